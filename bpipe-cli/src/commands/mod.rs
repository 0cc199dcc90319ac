pub mod client_server;
