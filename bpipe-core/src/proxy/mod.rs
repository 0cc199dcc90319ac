pub mod detector;
pub mod http;
pub mod socks4;
pub mod socks5;

pub use detector::{ClientProxy, Completion, Handshake, Pending};
