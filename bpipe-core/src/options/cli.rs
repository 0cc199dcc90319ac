use clap::{Parser, Subcommand};

use super::{client::ClientOptions, common::Options, server::ServerOptions};

#[derive(Parser)]
#[clap(name = "bpipe", version, about)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn service_options(&self) -> Options {
        match &self.command {
            Command::Client(opts) => Options::Client(opts.clone()),
            Command::Server(opts) => Options::Server(opts.clone()),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Run bpipe client
    Client(ClientOptions),

    /// Run bpipe server
    Server(ServerOptions),
}
