use bpipe_cli::{commands::client_server, exit, logging, ExitError};
use bpipe_core::{Cli, StartupInfo};
use clap::Parser;
use log::LevelFilter;
use tokio::sync::oneshot;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = logging::init(LevelFilter::Info) {
        eprintln!("{}", err);
        exit(ExitError::LoggingError);
    }

    let (tx, _rx) = oneshot::channel::<StartupInfo>();

    client_server::run(cli.service_options(), tx).await;
}
