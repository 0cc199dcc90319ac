use bpipe_core::{Address, Options, StartupInfo};
use tokio::sync::oneshot;

use crate::commands::client_server::bootstrap;

/// Start a bpipe service on a random loopback port, panics if it cannot start.
pub async fn run_bpipe(mut opts: Options) -> StartupInfo {
    opts.set_bind("127.0.0.1:0".parse::<Address>().unwrap());
    opts.check().unwrap();

    let (tx, rx) = oneshot::channel::<StartupInfo>();

    tokio::spawn(async move {
        if let Err(err) = bootstrap(opts, tx).await {
            panic!("{}", err);
        }
    });

    rx.await.expect("service should start")
}
