use std::{process, sync::Arc};

use anyhow::{Error, Result};
use bpipe_core::{
    config::SERVICE_CONNECTION_THRESHOLD, net::resolve, start_tcp_service, DnsCache, Options, ServiceContext, Session,
    StartupInfo,
};
use tokio::{
    net::TcpStream,
    sync::{mpsc::channel, oneshot::Sender},
};

use crate::utils::{
    counter::Counter,
    exit::{exit, ExitError},
};

pub async fn run(mut opts: Options, sender_ready: Sender<StartupInfo>) {
    // try load bpipe service options from --config
    if let Some(config) = opts.config() {
        log::info!("loading configuration from {}", config);
        if let Err(err) = opts.try_load_from_file(&config) {
            log::error!("unrecognized format of --config: {}", err);
            exit(ExitError::ArgumentsError);
        }
    }

    // check options
    if let Err(err) = opts.check() {
        log::error!("{}", err);
        exit(ExitError::ArgumentsError);
    }

    // bootstrap bpipe service
    if let Err(err) = bootstrap(opts, sender_ready).await {
        log::error!("{}", err);
        exit(ExitError::BootstrapError);
    }

    log::info!("[{}] process exit with code 0", process::id());
}

/// Start the service described by checked `opts` and serve until the listener fails.
pub async fn bootstrap(opts: Options, sender_ready: Sender<StartupInfo>) -> Result<()> {
    let dns_cache = DnsCache::new(opts.dns_server(), opts.dns_expire())?;

    match opts.dns_server() {
        Some(server) => log::info!("using dns server {}", server),
        None => log::info!("using dns servers from system configuration"),
    }

    let ctx = Arc::new(ServiceContext::new(&opts, Arc::new(dns_cache)));

    log::info!(
        "running as {}, presets: {}",
        if opts.is_client() { "client" } else { "server" },
        ctx.presets.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(",")
    );

    let (sender, mut receiver) = channel::<Option<(TcpStream, std::net::SocketAddr)>>(SERVICE_CONNECTION_THRESHOLD);

    let bind_addr = resolve(ctx.resolver.as_ref(), &opts.bind()).await?;
    let startup_info = start_tcp_service(bind_addr, sender).await?;

    sender_ready
        .send(startup_info)
        .map_err(|_| Error::msg("startup info receiver is dropped"))?;

    let total_cnt = Arc::new(Counter::default());
    let live_cnt = Arc::new(Counter::default());

    // consume accepted sockets, each one runs a Session on its own task
    while let Some(Some((stream, peer_addr))) = receiver.recv().await {
        let ctx = ctx.clone();
        let total_cnt = total_cnt.clone();
        let live_cnt = live_cnt.clone();

        total_cnt.inc();
        live_cnt.inc();

        tokio::spawn(async move {
            log::info!(
                "[{}] connected, {} live connections, {} in total",
                peer_addr,
                live_cnt,
                total_cnt
            );

            match Session::new(stream, peer_addr, ctx) {
                Ok(session) => {
                    if let Err(err) = session.handle().await {
                        log::warn!("{}", err);
                    }
                }
                Err(err) => log::error!("[{}] {}", peer_addr, err),
            }

            live_cnt.dec();

            log::info!(
                "[{}] closed, {} live connections, {} in total",
                peer_addr,
                live_cnt,
                total_cnt
            );
        });
    }

    Ok(())
}
