use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Error, Result};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc::Sender,
};

use crate::{
    behaviour::Behaviour,
    net::{balancer::Balancer, dns::Resolver},
    options::{Options, ServiceType},
    presets::PresetConfig,
};

#[derive(Debug, Clone)]
pub struct StartupInfo {
    /// The address actually bound, useful when binding port 0
    pub bind_addr: SocketAddr,
}

/// Everything a session needs besides its socket, shared by all sessions of a service.
pub struct ServiceContext {
    pub service_type: ServiceType,
    pub presets: Vec<PresetConfig>,
    pub key: String,
    pub timeout: Duration,
    pub on_preset_failed: Behaviour,
    pub resolver: Arc<dyn Resolver>,
    pub balancer: Arc<Balancer>,
}

impl ServiceContext {
    pub fn new(opts: &Options, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            service_type: opts.service_type(),
            presets: opts.presets(),
            key: opts.key(),
            timeout: opts.timeout(),
            on_preset_failed: opts.on_preset_failed(),
            resolver,
            balancer: Arc::new(Balancer::new(opts.upstreams())),
        }
    }
}

pub async fn start_tcp_service(
    bind_addr: SocketAddr,
    sender: Sender<Option<(TcpStream, SocketAddr)>>,
) -> Result<StartupInfo> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|err| Error::msg(format!("tcp service start failed from {} due to: {}", bind_addr, err)))?;

    let bind_addr = listener.local_addr()?;

    log::info!("service running at tcp://{}, waiting for connection...", bind_addr);

    tokio::spawn(async move {
        loop {
            let accept = listener.accept().await;

            if sender.is_closed() {
                break;
            }

            match accept {
                Ok(conn) => {
                    if sender.send(Some(conn)).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    log::error!("encountered an error: {}", err);
                    let _ = sender.send(None).await;
                    break;
                }
            }
        }
    });

    Ok(StartupInfo { bind_addr })
}
