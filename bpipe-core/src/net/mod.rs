use std::{
    net::SocketAddr,
    time::Duration,
};

use anyhow::{Error, Result};
use tokio::{net::TcpStream, time};

use crate::config::TCP_CONNECT_TIMEOUT_SECONDS;

pub mod address;
pub mod balancer;
pub mod dns;
pub mod io;
pub mod service;
pub mod session;

pub use address::Address;
pub use balancer::{Balancer, Upstream};
pub use dns::{DnsCache, Resolver};
pub use service::{start_tcp_service, ServiceContext, StartupInfo};
pub use session::Session;

/// Turn `address` into a socket address, hostnames go through `resolver`.
pub async fn resolve(resolver: &dyn Resolver, address: &Address) -> Result<SocketAddr> {
    let ip = match address.ip() {
        Some(ip) => ip,
        None => resolver.resolve(&address.host()).await?,
    };
    Ok(SocketAddr::new(ip, address.port()))
}

pub async fn connect(resolver: &dyn Resolver, address: &Address) -> Result<TcpStream> {
    let addr = resolve(resolver, address).await?;

    time::timeout(
        Duration::from_secs(TCP_CONNECT_TIMEOUT_SECONDS),
        TcpStream::connect(addr),
    )
    .await
    .map_err(|_| Error::msg(format!("connect to {} timeout", address)))?
    .map_err(|err| Error::msg(format!("connect to {} failed: {}", address, err)))
}
