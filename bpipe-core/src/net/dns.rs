use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    time::{Duration, Instant},
};

use anyhow::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time;
use trust_dns_resolver::{
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    TokioAsyncResolver,
};

use crate::config::{DNS_CACHE_CAPACITY, DNS_RESOLVE_TIMEOUT_SECONDS};

#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str) -> Result<IpAddr>;
}

struct Entry {
    ip: IpAddr,
    expire_at: Instant,
}

/// Resolves hostnames and keeps the results for `expire`.
pub struct DnsCache {
    resolver: TokioAsyncResolver,
    expire: Duration,
    capacity: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

impl DnsCache {
    /// Query `dns_server` or the name servers of the system configuration when `None`.
    pub fn new(dns_server: Option<SocketAddr>, expire: Duration) -> Result<Self> {
        let resolver = match dns_server {
            Some(server) => {
                let group = NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true);
                let config = ResolverConfig::from_parts(None, vec![], group);

                TokioAsyncResolver::tokio(config, ResolverOpts::default())
                    .map_err(|err| Error::msg(format!("cannot create dns resolver for {}: {}", server, err)))?
            }
            None => TokioAsyncResolver::tokio_from_system_conf()
                .map_err(|err| Error::msg(format!("cannot create dns resolver from system conf: {}", err)))?,
        };

        Ok(Self {
            resolver,
            expire,
            capacity: DNS_CACHE_CAPACITY,
            entries: Mutex::new(HashMap::new()),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, host: &str) -> Option<IpAddr> {
        let mut entries = self.entries.lock();

        match entries.get(host) {
            Some(entry) if entry.expire_at > Instant::now() => Some(entry.ip),
            Some(_) => {
                entries.remove(host);
                None
            }
            None => None,
        }
    }

    fn put(&self, host: &str, ip: IpAddr) {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        entries.retain(|_, entry| entry.expire_at > now);

        if entries.len() >= self.capacity && !entries.contains_key(host) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.expire_at)
                .map(|(host, _)| host.clone());

            if let Some(oldest) = oldest {
                log::debug!("[dns] cache is full, evict {}", oldest);
                entries.remove(&oldest);
            }
        }

        entries.insert(
            host.to_string(),
            Entry {
                ip,
                expire_at: now + self.expire,
            },
        );
    }
}

#[async_trait]
impl Resolver for DnsCache {
    async fn resolve(&self, host: &str) -> Result<IpAddr> {
        let literal = host.trim_start_matches('[').trim_end_matches(']');

        if let Ok(ip) = literal.parse::<IpAddr>() {
            return Ok(ip);
        }

        if let Some(ip) = self.get(host) {
            log::debug!("[dns] {} is resolved to {} from cache", host, ip);
            return Ok(ip);
        }

        let lookup = time::timeout(
            Duration::from_secs(DNS_RESOLVE_TIMEOUT_SECONDS),
            self.resolver.lookup_ip(host),
        )
        .await
        .map_err(|_| Error::msg(format!("resolve {} timeout", host)))?
        .map_err(|err| Error::msg(format!("resolve {} failed: {}", host, err)))?;

        let ip = lookup
            .iter()
            .next()
            .ok_or_else(|| Error::msg(format!("resolve {} but got nothing", host)))?;

        log::debug!("[dns] {} is resolved to {}", host, ip);

        self.put(host, ip);

        Ok(ip)
    }
}
