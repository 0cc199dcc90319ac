use anyhow::{Error, Result};
use serde::Deserialize;

use super::common::{check_key, OptionsChecker, PresetList};
use crate::{
    behaviour::Behaviour,
    config::{DEFAULT_DNS_EXPIRE_SECONDS, DEFAULT_SERVICE_ADDRESS, DEFAULT_TIMEOUT_SECONDS},
    net::{address::Address, balancer::Upstream},
    presets::PRESET_PROXY,
};

/// One upstream server of the client, only available in config files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerEntry {
    pub bind: Address,
    pub key: String,
    #[serde(default)]
    pub presets: PresetList,
}

#[derive(clap::Args, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ClientOptions {
    /// Configuration file in YAML/JSON format, [default: <empty>]
    #[clap(long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Local service bind address
    #[clap(short, long, default_value = DEFAULT_SERVICE_ADDRESS)]
    pub bind: Address,

    /// Server bind address, ignored if "servers" is set in the config file, [default: <empty>]
    #[clap(long)]
    pub server_bind: Option<Address>,

    /// Symmetric key shared with --server-bind, [default: <empty>]
    #[clap(short, long)]
    pub key: Option<String>,

    /// Comma separated preset names applied to each connection, e.g, "ss-base,erp"
    #[clap(short, long, default_value = crate::config::DEFAULT_PRESETS)]
    pub presets: PresetList,

    /// Upstream servers with their own key and presets
    #[clap(skip)]
    pub servers: Vec<ServerEntry>,

    /// Close a connection after it has been idle for this many seconds
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout: u64,

    /// DNS server address, [default: <system configuration>]
    #[clap(long)]
    pub dns_server: Option<Address>,

    /// Seconds to keep a resolved address in the dns cache
    #[clap(long, default_value_t = DEFAULT_DNS_EXPIRE_SECONDS)]
    pub dns_expire: u64,

    /// What to do when a preset fails: close, random-timeout or redirect:<host>:<port>
    #[clap(long, default_value = "close")]
    pub on_preset_failed: Behaviour,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            config: None,
            bind: DEFAULT_SERVICE_ADDRESS.parse().unwrap_or_default(),
            server_bind: None,
            key: None,
            presets: PresetList::default(),
            servers: vec![],
            timeout: DEFAULT_TIMEOUT_SECONDS,
            dns_server: None,
            dns_expire: DEFAULT_DNS_EXPIRE_SECONDS,
            on_preset_failed: Behaviour::default(),
        }
    }
}

impl ClientOptions {
    /// Upstream servers in configuration order, `servers` wins over `--server-bind`.
    pub fn upstreams(&self) -> Vec<Upstream> {
        if !self.servers.is_empty() {
            return self
                .servers
                .iter()
                .enumerate()
                .map(|(id, entry)| Upstream {
                    id,
                    address: entry.bind.clone(),
                    key: entry.key.clone(),
                    presets: entry.presets.0.clone(),
                })
                .collect();
        }

        match &self.server_bind {
            Some(bind) => vec![Upstream {
                id: 0,
                address: bind.clone(),
                key: self.key.clone().unwrap_or_default(),
                presets: self.presets.0.clone(),
            }],
            None => vec![],
        }
    }
}

fn check_proxy_position(presets: &PresetList) -> Result<()> {
    if presets.0.iter().skip(1).any(|preset| preset.name == PRESET_PROXY) {
        return Err(Error::msg(format!("preset {} must be the first one.", PRESET_PROXY)));
    }
    Ok(())
}

impl OptionsChecker for ClientOptions {
    fn check(&self) -> Result<()> {
        if self.servers.is_empty() && self.server_bind.is_none() {
            return Err(Error::msg("--server-bind must be set, or \"servers\" in config file."));
        }

        if self.servers.is_empty() {
            check_key(self.key.as_deref())?;
            self.presets.check()?;
            check_proxy_position(&self.presets)?;
        }

        for server in &self.servers {
            if !server.bind.is_valid() {
                return Err(Error::msg(format!("server {} is invalid.", server.bind)));
            }
            check_key(Some(&server.key)).map_err(|_| Error::msg(format!("key of server {} is empty.", server.bind)))?;
            server.presets.check()?;
            check_proxy_position(&server.presets)?;
        }

        if let Some(dns_server) = &self.dns_server {
            if !dns_server.is_ip() {
                return Err(Error::msg("--dns-server must be an ip address."));
            }
        }

        if self.timeout == 0 {
            return Err(Error::msg("--timeout should not be zero."));
        }

        Ok(())
    }
}
