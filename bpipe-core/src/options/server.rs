use anyhow::{Error, Result};
use serde::Deserialize;

use super::common::{check_key, OptionsChecker, PresetList};
use crate::{
    behaviour::Behaviour,
    config::{DEFAULT_DNS_EXPIRE_SECONDS, DEFAULT_PRESETS, DEFAULT_SERVICE_ADDRESS, DEFAULT_TIMEOUT_SECONDS},
    net::address::Address,
    presets::PRESET_PROXY,
};

#[derive(clap::Args, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerOptions {
    /// Configuration file in YAML/JSON format, [default: <empty>]
    #[clap(long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Local service bind address
    #[clap(short, long, default_value = DEFAULT_SERVICE_ADDRESS)]
    pub bind: Address,

    /// Symmetric key, required
    #[clap(short, long, default_value = "")]
    pub key: String,

    /// Comma separated preset names applied to each connection, e.g, "ss-base,erp"
    #[clap(short, long, default_value = DEFAULT_PRESETS)]
    pub presets: PresetList,

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

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: None,
            bind: DEFAULT_SERVICE_ADDRESS.parse().unwrap_or_default(),
            key: String::new(),
            presets: PresetList::default(),
            timeout: DEFAULT_TIMEOUT_SECONDS,
            dns_server: None,
            dns_expire: DEFAULT_DNS_EXPIRE_SECONDS,
            on_preset_failed: Behaviour::default(),
        }
    }
}

impl OptionsChecker for ServerOptions {
    fn check(&self) -> Result<()> {
        check_key(Some(&self.key))?;
        self.presets.check()?;

        if self.presets.0.iter().any(|preset| preset.name == PRESET_PROXY) {
            return Err(Error::msg(format!("preset {} can only be used on client.", PRESET_PROXY)));
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
