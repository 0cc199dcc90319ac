use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Error, Result};
use serde::Deserialize;

use crate::{
    behaviour::Behaviour,
    config::DEFAULT_PRESETS,
    net::{address::Address, balancer::Upstream},
    options::{client::ClientOptions, server::ServerOptions, utils::options_from_file},
    presets::{check_params, PresetConfig},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    Client,
    Server,
}

impl ServiceType {
    pub fn is_client(&self) -> bool {
        matches!(self, ServiceType::Client)
    }

    pub fn is_server(&self) -> bool {
        matches!(self, ServiceType::Server)
    }
}

pub trait OptionsChecker {
    fn check(&self) -> Result<()>;
}

/// Ordered presets, written as `ss-base,erp` on the command line or as a list of
/// `{name, params}` in a config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct PresetList(pub Vec<PresetConfig>);

impl PresetList {
    pub fn check(&self) -> Result<()> {
        for preset in &self.0 {
            check_params(&preset.name, &preset.params)?;
        }
        Ok(())
    }
}

impl FromStr for PresetList {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let names: Vec<&str> = s.split(',').map(str::trim).filter(|name| !name.is_empty()).collect();

        if names.is_empty() {
            return Err("preset list is empty".into());
        }

        Ok(Self(names.into_iter().map(PresetConfig::new).collect()))
    }
}

impl Default for PresetList {
    fn default() -> Self {
        DEFAULT_PRESETS.parse().unwrap_or(Self(vec![]))
    }
}

/// Check that `key` is usable for presets which need one.
pub(crate) fn check_key(key: Option<&str>) -> Result<()> {
    match key {
        Some(key) if !key.is_empty() => Ok(()),
        _ => Err(Error::msg("-k or --key must be set.")),
    }
}

#[derive(Debug, Clone)]
pub enum Options {
    Client(ClientOptions),
    Server(ServerOptions),
}

impl Options {
    pub fn try_load_from_file(&mut self, config: &str) -> Result<()> {
        match self.service_type() {
            ServiceType::Client => {
                let mut file_opts = options_from_file::<ClientOptions>(config)?;
                file_opts.config = Some(config.to_string());
                *self = Self::Client(file_opts);
            }
            ServiceType::Server => {
                let mut file_opts = options_from_file::<ServerOptions>(config)?;
                file_opts.config = Some(config.to_string());
                *self = Self::Server(file_opts);
            }
        }
        Ok(())
    }

    pub fn check(&self) -> Result<()> {
        match self {
            Self::Client(opts) => opts.check(),
            Self::Server(opts) => opts.check(),
        }
    }

    pub fn set_bind(&mut self, bind: Address) {
        match self {
            Self::Client(opts) => opts.bind = bind,
            Self::Server(opts) => opts.bind = bind,
        }
    }
}

impl Options {
    pub fn is_client(&self) -> bool {
        matches!(self, Self::Client { .. })
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server { .. })
    }

    pub fn config(&self) -> Option<String> {
        match self {
            Self::Client(opts) => opts.config.clone(),
            Self::Server(opts) => opts.config.clone(),
        }
    }

    pub fn service_type(&self) -> ServiceType {
        match self {
            Self::Client(_) => ServiceType::Client,
            Self::Server(_) => ServiceType::Server,
        }
    }

    pub fn bind(&self) -> Address {
        match self {
            Self::Client(opts) => opts.bind.clone(),
            Self::Server(opts) => opts.bind.clone(),
        }
    }

    /// The key used by the server side presets, empty on the client which uses the
    /// key of each upstream instead.
    pub fn key(&self) -> String {
        match self {
            Self::Client(opts) => opts.key.clone().unwrap_or_default(),
            Self::Server(opts) => opts.key.clone(),
        }
    }

    pub fn presets(&self) -> Vec<PresetConfig> {
        match self {
            Self::Client(opts) => opts.presets.0.clone(),
            Self::Server(opts) => opts.presets.0.clone(),
        }
    }

    pub fn upstreams(&self) -> Vec<Upstream> {
        match self {
            Self::Client(opts) => opts.upstreams(),
            Self::Server(_) => vec![],
        }
    }

    pub fn timeout(&self) -> Duration {
        let secs = match self {
            Self::Client(opts) => opts.timeout,
            Self::Server(opts) => opts.timeout,
        };
        Duration::from_secs(secs)
    }

    /// Use the system configuration when `None`.
    pub fn dns_server(&self) -> Option<SocketAddr> {
        let server = match self {
            Self::Client(opts) => opts.dns_server.as_ref(),
            Self::Server(opts) => opts.dns_server.as_ref(),
        };
        server.and_then(|addr| addr.ip().map(|ip| SocketAddr::new(ip, addr.port())))
    }

    pub fn dns_expire(&self) -> Duration {
        let secs = match self {
            Self::Client(opts) => opts.dns_expire,
            Self::Server(opts) => opts.dns_expire,
        };
        Duration::from_secs(secs)
    }

    pub fn on_preset_failed(&self) -> Behaviour {
        match self {
            Self::Client(opts) => opts.on_preset_failed.clone(),
            Self::Server(opts) => opts.on_preset_failed.clone(),
        }
    }
}
