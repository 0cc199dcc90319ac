use anyhow::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::{options::ServiceType, pipeline::DynPreset};

pub mod erp;
pub mod proxy;
pub mod ss_base;
pub mod tracker;

pub use erp::Erp;
pub use proxy::Proxy;
pub use ss_base::SsBase;
pub use tracker::Tracker;

pub const PRESET_PROXY: &str = "proxy";
pub const PRESET_TRACKER: &str = "tracker";
pub const PRESET_SS_BASE: &str = "ss-base";
pub const PRESET_ERP: &str = "erp";

/// One entry of the `presets` option.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PresetConfig {
    pub name: String,
    #[serde(default)]
    pub params: Value,
}

impl PresetConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Value::Null,
        }
    }
}

/// Validate the parameters of preset `name`, unknown names are rejected.
pub fn check_params(name: &str, params: &Value) -> Result<()> {
    match name {
        PRESET_PROXY | PRESET_TRACKER | PRESET_SS_BASE | PRESET_ERP => match params {
            Value::Null => Ok(()),
            Value::Object(map) if map.is_empty() => Ok(()),
            Value::Object(map) => Err(Error::msg(format!(
                "preset {} takes no params but got {}",
                name,
                map.keys().cloned().collect::<Vec<_>>().join(", ")
            ))),
            other => Err(Error::msg(format!("params of preset {} must be an object but got {}", name, other))),
        },
        _ => Err(Error::msg(format!("unknown preset: {}", name))),
    }
}

pub fn create_preset(config: &PresetConfig, service_type: ServiceType, key: &str) -> Result<DynPreset> {
    check_params(&config.name, &config.params)?;

    let preset: DynPreset = match config.name.as_str() {
        PRESET_PROXY if service_type.is_server() => {
            return Err(Error::msg(format!("preset {} can only be used on client", PRESET_PROXY)));
        }
        PRESET_PROXY => Box::new(Proxy::new()),
        PRESET_TRACKER => Box::new(Tracker::new()),
        PRESET_SS_BASE => Box::new(SsBase::new(service_type)),
        PRESET_ERP => Box::new(Erp::new(key, service_type)?),
        name => return Err(Error::msg(format!("unknown preset: {}", name))),
    };

    Ok(preset)
}

/// Build the presets of one connection in configuration order.
pub fn create_presets(configs: &[PresetConfig], service_type: ServiceType, key: &str) -> Result<Vec<DynPreset>> {
    configs
        .iter()
        .map(|config| create_preset(config, service_type, key))
        .collect()
}
