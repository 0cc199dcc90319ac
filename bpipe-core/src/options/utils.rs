use std::fs;

use anyhow::{Error, Result};

pub fn options_from_file<T: serde::de::DeserializeOwned>(file: &str) -> Result<T> {
    let raw_str = fs::read_to_string(file).map_err(|err| Error::msg(format!("fail to read {}: {}", file, err)))?;

    if file.ends_with(".yml") || file.ends_with(".yaml") {
        return from_yaml_str::<T>(&raw_str);
    }

    if file.ends_with(".json") {
        return from_json_str::<T>(&raw_str);
    }

    Err(Error::msg("invalid file format, only .yml, .yaml and .json are supported"))
}

pub fn from_yaml_str<T: serde::de::DeserializeOwned>(s: &str) -> Result<T> {
    serde_yaml::from_str(s).map_err(|err| Error::msg(format!("fail to load YAML config: {}", err)))
}

pub fn from_json_str<T: serde::de::DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|err| Error::msg(format!("fail to load JSON config: {}", err)))
}
