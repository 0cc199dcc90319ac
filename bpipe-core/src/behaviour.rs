use std::{fmt::Display, str::FromStr, time::Duration};

use serde::{de::Visitor, Deserialize, Deserializer};

use crate::{net::address::Address, utils::crypto::Crypto};

const RANDOM_TIMEOUT_MIN_SECONDS: u64 = 10;
const RANDOM_TIMEOUT_MAX_SECONDS: u64 = 40;

/// What a session does when one of its presets fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behaviour {
    /// Close the connection immediately
    Close,
    /// Keep the connection open for a while and then close it
    RandomTimeout,
    /// Relay the connection to another address, starting with the bytes which failed
    Redirect(Address),
}

impl Behaviour {
    /// How long `RandomTimeout` holds the connection, between 10s and 40s.
    pub fn random_timeout() -> Duration {
        Duration::from_secs(Crypto::random_range(
            RANDOM_TIMEOUT_MIN_SECONDS,
            RANDOM_TIMEOUT_MAX_SECONDS,
        ))
    }
}

impl Default for Behaviour {
    fn default() -> Self {
        Self::Close
    }
}

impl FromStr for Behaviour {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "close" => Ok(Self::Close),
            "random-timeout" => Ok(Self::RandomTimeout),
            lower => match lower.strip_prefix("redirect:") {
                Some(_) => {
                    let address = Address::from_str(&s["redirect:".len()..])?;

                    if !address.is_valid() {
                        return Err(format!("redirect address {} is invalid", address));
                    }

                    Ok(Self::Redirect(address))
                }
                None => Err(format!(
                    "{} is not supported, available behaviours are: close, random-timeout, redirect:<host>:<port>",
                    s
                )),
            },
        }
    }
}

impl Display for Behaviour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Close => f.write_str("close"),
            Self::RandomTimeout => f.write_str("random-timeout"),
            Self::Redirect(address) => write!(f, "redirect:{}", address),
        }
    }
}

struct BehaviourVisitor;

impl<'de> Visitor<'de> for BehaviourVisitor {
    type Value = Behaviour;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("close/random-timeout/redirect:<host>:<port>")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Behaviour::from_str(v).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Behaviour {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_string(BehaviourVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_behaviour() {
        assert_eq!("close".parse::<Behaviour>(), Ok(Behaviour::Close));
        assert_eq!("Random-Timeout".parse::<Behaviour>(), Ok(Behaviour::RandomTimeout));
        assert_eq!(
            "redirect:example.com:80".parse::<Behaviour>().map(|b| b.to_string()),
            Ok("redirect:example.com:80".to_string())
        );
        assert!("redirect:example.com".parse::<Behaviour>().is_err());
        assert!("redirect:example.com:0".parse::<Behaviour>().is_err());
        assert!("explode".parse::<Behaviour>().is_err());
    }

    #[test]
    fn test_random_timeout_range() {
        for _ in 0..32 {
            let timeout = Behaviour::random_timeout().as_secs();
            assert!((10..=40).contains(&timeout));
        }
    }
}
