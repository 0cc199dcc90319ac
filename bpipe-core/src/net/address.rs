use std::{
    convert::TryFrom,
    fmt::Display,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    str::FromStr,
};

use anyhow::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::Visitor, Deserialize, Deserializer};
use url::Url;

pub const ATYP_V4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_V6: u8 = 0x04;

// The same as ATYP in Socks5 Protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    V4,
    V6,
    Domain,
}

impl From<AddressType> for u8 {
    fn from(value: AddressType) -> u8 {
        match value {
            AddressType::V4 => ATYP_V4,
            AddressType::V6 => ATYP_V6,
            AddressType::Domain => ATYP_DOMAIN,
        }
    }
}

impl TryFrom<u8> for AddressType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            ATYP_V4 => Ok(AddressType::V4),
            ATYP_V6 => Ok(AddressType::V6),
            ATYP_DOMAIN => Ok(AddressType::Domain),
            _ => Err(Error::msg(format!(
                "ATYP must be {:#04x} or {:#04x} or {:#04x} but got {:#04x}",
                ATYP_V4, ATYP_DOMAIN, ATYP_V6, value
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    Ip(IpAddr),
    Name(String),
}

impl Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Host::Ip(IpAddr::V4(v4)) => write!(f, "{}", v4),
            Host::Ip(IpAddr::V6(v6)) => write!(f, "[{}]", v6),
            Host::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for Host {
    fn from(s: &str) -> Self {
        let trimmed = s.trim_start_matches('[').trim_end_matches(']');

        match trimmed.parse::<IpAddr>() {
            Ok(ip) => Host::Ip(ip),
            Err(_) => Host::Name(s.to_string()),
        }
    }
}

// +------+----------+----------+
// | ATYP | DST.ADDR | DST.PORT |
// +------+----------+----------+
// |  1   | Variable |    2     |
// +------+----------+----------+
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    host: Host,
    port: u16,
}

impl Address {
    pub fn new(host: Host, port: u16) -> Self {
        Self { host, port }
    }

    pub fn is_ip(&self) -> bool {
        matches!(self.host, Host::Ip(_))
    }

    pub fn is_hostname(&self) -> bool {
        !self.is_ip()
    }

    pub fn address_type(&self) -> AddressType {
        match &self.host {
            Host::Ip(IpAddr::V4(_)) => AddressType::V4,
            Host::Ip(IpAddr::V6(_)) => AddressType::V6,
            Host::Name(_) => AddressType::Domain,
        }
    }

    /// A dialable address has a non-empty host and a non-zero port.
    pub fn is_valid(&self) -> bool {
        let host_ok = match &self.host {
            Host::Ip(_) => true,
            Host::Name(name) => !name.is_empty() && name.len() <= u8::MAX as usize,
        };
        host_ok && self.port != 0
    }

    pub fn as_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn as_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + 1 + 255 + 2);

        match &self.host {
            Host::Ip(IpAddr::V4(v4)) => {
                buf.put_u8(ATYP_V4);
                buf.put_slice(&v4.octets()[..]);
            }
            Host::Ip(IpAddr::V6(v6)) => {
                buf.put_u8(ATYP_V6);
                buf.put_slice(&v6.octets()[..]);
            }
            Host::Name(name) => {
                buf.put_u8(ATYP_DOMAIN);
                buf.put_u8(name.len() as u8); // length of hostname
                buf.put_slice(name.as_bytes());
            }
        }

        buf.put_u16(self.port);
        buf.freeze()
    }

    /// Parse `ATYP | DST.ADDR | DST.PORT` from the head of `buf`.
    ///
    /// Returns `Ok(None)` when `buf` is too short to hold the whole address,
    /// otherwise the address and the number of bytes it occupies.
    pub fn try_from_bytes(buf: &[u8]) -> Result<Option<(Self, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        let atyp = AddressType::try_from(buf[0])?;

        let (host, offset) = match atyp {
            AddressType::V4 => {
                if buf.len() < 1 + 4 {
                    return Ok(None);
                }
                let host = Host::Ip(IpAddr::V4(Ipv4Addr::new(buf[1], buf[2], buf[3], buf[4])));
                (host, 1 + 4)
            }
            AddressType::V6 => {
                if buf.len() < 1 + 16 {
                    return Ok(None);
                }
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&buf[1..17]);
                (Host::Ip(IpAddr::V6(Ipv6Addr::from(octets))), 1 + 16)
            }
            AddressType::Domain => {
                if buf.len() < 2 {
                    return Ok(None);
                }
                let len = buf[1] as usize;
                if buf.len() < 2 + len {
                    return Ok(None);
                }
                let name = String::from_utf8(buf[2..2 + len].to_vec())
                    .map_err(|_| Error::msg("DST.ADDR is not a valid utf-8 hostname"))?;
                (Host::Name(name), 2 + len)
            }
        };

        if buf.len() < offset + 2 {
            return Ok(None);
        }

        let port = u16::from_be_bytes([buf[offset], buf[offset + 1]]);

        Ok(Some((Self::new(host, port), offset + 2)))
    }

    /// Split `<host>[:<port>]` (as found in a Host header or a CONNECT target)
    /// into an address, `default_port` is used when the port is omitted.
    pub fn from_authority(s: &str, default_port: u16) -> Option<Self> {
        let s = s.trim();

        if s.is_empty() || s.contains('/') {
            return None;
        }

        // a non-special scheme keeps the explicit port even when it is 80 or 443
        let url = Url::parse(&format!("tcp://{}", s)).ok()?;
        let host = match url.host()? {
            url::Host::Domain(name) if name.is_empty() => return None,
            url::Host::Domain(name) => Host::from(name),
            url::Host::Ipv4(v4) => Host::Ip(IpAddr::V4(v4)),
            url::Host::Ipv6(v6) => Host::Ip(IpAddr::V6(v6)),
        };

        Some(Self::new(host, url.port().unwrap_or(default_port)))
    }

    /// Extract the address from an absolute URI such as `http://example.com/index.html`.
    pub fn from_absolute_uri(uri: &str) -> Option<Self> {
        let url = Url::parse(uri).ok()?;
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;

        Some(Self::new(Host::from(host), port))
    }

    pub fn host(&self) -> String {
        self.host.to_string()
    }

    pub fn ip(&self) -> Option<IpAddr> {
        match self.host {
            Host::Ip(ip) => Some(ip),
            Host::Name(_) => None,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (host, port) = s.rsplit_once(':').ok_or_else(|| format!("invalid format of {}", s))?;
        let port: u16 = port.parse().map_err(|_| format!("cannot parse port of {}", s))?;

        if host.is_empty() {
            return Err(format!("host of {} is empty", s));
        }

        Ok(Self::new(Host::from(host), port))
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self {
            host: Host::Ip(addr.ip()),
            port: addr.port(),
        }
    }
}

impl Default for Address {
    fn default() -> Self {
        Self {
            host: Host::Ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            port: Default::default(),
        }
    }
}

struct AddressVisitor;

impl<'de> Visitor<'de> for AddressVisitor {
    type Value = Address;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("<host>:<port>")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Address::from_str(v).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_string(AddressVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_authority() {
        let addr = Address::from_authority("example.com:443", 80).unwrap();
        assert_eq!(addr.host(), "example.com");
        assert_eq!(addr.port(), 443);

        let addr = Address::from_authority("example.com", 80).unwrap();
        assert_eq!(addr.port(), 80);

        let addr = Address::from_authority("example.com:80", 443).unwrap();
        assert_eq!(addr.port(), 80);

        let addr = Address::from_authority("93.184.216.34:8080", 80).unwrap();
        assert_eq!(addr.address_type(), AddressType::V4);

        let addr = Address::from_authority("[::1]:8080", 80).unwrap();
        assert_eq!(addr.address_type(), AddressType::V6);
        assert_eq!(addr.as_string(), "[::1]:8080");

        assert!(Address::from_authority("", 80).is_none());
        assert!(Address::from_authority("example.com/path", 80).is_none());
    }

    #[test]
    fn test_try_from_bytes_incomplete() {
        let addr: Address = "example.com:443".parse().unwrap();
        let buf = addr.as_bytes();

        for n in 0..buf.len() {
            assert!(Address::try_from_bytes(&buf[..n]).unwrap().is_none());
        }

        let (parsed, len) = Address::try_from_bytes(&buf).unwrap().unwrap();
        assert_eq!(parsed, addr);
        assert_eq!(len, buf.len());
    }

    #[test]
    fn test_try_from_bytes_bad_atyp() {
        assert!(Address::try_from_bytes(&[0x02, 0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_is_valid() {
        assert!("example.com:443".parse::<Address>().unwrap().is_valid());
        assert!(!"example.com:0".parse::<Address>().unwrap().is_valid());
        assert!(!Address::new(Host::Name(String::new()), 80).is_valid());
    }
}
