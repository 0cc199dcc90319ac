use bytes::{BufMut, Bytes, BytesMut};

use crate::net::address::Address;

pub const SOCKS_VERSION_V5: u8 = 0x05;

const NOOP: u8 = 0x00;
pub const METHOD_NO_AUTH: u8 = 0x00;
// const METHOD_USERNAME_PASSWORD: u8 = 0x02;
// const METHOD_NOT_ACCEPTABLE: u8 = 0xff;

const REQUEST_COMMAND_CONNECT: u8 = 0x01;
const REQUEST_COMMAND_BIND: u8 = 0x02;
const REQUEST_COMMAND_UDP: u8 = 0x03;

pub const REPLY_SUCCEEDED: u8 = 0x00;
// const REPLY_FAILURE: u8 = 0x01;
// const REPLY_NOT_ALLOWED: u8 = 0x02;
// const REPLY_NETWORK_UNREACHABLE: u8 = 0x03;
// const REPLY_HOST_UNREACHABLE: u8 = 0x04;
// const REPLY_CONNECTION_REFUSED: u8 = 0x05;
// const REPLY_TTL_EXPIRED: u8 = 0x06;
pub const REPLY_COMMAND_NOT_SUPPORTED: u8 = 0x07;
// const REPLY_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;

// Socks5 Identifier Message
// +----+----------+----------+
// |VER | NMETHODS | METHODS  |
// +----+----------+----------+
// | 1  |    1     | 1 to 255 |
// +----+----------+----------+
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierMessage {
    pub methods: Vec<u8>,
}

impl IdentifierMessage {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < 3 || buf[0] != SOCKS_VERSION_V5 {
            return None;
        }

        let n_methods = buf[1] as usize;

        if n_methods < 1 || buf.len() != 2 + n_methods {
            return None;
        }

        Some(Self {
            methods: buf[2..].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(2 + self.methods.len());
        buf.put_u8(SOCKS_VERSION_V5);
        buf.put_u8(self.methods.len() as u8);
        buf.put_slice(&self.methods);
        buf.freeze()
    }
}

// Socks5 Select Message
// +----+--------+
// |VER | METHOD |
// +----+--------+
// | 1  |   1    |
// +----+--------+
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectMessage {
    pub method: u8,
}

impl Default for SelectMessage {
    fn default() -> Self {
        Self { method: METHOD_NO_AUTH }
    }
}

impl SelectMessage {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        match buf {
            [SOCKS_VERSION_V5, method] => Some(Self { method: *method }),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&[SOCKS_VERSION_V5, self.method])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Bind,
    UdpAssociate,
    Unknown(u8),
}

impl From<u8> for Command {
    fn from(value: u8) -> Self {
        match value {
            REQUEST_COMMAND_CONNECT => Command::Connect,
            REQUEST_COMMAND_BIND => Command::Bind,
            REQUEST_COMMAND_UDP => Command::UdpAssociate,
            other => Command::Unknown(other),
        }
    }
}

impl From<Command> for u8 {
    fn from(value: Command) -> u8 {
        match value {
            Command::Connect => REQUEST_COMMAND_CONNECT,
            Command::Bind => REQUEST_COMMAND_BIND,
            Command::UdpAssociate => REQUEST_COMMAND_UDP,
            Command::Unknown(other) => other,
        }
    }
}

// Socks5 Request Message
// +----+-----+-------+------+----------+----------+
// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
// +----+-----+-------+------+----------+----------+
// | 1  |  1  | X'00' |  1   | Variable |    2     |
// +----+-----+-------+------+----------+----------+
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMessage {
    pub cmd: Command,
    pub address: Address,
}

impl RequestMessage {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < 4 || buf[0] != SOCKS_VERSION_V5 || buf[2] != NOOP {
            return None;
        }

        match Address::try_from_bytes(&buf[3..]) {
            Ok(Some((address, len))) if 3 + len == buf.len() => Some(Self {
                cmd: Command::from(buf[1]),
                address,
            }),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(3 + 1 + 255 + 2);
        buf.put_u8(SOCKS_VERSION_V5);
        buf.put_u8(self.cmd.into());
        buf.put_u8(NOOP);
        buf.put_slice(&self.address.as_bytes());
        buf.freeze()
    }
}

// Socks5 Reply Message
// +----+-----+-------+------+----------+----------+
// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
// +----+-----+-------+------+----------+----------+
// | 1  |  1  | X'00' |  1   | Variable |    2     |
// +----+-----+-------+------+----------+----------+
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMessage {
    pub rep: u8,
    pub address: Address,
}

impl ReplyMessage {
    /// Success reply, BND.ADDR and BND.PORT echo the requested destination.
    pub fn succeeded(address: Address) -> Self {
        Self {
            rep: REPLY_SUCCEEDED,
            address,
        }
    }

    pub fn command_not_supported() -> Self {
        Self {
            rep: REPLY_COMMAND_NOT_SUPPORTED,
            address: Address::default(),
        }
    }

    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < 4 || buf[0] != SOCKS_VERSION_V5 || buf[2] != NOOP {
            return None;
        }

        match Address::try_from_bytes(&buf[3..]) {
            Ok(Some((address, len))) if 3 + len == buf.len() => Some(Self { rep: buf[1], address }),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(3 + 1 + 255 + 2);
        buf.put_u8(SOCKS_VERSION_V5);
        buf.put_u8(self.rep);
        buf.put_u8(NOOP);
        buf.put_slice(&self.address.as_bytes());
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_parse() {
        assert_eq!(
            IdentifierMessage::parse(&[0x05, 0x01, 0x00]),
            Some(IdentifierMessage { methods: vec![0x00] })
        );
        assert_eq!(IdentifierMessage::parse(&[0x05, 0x00]), None);
        assert_eq!(IdentifierMessage::parse(&[0x05, 0x02, 0x00]), None);
        assert_eq!(IdentifierMessage::parse(&[0x04, 0x01, 0x00]), None);
    }

    #[test]
    fn test_request_parse_exact_length() {
        let buf = [0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50];

        let req = RequestMessage::parse(&buf).unwrap();
        assert_eq!(req.cmd, Command::Connect);
        assert_eq!(req.address.as_string(), "127.0.0.1:80");

        assert_eq!(RequestMessage::parse(&buf[..9]), None);

        let mut longer = buf.to_vec();
        longer.push(0xff);
        assert_eq!(RequestMessage::parse(&longer), None);
    }

    #[test]
    fn test_request_parse_bad_rsv() {
        let buf = [0x05, 0x01, 0x01, 0x01, 127, 0, 0, 1, 0x00, 0x50];
        assert_eq!(RequestMessage::parse(&buf), None);
    }

    #[test]
    fn test_command_not_supported_reply() {
        assert_eq!(
            &ReplyMessage::command_not_supported().to_bytes()[..],
            &[0x05, 0x07, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }
}
