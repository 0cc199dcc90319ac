use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::net::address::{Address, Host};

pub const SOCKS_VERSION_V4: u8 = 0x04;

const NOOP: u8 = 0x00;

pub const REQUEST_COMMAND_CONNECT: u8 = 0x01;
// const REQUEST_COMMAND_BIND: u8 = 0x02;

pub const REPLY_GRANTED: u8 = 0x5a;
// const REPLY_REJECTED: u8 = 0x5b;

// Socks4(a) Request Message
// +----+----+---------+-------+--------------+---------------------+
// | VN | CD | DSTPORT | DSTIP | USERID  NULL | DSTADDR NULL (4a)   |
// +----+----+---------+-------+--------------+---------------------+
// | 1  | 1  |    2    |   4   |   Variable   |      Variable       |
// +----+----+---------+-------+--------------+---------------------+
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMessage {
    pub cmd: u8,
    pub port: u16,
    pub ip: Ipv4Addr,
    pub user_id: Vec<u8>,
    /// DSTADDR of Socks4a, only present when non-empty
    pub host: Option<String>,
}

impl RequestMessage {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < 9 || buf[0] != SOCKS_VERSION_V4 {
            return None;
        }

        let user_id_end = 8 + buf[8..].iter().position(|b| *b == NOOP)?;
        let rest = &buf[user_id_end + 1..];

        // a lone trailing null after USERID is an empty DSTADDR
        let host = match rest {
            [] | [NOOP] => None,
            [name @ .., NOOP] if !name.contains(&NOOP) => Some(String::from_utf8(name.to_vec()).ok()?),
            _ => return None,
        };

        Some(Self {
            cmd: buf[1],
            port: u16::from_be_bytes([buf[2], buf[3]]),
            ip: Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]),
            user_id: buf[8..user_id_end].to_vec(),
            host,
        })
    }

    pub fn is_connect(&self) -> bool {
        self.cmd == REQUEST_COMMAND_CONNECT
    }

    pub fn address(&self) -> Address {
        match &self.host {
            Some(name) => Address::new(Host::Name(name.clone()), self.port),
            None => Address::new(Host::Ip(self.ip.into()), self.port),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let host_len = self.host.as_ref().map(|h| h.len() + 1).unwrap_or(0);
        let mut buf = BytesMut::with_capacity(8 + self.user_id.len() + 1 + host_len);

        buf.put_u8(SOCKS_VERSION_V4);
        buf.put_u8(self.cmd);
        buf.put_u16(self.port);
        buf.put_slice(&self.ip.octets());
        buf.put_slice(&self.user_id);
        buf.put_u8(NOOP);

        if let Some(host) = &self.host {
            buf.put_slice(host.as_bytes());
            buf.put_u8(NOOP);
        }

        buf.freeze()
    }
}

// Socks4 Reply Message
// +----+----+---------+-------+
// | VN | CD | DSTPORT | DSTIP |
// +----+----+---------+-------+
// | 1  | 1  |    2    |   4   |
// +----+----+---------+-------+
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyMessage {
    pub code: u8,
    pub port: u16,
    pub ip: Ipv4Addr,
}

impl ReplyMessage {
    pub fn granted(request: &RequestMessage) -> Self {
        Self {
            code: REPLY_GRANTED,
            port: request.port,
            ip: request.ip,
        }
    }

    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() != 8 || buf[0] != NOOP {
            return None;
        }

        Some(Self {
            code: buf[1],
            port: u16::from_be_bytes([buf[2], buf[3]]),
            ip: Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]),
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u8(NOOP);
        buf.put_u8(self.code);
        buf.put_u16(self.port);
        buf.put_slice(&self.ip.octets());
        buf.freeze()
    }
}
