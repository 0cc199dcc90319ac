use bytes::{Bytes, BytesMut};

use crate::{
    config::MAX_HTTP_HEAD_SIZE,
    net::address::Address,
    proxy::{
        http::{ConnectReply, HttpRequest},
        socks4, socks5,
    },
};

/// What to do once the destination of a matched request is reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    Socks5 { address: Address, udp: bool },
    Socks4(socks4::RequestMessage),
    HttpConnect,
    /// A plain forward proxy request, the original buffer still has to go upstream
    HttpForward(Bytes),
}

/// Result of feeding one buffer to the detector.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Bytes to write back to the application right away
    pub reply: Option<Bytes>,
    /// Set when a request matched, the destination to connect to
    pub address: Option<Address>,
}

/// Result of `ClientProxy::complete`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Reply to the application
    pub reply: Option<Bytes>,
    /// Bytes to send on towards the destination
    pub forward: Option<Bytes>,
}

/// Detects Socks5, Socks4(a) and HTTP proxy handshakes on the same inbound stream.
#[derive(Debug, Default)]
pub struct ClientProxy {
    socks_tcp_ready: bool,
    socks_udp_ready: bool,
    http_ready: bool,
    pending: Option<Pending>,
    staged: BytesMut,
}

impl ClientProxy {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_done(&self) -> bool {
        self.socks_tcp_ready || self.socks_udp_ready || self.http_ready
    }

    pub fn is_socks_tcp_ready(&self) -> bool {
        self.socks_tcp_ready
    }

    pub fn is_socks_udp_ready(&self) -> bool {
        self.socks_udp_ready
    }

    pub fn is_http_ready(&self) -> bool {
        self.http_ready
    }

    /// Whether a request matched and is waiting for `complete`.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&Pending> {
        self.pending.as_ref()
    }

    /// Try Socks5, then Socks4, then HTTP against `buf`.
    ///
    /// A buffer that matches nothing leaves the detector untouched, except
    /// that an incomplete HTTP head is kept and retried with the next buffer.
    pub fn make_handshake(&mut self, buf: &[u8]) -> Handshake {
        if self.is_done() || self.is_pending() {
            return Handshake::default();
        }

        let joined;
        let buf = if self.staged.is_empty() {
            buf
        } else {
            self.staged.extend_from_slice(buf);
            joined = self.staged.split().freeze();
            &joined[..]
        };

        if let Some(handshake) = self.try_socks5(buf) {
            return handshake;
        }

        if let Some(handshake) = self.try_socks4(buf) {
            return handshake;
        }

        if let Some(handshake) = self.try_http(buf) {
            return handshake;
        }

        if buf.len() <= MAX_HTTP_HEAD_SIZE && HttpRequest::is_partial(buf) {
            self.staged.extend_from_slice(buf);
        }

        Handshake::default()
    }

    /// Run the continuation of the matched request, the destination is reachable now.
    pub fn complete(&mut self) -> Completion {
        match self.pending.take() {
            Some(Pending::Socks5 { address, udp }) => {
                if udp {
                    self.socks_udp_ready = true;
                } else {
                    self.socks_tcp_ready = true;
                }
                Completion {
                    reply: Some(socks5::ReplyMessage::succeeded(address).to_bytes()),
                    forward: None,
                }
            }
            Some(Pending::Socks4(request)) => {
                self.socks_tcp_ready = true;
                Completion {
                    reply: Some(socks4::ReplyMessage::granted(&request).to_bytes()),
                    forward: None,
                }
            }
            Some(Pending::HttpConnect) => {
                self.http_ready = true;
                Completion {
                    reply: Some(ConnectReply.to_bytes()),
                    forward: None,
                }
            }
            Some(Pending::HttpForward(buf)) => {
                self.http_ready = true;
                Completion {
                    reply: None,
                    forward: Some(buf),
                }
            }
            None => Completion::default(),
        }
    }

    fn try_socks5(&mut self, buf: &[u8]) -> Option<Handshake> {
        if socks5::IdentifierMessage::parse(buf).is_some() {
            return Some(Handshake {
                reply: Some(socks5::SelectMessage::default().to_bytes()),
                address: None,
            });
        }

        let request = socks5::RequestMessage::parse(buf)?;

        let udp = match request.cmd {
            socks5::Command::Connect => false,
            socks5::Command::UdpAssociate => true,
            _ => {
                return Some(Handshake {
                    reply: Some(socks5::ReplyMessage::command_not_supported().to_bytes()),
                    address: None,
                });
            }
        };

        self.pending = Some(Pending::Socks5 {
            address: request.address.clone(),
            udp,
        });

        Some(Handshake {
            reply: None,
            address: Some(request.address),
        })
    }

    fn try_socks4(&mut self, buf: &[u8]) -> Option<Handshake> {
        let request = socks4::RequestMessage::parse(buf).filter(|req| req.is_connect())?;
        let address = request.address();

        self.pending = Some(Pending::Socks4(request));

        Some(Handshake {
            reply: None,
            address: Some(address),
        })
    }

    fn try_http(&mut self, buf: &[u8]) -> Option<Handshake> {
        let request = HttpRequest::parse(buf)?;
        let address = request.address()?;

        self.pending = Some(if request.is_connect() {
            Pending::HttpConnect
        } else {
            Pending::HttpForward(Bytes::copy_from_slice(buf))
        });

        Some(Handshake {
            reply: None,
            address: Some(address),
        })
    }
}
