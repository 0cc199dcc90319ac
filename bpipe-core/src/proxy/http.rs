use bytes::Bytes;
use httparse::Status;

use crate::net::address::Address;

const MAX_HEADERS: usize = 64;

const HTTP_CONNECT_REPLY: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub host: Option<String>,
    /// Length of the request head including the empty line
    pub head_len: usize,
}

impl HttpRequest {
    /// Parse a complete request head, `None` for foreign or incomplete buffers.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        let head_len = match req.parse(buf) {
            Ok(Status::Complete(n)) => n,
            _ => return None,
        };

        let host = req
            .headers
            .iter()
            .find(|item| item.name.eq_ignore_ascii_case("host"))
            .and_then(|item| std::str::from_utf8(item.value).ok())
            .map(|value| value.trim().to_string());

        Some(Self {
            method: req.method?.to_string(),
            path: req.path?.to_string(),
            host,
            head_len,
        })
    }

    /// Whether `buf` looks like the beginning of a request head which needs more bytes.
    pub fn is_partial(buf: &[u8]) -> bool {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        !buf.is_empty() && matches!(req.parse(buf), Ok(Status::Partial))
    }

    pub fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case("CONNECT")
    }

    /// Destination of this request.
    ///
    /// CONNECT carries it in the request target and defaults to port 443,
    /// other methods use the Host header and default to port 80.
    pub fn address(&self) -> Option<Address> {
        if self.is_connect() {
            Address::from_authority(&self.path, 443)
                .or_else(|| self.host.as_deref().and_then(|h| Address::from_authority(h, 443)))
        } else {
            self.host
                .as_deref()
                .and_then(|h| Address::from_authority(h, 80))
                .or_else(|| Address::from_absolute_uri(&self.path))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectReply;

impl ConnectReply {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        (buf == HTTP_CONNECT_REPLY).then(|| ConnectReply)
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from_static(HTTP_CONNECT_REPLY)
    }
}
