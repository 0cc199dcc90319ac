use bpipe_core::proxy::{
    http::{ConnectReply, HttpRequest},
    socks4, socks5, ClientProxy, Handshake, Pending,
};

#[test]
fn test_no_match() {
    let mut proxy = ClientProxy::new();

    assert_eq!(proxy.make_handshake(&[0x16, 0x03, 0x01, 0x00, 0x05]), Handshake::default());
    assert!(!proxy.is_done());
    assert!(!proxy.is_pending());
}

#[test]
fn test_socks5_connect() {
    let mut proxy = ClientProxy::new();

    let handshake = proxy.make_handshake(&[0x05, 0x01, 0x00]);
    assert_eq!(handshake.reply.as_deref(), Some(&[0x05, 0x00][..]));
    assert!(handshake.address.is_none());
    assert!(!proxy.is_done());

    let request = [0x05, 0x01, 0x00, 0x01, 0x5d, 0xb8, 0xd8, 0x22, 0x00, 0x50];
    let handshake = proxy.make_handshake(&request);
    assert!(handshake.reply.is_none());
    assert_eq!(handshake.address.unwrap().as_string(), "93.184.216.34:80");
    assert!(proxy.is_pending());
    assert!(!proxy.is_done());

    let completion = proxy.complete();
    assert_eq!(
        completion.reply.as_deref(),
        Some(&[0x05, 0x00, 0x00, 0x01, 0x5d, 0xb8, 0xd8, 0x22, 0x00, 0x50][..])
    );
    assert!(completion.forward.is_none());
    assert!(proxy.is_done());
    assert!(proxy.is_socks_tcp_ready());

    // nothing is detected after the handshake
    assert_eq!(proxy.make_handshake(&request), Handshake::default());
}

#[test]
fn test_socks5_domain() {
    let mut proxy = ClientProxy::new();
    let mut request = vec![0x05, 0x01, 0x00, 0x03, 11];
    request.extend_from_slice(b"example.com");
    request.extend_from_slice(&[0x01, 0xbb]);

    let handshake = proxy.make_handshake(&request);
    assert_eq!(handshake.address.unwrap().as_string(), "example.com:443");
}

#[test]
fn test_socks4_and_socks4a() {
    let mut proxy = ClientProxy::new();
    let handshake = proxy.make_handshake(&[0x04, 0x01, 0x00, 0x50, 93, 184, 216, 34, 0x00]);

    assert_eq!(handshake.address.unwrap().as_string(), "93.184.216.34:80");
    assert!(matches!(proxy.pending(), Some(Pending::Socks4(_))));

    let completion = proxy.complete();
    assert_eq!(
        completion.reply.as_deref(),
        Some(&[0x00, 0x5a, 0x00, 0x50, 93, 184, 216, 34][..])
    );
    assert!(proxy.is_socks_tcp_ready());

    let mut proxy = ClientProxy::new();
    let mut request = vec![0x04, 0x01, 0x01, 0xbb, 0, 0, 0, 1, b'i', b'd', 0x00];
    request.extend_from_slice(b"example.com\0");

    let handshake = proxy.make_handshake(&request);
    assert_eq!(handshake.address.unwrap().as_string(), "example.com:443");
}

#[test]
fn test_http_connect() {
    let mut proxy = ClientProxy::new();
    let handshake = proxy.make_handshake(b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n");

    assert!(handshake.reply.is_none());
    assert_eq!(handshake.address.unwrap().as_string(), "example.com:443");
    assert_eq!(proxy.pending(), Some(&Pending::HttpConnect));

    let completion = proxy.complete();
    assert_eq!(
        completion.reply.as_deref(),
        Some(&b"HTTP/1.1 200 Connection Established\r\n\r\n"[..])
    );
    assert!(completion.forward.is_none());
    assert!(proxy.is_http_ready());
}

#[test]
fn test_http_forward() {
    let mut proxy = ClientProxy::new();
    let request = b"GET http://example.com/index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";

    let handshake = proxy.make_handshake(request);
    assert_eq!(handshake.address.unwrap().as_string(), "example.com:80");

    let completion = proxy.complete();
    assert!(completion.reply.is_none());
    assert_eq!(completion.forward.as_deref(), Some(&request[..]));
    assert!(proxy.is_http_ready());
}

#[test]
fn test_http_forward_origin_form() {
    let mut proxy = ClientProxy::new();
    let request = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

    let handshake = proxy.make_handshake(request);
    assert!(handshake.reply.is_none());
    assert_eq!(handshake.address.unwrap().as_string(), "example.com:80");

    let completion = proxy.complete();
    assert!(completion.reply.is_none());
    assert_eq!(completion.forward.as_deref(), Some(&request[..]));
}

#[test]
fn test_http_forward_without_host() {
    let mut proxy = ClientProxy::new();

    let handshake = proxy.make_handshake(b"GET http://example.com:8080/ HTTP/1.1\r\n\r\n");
    assert_eq!(handshake.address.unwrap().as_string(), "example.com:8080");
}

#[test]
fn test_complete_without_pending() {
    let mut proxy = ClientProxy::new();

    assert!(proxy.complete().reply.is_none());
    assert!(!proxy.is_done());
}

#[test]
fn test_messages_round_trip() {
    let identifier = socks5::IdentifierMessage::parse(&[0x05, 0x02, 0x00, 0x02]).unwrap();
    assert_eq!(&identifier.to_bytes()[..], &[0x05, 0x02, 0x00, 0x02]);

    let request = socks5::RequestMessage::parse(&[0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0x1f, 0x90]).unwrap();
    assert_eq!(request.address.as_string(), "127.0.0.1:8080");
    assert_eq!(&request.to_bytes()[..], &[0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0x1f, 0x90]);

    let reply = socks4::ReplyMessage::parse(&[0x00, 0x5a, 0x00, 0x50, 127, 0, 0, 1]).unwrap();
    assert_eq!(reply.code, socks4::REPLY_GRANTED);

    assert!(ConnectReply::parse(&ConnectReply.to_bytes()).is_some());
    assert!(HttpRequest::parse(b"GET / HTTP/1.1\r\n").is_none());
}
