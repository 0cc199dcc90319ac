use std::net::SocketAddr;

use bpipe_core::{net::address::AddressType, Address, Host};

#[test]
fn test_parse() {
    let addr: Address = "example.com:443".parse().unwrap();
    assert!(addr.is_hostname());
    assert_eq!(addr.host(), "example.com");
    assert_eq!(addr.port(), 443);

    let addr: Address = "[::1]:80".parse().unwrap();
    assert!(addr.is_ip());
    assert_eq!(addr.address_type(), AddressType::V6);
    assert_eq!(addr.to_string(), "[::1]:80");

    assert!("example.com".parse::<Address>().is_err());
    assert!(":80".parse::<Address>().is_err());
    assert!("example.com:http".parse::<Address>().is_err());
}

#[test]
fn test_as_bytes() {
    let addr: Address = "127.0.0.1:80".parse().unwrap();
    assert_eq!(&addr.as_bytes()[..], &[0x01, 127, 0, 0, 1, 0x00, 0x50]);

    let addr = Address::new(Host::Name("a.io".into()), 443);
    assert_eq!(&addr.as_bytes()[..], &[0x03, 4, b'a', b'.', b'i', b'o', 0x01, 0xbb]);

    let (parsed, len) = Address::try_from_bytes(&addr.as_bytes()).unwrap().unwrap();
    assert_eq!(parsed, addr);
    assert_eq!(len, 8);
}

#[test]
fn test_from_socket_addr() {
    let socket_addr: SocketAddr = "10.0.0.1:9000".parse().unwrap();
    let addr = Address::from(socket_addr);

    assert_eq!(addr.ip(), Some(socket_addr.ip()));
    assert_eq!(addr.as_string(), "10.0.0.1:9000");
}

#[test]
fn test_from_absolute_uri() {
    let addr = Address::from_absolute_uri("http://example.com/index.html").unwrap();
    assert_eq!(addr.as_string(), "example.com:80");

    let addr = Address::from_absolute_uri("https://example.com:8443/").unwrap();
    assert_eq!(addr.as_string(), "example.com:8443");

    assert!(Address::from_absolute_uri("/index.html").is_none());
}
