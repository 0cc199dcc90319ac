use std::{net::SocketAddr, time::Duration};

use bpipe_cli::test_utils::run_bpipe;
use bpipe_core::{Behaviour, ClientOptions, Options, ServerEntry, ServerOptions, StartupInfo};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time,
};

const KEY: &str = "secret";

async fn run_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    addr
}

fn server_opts() -> ServerOptions {
    ServerOptions {
        key: KEY.to_string(),
        // never queried, destinations in these tests are ip addresses
        dns_server: Some("127.0.0.1:53".parse().unwrap()),
        ..Default::default()
    }
}

fn client_opts(server_addr: SocketAddr) -> ClientOptions {
    ClientOptions {
        server_bind: Some(server_addr.into()),
        key: Some(KEY.to_string()),
        dns_server: Some("127.0.0.1:53".parse().unwrap()),
        ..Default::default()
    }
}

async fn run_client_and_server() -> SocketAddr {
    let StartupInfo { bind_addr: server_addr } = run_bpipe(Options::Server(server_opts())).await;
    let StartupInfo { bind_addr } = run_bpipe(Options::Client(client_opts(server_addr))).await;
    bind_addr
}

async fn read_n(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).await.unwrap();
    buf
}

async fn assert_echo(stream: &mut TcpStream, data: &[u8]) {
    stream.write_all(data).await.unwrap();
    assert_eq!(read_n(stream, data.len()).await, data);
}

async fn socks5_connect(proxy_addr: SocketAddr, dest: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(proxy_addr).await.unwrap();

    stream.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    assert_eq!(read_n(&mut stream, 2).await, vec![0x05, 0x00]);

    let ip = match dest {
        SocketAddr::V4(v4) => v4.ip().octets(),
        SocketAddr::V6(_) => unreachable!(),
    };

    let mut request = vec![0x05, 0x01, 0x00, 0x01];
    request.extend_from_slice(&ip);
    request.extend_from_slice(&dest.port().to_be_bytes());

    stream.write_all(&request).await.unwrap();

    let reply = read_n(&mut stream, 10).await;
    assert_eq!(reply[..4], [0x05, 0x00, 0x00, 0x01]);

    stream
}

#[tokio::test(flavor = "multi_thread")]
async fn test_socks5() {
    let echo_addr = run_echo_server().await;
    let proxy_addr = run_client_and_server().await;

    let mut stream = socks5_connect(proxy_addr, echo_addr).await;

    assert_echo(&mut stream, b"hello").await;
    assert_echo(&mut stream, &vec![0xab; 64 * 1024]).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_socks4() {
    let echo_addr = run_echo_server().await;
    let proxy_addr = run_client_and_server().await;

    let mut stream = TcpStream::connect(proxy_addr).await.unwrap();

    let mut request = vec![0x04, 0x01];
    request.extend_from_slice(&echo_addr.port().to_be_bytes());
    request.extend_from_slice(&[127, 0, 0, 1]);
    request.extend_from_slice(b"bpipe\0");

    stream.write_all(&request).await.unwrap();

    let reply = read_n(&mut stream, 8).await;
    assert_eq!(reply[..2], [0x00, 0x5a]);

    assert_echo(&mut stream, b"hello").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_http_connect() {
    let echo_addr = run_echo_server().await;
    let proxy_addr = run_client_and_server().await;

    let mut stream = TcpStream::connect(proxy_addr).await.unwrap();
    let request = format!("CONNECT {0} HTTP/1.1\r\nHost: {0}\r\n\r\n", echo_addr);

    stream.write_all(request.as_bytes()).await.unwrap();

    let reply = b"HTTP/1.1 200 Connection Established\r\n\r\n";
    assert_eq!(read_n(&mut stream, reply.len()).await, reply.to_vec());

    assert_echo(&mut stream, b"hello").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_http_forward() {
    let echo_addr = run_echo_server().await;
    let proxy_addr = run_client_and_server().await;

    let mut stream = TcpStream::connect(proxy_addr).await.unwrap();
    let request = format!("GET http://{0}/ HTTP/1.1\r\nHost: {0}\r\n\r\n", echo_addr);

    // the request itself is forwarded to the destination
    assert_echo(&mut stream, request.as_bytes()).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_balancer_skips_failed_server() {
    let echo_addr = run_echo_server().await;
    let StartupInfo { bind_addr: server_addr } = run_bpipe(Options::Server(server_opts())).await;

    let dead_addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let opts = ClientOptions {
        servers: vec![
            ServerEntry {
                bind: dead_addr.into(),
                key: KEY.to_string(),
                presets: Default::default(),
            },
            ServerEntry {
                bind: server_addr.into(),
                key: KEY.to_string(),
                presets: Default::default(),
            },
        ],
        dns_server: Some("127.0.0.1:53".parse().unwrap()),
        ..Default::default()
    };

    let StartupInfo { bind_addr: proxy_addr } = run_bpipe(Options::Client(opts)).await;

    // the first connection goes to the dead server and is closed
    let mut stream = TcpStream::connect(proxy_addr).await.unwrap();
    stream.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    assert_eq!(read_n(&mut stream, 2).await, vec![0x05, 0x00]);

    let mut request = vec![0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1];
    request.extend_from_slice(&echo_addr.port().to_be_bytes());
    stream.write_all(&request).await.unwrap();

    let mut buf = [0u8; 16];
    assert!(matches!(stream.read(&mut buf).await, Ok(0) | Err(_)));

    // the next one is served by the live server
    let mut stream = socks5_connect(proxy_addr, echo_addr).await;
    assert_echo(&mut stream, b"hello").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_preset_failed_close() {
    let StartupInfo { bind_addr } = run_bpipe(Options::Server(server_opts())).await;

    let mut stream = TcpStream::connect(bind_addr).await.unwrap();
    stream.write_all(&[0x42; 100]).await.unwrap();

    let mut buf = [0u8; 16];
    assert!(matches!(stream.read(&mut buf).await, Ok(0) | Err(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_preset_failed_redirect() {
    let echo_addr = run_echo_server().await;

    let opts = ServerOptions {
        on_preset_failed: Behaviour::Redirect(echo_addr.into()),
        ..server_opts()
    };

    let StartupInfo { bind_addr } = run_bpipe(Options::Server(opts)).await;

    let mut stream = TcpStream::connect(bind_addr).await.unwrap();

    // the bytes which failed are sent to the redirect address first
    assert_echo(&mut stream, &[0x42; 100]).await;
    assert_echo(&mut stream, b"GET / HTTP/1.1\r\n\r\n").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_idle_timeout() {
    let echo_addr = run_echo_server().await;
    let StartupInfo { bind_addr: server_addr } = run_bpipe(Options::Server(server_opts())).await;

    let opts = ClientOptions {
        timeout: 1,
        ..client_opts(server_addr)
    };

    let StartupInfo { bind_addr: proxy_addr } = run_bpipe(Options::Client(opts)).await;

    let mut stream = socks5_connect(proxy_addr, echo_addr).await;
    assert_echo(&mut stream, b"hello").await;

    let mut buf = [0u8; 16];
    let read = time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await.unwrap();
    assert!(matches!(read, Ok(0) | Err(_)));
}

async fn assert_closed_without_dial(request: &[u8]) {
    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let opts = client_opts(upstream.local_addr().unwrap());

    let StartupInfo { bind_addr: proxy_addr } = run_bpipe(Options::Client(opts)).await;

    let mut stream = TcpStream::connect(proxy_addr).await.unwrap();
    stream.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    assert_eq!(read_n(&mut stream, 2).await, vec![0x05, 0x00]);

    stream.write_all(request).await.unwrap();

    let mut buf = [0u8; 16];
    let read = time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await.unwrap();
    assert!(matches!(read, Ok(0) | Err(_)));

    assert!(time::timeout(Duration::from_millis(200), upstream.accept()).await.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_socks5_connect_port_zero() {
    assert_closed_without_dial(&[0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x00]).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_socks5_connect_empty_domain() {
    assert_closed_without_dial(&[0x05, 0x01, 0x00, 0x03, 0x00, 0x00, 0x50]).await;
}
