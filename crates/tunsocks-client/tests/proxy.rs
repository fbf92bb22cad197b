//! Run connection attempts against a scripted SOCKS5 proxy on a
//! simulated network.

use futures::executor::ThreadPool;
use futures::io::{AsyncReadExt, AsyncWriteExt};
use futures_await_test::async_test;
use hex_literal::hex;
use std::io::ErrorKind;
use std::net::SocketAddr;

use tunsocks_client::{
    AuthConfig, AuthMethod, ConnectTarget, Credentials, Error, RelayTransport, Socks5Connector,
    SocksStatus, WrappedProtocol,
};
use tunsocks_proto::AuthMethodCode;
use tunsocks_rtcompat::{TcpListener, TcpProvider, Transport};
use tunsocks_rtmock::io::LocalStream;
use tunsocks_rtmock::net::{MockNetListener, MockNetwork};
use tunsocks_rtmock::MockNetRuntime;

/// Where our fake proxy lives.
const PROXY_IP: &str = "198.51.100.1";

/// A connector, and the listener that its proxy is behind.
struct Setup {
    connector: Socks5Connector<MockNetRuntime<ThreadPool>>,
    listener: MockNetListener,
}

async fn setup_with_proxy_port(auth: AuthConfig, connect_port: u16) -> Setup {
    let net = MockNetwork::new();
    let client = net.add_host(&["192.0.2.1".parse().unwrap()]);
    let proxy = net.add_host(&[PROXY_IP.parse().unwrap()]);
    let listener = proxy
        .listen(&format!("{}:1080", PROXY_IP).parse().unwrap())
        .await
        .unwrap();
    let runtime = MockNetRuntime::new(ThreadPool::new().unwrap(), client);
    let proxy_addr = format!("{}:{}", PROXY_IP, connect_port).parse().unwrap();
    Setup {
        connector: Socks5Connector::new(runtime, proxy_addr, auth),
        listener,
    }
}

async fn setup(auth: AuthConfig) -> Setup {
    setup_with_proxy_port(auth, 1080).await
}

fn login(user: &str, pass: &str) -> AuthConfig {
    AuthConfig::new(vec![AuthMethod::UsernamePassword(
        Credentials::new(user, pass).unwrap(),
    )])
    .unwrap()
}

fn example_com() -> ConnectTarget {
    ConnectTarget::new("example.com", 80).unwrap()
}

/// Read exactly as many bytes as `expected` holds, and make sure they match.
async fn expect(s: &mut LocalStream, expected: &[u8]) {
    let mut buf = vec![0_u8; expected.len()];
    s.read_exact(&mut buf[..]).await.unwrap();
    assert_eq!(&buf[..], expected);
}

/// Make sure the client sends nothing more, and closes the connection.
async fn expect_eof(s: &mut LocalStream) {
    let mut rest = Vec::new();
    s.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty(), "unexpected bytes: {:?}", rest);
}

/// Proposal of anonymous access only.
const ANON_PROPOSAL: [u8; 3] = hex!("05 01 00");
/// Connect request for example.com:80.
const CONNECT_EXAMPLE_COM: [u8; 18] = hex!("05 01 00 03 0b 6578616d706c652e636f6d 0050");
/// A granted connect reply, bound to 192.0.2.9:8080.
const GRANTED: [u8; 10] = hex!("05 00 00 01 c0000209 1f90");

/// A protocol that remembers how often it was started.
#[derive(Default)]
struct Recorder {
    /// Number of calls to start().
    starts: usize,
    /// The transport from the last call to start().
    transport: Option<RelayTransport<LocalStream>>,
}

impl WrappedProtocol<LocalStream> for Recorder {
    fn start(&mut self, transport: RelayTransport<LocalStream>) {
        self.starts += 1;
        self.transport = Some(transport);
    }
}

fn recorder_factory(_peer: SocketAddr) -> Option<Recorder> {
    Some(Recorder::default())
}

#[async_test]
async fn anonymous_connect() {
    let s = setup(AuthConfig::anonymous()).await;

    let (relay, mut p) = futures::join!(s.connector.connect_stream(example_com()), async {
        let (mut p, addr) = s.listener.accept().await.unwrap();
        assert_eq!(addr.ip(), "192.0.2.1".parse::<std::net::IpAddr>().unwrap());
        expect(&mut p, &ANON_PROPOSAL).await;
        p.write_all(&hex!("05 00")).await.unwrap();
        expect(&mut p, &CONNECT_EXAMPLE_COM).await;
        p.write_all(&GRANTED).await.unwrap();
        p
    });
    let mut relay = relay.unwrap();
    assert_eq!(
        relay.peer_addr().unwrap(),
        format!("{}:1080", PROXY_IP).parse::<SocketAddr>().unwrap()
    );
    let reply = relay.proxy_reply().unwrap();
    assert_eq!(reply.status(), SocksStatus::SUCCEEDED);
    assert_eq!(reply.addr().to_string(), "192.0.2.9");
    assert_eq!(reply.port(), 8080);

    // Once the tunnel is up, bytes go both ways unchanged.
    relay.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
    relay.close().await.unwrap();
    expect(&mut p, b"GET / HTTP/1.0\r\n\r\n").await;
    expect_eof(&mut p).await;

    p.write_all(b"HTTP/1.0 200 OK\r\n").await.unwrap();
    p.close().await.unwrap();
    let mut got = Vec::new();
    relay.read_to_end(&mut got).await.unwrap();
    assert_eq!(&got[..], b"HTTP/1.0 200 OK\r\n");
}

#[async_test]
async fn started_once_and_bytes_in_order() {
    let s = setup(AuthConfig::anonymous()).await;

    let (proto, mut p) = futures::join!(s.connector.connect(example_com(), recorder_factory), async {
        let (mut p, _) = s.listener.accept().await.unwrap();
        expect(&mut p, &ANON_PROPOSAL).await;
        p.write_all(&hex!("05 00")).await.unwrap();
        expect(&mut p, &CONNECT_EXAMPLE_COM).await;
        // The first application bytes arrive in the same write as the
        // reply; they must not be taken for handshake data.
        let mut msg = GRANTED.to_vec();
        msg.extend_from_slice(&hex!("05 00 00 01"));
        p.write_all(&msg[..]).await.unwrap();
        p
    });
    let proto = proto.unwrap();
    assert_eq!(proto.starts, 1);
    let mut relay = proto.transport.unwrap();

    let (expected, got) = futures::join!(
        async {
            let mut expected = hex!("05 00 00 01").to_vec();
            for i in 0_u8..=255 {
                let chunk = vec![i; usize::from(i) + 1];
                p.write_all(&chunk[..]).await.unwrap();
                expected.extend_from_slice(&chunk[..]);
            }
            p.close().await.unwrap();
            expected
        },
        async {
            let mut got = Vec::new();
            relay.read_to_end(&mut got).await.unwrap();
            got
        }
    );
    assert_eq!(got, expected);
}

#[async_test]
async fn unproposed_method() {
    let s = setup(AuthConfig::anonymous()).await;

    let (r, ()) = futures::join!(s.connector.connect(example_com(), recorder_factory), async {
        let (mut p, _) = s.listener.accept().await.unwrap();
        expect(&mut p, &ANON_PROPOSAL).await;
        p.write_all(&hex!("05 02")).await.unwrap();
        expect_eof(&mut p).await;
    });
    match r {
        Err(Error::Handshake(tunsocks_proto::Error::MethodsNotAccepted { proposed, selected })) => {
            assert_eq!(proposed, vec![AuthMethodCode::NO_AUTHENTICATION]);
            assert_eq!(selected, AuthMethodCode::USERNAME_PASSWORD);
        }
        _ => panic!("wrong result"),
    }
}

#[async_test]
async fn login_rejected() {
    let s = setup(login("u", "p")).await;

    let (r, ()) = futures::join!(s.connector.connect(example_com(), recorder_factory), async {
        let (mut p, _) = s.listener.accept().await.unwrap();
        expect(&mut p, &hex!("05 01 02")).await;
        p.write_all(&hex!("05 02")).await.unwrap();
        expect(&mut p, &hex!("01 01 75 01 70")).await;
        p.write_all(&hex!("01 01")).await.unwrap();
        // No connect request follows the failed login.
        expect_eof(&mut p).await;
    });
    assert!(matches!(
        r,
        Err(Error::Handshake(
            tunsocks_proto::Error::LoginAuthenticationFailed
        ))
    ));
}

#[async_test]
async fn login_accepted() {
    let s = setup(login("alice", "hunter2")).await;

    let (r, _p) = futures::join!(s.connector.connect(example_com(), recorder_factory), async {
        let (mut p, _) = s.listener.accept().await.unwrap();
        expect(&mut p, &hex!("05 01 02")).await;
        p.write_all(&hex!("05 02")).await.unwrap();
        expect(&mut p, &hex!("01 05 616c696365 07 68756e74657232")).await;
        p.write_all(&hex!("01 00")).await.unwrap();
        expect(&mut p, &CONNECT_EXAMPLE_COM).await;
        p.write_all(&GRANTED).await.unwrap();
        p
    });
    assert_eq!(r.unwrap().starts, 1);
}

#[async_test]
async fn closed_before_selection() {
    let s = setup(AuthConfig::anonymous()).await;

    let (r, ()) = futures::join!(s.connector.connect(example_com(), recorder_factory), async {
        let (mut p, _) = s.listener.accept().await.unwrap();
        expect(&mut p, &ANON_PROPOSAL).await;
        p.close().await.unwrap();
        drop(p);
    });
    assert!(matches!(
        r,
        Err(Error::Handshake(
            tunsocks_proto::Error::ConnectionClosedPrematurely
        ))
    ));
}

#[async_test]
async fn reset_during_handshake() {
    let s = setup(AuthConfig::anonymous()).await;

    let (r, _p) = futures::join!(s.connector.connect(example_com(), recorder_factory), async {
        let (mut p, _) = s.listener.accept().await.unwrap();
        expect(&mut p, &ANON_PROPOSAL).await;
        p.write_all(&hex!("05 00 05 00")).await.unwrap();
        p.send_err(ErrorKind::ConnectionReset).await.unwrap();
        p
    });
    assert!(matches!(
        r,
        Err(Error::Handshake(
            tunsocks_proto::Error::ConnectionClosedPrematurely
        ))
    ));
}

#[async_test]
async fn host_unreachable() {
    let s = setup(AuthConfig::anonymous()).await;

    let (r, _p) = futures::join!(s.connector.connect(example_com(), recorder_factory), async {
        let (mut p, _) = s.listener.accept().await.unwrap();
        expect(&mut p, &ANON_PROPOSAL).await;
        p.write_all(&hex!("05 00")).await.unwrap();
        expect(&mut p, &CONNECT_EXAMPLE_COM).await;
        p.write_all(&hex!("05 04 00 01 00000000 0000")).await.unwrap();
        p
    });
    let e = r.err().unwrap();
    match &e {
        Error::Handshake(tunsocks_proto::Error::ConnectionError { status, reason }) => {
            assert_eq!(*status, SocksStatus::HOST_UNREACHABLE);
            assert_eq!(*reason, "host unreachable");
        }
        _ => panic!("wrong error: {}", e),
    }
    assert_eq!(e.socks_status(), Some(SocksStatus::HOST_UNREACHABLE));
    assert!(!e.is_config_error());
}

#[async_test]
async fn bad_version() {
    let s = setup(AuthConfig::anonymous()).await;

    let (r, ()) = futures::join!(s.connector.connect(example_com(), recorder_factory), async {
        let (mut p, _) = s.listener.accept().await.unwrap();
        expect(&mut p, &ANON_PROPOSAL).await;
        p.write_all(&hex!("04 00")).await.unwrap();
        expect_eof(&mut p).await;
    });
    assert!(matches!(
        r,
        Err(Error::Handshake(tunsocks_proto::Error::ProtocolViolation(
            _
        )))
    ));
}

#[async_test]
async fn no_proxy_there() {
    let s = setup_with_proxy_port(AuthConfig::anonymous(), 9).await;
    let r = s.connector.connect(example_com(), recorder_factory).await;
    match r {
        Err(Error::TransportOpen { addr, source }) => {
            assert_eq!(addr.port(), 9);
            assert_eq!(source.kind(), ErrorKind::ConnectionRefused);
        }
        _ => panic!("wrong result"),
    }
}

#[async_test]
async fn factory_declines() {
    let s = setup(AuthConfig::anonymous()).await;

    let (r, ()) = futures::join!(
        s.connector
            .connect(example_com(), |_: SocketAddr| -> Option<Recorder> { None }),
        async {
            let (mut p, _) = s.listener.accept().await.unwrap();
            expect(&mut p, &ANON_PROPOSAL).await;
            p.write_all(&hex!("05 00")).await.unwrap();
            expect(&mut p, &CONNECT_EXAMPLE_COM).await;
            p.write_all(&GRANTED).await.unwrap();
            expect_eof(&mut p).await;
        }
    );
    let e = r.err().unwrap();
    assert!(matches!(e, Error::NoProtocol));
    assert!(e.is_config_error());
}

#[async_test]
async fn launched() {
    let s = setup(AuthConfig::anonymous()).await;
    let result = s.connector.launch(example_com(), recorder_factory);

    let (proxy_side, r) = futures::join!(
        async {
            let (mut p, _) = s.listener.accept().await.unwrap();
            expect(&mut p, &ANON_PROPOSAL).await;
            p.write_all(&hex!("05 00")).await.unwrap();
            expect(&mut p, &CONNECT_EXAMPLE_COM).await;
            p.write_all(&GRANTED).await.unwrap();
            p
        },
        result
    );
    let _proxy_side = proxy_side;
    let proto = r.unwrap();
    assert_eq!(proto.starts, 1);
    assert!(proto.transport.is_some());
}

#[async_test]
async fn launch_canceled() {
    let s = setup(AuthConfig::anonymous()).await;
    let result = s.connector.launch(example_com(), recorder_factory);

    let (mut p, _) = s.listener.accept().await.unwrap();
    expect(&mut p, &ANON_PROPOSAL).await;

    // Nobody wants this connection any more: the attempt should hang up
    // on the proxy without sending anything else.
    drop(result);
    expect_eof(&mut p).await;
}
