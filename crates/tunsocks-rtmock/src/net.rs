//! A simulated network of hosts that can reach each other over TCP.
//!
//! Every host gets a [`MockNetProvider`], which implements
//! [`TcpProvider`] and can stand in for a real runtime's networking.
//! Streams between hosts are [`LocalStream`] pairs.

use crate::io::{stream_pair_between, LocalStream};
use tunsocks_rtcompat::{TcpListener, TcpProvider};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::lock::Mutex as AsyncMutex;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use std::collections::HashMap;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// An incoming connection, as queued for a listener.
type Incoming = (LocalStream, SocketAddr);

/// How many unaccepted connections a listener will queue.
const BACKLOG: usize = 16;

/// First port we hand out when asked for an arbitrary one.
const FIRST_EPHEMERAL_PORT: u16 = 49152;

/// An error from the simulated network.
///
/// These always reach callers wrapped in a [`std::io::Error`] whose
/// kind says what a real socket would have reported.
#[derive(Clone, Error, Debug)]
#[non_exhaustive]
pub enum MockNetError {
    /// Nothing is listening at the address we tried to connect to.
    #[error("nothing is listening at {0}")]
    NoListener(SocketAddr),
    /// Some other listener already has this address.
    #[error("{0} is already bound")]
    AddrInUse(SocketAddr),
    /// The host has no address that it could use here.
    #[error("host has no address usable for {0}")]
    NoAddress(IpAddr),
    /// Every arbitrary port on this host has been handed out.
    #[error("out of ephemeral ports")]
    NoPorts,
    /// The listener table was poisoned by a panic elsewhere.
    #[error("mock network state poisoned")]
    Poisoned,
    /// An error injected into a stream with `send_err`.
    #[error("injected stream error")]
    Injected,
    /// The other end of a stream, or the network behind a listener, is gone.
    #[error("peer is gone")]
    PeerGone,
}

impl MockNetError {
    /// Return the kind of IO error that a real socket would give here.
    fn kind(&self) -> ErrorKind {
        match self {
            MockNetError::NoListener(_) => ErrorKind::ConnectionRefused,
            MockNetError::AddrInUse(_) => ErrorKind::AddrInUse,
            MockNetError::NoAddress(_) | MockNetError::NoPorts => ErrorKind::AddrNotAvailable,
            MockNetError::Poisoned | MockNetError::Injected => ErrorKind::Other,
            MockNetError::PeerGone => ErrorKind::BrokenPipe,
        }
    }
}

impl From<MockNetError> for IoError {
    fn from(e: MockNetError) -> IoError {
        IoError::new(e.kind(), e)
    }
}

/// Return an IO error of kind `kind` that was injected into a stream.
pub(crate) fn injected(kind: ErrorKind) -> IoError {
    IoError::new(kind, MockNetError::Injected)
}

/// A simulated network.
///
/// This only knows which addresses have listeners on them; all the
/// per-host state lives in each [`MockNetProvider`].
#[derive(Default)]
pub struct MockNetwork {
    /// Queues for incoming connections, by listening address.
    listeners: Mutex<HashMap<SocketAddr, mpsc::Sender<Incoming>>>,
}

impl MockNetwork {
    /// Make a new network with nothing on it.
    pub fn new() -> Arc<Self> {
        Arc::new(MockNetwork::default())
    }

    /// Attach a new host with the addresses in `addrs`, and return its
    /// view of the network.
    ///
    /// ```
    /// # use tunsocks_rtmock::net::MockNetwork;
    /// let net = MockNetwork::new();
    /// let proxy = net.add_host(&["198.51.100.1".parse().unwrap()]);
    /// let client = net.add_host(&[
    ///     "192.0.2.1".parse().unwrap(),
    ///     "2001:db8::1".parse().unwrap(),
    /// ]);
    /// ```
    pub fn add_host(self: &Arc<Self>, addrs: &[IpAddr]) -> MockNetProvider {
        MockNetProvider {
            host: Arc::new(Host {
                addrs: addrs.to_vec(),
                net: Arc::clone(self),
                next_port: AtomicU16::new(FIRST_EPHEMERAL_PORT),
            }),
        }
    }

    /// Deliver `stream`, coming from `from`, to whoever listens at `to`.
    async fn deliver(
        &self,
        from: SocketAddr,
        to: SocketAddr,
        stream: LocalStream,
    ) -> IoResult<()> {
        let queue = self
            .listeners
            .lock()
            .map_err(|_| MockNetError::Poisoned)?
            .get(&to)
            .cloned();
        if let Some(mut queue) = queue {
            if queue.send((stream, from)).await.is_ok() {
                return Ok(());
            }
        }
        Err(MockNetError::NoListener(to).into())
    }

    /// Start accepting connections at `addr`.
    ///
    /// An address whose previous listener was dropped can be bound again.
    fn bind(&self, addr: SocketAddr) -> IoResult<mpsc::Receiver<Incoming>> {
        let mut listeners = self.listeners.lock().map_err(|_| MockNetError::Poisoned)?;
        if listeners.get(&addr).map_or(false, |q| !q.is_closed()) {
            return Err(MockNetError::AddrInUse(addr).into());
        }
        let (queue, incoming) = mpsc::channel(BACKLOG);
        listeners.insert(addr, queue);
        Ok(incoming)
    }
}

/// One host's view of a [`MockNetwork`].
///
/// Cloning this gives another handle to the same host.
#[derive(Clone)]
pub struct MockNetProvider {
    /// The host itself.
    host: Arc<Host>,
}

/// State for a single simulated host.
struct Host {
    /// Addresses that belong to this host.
    addrs: Vec<IpAddr>,
    /// The network the host is attached to.
    net: Arc<MockNetwork>,
    /// Next arbitrary port to hand out.  Zero once we've run out.
    next_port: AtomicU16,
}

impl MockNetProvider {
    /// Return one of our addresses in the same family as `like`.
    fn addr_like(&self, like: IpAddr) -> IoResult<IpAddr> {
        self.host
            .addrs
            .iter()
            .copied()
            .find(|a| a.is_ipv4() == like.is_ipv4())
            .ok_or_else(|| MockNetError::NoAddress(like).into())
    }

    /// Hand out a port that this host hasn't handed out before.
    fn ephemeral_port(&self) -> IoResult<u16> {
        self.host
            .next_port
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |p| {
                if p == 0 {
                    None
                } else {
                    Some(p.wrapping_add(1))
                }
            })
            .map_err(|_| MockNetError::NoPorts.into())
    }

    /// Work out the address to actually bind when asked to listen on `want`.
    ///
    /// An unspecified IP means "one of mine", and port 0 means "any port".
    fn bind_addr(&self, want: &SocketAddr) -> IoResult<SocketAddr> {
        let ip = if want.ip().is_unspecified() {
            self.addr_like(want.ip())?
        } else if self.host.addrs.contains(&want.ip()) {
            want.ip()
        } else {
            return Err(MockNetError::NoAddress(want.ip()).into());
        };
        let port = match want.port() {
            0 => self.ephemeral_port()?,
            p => p,
        };
        Ok(SocketAddr::new(ip, port))
    }
}

/// A listening socket on a [`MockNetProvider`].
pub struct MockNetListener {
    /// Where we're bound.
    addr: SocketAddr,
    /// Connections waiting to be accepted.
    incoming: AsyncMutex<mpsc::Receiver<Incoming>>,
}

#[async_trait]
impl TcpListener for MockNetListener {
    type TcpStream = LocalStream;

    async fn accept(&self) -> IoResult<(LocalStream, SocketAddr)> {
        self.incoming
            .lock()
            .await
            .next()
            .await
            .ok_or_else(|| MockNetError::PeerGone.into())
    }

    fn local_addr(&self) -> IoResult<SocketAddr> {
        Ok(self.addr)
    }
}

#[async_trait]
impl TcpProvider for MockNetProvider {
    type TcpStream = LocalStream;
    type TcpListener = MockNetListener;

    async fn connect(&self, addr: &SocketAddr) -> IoResult<LocalStream> {
        let local = SocketAddr::new(self.addr_like(addr.ip())?, self.ephemeral_port()?);
        let (ours, theirs) = stream_pair_between(local, *addr);
        self.host.net.deliver(local, *addr, theirs).await?;
        Ok(ours)
    }

    async fn listen(&self, addr: &SocketAddr) -> IoResult<MockNetListener> {
        let addr = self.bind_addr(addr)?;
        let incoming = AsyncMutex::new(self.host.net.bind(addr)?);
        Ok(MockNetListener { addr, incoming })
    }
}
