//! Declarations for traits that we need our runtimes to implement.
use async_trait::async_trait;
use futures::io::{AsyncRead, AsyncWrite};
use futures::task::Spawn;
use std::io::Result as IoResult;
use std::net::SocketAddr;

/// A runtime that we can use to open tunnels through a SOCKS5 proxy.
///
/// Every runtime needs to be able to spawn tasks and open TCP
/// connections; nothing else is required.
pub trait Runtime: Send + Sync + Clone + Spawn + TcpProvider + 'static {}

impl<T> Runtime for T where T: Send + Sync + Clone + Spawn + TcpProvider + 'static {}

/// A bidirectional byte stream connected to some peer.
///
/// Reading, writing, and closing come from [`AsyncRead`] and
/// [`AsyncWrite`]; the only extra capability is reporting who is on
/// the other end.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Return the address of the peer that this stream is connected to.
    fn peer_addr(&self) -> IoResult<SocketAddr>;
}

/// Trait for a runtime that can create and accept TCP connections.
// TODO: Use of asynctrait is not ideal, since we have to box with every
// call.  Still, async_io basically makes that necessary :/
#[async_trait]
pub trait TcpProvider {
    /// The type for the TCP connections returned by [`Self::connect()`].
    type TcpStream: Transport;
    /// The type for the TCP listeners returned by [`Self::listen()`].
    type TcpListener: TcpListener<TcpStream = Self::TcpStream> + Send + Sync + Unpin + 'static;

    /// Launch a TCP connection to a given socket address.
    async fn connect(&self, addr: &SocketAddr) -> IoResult<Self::TcpStream>;

    /// Open a TCP listener on a given socket address.
    async fn listen(&self, addr: &SocketAddr) -> IoResult<Self::TcpListener>;
}

/// Trait for a local socket that accepts incoming TCP streams.
#[async_trait]
pub trait TcpListener {
    /// The type of TCP connections returned by [`Self::accept()`].
    type TcpStream: Transport;

    /// Wait for an incoming stream; return it along with its address.
    async fn accept(&self) -> IoResult<(Self::TcpStream, SocketAddr)>;

    /// Return the local address that this listener is bound to.
    fn local_addr(&self) -> IoResult<SocketAddr>;
}
