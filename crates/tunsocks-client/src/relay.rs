//! The transport that a wrapped protocol talks through once the
//! tunnel is up.

use bytes::{Buf, Bytes};
use futures::io::{AsyncRead, AsyncWrite};
use std::io::Result as IoResult;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tunsocks_proto::ProxyReply;
use tunsocks_rtcompat::Transport;

/// A connection to the far end of a SOCKS5 tunnel.
///
/// Writes, flushes, closes, and address lookups go straight to the
/// underlying connection to the proxy.  Reads do too, except that any
/// bytes the proxy sent right behind its connect reply come out first:
/// the handshake may have read them before it knew where the reply
/// ended.
pub struct RelayTransport<T> {
    /// Bytes from the proxy that arrived with the handshake, but belong
    /// to the tunneled protocol.
    leftover: Bytes,
    /// The proxy's answer to our connect request, if we have it.
    reply: Option<ProxyReply>,
    /// The connection to the proxy.
    inner: T,
}

impl<T> RelayTransport<T> {
    /// Wrap `inner`, delivering `leftover` before anything else it reads.
    pub(crate) fn new(inner: T, leftover: Bytes) -> Self {
        RelayTransport {
            leftover,
            reply: None,
            inner,
        }
    }

    /// Remember `reply` as the proxy's answer to our connect request.
    pub(crate) fn with_reply(mut self, reply: Option<ProxyReply>) -> Self {
        self.reply = reply;
        self
    }

    /// Return the proxy's reply to our connect request.
    ///
    /// This holds the address and port that the proxy bound for its
    /// side of the tunnel.
    pub fn proxy_reply(&self) -> Option<&ProxyReply> {
        self.reply.as_ref()
    }

    /// Return a reference to the underlying connection.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Return the bytes that have been received, but not read yet.
    pub fn buffered(&self) -> &[u8] {
        &self.leftover[..]
    }

    /// Take this transport apart, returning any unread bytes along
    /// with the underlying connection.
    pub fn into_parts(self) -> (Bytes, T) {
        (self.leftover, self.inner)
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for RelayTransport<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<IoResult<usize>> {
        let this = self.get_mut();
        if this.leftover.is_empty() {
            return Pin::new(&mut this.inner).poll_read(cx, buf);
        }
        let n = std::cmp::min(buf.len(), this.leftover.len());
        buf[..n].copy_from_slice(&this.leftover[..n]);
        this.leftover.advance(n);
        Poll::Ready(Ok(n))
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for RelayTransport<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<IoResult<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }
    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        Pin::new(&mut self.get_mut().inner).poll_close(cx)
    }
}

impl<T: Transport> Transport for RelayTransport<T> {
    fn peer_addr(&self) -> IoResult<SocketAddr> {
        self.inner.peer_addr()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::io::{AsyncReadExt, AsyncWriteExt};
    use futures_await_test::async_test;
    use tunsocks_rtmock::io::{stream_pair, stream_pair_between};

    #[async_test]
    async fn leftover_first() {
        let (s1, mut s2) = stream_pair();
        let mut relay = RelayTransport::new(s1, Bytes::from_static(b"early "));
        assert_eq!(relay.buffered(), b"early ");

        s2.write_all(b"late").await.unwrap();
        s2.close().await.unwrap();

        // A small read only eats part of the leftover.
        let mut buf = [0_u8; 3];
        relay.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ear");
        assert_eq!(relay.buffered(), b"ly ");

        let mut rest = Vec::new();
        relay.read_to_end(&mut rest).await.unwrap();
        assert_eq!(&rest[..], b"ly late");
    }

    #[async_test]
    async fn writes_pass_through() {
        let (s1, mut s2) = stream_pair();
        let mut relay = RelayTransport::new(s1, Bytes::new());
        relay.write_all(b"\x00\x01 raw bytes \xff").await.unwrap();
        relay.close().await.unwrap();

        let mut got = Vec::new();
        s2.read_to_end(&mut got).await.unwrap();
        assert_eq!(&got[..], b"\x00\x01 raw bytes \xff");
    }

    #[test]
    fn parts() {
        let a = "192.0.2.1:5000".parse().unwrap();
        let b = "198.51.100.1:1080".parse().unwrap();
        let (s1, _s2) = stream_pair_between(a, b);
        let relay = RelayTransport::new(s1, Bytes::from_static(b"xyz"));
        assert_eq!(relay.peer_addr().unwrap(), b);
        assert_eq!(relay.get_ref().peer_addr().unwrap(), b);
        let (left, _inner) = relay.into_parts();
        assert_eq!(&left[..], b"xyz");
    }
}
