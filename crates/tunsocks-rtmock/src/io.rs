//! Mocking helpers for testing with futures::io types.
//!
//! Note that some of this code might be of general use, but for now
//! we're only trying it for testing.

use crate::net::injected;
use tunsocks_rtcompat::Transport;

use futures::channel::mpsc;
use futures::io::{AsyncRead, AsyncWrite};
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::net::{Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Channel capacity for our internal MPSC channels.
///
/// We keep this intentionally low to make sure that some blocking
/// will occur occur.
const CAPACITY: usize = 4;

/// Maximum size for a queued buffer on a local chunk.
///
/// This size is deliberately weird, to try to find errors.
const CHUNKSZ: usize = 213;

/// What one half of a stream pair hands to the other.
///
/// An `Err` makes the peer's next read fail with that kind of error.
type Chunk = Result<Vec<u8>, ErrorKind>;

/// Construct a new pair of linked LocalStream objects.
///
/// Any bytes written to one will be readable on the other, and vice
/// versa.  These streams will behave more or less like a socketpair,
/// except without actually going through the operating system.
///
/// Both streams report an unspecified peer address; use
/// [`stream_pair_between`] if the addresses matter.
pub fn stream_pair() -> (LocalStream, LocalStream) {
    let nowhere = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0);
    stream_pair_between(nowhere, nowhere)
}

/// Construct a new pair of linked LocalStream objects, as with
/// [`stream_pair`], where the first one lives at `a` and the second
/// one lives at `b`.
pub fn stream_pair_between(a: SocketAddr, b: SocketAddr) -> (LocalStream, LocalStream) {
    let (w1, r2) = mpsc::channel(CAPACITY);
    let (w2, r1) = mpsc::channel(CAPACITY);
    let s1 = LocalStream {
        w: w1,
        r: r1,
        pending_bytes: Vec::new(),
        peer: b,
    };
    let s2 = LocalStream {
        w: w2,
        r: r2,
        pending_bytes: Vec::new(),
        peer: a,
    };
    (s1, s2)
}

/// One half of a pair of linked streams returned by [`stream_pair`].
//
// Implementation notes: linked streams are made out a pair of mpsc
// channels.  There's one channel for sending bytes in each direction.
// Bytes are sent as Vec<u8>; we keep a buffer of the data from the
// most recently received Vec that we haven't delivered yet.
pub struct LocalStream {
    /// The writing side of the channel that we use to implement this
    /// stream.
    w: mpsc::Sender<Chunk>,
    /// The reading side of the channel that we use to implement this
    /// stream.
    r: mpsc::Receiver<Chunk>,
    /// Bytes that we have read from `r` but not yet delivered.
    pending_bytes: Vec<u8>,
    /// The address that we pretend to be connected to.
    peer: SocketAddr,
}

impl LocalStream {
    /// Make the other end's next read fail with an error of kind `kind`.
    ///
    /// Bytes written before this call are still delivered first.
    pub async fn send_err(&mut self, kind: ErrorKind) -> IoResult<()> {
        self.w
            .send(Err(kind))
            .await
            .map_err(|e| IoError::new(ErrorKind::BrokenPipe, e))
    }
}

impl AsyncRead for LocalStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<IoResult<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let this = self.get_mut();
        while this.pending_bytes.is_empty() {
            match futures::ready!(this.r.poll_next_unpin(cx)) {
                None => return Poll::Ready(Ok(0)),
                Some(Err(kind)) => return Poll::Ready(Err(injected(kind))),
                Some(Ok(v)) => this.pending_bytes = v,
            }
        }
        let n = std::cmp::min(buf.len(), this.pending_bytes.len());
        buf[..n].copy_from_slice(&this.pending_bytes[..n]);
        this.pending_bytes.drain(..n);
        Poll::Ready(Ok(n))
    }
}

impl AsyncWrite for LocalStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<IoResult<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let this = self.get_mut();
        if let Err(e) = futures::ready!(this.w.poll_ready(cx)) {
            return Poll::Ready(Err(IoError::new(ErrorKind::BrokenPipe, e)));
        }
        let buf = if buf.len() > CHUNKSZ {
            &buf[..CHUNKSZ]
        } else {
            buf
        };
        let len = buf.len();
        match this.w.start_send(Ok(buf.to_vec())) {
            Ok(()) => Poll::Ready(Ok(len)),
            Err(e) => Poll::Ready(Err(IoError::new(ErrorKind::BrokenPipe, e))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        self.get_mut().w.close_channel();
        Poll::Ready(Ok(()))
    }
}

impl Transport for LocalStream {
    fn peer_addr(&self) -> IoResult<SocketAddr> {
        Ok(self.peer)
    }
}
