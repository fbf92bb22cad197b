//! Re-exports of the tokio runtime for use with tunsocks.
//!
//! This crate helps define a slim API around our async runtime so that we
//! can easily swap it out.

/// Types used for networking (tokio implementation)
pub(crate) mod net {
    use crate::traits;
    use async_trait::async_trait;

    use futures::io::{AsyncRead, AsyncWrite};
    use std::io::Result as IoResult;
    use std::net::SocketAddr;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio_crate::net::{TcpListener as TokioTcpListener, TcpStream as TokioTcpStream};
    use tokio_util::compat::{Compat, TokioAsyncReadCompatExt as _};

    /// Wrapper for Tokio's TcpStream that implements the standard
    /// AsyncRead and AsyncWrite.
    pub struct TcpStream {
        /// Underlying tokio_util::compat::Compat wrapper.
        s: Compat<TokioTcpStream>,
    }
    impl From<TokioTcpStream> for TcpStream {
        fn from(s: TokioTcpStream) -> TcpStream {
            let s = s.compat();
            TcpStream { s }
        }
    }
    impl AsyncRead for TcpStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut [u8],
        ) -> Poll<IoResult<usize>> {
            Pin::new(&mut self.s).poll_read(cx, buf)
        }
    }
    impl AsyncWrite for TcpStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<IoResult<usize>> {
            Pin::new(&mut self.s).poll_write(cx, buf)
        }
        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
            Pin::new(&mut self.s).poll_flush(cx)
        }
        fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
            Pin::new(&mut self.s).poll_close(cx)
        }
    }
    impl traits::Transport for TcpStream {
        fn peer_addr(&self) -> IoResult<SocketAddr> {
            self.s.get_ref().peer_addr()
        }
    }

    /// Wrap a Tokio TcpListener to behave as a tunsocks TcpListener.
    pub struct TcpListener {
        /// The underlying listener.
        pub(super) lis: TokioTcpListener,
    }

    #[async_trait]
    impl traits::TcpListener for TcpListener {
        type TcpStream = TcpStream;
        async fn accept(&self) -> IoResult<(Self::TcpStream, SocketAddr)> {
            let (stream, addr) = self.lis.accept().await?;
            Ok((stream.into(), addr))
        }
        fn local_addr(&self) -> IoResult<SocketAddr> {
            self.lis.local_addr()
        }
    }
}

// ==============================

use crate::traits::*;
use async_trait::async_trait;
use futures::task::{FutureObj, Spawn, SpawnError};
use std::io::Result as IoResult;
use std::net::SocketAddr;

/// A [`Runtime`] built around a Handle to a tokio runtime.
///
/// The handle doesn't keep the runtime alive: whoever built the
/// runtime must hold onto it for as long as this handle is in use.
#[derive(Clone, Debug)]
pub struct TokioRuntimeHandle {
    /// The underlying Handle.
    handle: tokio_crate::runtime::Handle,
}

impl TokioRuntimeHandle {
    /// Wrap a tokio runtime handle into a format that tunsocks can use.
    pub fn new(handle: tokio_crate::runtime::Handle) -> Self {
        TokioRuntimeHandle { handle }
    }
}

impl From<tokio_crate::runtime::Handle> for TokioRuntimeHandle {
    fn from(handle: tokio_crate::runtime::Handle) -> Self {
        TokioRuntimeHandle::new(handle)
    }
}

impl Spawn for TokioRuntimeHandle {
    fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        let _join_handle = self.handle.spawn(future);
        Ok(())
    }
}

#[async_trait]
impl TcpProvider for TokioRuntimeHandle {
    type TcpStream = net::TcpStream;
    type TcpListener = net::TcpListener;

    async fn connect(&self, addr: &SocketAddr) -> IoResult<Self::TcpStream> {
        let s = tokio_crate::net::TcpStream::connect(addr).await?;
        Ok(s.into())
    }
    async fn listen(&self, addr: &SocketAddr) -> IoResult<Self::TcpListener> {
        let lis = tokio_crate::net::TcpListener::bind(*addr).await?;
        Ok(net::TcpListener { lis })
    }
}

/// Create and return a new multithreaded tokio runtime.
///
/// Wrap its handle with [`TokioRuntimeHandle::new()`] to get something
/// that implements [`Runtime`].
pub fn create_runtime() -> IoResult<tokio_crate::runtime::Runtime> {
    tokio_crate::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}
