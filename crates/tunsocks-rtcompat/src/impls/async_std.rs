//! Re-exports of the async_std runtime for use with tunsocks.
//!
//! This crate helps define a slim API around our async runtime so that we
//! can easily swap it out.

/// Types used for networking (async_std implementation)
mod net {
    use crate::traits;

    use async_std_crate::net::{TcpListener, TcpStream};
    use async_trait::async_trait;
    use std::io::Result as IoResult;
    use std::net::SocketAddr;

    #[async_trait]
    impl traits::TcpListener for TcpListener {
        type TcpStream = TcpStream;
        async fn accept(&self) -> IoResult<(Self::TcpStream, SocketAddr)> {
            TcpListener::accept(self).await
        }
        fn local_addr(&self) -> IoResult<SocketAddr> {
            TcpListener::local_addr(self)
        }
    }

    impl traits::Transport for TcpStream {
        fn peer_addr(&self) -> IoResult<SocketAddr> {
            TcpStream::peer_addr(self)
        }
    }

    #[async_trait]
    impl traits::TcpProvider for async_executors::AsyncStd {
        type TcpStream = TcpStream;
        type TcpListener = TcpListener;
        async fn connect(&self, addr: &SocketAddr) -> IoResult<Self::TcpStream> {
            TcpStream::connect(addr).await
        }
        async fn listen(&self, addr: &SocketAddr) -> IoResult<Self::TcpListener> {
            TcpListener::bind(*addr).await
        }
    }
}

// ==============================

/// Create and return a new `async_std` runtime.
pub fn create_runtime() -> async_executors::AsyncStd {
    async_executors::AsyncStd::new()
}

/// Run `future` to completion on the async_std executor.
pub fn block_on<F: futures::Future>(future: F) -> F::Output {
    async_executors::AsyncStd::block_on(future)
}
