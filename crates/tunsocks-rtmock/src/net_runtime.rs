//! Declare MockNetRuntime.

use crate::net::MockNetProvider;
use tunsocks_rtcompat::TcpProvider;

use async_trait::async_trait;
use futures::task::{FutureObj, Spawn, SpawnError};
use std::io::Result as IoResult;
use std::net::SocketAddr;

/// A wrapper Runtime that overrides the TcpProvider trait for the
/// underlying executor.
///
/// The underlying executor only needs to be able to spawn tasks; a
/// `futures::executor::ThreadPool` will do.
#[derive(Clone)]
pub struct MockNetRuntime<R> {
    /// The underlying runtime. Most calls get delegated here.
    runtime: R,
    /// A MockNetProvider.  Network-related calls get delegated here.
    net: MockNetProvider,
}

impl<R> MockNetRuntime<R>
where
    R: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a new runtime that wraps `runtime`, but overrides
    /// its view of the network with a [`MockNetProvider`], `net`.
    pub fn new(runtime: R, net: MockNetProvider) -> Self {
        MockNetRuntime { runtime, net }
    }

    /// Return a reference to the underlying runtime.
    pub fn inner(&self) -> &R {
        &self.runtime
    }

    /// Return a reference to the [`MockNetProvider`]
    pub fn mock_net(&self) -> &MockNetProvider {
        &self.net
    }
}

impl<R: Spawn> Spawn for MockNetRuntime<R> {
    fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        self.runtime.spawn_obj(future)
    }
}

#[async_trait]
impl<R: Send + Sync> TcpProvider for MockNetRuntime<R> {
    type TcpStream = <MockNetProvider as TcpProvider>::TcpStream;
    type TcpListener = <MockNetProvider as TcpProvider>::TcpListener;

    async fn connect(&self, addr: &SocketAddr) -> IoResult<Self::TcpStream> {
        self.net.connect(addr).await
    }
    async fn listen(&self, addr: &SocketAddr) -> IoResult<Self::TcpListener> {
        self.net.listen(addr).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::net::MockNetwork;
    use futures::io::{AsyncReadExt, AsyncWriteExt};
    use futures::task::SpawnExt;
    use tunsocks_rtcompat::{Runtime, TcpListener};

    /// Make sure that a MockNetRuntime really is a Runtime.
    fn assert_runtime<R: Runtime>(_: &R) {}

    #[test]
    fn spawn_and_connect() -> IoResult<()> {
        let net = MockNetwork::new();
        let host = net.add_host(&["192.0.2.1".parse().unwrap()]);
        let pool = futures::executor::ThreadPool::new()?;
        let rt = MockNetRuntime::new(pool, host);
        assert_runtime(&rt);

        futures::executor::block_on(async {
            let lis = rt.listen(&"0.0.0.0:7".parse().unwrap()).await?;
            let addr = lis.local_addr()?;
            rt.spawn(async move {
                if let Ok((mut s, _)) = lis.accept().await {
                    let mut buf = [0_u8; 4];
                    if s.read_exact(&mut buf).await.is_ok() {
                        let _ = s.write_all(&buf).await;
                    }
                }
            })
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

            let mut c = rt.connect(&addr).await?;
            c.write_all(b"echo").await?;
            let mut buf = [0_u8; 4];
            c.read_exact(&mut buf).await?;
            assert_eq!(&buf, b"echo");
            Ok(())
        })
    }
}
