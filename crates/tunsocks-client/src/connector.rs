//! Entry points for opening tunnels through a SOCKS5 proxy.

use crate::coordinator::{run_attempt, ConnectionCoordinator, ConnectionResult};
use crate::protocol::{ProtocolFactory, Tunnel};
use crate::relay::RelayTransport;
use crate::{Error, Result};

use futures::task::SpawnExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tunsocks_proto::{AuthConfig, ConnectTarget, Socks5ClientHandshake};
use tunsocks_rtcompat::Runtime;

/// An object that opens connections to targets by way of a single
/// SOCKS5 proxy.
///
/// Each call to [`connect()`](Socks5Connector::connect) or
/// [`launch()`](Socks5Connector::launch) is an independent attempt with
/// its own connection to the proxy.
#[derive(Clone)]
pub struct Socks5Connector<R: Runtime> {
    /// Runtime used to reach the proxy and to spawn attempts.
    runtime: R,
    /// Address of the proxy.
    proxy: SocketAddr,
    /// The authentication methods we propose to the proxy.
    auth: AuthConfig,
}

impl<R: Runtime> Socks5Connector<R> {
    /// Make a connector that reaches the proxy at `proxy`, proposing
    /// the methods in `auth`.
    pub fn new(runtime: R, proxy: SocketAddr, auth: AuthConfig) -> Self {
        Socks5Connector {
            runtime,
            proxy,
            auth,
        }
    }

    /// Return the address of the proxy we use.
    pub fn proxy_addr(&self) -> SocketAddr {
        self.proxy
    }

    /// Return the authentication methods we propose.
    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    /// Return a new handshake for a connection to `target`.
    fn handshake_for(&self, target: ConnectTarget) -> Socks5ClientHandshake {
        Socks5ClientHandshake::new(target, self.auth.clone())
    }

    /// Ask the proxy to connect us to `target`; once it has, build a
    /// protocol with `factory` and start it on the tunnel.
    ///
    /// Runs the whole attempt in the current task.  Dropping the
    /// returned future abandons the attempt.
    pub async fn connect<F>(&self, target: ConnectTarget, factory: F) -> Result<F::Protocol>
    where
        F: ProtocolFactory<R::TcpStream>,
    {
        let (mut coordinator, result) = ConnectionCoordinator::new();
        let handshake = self.handshake_for(target);
        run_attempt(
            &self.runtime,
            self.proxy,
            handshake,
            factory,
            &mut coordinator,
        )
        .await;
        result.await
    }

    /// As [`connect()`](Socks5Connector::connect), but run the attempt
    /// in a new task, and return a [`ConnectionResult`] for its outcome.
    ///
    /// Dropping the `ConnectionResult` before it resolves cancels the
    /// attempt and closes the connection to the proxy.
    pub fn launch<F>(&self, target: ConnectTarget, factory: F) -> ConnectionResult<F::Protocol>
    where
        F: ProtocolFactory<R::TcpStream> + Send + 'static,
        F::Protocol: Send + 'static,
    {
        let (mut coordinator, result) = ConnectionCoordinator::new();
        let handshake = self.handshake_for(target);
        let runtime = self.runtime.clone();
        let proxy = self.proxy;
        let attempt = async move {
            run_attempt(&runtime, proxy, handshake, factory, &mut coordinator).await;
        };

        match self.runtime.spawn(attempt) {
            Ok(()) => result,
            Err(e) => {
                // The attempt never ran, so its coordinator is gone;
                // report the failure through a fresh one.
                let (mut coordinator, result) = ConnectionCoordinator::new();
                coordinator.resolve(Err(Error::Spawn(Arc::new(e))));
                result
            }
        }
    }

    /// Ask the proxy to connect us to `target`, and return the tunnel
    /// itself.
    pub async fn connect_stream(&self, target: ConnectTarget) -> Result<RelayTransport<R::TcpStream>> {
        let tunnel = self
            .connect(target, |_peer: SocketAddr| {
                Some(Tunnel::<R::TcpStream>::new())
            })
            .await?;
        tunnel
            .into_transport()
            .ok_or(Error::Internal("tunnel was built but never started"))
    }
}
