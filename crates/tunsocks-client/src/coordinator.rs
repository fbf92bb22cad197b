//! Run one connection attempt through a SOCKS5 proxy, from opening the
//! transport to starting the wrapped protocol.

use crate::protocol::{ProtocolFactory, WrappedProtocol};
use crate::relay::RelayTransport;
use crate::{Error, Result};

use bytes::{Buf, Bytes, BytesMut};
use futures::channel::oneshot;
use futures::future::{self, Either, Future, FutureExt};
use futures::io::{AsyncReadExt, AsyncWriteExt};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, error, info, trace};
use tunsocks_proto::Socks5ClientHandshake;
use tunsocks_rtcompat::{TcpProvider, Transport};

/// The eventual outcome of a connection attempt.
///
/// This is a future: it resolves to the started protocol, or to the
/// reason the attempt failed.  Dropping it before it resolves cancels
/// the attempt.
#[must_use = "dropping a ConnectionResult cancels the connection attempt"]
pub struct ConnectionResult<P> {
    /// Where the coordinator will put the outcome.
    receiver: oneshot::Receiver<Result<P>>,
}

impl<P> Future for ConnectionResult<P> {
    type Output = Result<P>;
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match futures::ready!(self.get_mut().receiver.poll_unpin(cx)) {
            Ok(outcome) => Poll::Ready(outcome),
            Err(oneshot::Canceled) => Poll::Ready(Err(Error::Internal(
                "connection attempt ended without a result",
            ))),
        }
    }
}

/// The only writer of a [`ConnectionResult`].
///
/// Resolving twice is a bug: the second outcome is logged and thrown away.
pub(crate) struct ConnectionCoordinator<P> {
    /// Sender for the outcome.  Taken when we resolve.
    sender: Option<oneshot::Sender<Result<P>>>,
}

impl<P> ConnectionCoordinator<P> {
    /// Make a new coordinator, along with the result it will resolve.
    pub(crate) fn new() -> (Self, ConnectionResult<P>) {
        let (sender, receiver) = oneshot::channel();
        (
            ConnectionCoordinator {
                sender: Some(sender),
            },
            ConnectionResult { receiver },
        )
    }

    /// Return true if we have already resolved our result.
    pub(crate) fn is_resolved(&self) -> bool {
        self.sender.is_none()
    }

    /// Return true if nobody is waiting for our result any more.
    pub(crate) fn is_canceled(&self) -> bool {
        self.sender.as_ref().map_or(true, oneshot::Sender::is_canceled)
    }

    /// Wait until nobody is waiting for our result any more.
    async fn canceled(&mut self) {
        match self.sender.as_mut() {
            Some(sender) => sender.cancellation().await,
            None => future::pending::<()>().await,
        }
    }

    /// Deliver `outcome` to whoever holds the [`ConnectionResult`].
    pub(crate) fn resolve(&mut self, outcome: Result<P>) {
        match self.sender.take() {
            Some(sender) => {
                if sender.send(outcome).is_err() {
                    debug!("Connection attempt finished, but nobody was waiting for it.");
                }
            }
            None => {
                error!("Tried to resolve a connection attempt twice.");
                debug_assert!(false, "Tried to resolve a connection attempt twice.");
            }
        }
    }
}

/// Map a failed read or write on the proxy connection onto the handshake.
fn closed_during_handshake(
    handshake: &mut Socks5ClientHandshake,
    what: &'static str,
    e: Option<std::io::Error>,
) -> Error {
    match e {
        Some(e) => debug!("Error while {} SOCKS handshake: {}", what, e),
        None => debug!("Proxy closed the connection during the SOCKS handshake"),
    }
    handshake.connection_closed().into()
}

/// Drive `handshake` to completion over `stream`.
///
/// On success, return whatever the proxy sent after its connect reply.
async fn negotiate<S: Transport>(
    stream: &mut S,
    handshake: &mut Socks5ClientHandshake,
) -> Result<Bytes> {
    // The SOCKS5 handshake always takes more than one round trip, so we
    // run it in a loop.
    let proposal = handshake.start()?;
    if let Err(e) = write_reply(stream, &proposal.reply).await {
        return Err(closed_during_handshake(handshake, "writing", Some(e)));
    }

    let mut inbuf = BytesMut::with_capacity(512);
    let mut chunk = [0_u8; 1024];
    loop {
        // Read some more stuff.
        let n = match stream.read(&mut chunk[..]).await {
            Ok(0) => return Err(closed_during_handshake(handshake, "reading", None)),
            Ok(n) => n,
            Err(e) => return Err(closed_during_handshake(handshake, "reading", Some(e))),
        };
        inbuf.extend_from_slice(&chunk[..n]);

        // The proxy may have sent more than one message; handle all the
        // complete ones we have.
        loop {
            let action = match handshake.handshake(&inbuf[..]) {
                Err(tunsocks_proto::Error::Truncated) => break,
                Err(e) => return Err(e.into()),
                Ok(action) => action,
            };
            inbuf.advance(action.drain);
            if !action.reply.is_empty() {
                trace!("Sending {} bytes to SOCKS proxy", action.reply.len());
                if let Err(e) = write_reply(stream, &action.reply).await {
                    return Err(closed_during_handshake(handshake, "writing", Some(e)));
                }
            }
            if action.finished {
                return Ok(inbuf.freeze());
            }
        }
    }
}

/// Write `reply` to `stream`, and flush it.
async fn write_reply<S: Transport>(stream: &mut S, reply: &[u8]) -> std::io::Result<()> {
    stream.write_all(reply).await?;
    stream.flush().await
}

/// Run a single connection attempt through the proxy at `proxy`, and
/// resolve `coordinator` with its outcome.
///
/// If the coordinator's result is dropped while we're negotiating, we
/// close the connection and stop without resolving anything.
pub(crate) async fn run_attempt<R, F>(
    provider: &R,
    proxy: SocketAddr,
    mut handshake: Socks5ClientHandshake,
    factory: F,
    coordinator: &mut ConnectionCoordinator<F::Protocol>,
) where
    R: TcpProvider,
    F: ProtocolFactory<R::TcpStream>,
{
    let target = handshake.target().clone();
    debug!("Connecting to SOCKS proxy at {} for {}", proxy, target);

    let mut stream = match provider.connect(&proxy).await {
        Ok(s) => s,
        Err(e) => {
            debug!("Couldn't reach SOCKS proxy at {}: {}", proxy, e);
            coordinator.resolve(Err(Error::TransportOpen {
                addr: proxy,
                source: Arc::new(e),
            }));
            return;
        }
    };

    if coordinator.is_canceled() {
        debug!("Connection attempt for {} canceled before it began; closing.", target);
        let _ = stream.close().await;
        return;
    }

    let outcome = {
        let negotiation = negotiate(&mut stream, &mut handshake);
        let canceled = coordinator.canceled();
        futures::pin_mut!(negotiation, canceled);
        match future::select(negotiation, canceled).await {
            Either::Left((outcome, _)) => Some(outcome),
            Either::Right(((), _)) => None,
        }
    };

    let leftover = match outcome {
        None => {
            debug!("Connection attempt for {} canceled; closing.", target);
            let _ = stream.close().await;
            let _ = handshake.connection_closed();
            return;
        }
        Some(Err(e)) => {
            info!("SOCKS handshake for {} failed: {}", target, e);
            let _ = stream.close().await;
            coordinator.resolve(Err(e));
            return;
        }
        Some(Ok(leftover)) => leftover,
    };

    let reply = handshake.into_reply();
    if let Some(reply) = &reply {
        debug!(
            "Tunnel to {} established; proxy bound {}:{}",
            target,
            reply.addr(),
            reply.port()
        );
    }

    if coordinator.is_canceled() {
        debug!("Tunnel to {} is up, but nobody wants it; closing.", target);
        let _ = stream.close().await;
        return;
    }

    let peer = stream.peer_addr().unwrap_or(proxy);
    match factory.build_protocol(peer) {
        Some(mut protocol) => {
            protocol.start(RelayTransport::new(stream, leftover).with_reply(reply));
            coordinator.resolve(Ok(protocol));
        }
        None => {
            info!("No protocol to run over tunnel to {}; closing.", target);
            let _ = stream.close().await;
            coordinator.resolve(Err(Error::NoProtocol));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_await_test::async_test;
    use hex_literal::hex;
    use crate::protocol::Tunnel;
    use tunsocks_proto::{AuthConfig, ConnectTarget, HandshakeState};
    use tunsocks_rtcompat::TcpListener;
    use tunsocks_rtmock::io::{stream_pair, LocalStream};
    use tunsocks_rtmock::net::MockNetwork;

    #[async_test]
    async fn resolve_once() {
        let (mut coord, result) = ConnectionCoordinator::<u32>::new();
        assert!(!coord.is_resolved());
        assert!(!coord.is_canceled());
        coord.resolve(Ok(7));
        assert!(coord.is_resolved());
        assert_eq!(result.await.unwrap(), 7);
    }

    #[async_test]
    async fn dropped_coordinator() {
        let (coord, result) = ConnectionCoordinator::<u32>::new();
        drop(coord);
        assert!(matches!(result.await, Err(Error::Internal(_))));
    }

    #[test]
    fn dropped_result() {
        let (mut coord, result) = ConnectionCoordinator::<u32>::new();
        drop(result);
        assert!(coord.is_canceled());
        // Nobody's listening, but that's not a bug.
        coord.resolve(Ok(1));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn resolve_twice() {
        let (mut coord, _result) = ConnectionCoordinator::<u32>::new();
        coord.resolve(Ok(1));
        coord.resolve(Ok(2));
    }

    fn anon_handshake() -> Socks5ClientHandshake {
        Socks5ClientHandshake::new(
            ConnectTarget::new("example.com", 80).unwrap(),
            AuthConfig::anonymous(),
        )
    }

    #[async_test]
    async fn negotiate_pipelined() {
        // The proxy answers everything at once, and the tunneled
        // protocol's first bytes come right along with it.
        let (mut client, mut proxy) = stream_pair();
        let mut hs = anon_handshake();
        proxy
            .write_all(&hex!("0500 05000001c0000201 0050 6869"))
            .await
            .unwrap();
        let leftover = negotiate(&mut client, &mut hs).await.unwrap();
        assert_eq!(&leftover[..], b"hi");
        assert!(hs.finished());

        let mut sent = [0_u8; 3 + 18];
        proxy.read_exact(&mut sent).await.unwrap();
        assert_eq!(
            &sent[..],
            &hex!("050100 050100030b6578616d706c652e636f6d0050")[..]
        );
    }

    #[async_test]
    async fn negotiate_read_error() {
        let (mut client, mut proxy) = stream_pair();
        let mut hs = anon_handshake();
        proxy
            .send_err(std::io::ErrorKind::ConnectionReset)
            .await
            .unwrap();
        let r = negotiate(&mut client, &mut hs).await;
        assert!(matches!(
            r,
            Err(Error::Handshake(
                tunsocks_proto::Error::ConnectionClosedPrematurely
            ))
        ));
        assert_eq!(
            hs.state(),
            &HandshakeState::Failed(tunsocks_proto::Error::ConnectionClosedPrematurely)
        );
    }

    #[async_test]
    async fn negotiate_write_error() {
        let (mut client, proxy) = stream_pair();
        drop(proxy);
        let mut hs = anon_handshake();
        let r = negotiate(&mut client, &mut hs).await;
        assert!(matches!(
            r,
            Err(Error::Handshake(
                tunsocks_proto::Error::ConnectionClosedPrematurely
            ))
        ));
    }

    #[async_test]
    async fn canceled_before_proposal() {
        let net = MockNetwork::new();
        let client = net.add_host(&["192.0.2.1".parse().unwrap()]);
        let proxy = net.add_host(&["198.51.100.1".parse().unwrap()]);
        let proxy_addr: SocketAddr = "198.51.100.1:1080".parse().unwrap();
        let lis = proxy.listen(&proxy_addr).await.unwrap();

        // Nobody wants the result by the time the proxy answers the
        // TCP connect.
        let (mut coord, result) = ConnectionCoordinator::<Tunnel<LocalStream>>::new();
        drop(result);
        run_attempt(
            &client,
            proxy_addr,
            anon_handshake(),
            |_: SocketAddr| Some(Tunnel::new()),
            &mut coord,
        )
        .await;
        assert!(!coord.is_resolved());

        // The proxy sees the connection close without a single byte.
        let (mut p, _) = lis.accept().await.unwrap();
        let mut got = Vec::new();
        p.read_to_end(&mut got).await.unwrap();
        assert!(got.is_empty());
    }
}
