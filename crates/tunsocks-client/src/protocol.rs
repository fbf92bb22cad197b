//! Traits for the protocol that runs over an established tunnel.
//!
//! A connection attempt is given a [`ProtocolFactory`].  Once the proxy
//! reports that the tunnel is up, the factory builds a
//! [`WrappedProtocol`], which is started once with a
//! [`RelayTransport`].  From then on the protocol reads and writes the
//! relay as if it were a direct connection to the target: reaching EOF
//! (or an error) on the relay means the tunnel has closed.

use crate::relay::RelayTransport;
use std::net::SocketAddr;

/// An application protocol that can run over a SOCKS5 tunnel.
pub trait WrappedProtocol<T> {
    /// Begin running this protocol over `transport`.
    ///
    /// Called exactly once, right after the tunnel is established.
    fn start(&mut self, transport: RelayTransport<T>);
}

/// Something that builds a [`WrappedProtocol`] for a new tunnel.
///
/// Any `FnOnce(SocketAddr) -> Option<P>` is a factory.
pub trait ProtocolFactory<T> {
    /// The kind of protocol this factory builds.
    type Protocol: WrappedProtocol<T>;

    /// Build a protocol for a tunnel through the proxy at `peer`.
    ///
    /// Returning `None` makes the attempt fail with
    /// [`Error::NoProtocol`](crate::Error::NoProtocol).
    fn build_protocol(self, peer: SocketAddr) -> Option<Self::Protocol>;
}

impl<T, P, F> ProtocolFactory<T> for F
where
    F: FnOnce(SocketAddr) -> Option<P>,
    P: WrappedProtocol<T>,
{
    type Protocol = P;
    fn build_protocol(self, peer: SocketAddr) -> Option<P> {
        self(peer)
    }
}

/// A protocol that does nothing but hold on to its transport.
///
/// Use this when you want the tunneled byte stream itself.
pub struct Tunnel<T> {
    /// The transport we were started with, if any.
    transport: Option<RelayTransport<T>>,
}

impl<T> Tunnel<T> {
    /// Make a new Tunnel that hasn't been started yet.
    pub fn new() -> Self {
        Tunnel { transport: None }
    }

    /// Return true if this tunnel has been started.
    pub fn is_started(&self) -> bool {
        self.transport.is_some()
    }

    /// Consume this Tunnel, and return its transport (if it was started).
    pub fn into_transport(self) -> Option<RelayTransport<T>> {
        self.transport
    }
}

impl<T> Default for Tunnel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WrappedProtocol<T> for Tunnel<T> {
    fn start(&mut self, transport: RelayTransport<T>) {
        debug_assert!(self.transport.is_none());
        self.transport = Some(transport);
    }
}
