//! Implements the client side of the SOCKS5 handshake.
//!
//! SOCKS5 is a protocol for asking a proxy to open a TCP connection on
//! our behalf, and then relay bytes over it.  This crate speaks the
//! client half of that conversation: it proposes authentication
//! methods, sends credentials if the proxy asks for them, sends a
//! CONNECT request, and interprets the proxy's reply.
//!
//! It does no IO of its own.  Instead it exposes a stateful
//! [`Socks5ClientHandshake`] that is fed whatever bytes have arrived
//! from the proxy, and answers with an [`Action`] saying what to send
//! back and how much input it consumed.  Once the handshake reports
//! that it is finished, every remaining byte belongs to the tunneled
//! protocol.
//!
//! For more information about SOCKS5:
//!
//!   * SOCKS5 is specified in
//!     [RFC 1928](https://tools.ietf.org/html/rfc1928), and see also
//!     [RFC 1929](https://tools.ietf.org/html/rfc1929) for
//!     Username/Password authentication.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::exhaustive_structs)]

mod auth;
pub mod codec;
mod err;
mod handshake;
mod msg;
mod sender;

pub use auth::{AuthConfig, AuthMethod, Credentials};
pub use err::{ConfigError, Error};
pub use handshake::{Action, HandshakeState, Socks5ClientHandshake};
pub use msg::{
    AuthMethodCode, ConnectTarget, ProxyReply, SocksAddr, SocksCmd, SocksHostname, SocksStatus,
};
pub use sender::RequestSender;

/// A Result type for the tunsocks_proto crate.
pub type Result<T> = std::result::Result<T, Error>;
