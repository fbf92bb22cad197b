//! Open connections through a SOCKS5 proxy.
//!
//! # Overview
//!
//! This crate turns "connect to a proxy, then have it connect to a
//! target" into one asynchronous operation.  A [`Socks5Connector`]
//! opens a transport to the proxy, runs the client side of the SOCKS5
//! handshake (from `tunsocks_proto`) over it, and once the proxy has
//! granted our connect request, hands the connection to an application
//! protocol of the caller's choosing.
//!
//! The application protocol is built by a [`ProtocolFactory`] and
//! started exactly once with a [`RelayTransport`]: a transport that
//! passes bytes to and from the target unchanged.  Callers who just want
//! the byte stream can use [`Socks5Connector::connect_stream()`].
//!
//! Every attempt resolves exactly once, to the started protocol or to
//! an [`Error`].  Nothing is retried.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo<R: tunsocks_rtcompat::Runtime>(runtime: R) -> Result<(), Box<dyn std::error::Error>> {
//! use tunsocks_client::{AuthConfig, ConnectTarget, Socks5Connector};
//! use futures::io::AsyncWriteExt;
//!
//! let proxy = "127.0.0.1:1080".parse().unwrap();
//! let connector = Socks5Connector::new(runtime, proxy, AuthConfig::anonymous());
//! let mut stream = connector
//!     .connect_stream(ConnectTarget::new("example.com", 80)?)
//!     .await?;
//! stream
//!     .write_all(b"GET / HTTP/1.0\r\nHost: example.com\r\n\r\n")
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![warn(noop_method_call)]
#![deny(unreachable_pub)]
#![deny(clippy::await_holding_lock)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::cognitive_complexity)]
#![deny(clippy::debug_assert_with_mut_call)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::exhaustive_structs)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::option_option)]

mod connector;
mod coordinator;
mod err;
mod protocol;
mod relay;

pub use connector::Socks5Connector;
pub use coordinator::ConnectionResult;
pub use err::{Error, Result};
pub use protocol::{ProtocolFactory, Tunnel, WrappedProtocol};
pub use relay::RelayTransport;

pub use tunsocks_proto::{
    AuthConfig, AuthMethod, ConnectTarget, Credentials, ProxyReply, SocksStatus,
};
