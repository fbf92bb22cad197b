//! Declare an error type for tunsocks_client.
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

/// An error that caused a tunneled connection attempt to fail.
///
/// Every attempt ends with exactly one of these or with a started
/// protocol; nothing is retried.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// We couldn't open a connection to the proxy at all.
    #[error("Unable to connect to SOCKS proxy at {addr}")]
    TransportOpen {
        /// The proxy address we tried.
        addr: SocketAddr,
        /// What went wrong.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The SOCKS5 handshake with the proxy failed.
    #[error("SOCKS handshake failed: {0}")]
    Handshake(#[from] tunsocks_proto::Error),

    /// The caller asked for something that can't be expressed in SOCKS5.
    #[error("Invalid SOCKS configuration: {0}")]
    Config(#[from] tunsocks_proto::ConfigError),

    /// The protocol factory declined to build a protocol once the
    /// tunnel was up.
    #[error("Protocol factory declined to build a protocol for the tunnel")]
    NoProtocol,

    /// We couldn't spawn a task to run the connection attempt.
    #[error("Unable to spawn connection attempt")]
    Spawn(#[source] Arc<futures::task::SpawnError>),

    /// A programming error in this crate.
    #[error("Internal error: {0}")]
    Internal(&'static str),
}

impl Error {
    /// Return true if this error was caused by how the attempt was set
    /// up, rather than by anything the network or the proxy did.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::NoProtocol
                | Error::Handshake(tunsocks_proto::Error::Config(_))
        )
    }

    /// If this error came from the proxy refusing our connect request,
    /// return the status code it sent.
    pub fn socks_status(&self) -> Option<tunsocks_proto::SocksStatus> {
        match self {
            Error::Handshake(tunsocks_proto::Error::ConnectionError { status, .. }) => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// A Result type for the tunsocks_client crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;
    use tunsocks_proto::{ConfigError, SocksStatus};

    #[test]
    fn classify() {
        assert!(Error::NoProtocol.is_config_error());
        assert!(Error::Config(ConfigError::NoAuthMethods).is_config_error());
        assert!(!Error::Internal("x").is_config_error());

        let refused: Error = tunsocks_proto::Error::ConnectionError {
            status: SocksStatus::HOST_UNREACHABLE,
            reason: SocksStatus::HOST_UNREACHABLE.reason(),
        }
        .into();
        assert!(!refused.is_config_error());
        assert_eq!(refused.socks_status(), Some(SocksStatus::HOST_UNREACHABLE));
        assert_eq!(Error::NoProtocol.socks_status(), None);
    }

    #[test]
    fn display() {
        let e = Error::TransportOpen {
            addr: "192.0.2.1:1080".parse().unwrap(),
            source: Arc::new(std::io::ErrorKind::ConnectionRefused.into()),
        };
        assert_eq!(
            e.to_string(),
            "Unable to connect to SOCKS proxy at 192.0.2.1:1080"
        );
        let e: Error = tunsocks_proto::Error::LoginAuthenticationFailed.into();
        assert_eq!(
            e.to_string(),
            "SOCKS handshake failed: username/password combination was rejected"
        );
    }
}
