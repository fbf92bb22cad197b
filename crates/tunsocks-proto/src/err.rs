//! Declare error types for tunsocks_proto
use crate::msg::{AuthMethodCode, SocksStatus};
use thiserror::Error;

/// A problem with the caller-supplied configuration for a SOCKS5
/// connection attempt.
///
/// These are always detected before any bytes are sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// No authentication methods were specified.
    #[error("no auth methods were specified")]
    NoAuthMethods,
    /// The same authentication method was specified twice.
    #[error("auth method {0} was specified more than once")]
    DuplicateAuthMethod(AuthMethodCode),
    /// A username or password doesn't fit in the one-byte length field.
    #[error("{0} is longer than 255 bytes")]
    CredentialTooLong(&'static str),
    /// A target hostname was empty, or doesn't fit in the one-byte length field.
    #[error("target hostname must be between 1 and 255 bytes long")]
    BadHostname,
}

/// An error that occurs while negotiating a SOCKS5 handshake with a proxy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Tried to handle a message what wasn't complete: try again.
    #[error("Message truncated; need to wait for more")]
    Truncated,

    /// The connection attempt was misconfigured.
    #[error("Invalid SOCKS configuration: {0}")]
    Config(#[from] ConfigError),

    /// The proxy sent something that isn't valid SOCKS5 at this point
    /// of the handshake.
    #[error("SOCKS protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// The proxy selected an authentication method that we never
    /// proposed.
    #[error("no method proposed was accepted (proxy selected {selected})")]
    MethodsNotAccepted {
        /// The methods we offered, in order.
        proposed: Vec<AuthMethodCode>,
        /// The method that the proxy picked.
        selected: AuthMethodCode,
    },

    /// The proxy rejected our username and password.
    #[error("username/password combination was rejected")]
    LoginAuthenticationFailed,

    /// The proxy refused to open a connection to the target.
    #[error("connection rejected by SOCKS server: {reason} ({status})")]
    ConnectionError {
        /// Status code from the proxy's reply.
        status: SocksStatus,
        /// Human-readable meaning of `status`.
        reason: &'static str,
    },

    /// The connection to the proxy ended before the handshake was over.
    #[error("connection to SOCKS server closed before the handshake finished")]
    ConnectionClosedPrematurely,

    /// Tried to progress the SOCKS handshake when it was already
    /// finished.  This is a programming error.
    #[error("SOCKS handshake was finished; no need to call this again")]
    AlreadyFinished,

    /// Something went wrong with the programming of this module.
    #[error("Internal programming error while handling SOCKS handshake")]
    Internal,
}

impl From<crate::codec::CodecError> for Error {
    fn from(e: crate::codec::CodecError) -> Error {
        use crate::codec::CodecError as E;
        match e {
            E::Truncated => Error::Truncated,
            E::BadMessage(m) => Error::ProtocolViolation(m),
        }
    }
}
