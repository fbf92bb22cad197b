//! Authentication methods, and dispatch on the method the proxy selects.

use crate::err::ConfigError;
use crate::msg::AuthMethodCode;
use crate::sender::RequestSender;
use crate::codec::Writer;
use crate::{Error, Result};

use std::fmt;
use zeroize::Zeroize;

/// A username and password for RFC 1929 authentication.
///
/// The password is wiped from memory when this object is dropped, and
/// is never shown by the `Debug` implementation.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The username, as raw bytes.
    username: Vec<u8>,
    /// The password, as raw bytes.
    password: Vec<u8>,
}

impl Credentials {
    /// Construct a new set of credentials.
    ///
    /// Each field is sent with a one-byte length, so neither may be
    /// longer than 255 bytes.
    pub fn new<U, P>(username: U, password: P) -> std::result::Result<Self, ConfigError>
    where
        U: Into<Vec<u8>>,
        P: Into<Vec<u8>>,
    {
        let creds = Credentials {
            username: username.into(),
            password: password.into(),
        };
        if creds.username.len() > 255 {
            return Err(ConfigError::CredentialTooLong("username"));
        }
        if creds.password.len() > 255 {
            return Err(ConfigError::CredentialTooLong("password"));
        }
        Ok(creds)
    }
    /// Return the username.
    pub fn username(&self) -> &[u8] {
        &self.username[..]
    }
    /// Return the password.
    pub fn password(&self) -> &[u8] {
        &self.password[..]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Drop for Credentials {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

/// An authentication method that we're willing to use with the proxy,
/// along with whatever parameters it needs.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthMethod {
    /// No authentication.
    Anonymous,
    /// RFC 1929 username/password authentication.
    UsernamePassword(Credentials),
}

impl AuthMethod {
    /// Return the wire code for this method.
    pub fn code(&self) -> AuthMethodCode {
        match self {
            AuthMethod::Anonymous => AuthMethodCode::NO_AUTHENTICATION,
            AuthMethod::UsernamePassword(_) => AuthMethodCode::USERNAME_PASSWORD,
        }
    }
}

/// The ordered, non-empty set of authentication methods that we
/// propose to the proxy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
    /// Methods in the order we propose them.  Never empty, never
    /// contains two methods with the same code.
    methods: Vec<AuthMethod>,
}

impl AuthConfig {
    /// Build an AuthConfig from a list of methods, in order of preference.
    pub fn new(methods: Vec<AuthMethod>) -> std::result::Result<Self, ConfigError> {
        if methods.is_empty() {
            return Err(ConfigError::NoAuthMethods);
        }
        for (idx, m) in methods.iter().enumerate() {
            if methods[..idx].iter().any(|other| other.code() == m.code()) {
                return Err(ConfigError::DuplicateAuthMethod(m.code()));
            }
        }
        Ok(AuthConfig { methods })
    }
    /// Return an AuthConfig that only proposes anonymous access.
    pub fn anonymous() -> Self {
        AuthConfig {
            methods: vec![AuthMethod::Anonymous],
        }
    }
    /// Return the methods in this configuration.
    pub fn methods(&self) -> &[AuthMethod] {
        &self.methods[..]
    }
    /// Return the wire codes of the methods in this configuration.
    pub fn codes(&self) -> Vec<AuthMethodCode> {
        self.methods.iter().map(AuthMethod::code).collect()
    }
    /// Find the method that we proposed with the code `code`, if any.
    fn lookup(&self, code: AuthMethodCode) -> Option<&AuthMethod> {
        self.methods.iter().find(|m| m.code() == code)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// What the handshake should do once authentication has been dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AuthOutcome {
    /// Nothing more to authenticate: send the connect request.
    ConnectNow,
    /// We sent a login request, and must wait for the proxy's verdict.
    AwaitLogin,
}

/// Dispatches on the authentication method that the proxy selected.
pub(crate) struct AuthNegotiator<'a> {
    /// The methods that we proposed.
    config: &'a AuthConfig,
}

impl<'a> AuthNegotiator<'a> {
    /// Make a new negotiator for the methods in `config`.
    pub(crate) fn new(config: &'a AuthConfig) -> Self {
        AuthNegotiator { config }
    }

    /// Run the authentication step for `selected`, writing any
    /// credentials through `sender`.
    ///
    /// Fails with [`Error::MethodsNotAccepted`] if we never proposed
    /// `selected`: a proxy must not be able to push us onto a method we
    /// didn't offer.
    pub(crate) fn dispatch<W: Writer + ?Sized>(
        &self,
        selected: AuthMethodCode,
        sender: &mut RequestSender<'_, W>,
    ) -> Result<AuthOutcome> {
        let method = self
            .config
            .lookup(selected)
            .ok_or_else(|| Error::MethodsNotAccepted {
                proposed: self.config.codes(),
                selected,
            })?;
        match method {
            AuthMethod::Anonymous => Ok(AuthOutcome::ConnectNow),
            AuthMethod::UsernamePassword(creds) => {
                sender.send_login(creds.username(), creds.password());
                Ok(AuthOutcome::AwaitLogin)
            }
        }
    }
}
