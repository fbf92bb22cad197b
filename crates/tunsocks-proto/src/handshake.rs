//! The client side of a SOCKS5 handshake, as a state machine.

use crate::auth::{AuthConfig, AuthNegotiator, AuthOutcome};
use crate::codec::Reader;
use crate::msg::{
    AuthMethodCode, ConnectTarget, ProxyReply, SocksAddr, SocksStatus, LOGIN_VERSION,
    SOCKS5_VERSION,
};
use crate::sender::RequestSender;
use crate::{Error, Result};

/// The state of a [`Socks5ClientHandshake`].
///
/// Each completed message from the proxy advances the state.  States
/// are never revisited; any state can move to `Failed`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum HandshakeState {
    /// We have sent nothing yet.
    Initial,
    /// We have proposed our authentication methods, and are waiting to
    /// hear which one the proxy picked.
    AwaitingAuthSelection,
    /// We have sent a username and password, and are waiting to hear
    /// whether they were accepted.
    AwaitingLoginResult,
    /// We have sent our connect request, and are waiting for the reply.
    AwaitingConnectResult,
    /// The proxy has connected us to the target.  Everything the proxy
    /// sends from now on belongs to the tunneled protocol.
    Established,
    /// The handshake failed, and can make no further progress.
    Failed(Error),
}

impl HandshakeState {
    /// Return true if no more transitions can happen from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakeState::Established | HandshakeState::Failed(_))
    }
}

/// An action to take in response to a message from the proxy.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct Action {
    /// If nonzero, this many bytes should be drained from the
    /// proxy's input.
    pub drain: usize,
    /// If nonempty, these bytes should be sent to the proxy.
    pub reply: Vec<u8>,
    /// If true, then the tunnel is established and the handshake is over.
    ///
    /// Any input past `drain` belongs to the tunneled protocol, and must
    /// not be given to this handshake.
    pub finished: bool,
}

/// The client side of an ongoing SOCKS5 handshake.
///
/// Call [`Socks5ClientHandshake::start`] once to get the first message,
/// then call [`Socks5ClientHandshake::handshake`] with whatever the proxy
/// has sent, until the resulting [`Action`] has `finished` set (or an
/// error other than [`Error::Truncated`] comes back).
#[derive(Clone, Debug)]
pub struct Socks5ClientHandshake {
    /// Where we want the proxy to connect us.
    target: ConnectTarget,
    /// The authentication methods we propose.
    auth: AuthConfig,
    /// Our current state in negotiating with the proxy.
    state: HandshakeState,
    /// The proxy's reply to our connect request, once we have it.
    reply: Option<ProxyReply>,
}

impl Socks5ClientHandshake {
    /// Construct a new handshake that will ask a proxy to connect to
    /// `target`, proposing the methods in `auth`.
    pub fn new(target: ConnectTarget, auth: AuthConfig) -> Self {
        Socks5ClientHandshake {
            target,
            auth,
            state: HandshakeState::Initial,
            reply: None,
        }
    }

    /// Return the current state of this handshake.
    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// Return true if the tunnel has been established.
    pub fn finished(&self) -> bool {
        self.state == HandshakeState::Established
    }

    /// Return the target that we're asking the proxy to connect to.
    pub fn target(&self) -> &ConnectTarget {
        &self.target
    }

    /// Begin the handshake: return the message proposing our
    /// authentication methods.
    pub fn start(&mut self) -> Result<Action> {
        if self.state != HandshakeState::Initial {
            return Err(Error::AlreadyFinished);
        }
        let mut reply = Vec::new();
        RequestSender::new(&mut reply).propose_auth_methods(&self.auth);
        self.state = HandshakeState::AwaitingAuthSelection;
        Ok(Action {
            drain: 0,
            reply,
            finished: false,
        })
    }

    /// Try to advance the handshake, given some proxy input in `input`.
    ///
    /// If there isn't enough input, gives [`Error::Truncated`] and leaves
    /// the state unchanged.  Any other error moves the handshake to
    /// [`HandshakeState::Failed`].
    pub fn handshake(&mut self, input: &[u8]) -> Result<Action> {
        let result = match self.state {
            HandshakeState::Initial => Err(Error::Internal),
            HandshakeState::AwaitingAuthSelection => self.handle_auth_selection(input),
            HandshakeState::AwaitingLoginResult => self.handle_login_response(input),
            HandshakeState::AwaitingConnectResult => self.handle_connect_response(input),
            HandshakeState::Established | HandshakeState::Failed(_) => {
                return Err(Error::AlreadyFinished)
            }
        };
        match result {
            Err(Error::Truncated) => {}
            Err(ref e) => self.state = HandshakeState::Failed(e.clone()),
            Ok(_) => {}
        }
        result
    }

    /// Tell the handshake that the connection to the proxy has closed.
    ///
    /// Returns the error that the attempt should fail with.  If the
    /// handshake had already reached a terminal state, that state is
    /// kept.
    pub fn connection_closed(&mut self) -> Error {
        match &self.state {
            HandshakeState::Failed(e) => e.clone(),
            HandshakeState::Established => Error::AlreadyFinished,
            _ => {
                self.state = HandshakeState::Failed(Error::ConnectionClosedPrematurely);
                Error::ConnectionClosedPrematurely
            }
        }
    }

    /// Consume this handshake's state; if it finished successfully,
    /// return the proxy's reply.
    pub fn into_reply(self) -> Option<ProxyReply> {
        self.reply
    }

    /// Handle the proxy's choice of authentication method.
    fn handle_auth_selection(&mut self, input: &[u8]) -> Result<Action> {
        let mut r = Reader::from_slice(input);
        let version = r.take_u8()?;
        let selected: AuthMethodCode = r.take_u8()?.into();
        if version != SOCKS5_VERSION {
            return Err(Error::ProtocolViolation(
                "unexpected version in method selection",
            ));
        }

        let mut reply = Vec::new();
        let mut sender = RequestSender::new(&mut reply);
        match AuthNegotiator::new(&self.auth).dispatch(selected, &mut sender)? {
            AuthOutcome::ConnectNow => {
                sender.send_connect_request(&self.target);
                self.state = HandshakeState::AwaitingConnectResult;
            }
            AuthOutcome::AwaitLogin => {
                self.state = HandshakeState::AwaitingLoginResult;
            }
        }
        Ok(Action {
            drain: r.consumed(),
            reply,
            finished: false,
        })
    }

    /// Handle the proxy's verdict on our username and password.
    fn handle_login_response(&mut self, input: &[u8]) -> Result<Action> {
        let mut r = Reader::from_slice(input);
        let version = r.take_u8()?;
        let status = r.take_u8()?;
        if version != LOGIN_VERSION {
            return Err(Error::ProtocolViolation(
                "unexpected version in login response",
            ));
        }
        if status != 0 {
            return Err(Error::LoginAuthenticationFailed);
        }

        let mut reply = Vec::new();
        RequestSender::new(&mut reply).send_connect_request(&self.target);
        self.state = HandshakeState::AwaitingConnectResult;
        Ok(Action {
            drain: r.consumed(),
            reply,
            finished: false,
        })
    }

    /// Handle the proxy's reply to our connect request.
    fn handle_connect_response(&mut self, input: &[u8]) -> Result<Action> {
        let mut r = Reader::from_slice(input);
        let version = r.take_u8()?;
        if version != SOCKS5_VERSION {
            return Err(Error::ProtocolViolation(
                "unexpected version in connect response",
            ));
        }
        let status: SocksStatus = r.take_u8()?.into();
        let _reserved = r.take_u8()?;
        let addr: SocksAddr = r.extract()?;
        let port = r.take_u16()?;

        if status != SocksStatus::SUCCEEDED {
            return Err(Error::ConnectionError {
                status,
                reason: status.reason(),
            });
        }

        self.state = HandshakeState::Established;
        self.reply = Some(ProxyReply::new(status, addr, port));
        Ok(Action {
            drain: r.consumed(),
            reply: Vec::new(),
            finished: true,
        })
    }
}
