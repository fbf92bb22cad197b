//! Encode the messages that a SOCKS5 client sends.

use crate::auth::AuthConfig;
use crate::codec::Writer;
use crate::msg::{ConnectTarget, SocksCmd, LOGIN_VERSION, RESERVED, SOCKS5_VERSION};

/// Stateless encoder for outgoing SOCKS5 client messages.
///
/// Each method appends one complete message onto the underlying
/// [`Writer`]; the caller is responsible for getting those bytes onto
/// the transport.
pub struct RequestSender<'a, W: Writer + ?Sized> {
    /// Where encoded messages go.
    w: &'a mut W,
}

impl<'a, W: Writer + ?Sized> RequestSender<'a, W> {
    /// Make a new RequestSender that writes onto `w`.
    pub fn new(w: &'a mut W) -> Self {
        RequestSender { w }
    }

    /// Propose the authentication methods in `methods`, in order.
    pub fn propose_auth_methods(&mut self, methods: &AuthConfig) {
        let codes = methods.codes();
        // AuthConfig can't hold two methods with the same code, so this
        // always fits.
        debug_assert!(codes.len() <= u8::MAX as usize);
        self.w.write_u8(SOCKS5_VERSION);
        self.w.write_u8(codes.len() as u8);
        for code in codes {
            self.w.write_u8(code.into());
        }
    }

    /// Send an RFC 1929 username/password login request.
    ///
    /// Both fields must already be known to fit in 255 bytes.
    pub fn send_login(&mut self, username: &[u8], password: &[u8]) {
        self.w.write_u8(LOGIN_VERSION);
        self.w.write_u8_len_prefixed(username);
        self.w.write_u8_len_prefixed(password);
    }

    /// Ask the proxy to CONNECT to `target`.
    pub fn send_connect_request(&mut self, target: &ConnectTarget) {
        self.w.write_u8(SOCKS5_VERSION);
        self.w.write_u8(SocksCmd::CONNECT.into());
        self.w.write_u8(RESERVED);
        self.w.write(target.addr());
        self.w.write_u16(target.port());
    }
}
