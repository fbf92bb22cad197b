//! Structures that represent SOCKS5 messages and their fields.

use crate::codec::{CodecError, CodecResult, Readable, Reader, Writeable, Writer};
use crate::err::ConfigError;

use caret::caret_int;
use std::convert::TryFrom;
use std::fmt;
use std::net::IpAddr;

/// Version byte at the start of every SOCKS5 message.
pub(crate) const SOCKS5_VERSION: u8 = 0x05;
/// Version byte for RFC 1929 username/password subnegotiation.
pub(crate) const LOGIN_VERSION: u8 = 0x01;
/// Value we send in reserved fields.
pub(crate) const RESERVED: u8 = 0x00;

caret_int! {
    /// Authentication method code, as sent in method proposals and
    /// selections.
    pub struct AuthMethodCode(u8) {
        /// RFC 1928: "NO AUTHENTICATION REQUIRED"
        NO_AUTHENTICATION = 0x00,
        /// RFC 1928: "GSSAPI".  Recognized, never proposed.
        GSSAPI = 0x01,
        /// RFC 1929 username/password.
        USERNAME_PASSWORD = 0x02,
        /// RFC 1928: "NO ACCEPTABLE METHODS"
        NO_ACCEPTABLE_METHODS = 0xFF,
    }
}

caret_int! {
    /// Command that we ask the proxy to perform.
    pub struct SocksCmd(u8) {
        /// Connect to a remote TCP address:port.
        CONNECT = 1,
        /// Not supported by this client.
        BIND = 2,
        /// Not supported by this client.
        UDP_ASSOCIATE = 3,
    }
}

caret_int! {
    /// Possible reply status values from a SOCKS5 connect response.
    pub struct SocksStatus(u8) {
        /// RFC 1928: "succeeded"
        SUCCEEDED = 0x00,
        /// RFC 1928: "general SOCKS server failure"
        GENERAL_FAILURE = 0x01,
        /// RFC 1928: "connection not allowable by ruleset"
        NOT_ALLOWED = 0x02,
        /// RFC 1928: "Network unreachable"
        NETWORK_UNREACHABLE = 0x03,
        /// RFC 1928: "Host unreachable"
        HOST_UNREACHABLE = 0x04,
        /// RFC 1928: "Connection refused"
        CONNECTION_REFUSED = 0x05,
        /// RFC 1928: "TTL expired"
        TTL_EXPIRED = 0x06,
        /// RFC 1928: "Command not supported"
        COMMAND_NOT_SUPPORTED = 0x07,
        /// RFC 1928: "Address type not supported"
        ADDRTYPE_NOT_SUPPORTED = 0x08,
    }
}

impl SocksStatus {
    /// Return a human-readable explanation of this status.
    pub fn reason(self) -> &'static str {
        match self {
            SocksStatus::SUCCEEDED => "succeeded",
            SocksStatus::GENERAL_FAILURE => "general SOCKS server failure",
            SocksStatus::NOT_ALLOWED => "connection not allowed by ruleset",
            SocksStatus::NETWORK_UNREACHABLE => "network unreachable",
            SocksStatus::HOST_UNREACHABLE => "host unreachable",
            SocksStatus::CONNECTION_REFUSED => "connection refused",
            SocksStatus::TTL_EXPIRED => "TTL expired",
            SocksStatus::COMMAND_NOT_SUPPORTED => "command not supported",
            SocksStatus::ADDRTYPE_NOT_SUPPORTED => "address type not supported",
            _ => "unassigned reply code",
        }
    }
}

/// A hostname for use with SOCKS.  It is limited in length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocksHostname(String);

impl TryFrom<String> for SocksHostname {
    type Error = ConfigError;
    fn try_from(s: String) -> Result<SocksHostname, ConfigError> {
        if s.is_empty() || s.len() > 255 {
            Err(ConfigError::BadHostname)
        } else {
            Ok(SocksHostname(s))
        }
    }
}

impl AsRef<str> for SocksHostname {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// An address sent or received as part of a SOCKS5 handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum SocksAddr {
    /// A regular DNS hostname, to be resolved by the proxy.
    Hostname(SocksHostname),
    /// A literal IP address.
    Ip(IpAddr),
}

impl SocksAddr {
    /// Build a SocksAddr from a host string, treating literal IPv4 and
    /// IPv6 addresses as such and anything else as a hostname.
    pub fn parse_host(host: &str) -> Result<Self, ConfigError> {
        // Accept the bracketed form of IPv6 addresses too.
        let bare = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        match bare.parse::<IpAddr>() {
            Ok(ip) => Ok(SocksAddr::Ip(ip)),
            Err(_) => Ok(SocksAddr::Hostname(SocksHostname::try_from(
                host.to_string(),
            )?)),
        }
    }
}

impl fmt::Display for SocksAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksAddr::Ip(a) => write!(f, "{}", a),
            SocksAddr::Hostname(h) => write!(f, "{}", h.0),
        }
    }
}

/// Address-type tags for the ATYP field.
mod atyp {
    /// IPv4 address, 4 bytes.
    pub(super) const IPV4: u8 = 0x01;
    /// Length-prefixed domain name.
    pub(super) const DOMAINNAME: u8 = 0x03;
    /// IPv6 address, 16 bytes.
    pub(super) const IPV6: u8 = 0x04;
}

impl Readable for SocksAddr {
    fn take_from(r: &mut Reader<'_>) -> CodecResult<SocksAddr> {
        match r.take_u8()? {
            atyp::IPV4 => {
                let ip4: std::net::Ipv4Addr = r.extract()?;
                Ok(SocksAddr::Ip(ip4.into()))
            }
            atyp::DOMAINNAME => {
                let hostname = r.take_u8_len_prefixed()?;
                let hostname = std::str::from_utf8(hostname)
                    .map_err(|_| CodecError::BadMessage("bad utf8 on hostname"))?
                    .to_string();
                // Zero-length names can only come from a broken proxy.
                let hostname = SocksHostname::try_from(hostname)
                    .map_err(|_| CodecError::BadMessage("empty hostname"))?;
                Ok(SocksAddr::Hostname(hostname))
            }
            atyp::IPV6 => {
                let ip6: std::net::Ipv6Addr = r.extract()?;
                Ok(SocksAddr::Ip(ip6.into()))
            }
            _ => Err(CodecError::BadMessage("unrecognized address type")),
        }
    }
}

impl Writeable for SocksAddr {
    fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) {
        match self {
            SocksAddr::Ip(IpAddr::V4(ip)) => {
                w.write_u8(atyp::IPV4);
                w.write(ip);
            }
            SocksAddr::Ip(IpAddr::V6(ip)) => {
                w.write_u8(atyp::IPV6);
                w.write(ip);
            }
            SocksAddr::Hostname(h) => {
                w.write_u8(atyp::DOMAINNAME);
                w.write_u8_len_prefixed(h.0.as_bytes());
            }
        }
    }
}

/// The host and port that we want the proxy to connect to for us.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectTarget {
    /// The target address.
    addr: SocksAddr,
    /// The target port.
    port: u16,
}

impl ConnectTarget {
    /// Make a new ConnectTarget for `host`:`port`.
    ///
    /// Returns an error if `host` is neither an IP address nor a valid
    /// SOCKS hostname.
    pub fn new(host: &str, port: u16) -> Result<Self, ConfigError> {
        Ok(ConnectTarget {
            addr: SocksAddr::parse_host(host)?,
            port,
        })
    }
    /// Return the target address.
    pub fn addr(&self) -> &SocksAddr {
        &self.addr
    }
    /// Return the target port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl From<std::net::SocketAddr> for ConnectTarget {
    fn from(sa: std::net::SocketAddr) -> Self {
        ConnectTarget {
            addr: SocksAddr::Ip(sa.ip()),
            port: sa.port(),
        }
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.addr {
            SocksAddr::Ip(IpAddr::V6(a)) => write!(f, "[{}]:{}", a, self.port),
            a => write!(f, "{}:{}", a, self.port),
        }
    }
}

/// A successful reply from the proxy to our connect request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyReply {
    /// The status that the proxy sent.
    status: SocksStatus,
    /// The address that the proxy bound for the outgoing connection.
    addr: SocksAddr,
    /// The port that the proxy bound for the outgoing connection.
    port: u16,
}

impl ProxyReply {
    /// Construct a new ProxyReply.
    pub(crate) fn new(status: SocksStatus, addr: SocksAddr, port: u16) -> Self {
        ProxyReply { status, addr, port }
    }
    /// Return the status from the proxy.
    pub fn status(&self) -> SocksStatus {
        self.status
    }
    /// Return the bound address.
    pub fn addr(&self) -> &SocksAddr {
        &self.addr
    }
    /// Return the bound port.
    pub fn port(&self) -> u16 {
        self.port
    }
}
