//! Byte-level helpers for encoding and decoding SOCKS5 messages.
//!
//! A [`Reader`] is a view of a byte slice that we decode from; a
//! [`Writer`] is anything we can append encoded bytes onto.  Neither of
//! them does any IO: the handshake only ever looks at bytes that have
//! already arrived.

use thiserror::Error;

/// Error type for decoding SOCKS5 messages from bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// The message is not (yet) complete.
    #[error("object truncated (or not fully present)")]
    Truncated,
    /// The message was complete, but some field in it was invalid.
    #[error("bad object: {0}")]
    BadMessage(&'static str),
}

/// Result type for decoding operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// An object that can be decoded from a [`Reader`].
pub trait Readable: Sized {
    /// Try to decode an instance of this type from `r`.
    fn take_from(r: &mut Reader<'_>) -> CodecResult<Self>;
}

/// An object that can be encoded onto a [`Writer`].
pub trait Writeable {
    /// Encode this object onto `w`.
    fn write_onto<W: Writer + ?Sized>(&self, w: &mut W);
}

/// A type for reading SOCKS5 messages from a slice of bytes.
///
/// Multi-byte values are always big-endian.  Methods never panic: if
/// there are not enough bytes, they return [`CodecError::Truncated`].
pub struct Reader<'a> {
    /// The underlying slice that we're reading from
    b: &'a [u8],
    /// The next position in the slice that we intend to read from.
    off: usize,
}

impl<'a> Reader<'a> {
    /// Construct a new Reader from a slice of bytes.
    pub fn from_slice(slice: &'a [u8]) -> Self {
        Reader { b: slice, off: 0 }
    }
    /// Return the number of bytes that have not yet been read.
    pub fn remaining(&self) -> usize {
        self.b.len() - self.off
    }
    /// Return the number of bytes that have already been read.
    pub fn consumed(&self) -> usize {
        self.off
    }
    /// Try to consume and return a slice of `n` bytes from this reader.
    pub fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CodecError::Truncated);
        }
        let b = &self.b[self.off..self.off + n];
        self.off += n;
        Ok(b)
    }
    /// Try to consume and return a u8 from this reader.
    pub fn take_u8(&mut self) -> CodecResult<u8> {
        let b = self.take(1)?;
        Ok(b[0])
    }
    /// Try to consume and return a big-endian u16 from this reader.
    pub fn take_u16(&mut self) -> CodecResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }
    /// Consume a one-byte length, then that many bytes.
    pub fn take_u8_len_prefixed(&mut self) -> CodecResult<&'a [u8]> {
        let off_orig = self.off;
        let len = self.take_u8()?;
        self.take(len as usize).map_err(|e| {
            self.off = off_orig;
            e
        })
    }
    /// Try to decode and remove a Readable from this reader.
    ///
    /// On failure, consumes nothing.
    pub fn extract<E: Readable>(&mut self) -> CodecResult<E> {
        let off_orig = self.off;
        let result = E::take_from(self);
        if result.is_err() {
            self.off = off_orig;
        }
        result
    }
}

/// A byte-oriented trait for building SOCKS5 messages in memory.
///
/// Unlike std::io::Write, this trait's methods can't fail.
pub trait Writer {
    /// Append a slice to the end of this writer.
    fn write_all(&mut self, b: &[u8]);

    /// Append a single u8 to this writer.
    fn write_u8(&mut self, x: u8) {
        self.write_all(&[x])
    }
    /// Append a single u16 to this writer, encoded in big-endian order.
    fn write_u16(&mut self, x: u16) {
        self.write_all(&x.to_be_bytes())
    }
    /// Append `b`, preceded by its length as a single byte.
    ///
    /// # Panics
    ///
    /// Panics if `b` is longer than 255 bytes.  Callers validate lengths
    /// when the configuration is built, long before anything is encoded.
    fn write_u8_len_prefixed(&mut self, b: &[u8]) {
        assert!(b.len() <= u8::MAX as usize);
        self.write_u8(b.len() as u8);
        self.write_all(b);
    }
    /// Encode a Writeable object onto this writer.
    fn write<E: Writeable + ?Sized>(&mut self, e: &E) {
        e.write_onto(self)
    }
}

impl Writer for Vec<u8> {
    fn write_all(&mut self, b: &[u8]) {
        self.extend_from_slice(b)
    }
}

impl Writer for bytes::BytesMut {
    fn write_all(&mut self, b: &[u8]) {
        self.extend_from_slice(b)
    }
}

impl Readable for std::net::Ipv4Addr {
    fn take_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        let b = r.take(4)?;
        Ok([b[0], b[1], b[2], b[3]].into())
    }
}

impl Readable for std::net::Ipv6Addr {
    fn take_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        let mut octets = [0_u8; 16];
        octets.copy_from_slice(r.take(16)?);
        Ok(octets.into())
    }
}

impl Writeable for std::net::Ipv4Addr {
    fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) {
        w.write_all(&self.octets()[..])
    }
}

impl Writeable for std::net::Ipv6Addr {
    fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) {
        w.write_all(&self.octets()[..])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn read_ints() {
        let msg = hex!("05 01BB 7f000001");
        let mut r = Reader::from_slice(&msg[..]);
        assert_eq!(r.take_u8(), Ok(5));
        assert_eq!(r.take_u16(), Ok(443));
        let ip: Ipv4Addr = r.extract().unwrap();
        assert_eq!(ip, Ipv4Addr::LOCALHOST);
        assert_eq!(r.consumed(), 7);
        assert_eq!(r.remaining(), 0);
        assert_eq!(r.take_u8(), Err(CodecError::Truncated));
    }

    #[test]
    fn truncated_extract_rewinds() {
        let msg = hex!("2001 0db8 0000");
        let mut r = Reader::from_slice(&msg[..]);
        let e: CodecResult<Ipv6Addr> = r.extract();
        assert_eq!(e, Err(CodecError::Truncated));
        assert_eq!(r.consumed(), 0);
    }

    #[test]
    fn len_prefixed() {
        let msg = hex!("03 616263 09 6465");
        let mut r = Reader::from_slice(&msg[..]);
        assert_eq!(r.take_u8_len_prefixed(), Ok(&b"abc"[..]));
        // Second field claims 9 bytes but only has 2: nothing is consumed.
        assert_eq!(r.take_u8_len_prefixed(), Err(CodecError::Truncated));
        assert_eq!(r.consumed(), 4);
    }

    #[test]
    fn write_things() {
        let mut v = Vec::new();
        v.write_u8(5);
        v.write_u16(0x1f90);
        v.write_u8_len_prefixed(b"hi");
        v.write(&Ipv6Addr::LOCALHOST);
        assert_eq!(
            &v[..],
            &hex!("05 1f90 02 6869 00000000000000000000000000000001")[..]
        );

        let mut b = bytes::BytesMut::new();
        b.write(&Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(&b[..], &hex!("c0000201")[..]);
    }
}
