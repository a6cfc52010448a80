//! Flicker wire primitives — the byte-level building blocks of the payload.
//!
//! Every multi-byte integer is little-endian. Variable-length integers use
//! the Bitcoin CompactSize encoding, the same one the transaction container
//! uses. Changing anything here breaks every deployed receiver.

// ── Constants ─────────────────────────────────────────────────────────────────

/// Width of a compressed secp256k1 public key on the wire.
/// Fixed width: the identity key field is never length-prefixed.
pub const IDENTITY_KEY_LEN: usize = 33;

/// Width of a transaction id on the wire.
pub const TXID_LEN: usize = 32;

/// CompactSize markers.
const VARINT_U16: u8 = 0xfd;
const VARINT_U32: u8 = 0xfe;
const VARINT_U64: u8 = 0xff;

// ── Reader ────────────────────────────────────────────────────────────────────

/// Cursor over a decoded payload.
///
/// Every read checks the remaining length first, so a declared length that
/// overruns the buffer surfaces as `FormatError::Truncated` instead of a panic.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes between `start` and the current position.
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.buf[start..self.pos]
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        if len > self.remaining() {
            return Err(FormatError::Truncated {
                offset: self.pos,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), FormatError> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, FormatError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, FormatError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, FormatError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a CompactSize integer.
    pub fn read_varint(&mut self) -> Result<u64, FormatError> {
        match self.read_u8()? {
            VARINT_U16 => Ok(u64::from(self.read_u16_le()?)),
            VARINT_U32 => Ok(u64::from(self.read_u32_le()?)),
            VARINT_U64 => self.read_u64_le(),
            small => Ok(u64::from(small)),
        }
    }

    /// Read a CompactSize integer used as a count or a byte length.
    pub fn read_varint_len(&mut self) -> Result<usize, FormatError> {
        let value = self.read_varint()?;
        usize::try_from(value).map_err(|_| FormatError::VarIntOverflow(value))
    }

    /// Read a CompactSize length prefix followed by that many bytes.
    pub fn read_var_bytes(&mut self) -> Result<&'a [u8], FormatError> {
        let len = self.read_varint_len()?;
        self.read_bytes(len)
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Append-only payload builder, the mirror of `Reader`.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a CompactSize integer using the shortest form.
    pub fn write_varint(&mut self, value: u64) {
        if value < u64::from(VARINT_U16) {
            self.buf.push(value as u8);
        } else if value <= u64::from(u16::MAX) {
            self.buf.push(VARINT_U16);
            self.buf.extend_from_slice(&(value as u16).to_le_bytes());
        } else if value <= u64::from(u32::MAX) {
            self.buf.push(VARINT_U32);
            self.buf.extend_from_slice(&(value as u32).to_le_bytes());
        } else {
            self.buf.push(VARINT_U64);
            self.buf.extend_from_slice(&value.to_le_bytes());
        }
    }

    /// Write a CompactSize length prefix followed by the bytes.
    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.write_bytes(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when decoding a transported payload.
///
/// Any of these aborts the decode attempt; no partial envelope is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("payload is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("truncated payload at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("varint value {0} does not fit the target field")]
    VarIntOverflow(u64),

    #[error("unknown transaction container version: 0x{0:08x}")]
    UnknownContainerVersion(u32),

    #[error("unknown transaction data format in container: {0}")]
    UnknownTxFormat(u8),

    #[error("transaction container has {0} trailing bytes")]
    TrailingContainerBytes(usize),

    #[error("transaction container is not valid hex: {0}")]
    InvalidContainerHex(String),

    #[error("identity key must be {} bytes of hex, got {0:?}", IDENTITY_KEY_LEN)]
    InvalidIdentityKey(String),

    #[error("derivation field is not valid base64: {0}")]
    InvalidDerivation(String),
}

impl From<base64::DecodeError> for FormatError {
    fn from(e: base64::DecodeError) -> Self {
        FormatError::InvalidBase64(e.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: u64) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_varint(value);
        w.into_bytes()
    }

    #[test]
    fn varint_uses_shortest_form() {
        assert_eq!(encoded(0), vec![0x00]);
        assert_eq!(encoded(0xfc), vec![0xfc]);
        assert_eq!(encoded(0xfd), vec![0xfd, 0xfd, 0x00]);
        assert_eq!(encoded(0xffff), vec![0xfd, 0xff, 0xff]);
        assert_eq!(encoded(0x1_0000), vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(encoded(0x1_0000_0000).len(), 9);
        assert_eq!(encoded(0x1_0000_0000)[0], 0xff);
    }

    #[test]
    fn varint_boundaries_read_back() {
        for value in [0, 1, 0xfc, 0xfd, 0xfe, 0xffff, 0x1_0000, 0xffff_ffff, u64::MAX] {
            let bytes = encoded(value);
            let mut r = Reader::new(&bytes);
            assert_eq!(r.read_varint().unwrap(), value);
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn declared_length_past_end_is_truncated() {
        // length prefix says 10, only 3 bytes follow
        let bytes = [10u8, 1, 2, 3];
        let mut r = Reader::new(&bytes);
        let err = r.read_var_bytes().unwrap_err();
        assert_eq!(
            err,
            FormatError::Truncated {
                offset: 1,
                needed: 10,
                remaining: 3
            }
        );
    }

    #[test]
    fn truncated_varint_marker_is_an_error() {
        let bytes = [0xfe, 0x01];
        let mut r = Reader::new(&bytes);
        assert!(matches!(
            r.read_varint(),
            Err(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn consumed_since_tracks_cursor() {
        let bytes = [1u8, 2, 3, 4, 5];
        let mut r = Reader::new(&bytes);
        r.skip(1).unwrap();
        let start = r.position();
        r.skip(3).unwrap();
        assert_eq!(r.consumed_since(start), &[2, 3, 4]);
        assert_eq!(r.remaining(), 1);
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = FormatError::UnknownContainerVersion(0xdead_beef);
        assert!(err.to_string().contains("0xdeadbeef"));
    }
}
