//! Transaction container — the self-delimiting blob at the head of a payload.
//!
//! The container is BEEF (V1 `0100BEEF` or V2 `0200BEEF`), optionally wrapped
//! in the Atomic BEEF prefix. Flicker never interprets transactions; it walks
//! the structure only far enough to find where the container ends so the
//! remittance fields that follow can be read. The bytes are carried verbatim.

use bytes::Bytes;

use crate::wire::{FormatError, Reader, TXID_LEN};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Atomic BEEF marker word (`01010101`), followed by the subject txid.
pub const ATOMIC_BEEF: u32 = 0x0101_0101;

/// BEEF version words as read little-endian.
pub const BEEF_V1: u32 = 0xEFBE_0001;
pub const BEEF_V2: u32 = 0xEFBE_0002;

/// V2 per-transaction data formats.
const TX_FORMAT_RAW: u8 = 0;
const TX_FORMAT_RAW_WITH_BUMP: u8 = 1;
const TX_FORMAT_TXID_ONLY: u8 = 2;

/// BUMP leaf flag: the leaf duplicates its sibling and carries no hash.
const LEAF_FLAG_DUPLICATE: u8 = 0x01;

// ── Container ─────────────────────────────────────────────────────────────────

/// BEEF layout revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeefVersion {
    V1,
    V2,
}

/// An opaque, verbatim transaction container.
///
/// Construct with `TxContainer::from_bytes` (validates that the bytes are
/// exactly one container) or by reading from a payload with `read_from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxContainer {
    raw: Bytes,
    version: BeefVersion,
    atomic_txid: Option<[u8; TXID_LEN]>,
}

impl TxContainer {
    /// Wrap bytes that must hold exactly one container.
    pub fn from_bytes(raw: impl Into<Bytes>) -> Result<Self, FormatError> {
        let raw: Bytes = raw.into();
        let mut reader = Reader::new(&raw);
        let layout = walk(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(FormatError::TrailingContainerBytes(reader.remaining()));
        }
        Ok(Self {
            version: layout.version,
            atomic_txid: layout.atomic_txid,
            raw,
        })
    }

    /// Read one container from the head of `reader`, leaving the cursor
    /// exactly past its last byte.
    pub fn read_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        let start = reader.position();
        let layout = walk(reader)?;
        Ok(Self {
            raw: Bytes::copy_from_slice(reader.consumed_since(start)),
            version: layout.version,
            atomic_txid: layout.atomic_txid,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn version(&self) -> BeefVersion {
        self.version
    }

    pub fn is_atomic(&self) -> bool {
        self.atomic_txid.is_some()
    }

    /// Subject txid of an Atomic BEEF container, in display (reversed) hex.
    pub fn atomic_txid(&self) -> Option<String> {
        self.atomic_txid.map(|txid| {
            let mut display = txid;
            display.reverse();
            hex::encode(display)
        })
    }
}

// ── Structure walk ────────────────────────────────────────────────────────────

struct Layout {
    version: BeefVersion,
    atomic_txid: Option<[u8; TXID_LEN]>,
}

fn walk(r: &mut Reader<'_>) -> Result<Layout, FormatError> {
    let mut word = r.read_u32_le()?;
    let mut atomic_txid = None;
    if word == ATOMIC_BEEF {
        atomic_txid = Some(r.read_array::<TXID_LEN>()?);
        word = r.read_u32_le()?;
    }

    let version = match word {
        BEEF_V1 => BeefVersion::V1,
        BEEF_V2 => BeefVersion::V2,
        other => return Err(FormatError::UnknownContainerVersion(other)),
    };

    let bumps = r.read_varint()?;
    for _ in 0..bumps {
        skip_bump(r)?;
    }

    let txs = r.read_varint()?;
    for _ in 0..txs {
        match version {
            BeefVersion::V1 => {
                skip_raw_tx(r)?;
                if r.read_u8()? != 0 {
                    r.read_varint()?;
                }
            }
            BeefVersion::V2 => match r.read_u8()? {
                TX_FORMAT_RAW => skip_raw_tx(r)?,
                TX_FORMAT_RAW_WITH_BUMP => {
                    r.read_varint()?;
                    skip_raw_tx(r)?;
                }
                TX_FORMAT_TXID_ONLY => r.skip(TXID_LEN)?,
                other => return Err(FormatError::UnknownTxFormat(other)),
            },
        }
    }

    Ok(Layout {
        version,
        atomic_txid,
    })
}

/// Skip one BUMP (merkle path): block height, tree height, then per level a
/// list of leaves.
fn skip_bump(r: &mut Reader<'_>) -> Result<(), FormatError> {
    r.read_varint()?;
    let tree_height = r.read_u8()?;
    for _ in 0..tree_height {
        let leaves = r.read_varint()?;
        for _ in 0..leaves {
            r.read_varint()?;
            let flags = r.read_u8()?;
            if flags & LEAF_FLAG_DUPLICATE == 0 {
                r.skip(TXID_LEN)?;
            }
        }
    }
    Ok(())
}

/// Skip one serialized transaction.
fn skip_raw_tx(r: &mut Reader<'_>) -> Result<(), FormatError> {
    r.read_u32_le()?;
    let inputs = r.read_varint()?;
    for _ in 0..inputs {
        r.skip(TXID_LEN + 4)?;
        r.read_var_bytes()?;
        r.read_u32_le()?;
    }
    let outputs = r.read_varint()?;
    for _ in 0..outputs {
        r.read_u64_le()?;
        r.read_var_bytes()?;
    }
    r.read_u32_le()?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
