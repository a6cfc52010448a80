//! Payment envelope — the payload carried over the optical channel.
//!
//! Wire layout (base64 for text transport):
//!
//! ```text
//! [tx container][varint n]{[varint outputIndex][33 key][varint len][prefix][varint len][suffix]}*
//! ```
//!
//! Field order, the fixed 33-byte identity key and the CompactSize length
//! scheme are shared with every other implementation of this payload.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use static_assertions::assert_eq_size;

use crate::beef::TxContainer;
use crate::wire::{FormatError, Reader, Writer, IDENTITY_KEY_LEN};

/// Protocol label the receiving wallet expects on every remitted output.
pub const WALLET_PAYMENT_PROTOCOL: &str = "wallet payment";

// ── Identity key ──────────────────────────────────────────────────────────────

/// Compressed public key of the paying identity.
///
/// Always exactly 33 bytes on the wire. The key is not checked for curve
/// validity; that belongs to the wallet.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityKey([u8; IDENTITY_KEY_LEN]);

// the key is written to the wire as its raw bytes, with no length prefix
assert_eq_size!(IdentityKey, [u8; 33]);

impl IdentityKey {
    pub fn from_bytes(bytes: [u8; IDENTITY_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for IdentityKey {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; IDENTITY_KEY_LEN];
        hex::decode_to_slice(s, &mut out)
            .map_err(|_| FormatError::InvalidIdentityKey(s.to_string()))?;
        Ok(Self(out))
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityKey({})", self.to_hex())
    }
}

impl Serialize for IdentityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for IdentityKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Remittance ────────────────────────────────────────────────────────────────

/// Derivation data the recipient needs to claim one output of the transaction.
///
/// `output_index` is taken as given; it is not checked against the number of
/// outputs in the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRemittance {
    pub output_index: u32,
    pub sender_identity_key: IdentityKey,
    pub derivation_prefix: Vec<u8>,
    pub derivation_suffix: Vec<u8>,
}

impl OutputRemittance {
    /// Build from the string forms wallets hand around: hex identity key and
    /// base64 derivation fields.
    pub fn from_strings(
        output_index: u32,
        sender_identity_key: &str,
        derivation_prefix: &str,
        derivation_suffix: &str,
    ) -> Result<Self, FormatError> {
        Ok(Self {
            output_index,
            sender_identity_key: sender_identity_key.parse()?,
            derivation_prefix: decode_derivation(derivation_prefix)?,
            derivation_suffix: decode_derivation(derivation_suffix)?,
        })
    }

    pub fn derivation_prefix_base64(&self) -> String {
        STANDARD.encode(&self.derivation_prefix)
    }

    pub fn derivation_suffix_base64(&self) -> String {
        STANDARD.encode(&self.derivation_suffix)
    }
}

fn decode_derivation(s: &str) -> Result<Vec<u8>, FormatError> {
    STANDARD
        .decode(s)
        .map_err(|e| FormatError::InvalidDerivation(e.to_string()))
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// A transaction plus remittance metadata for the outputs paying the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EnvelopeJson", into = "EnvelopeJson")]
pub struct PaymentEnvelope {
    pub tx: TxContainer,
    pub outputs: Vec<OutputRemittance>,
}

impl PaymentEnvelope {
    pub fn new(tx: TxContainer, outputs: Vec<OutputRemittance>) -> Self {
        Self { tx, outputs }
    }

    /// Encode to the binary wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(self.tx.len() + 1 + self.outputs.len() * 64);
        w.write_bytes(self.tx.as_bytes());
        w.write_varint(self.outputs.len() as u64);
        for output in &self.outputs {
            w.write_varint(u64::from(output.output_index));
            w.write_bytes(output.sender_identity_key.as_bytes());
            w.write_var_bytes(&output.derivation_prefix);
            w.write_var_bytes(&output.derivation_suffix);
        }
        w.into_bytes()
    }

    /// Encode to the base64 text carried by the visual codes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Decode the binary wire form.
    ///
    /// Bytes after the last output are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut r = Reader::new(bytes);
        let tx = TxContainer::read_from(&mut r)?;

        let count = r.read_varint_len()?;
        // every output needs at least 36 bytes; do not trust `count` for capacity
        let mut outputs = Vec::with_capacity(count.min(r.remaining() / 36));
        for _ in 0..count {
            let raw_index = r.read_varint()?;
            let output_index =
                u32::try_from(raw_index).map_err(|_| FormatError::VarIntOverflow(raw_index))?;
            let sender_identity_key = IdentityKey::from_bytes(r.read_array()?);
            let derivation_prefix = r.read_var_bytes()?.to_vec();
            let derivation_suffix = r.read_var_bytes()?.to_vec();
            outputs.push(OutputRemittance {
                output_index,
                sender_identity_key,
                derivation_prefix,
                derivation_suffix,
            });
        }

        Ok(Self { tx, outputs })
    }

    /// Decode the base64 text produced by `to_base64`.
    pub fn from_base64(text: &str) -> Result<Self, FormatError> {
        let bytes = STANDARD.decode(text)?;
        Self::from_bytes(&bytes)
    }
}

// ── JSON form ─────────────────────────────────────────────────────────────────
//
// Mirrors the wallet's internalize request so the decoded envelope can be
// handed over as-is.

#[derive(Serialize, Deserialize)]
struct EnvelopeJson {
    tx: String,
    outputs: Vec<OutputJson>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputJson {
    output_index: u32,
    #[serde(default = "default_protocol")]
    protocol: String,
    payment_remittance: RemittanceJson,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemittanceJson {
    sender_identity_key: IdentityKey,
    derivation_prefix: String,
    derivation_suffix: String,
}

fn default_protocol() -> String {
    WALLET_PAYMENT_PROTOCOL.to_string()
}

impl From<PaymentEnvelope> for EnvelopeJson {
    fn from(envelope: PaymentEnvelope) -> Self {
        Self {
            tx: hex::encode(envelope.tx.as_bytes()),
            outputs: envelope
                .outputs
                .iter()
                .map(|o| OutputJson {
                    output_index: o.output_index,
                    protocol: default_protocol(),
                    payment_remittance: RemittanceJson {
                        sender_identity_key: o.sender_identity_key,
                        derivation_prefix: o.derivation_prefix_base64(),
                        derivation_suffix: o.derivation_suffix_base64(),
                    },
                })
                .collect(),
        }
    }
}

impl TryFrom<EnvelopeJson> for PaymentEnvelope {
    type Error = FormatError;

    fn try_from(json: EnvelopeJson) -> Result<Self, Self::Error> {
        let raw =
            hex::decode(&json.tx).map_err(|e| FormatError::InvalidContainerHex(e.to_string()))?;
        let tx = TxContainer::from_bytes(raw)?;
        let outputs = json
            .outputs
            .into_iter()
            .map(|o| {
                Ok(OutputRemittance {
                    output_index: o.output_index,
                    sender_identity_key: o.payment_remittance.sender_identity_key,
                    derivation_prefix: decode_derivation(&o.payment_remittance.derivation_prefix)?,
                    derivation_suffix: decode_derivation(&o.payment_remittance.derivation_suffix)?,
                })
            })
            .collect::<Result<Vec<_>, FormatError>>()?;
        Ok(Self { tx, outputs })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
