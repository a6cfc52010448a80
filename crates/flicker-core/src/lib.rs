//! flicker-core — payload codec, frame format, and configuration.
//! All other Flicker crates depend on this one.

pub mod beef;
pub mod config;
pub mod frame;
pub mod payment;
pub mod wire;

pub use beef::TxContainer;
pub use frame::{chunk, chunk_with, parse_frame, ChunkSet, Frame};
pub use payment::{IdentityKey, OutputRemittance, PaymentEnvelope};
pub use wire::FormatError;
