//! flicker-services — the moving parts of the optical channel: the animated
//! transmitter on the sending side, and capture, collection and consumption
//! on the receiving side.

pub mod capture;
pub mod collector;
pub mod consumer;
pub mod render;
pub mod sink;
pub mod transmitter;

pub use capture::{CaptureError, CaptureSource, ChannelCapture, LineCapture};
pub use collector::{ChunkCollector, Progress};
pub use consumer::{FrameConsumer, PayloadValidator, ScanOutcome, ScanProgress};
pub use render::{FrameDisplay, FrameRenderer, QrTextRenderer, RenderError};
pub use sink::{receive_payment, JsonSink, PaymentSink};
pub use transmitter::{AnimatedTransmitter, TransmitError, TransmitSettings};
