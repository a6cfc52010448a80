//! Payment sinks — where a received envelope is handed over.

use std::io::Write;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use flicker_core::PaymentEnvelope;

use crate::capture::CaptureSource;
use crate::consumer::{FrameConsumer, ScanOutcome};

/// The wallet side: takes ownership of a received payment.
pub trait PaymentSink {
    fn internalize(&mut self, envelope: PaymentEnvelope) -> Result<()>;
}

/// Writes each envelope as pretty-printed JSON in the wallet's internalize
/// shape, followed by a newline.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PaymentSink for JsonSink<W> {
    fn internalize(&mut self, envelope: PaymentEnvelope) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.out, &envelope)
            .context("failed to serialize envelope")?;
        writeln!(self.out).context("failed to write envelope")?;
        self.out.flush().context("failed to flush envelope")?;
        Ok(())
    }
}

/// Scan for a payload, decode it, and hand it to `sink`.
///
/// Returns `false` if the scan was cancelled.
pub async fn receive_payment<S, K>(
    consumer: &mut FrameConsumer<S>,
    sink: &mut K,
    shutdown: broadcast::Receiver<()>,
) -> Result<bool>
where
    S: CaptureSource,
    K: PaymentSink + ?Sized,
{
    let payload = match consumer.scan(shutdown).await? {
        ScanOutcome::Completed(payload) => payload,
        ScanOutcome::Cancelled => return Ok(false),
    };

    let envelope = PaymentEnvelope::from_base64(&payload).context("received payload is not a payment")?;
    tracing::info!(
        outputs = envelope.outputs.len(),
        txid = envelope.tx.atomic_txid().as_deref().unwrap_or("-"),
        "payment received"
    );
    sink.internalize(envelope)?;
    Ok(true)
}
