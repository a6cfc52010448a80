//! Envelope encode / decode commands.

use anyhow::{Context, Result};

use flicker_core::PaymentEnvelope;

pub fn cmd_encode(input: &str) -> Result<()> {
    let json = if input == "-" {
        super::read_arg(input)?
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input))?
    };
    let envelope: PaymentEnvelope =
        serde_json::from_str(&json).context("input is not a valid envelope")?;
    println!("{}", envelope.to_base64());
    Ok(())
}

pub fn cmd_decode(input: &str) -> Result<()> {
    let payload = super::read_arg(input)?;
    let envelope = PaymentEnvelope::from_base64(&payload).context("failed to decode payload")?;
    tracing::debug!(
        outputs = envelope.outputs.len(),
        container_bytes = envelope.tx.len(),
        "payload decoded"
    );
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}
