//! Terminal transmitter: draws each frame's QR code in place.

use std::io::Write;

use anyhow::{Context, Result};

use flicker_core::config::FlickerConfig;
use flicker_services::{AnimatedTransmitter, FrameDisplay, QrTextRenderer, TransmitSettings};

/// Clear screen, cursor home.
const CLEAR: &str = "\x1b[2J\x1b[H";

struct TerminalDisplay;

impl FrameDisplay<String> for TerminalDisplay {
    fn show(&self, rendered: String, index: usize, total: usize) {
        let mut out = std::io::stdout().lock();
        let footer = if total > 1 {
            format!("  frame {}/{}  (Ctrl-C to stop)", index + 1, total)
        } else {
            "  (Ctrl-C to stop)".to_string()
        };
        if let Err(e) = write!(out, "{CLEAR}{rendered}\n{footer}\n").and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "failed to draw frame");
        }
    }
}

pub async fn cmd_transmit(input: &str, config: &FlickerConfig) -> Result<()> {
    let payload = super::read_arg(input)?;
    let mut transmitter = AnimatedTransmitter::new(
        QrTextRenderer::from_config(&config.render),
        TerminalDisplay,
        TransmitSettings::from(&config.transport),
    );

    transmitter.start(&payload)?;
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    transmitter.stop();
    println!();
    Ok(())
}
