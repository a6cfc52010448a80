//! Receive command: reassemble a payment from decoded QR text on stdin.
//!
//! Any scanner tool that prints one decoded code per line can be piped in.
//! When stdin is a terminal there is no scanner, so the command asks for the
//! full payload to be pasted instead.

use std::io::IsTerminal;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

use flicker_core::config::FlickerConfig;
use flicker_core::PaymentEnvelope;
use flicker_services::{
    receive_payment, CaptureError, CaptureSource, FrameConsumer, JsonSink, LineCapture,
    PaymentSink, ScanOutcome,
};

/// Scanner output piped into stdin.
struct StdinCapture {
    lines: LineCapture<tokio::io::Stdin>,
}

impl StdinCapture {
    fn new(capacity: usize) -> Self {
        Self {
            lines: LineCapture::new(tokio::io::stdin(), capacity),
        }
    }
}

impl CaptureSource for StdinCapture {
    fn start(&mut self) -> Result<mpsc::Receiver<String>, CaptureError> {
        if std::io::stdin().is_terminal() {
            return Err(CaptureError::Unavailable(
                "stdin is a terminal, no scanner attached".into(),
            ));
        }
        self.lines.start()
    }

    fn release(&mut self) {
        self.lines.release();
    }
}

pub async fn cmd_receive(raw: bool, config: &FlickerConfig) -> Result<()> {
    let (stop, _) = broadcast::channel(1);
    let ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = ctrl_c.send(());
        }
    });

    let mut consumer = FrameConsumer::from_config(StdinCapture::new(config.scanner.channel_capacity), config);
    if !raw {
        consumer = consumer.with_validator(|text| PaymentEnvelope::from_base64(text).is_ok());
    }

    let mut progress = consumer.subscribe();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let p = progress.borrow_and_update().clone();
            eprint!("\r  frames {}/{}", p.collected, p.total);
        }
    });

    let mut sink = JsonSink::new(std::io::stdout());
    let result = if raw {
        receive_raw(&mut consumer, stop.subscribe()).await
    } else {
        receive_payment(&mut consumer, &mut sink, stop.subscribe())
            .await
            .map(|_| ())
    };

    match result {
        Err(e) if is_unavailable(&e) => {
            tracing::info!(error = %e, "no scanner input, falling back to manual entry");
            manual_entry(raw, &mut sink).await
        }
        other => other,
    }
}

async fn receive_raw(
    consumer: &mut FrameConsumer<StdinCapture>,
    shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    match consumer.scan(shutdown).await? {
        ScanOutcome::Completed(payload) => println!("{}", payload),
        ScanOutcome::Cancelled => eprintln!("\ncancelled"),
    }
    Ok(())
}

fn is_unavailable(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<CaptureError>(),
        Some(CaptureError::Unavailable(_))
    )
}

async fn manual_entry<K: PaymentSink>(raw: bool, sink: &mut K) -> Result<()> {
    eprintln!("Paste the payment payload and press Enter:");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let payload = lines
        .next_line()
        .await
        .context("failed to read payload")?
        .context("no payload entered")?;
    let payload = payload.trim();

    if raw {
        println!("{}", payload);
        return Ok(());
    }
    let envelope = PaymentEnvelope::from_base64(payload).context("entered text is not a payment")?;
    sink.internalize(envelope)
}
