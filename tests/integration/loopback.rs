//! Transmitter → loopback screen → consumer → codec.

use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::time::timeout;

use flicker_core::config::CollectorConfig;
use flicker_core::PaymentEnvelope;
use flicker_services::{
    receive_payment, AnimatedTransmitter, ChannelCapture, FrameConsumer, PaymentSink,
    ScanOutcome,
};

use crate::*;

#[derive(Default)]
struct Wallet(Vec<PaymentEnvelope>);

impl PaymentSink for Wallet {
    fn internalize(&mut self, envelope: PaymentEnvelope) -> Result<()> {
        self.0.push(envelope);
        Ok(())
    }
}

/// The fixture payment crosses the loopback channel and decodes identically.
#[tokio::test]
async fn test_payment_over_loopback() -> Result<()> {
    let (source, camera) = ChannelCapture::new(8);
    let releases = source.release_counter();
    let mut consumer = FrameConsumer::new(source, &CollectorConfig::default(), &unpaced())
        .with_validator(|text| PaymentEnvelope::from_base64(text).is_ok());

    let mut transmitter =
        AnimatedTransmitter::new(PassThrough, LoopbackScreen::new(camera, 0), fast_settings());
    assert_eq!(transmitter.start(fixture())?, 19);

    let mut wallet = Wallet::default();
    let (_stop, stop_rx) = broadcast::channel(1);
    let received = timeout(
        Duration::from_secs(10),
        receive_payment(&mut consumer, &mut wallet, stop_rx),
    )
    .await??;
    transmitter.stop();

    assert!(received);
    assert_eq!(wallet.0.len(), 1);
    assert_eq!(wallet.0[0].to_base64(), fixture());
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    Ok(())
}

/// Missed captures are recovered on later laps.
#[tokio::test]
async fn test_lossy_camera_still_completes() -> Result<()> {
    let (source, camera) = ChannelCapture::new(8);
    let mut consumer = FrameConsumer::new(source, &CollectorConfig::default(), &unpaced());

    let screen = LoopbackScreen::new(camera, 3);
    let shown = screen.shown_counter();
    let mut transmitter = AnimatedTransmitter::new(PassThrough, screen, fast_settings());
    let frames = transmitter.start(fixture())?;

    let (_stop, stop_rx) = broadcast::channel(1);
    let outcome = timeout(Duration::from_secs(10), consumer.scan(stop_rx)).await??;
    transmitter.stop();

    assert_eq!(outcome, ScanOutcome::Completed(fixture().to_string()));
    assert!(shown.load(Ordering::SeqCst) > frames, "needed more than one lap");
    Ok(())
}

/// A short payload goes out as a single untagged code.
#[tokio::test]
async fn test_short_payload_unchunked() -> Result<()> {
    let (source, camera) = ChannelCapture::new(8);
    let mut consumer = FrameConsumer::new(source, &CollectorConfig::default(), &unpaced());
    let mut transmitter =
        AnimatedTransmitter::new(PassThrough, LoopbackScreen::new(camera, 0), fast_settings());
    assert_eq!(transmitter.start("hello over light")?, 1);

    let (_stop, stop_rx) = broadcast::channel(1);
    let outcome = timeout(Duration::from_secs(5), consumer.scan(stop_rx)).await??;
    transmitter.stop();

    assert_eq!(outcome, ScanOutcome::Completed("hello over light".into()));
    Ok(())
}

/// Stopping the receiver mid-transfer cancels cleanly and releases the camera.
#[tokio::test]
async fn test_cancel_mid_transfer() -> Result<()> {
    let (source, camera) = ChannelCapture::new(8);
    let releases = source.release_counter();
    let mut consumer = FrameConsumer::new(source, &CollectorConfig::default(), &unpaced());

    // the last frame never reaches the camera
    let mut transmitter = AnimatedTransmitter::new(
        PassThrough,
        LoopbackScreen::new(camera, 0).blind_to(3),
        flicker_services::TransmitSettings {
            cycle_interval: Duration::from_millis(5),
            frame_chars: 40,
            ..Default::default()
        },
    );
    let frames = transmitter.start(&"W".repeat(160))?;
    assert_eq!(frames, 4);

    let (stop, stop_rx) = broadcast::channel(1);
    let mut progress = consumer.subscribe();
    let scan = tokio::spawn(async move { consumer.scan(stop_rx).await });

    timeout(Duration::from_secs(5), progress.changed()).await??;
    tokio::time::sleep(Duration::from_millis(200)).await;
    stop.send(())?;

    let outcome = scan.await?;
    transmitter.stop();

    assert_eq!(outcome?, ScanOutcome::Cancelled);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    let last = progress.borrow().clone();
    assert!(last.session_id.is_some());
    assert_eq!((last.collected, last.total), (3, 4));
    Ok(())
}
