//! Flicker integration test harness.
//!
//! Runs the sending and receiving halves in one process, joined by a
//! loopback "optical channel": the transmitter's display pushes each shown
//! frame straight into the consumer's capture source.
//!
//!   cargo test --test integration

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use flicker_services::{FrameDisplay, FrameRenderer, RenderError};

mod loopback;
mod reassembly;

// ── Harness ───────────────────────────────────────────────────────────────────

/// The bundled payment captured from a production sender.
pub const FIXTURE: &str = include_str!("../../crates/flicker-core/tests/fixtures/payment_v2.b64");

pub fn fixture() -> &'static str {
    FIXTURE.trim()
}

/// Renders a frame as its own text: a perfect encode/decode through the camera.
pub struct PassThrough;

impl FrameRenderer for PassThrough {
    type Output = String;

    fn render(&self, text: &str) -> Result<String, RenderError> {
        Ok(text.to_string())
    }
}

/// A screen the camera is pointed at. Every `miss_every`-th frame shown is
/// not captured (0 = capture all), nor is a frame at the blind index. A full
/// capture buffer also drops frames.
pub struct LoopbackScreen {
    camera: mpsc::Sender<String>,
    miss_every: usize,
    blind: Option<usize>,
    shown: Arc<AtomicUsize>,
}

impl LoopbackScreen {
    pub fn new(camera: mpsc::Sender<String>, miss_every: usize) -> Self {
        Self {
            camera,
            miss_every,
            blind: None,
            shown: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Never capture frame `index`, e.g. glare over part of the screen.
    pub fn blind_to(mut self, index: usize) -> Self {
        self.blind = Some(index);
        self
    }

    pub fn shown_counter(&self) -> Arc<AtomicUsize> {
        self.shown.clone()
    }
}

impl FrameDisplay<String> for LoopbackScreen {
    fn show(&self, rendered: String, index: usize, _total: usize) {
        let n = self.shown.fetch_add(1, Ordering::SeqCst) + 1;
        if self.miss_every > 0 && n % self.miss_every == 0 {
            return;
        }
        if self.blind == Some(index) {
            return;
        }
        let _ = self.camera.try_send(rendered);
    }
}

/// Fast transport settings so cycling tests finish quickly.
pub fn fast_settings() -> flicker_services::TransmitSettings {
    flicker_services::TransmitSettings {
        cycle_interval: Duration::from_millis(5),
        ..Default::default()
    }
}

pub fn unpaced() -> flicker_core::config::ScannerConfig {
    flicker_core::config::ScannerConfig {
        max_scans_per_second: 0,
        ..Default::default()
    }
}
