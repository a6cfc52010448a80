//! Frame consumer — scans until a full payload has been received.
//!
//! Each decoded text is either a tagged frame, fed to the collector, or an
//! untagged payload that arrived whole. Anything else in front of the camera
//! (other codes, blank reads, tagged text that does not parse) is ignored and
//! scanning continues.

use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use flicker_core::config::{CollectorConfig, FlickerConfig, ScannerConfig};
use flicker_core::frame::{has_frame_tag, parse_frame, payload_digest};

use crate::capture::{CaptureError, CaptureSession, CaptureSource};
use crate::collector::ChunkCollector;

/// Last progress seen for a chunked transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanProgress {
    pub session_id: Option<String>,
    pub collected: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed(String),
    Cancelled,
}

/// Accepts or rejects a candidate payload before the scan stops on it.
pub type PayloadValidator = Box<dyn Fn(&str) -> bool + Send + Sync>;

pub struct FrameConsumer<S: CaptureSource> {
    source: S,
    limits: CollectorConfig,
    validator: Option<PayloadValidator>,
    progress: watch::Sender<ScanProgress>,
    min_spacing: Option<Duration>,
}

/// Per-scan reassembly state. Built when a scan starts and dropped with it,
/// so frames never carry over from one scan to the next.
struct Assembler<'a> {
    collector: ChunkCollector,
    validator: Option<&'a PayloadValidator>,
    progress: &'a watch::Sender<ScanProgress>,
}

/// Lets at most one result through per `spacing`. Results arriving early are
/// dropped, not queued, so the capture channel keeps draining.
struct ScanPacer {
    spacing: Duration,
    next_at: Option<Instant>,
}

impl<S: CaptureSource> FrameConsumer<S> {
    /// `collector` sets the limits of the collector each scan starts with.
    pub fn new(source: S, collector: &CollectorConfig, scanner: &ScannerConfig) -> Self {
        let (progress, _) = watch::channel(ScanProgress::default());
        Self {
            source,
            limits: collector.clone(),
            validator: None,
            progress,
            min_spacing: scanner.min_scan_spacing(),
        }
    }

    pub fn from_config(source: S, config: &FlickerConfig) -> Self {
        Self::new(source, &config.collector, &config.scanner)
    }

    /// Only stop on payloads for which `validator` returns true.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Progress of the current scan. Reset when a scan starts; keeps its last
    /// value after the scan returns.
    pub fn subscribe(&self) -> watch::Receiver<ScanProgress> {
        self.progress.subscribe()
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Scan until a payload completes or `shutdown` fires.
    ///
    /// The capture source is acquired on entry and released exactly once
    /// before returning, or when the returned future is dropped. Every scan
    /// collects frames from scratch.
    pub async fn scan(
        &mut self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<ScanOutcome, CaptureError> {
        self.progress.send_replace(ScanProgress::default());
        let mut session = CaptureSession::open(&mut self.source)?;
        let mut assembler = Assembler {
            collector: ChunkCollector::from_config(&self.limits),
            validator: self.validator.as_ref(),
            progress: &self.progress,
        };
        let mut pacer = self.min_spacing.map(ScanPacer::new);
        tracing::info!(
            rate_limited = pacer.is_some(),
            "scan started"
        );

        loop {
            let text = tokio::select! {
                _ = shutdown.recv() => return Ok(cancelled(&mut session)),
                next = session.next() => match next {
                    Some(text) => text,
                    None => {
                        session.close();
                        tracing::info!(
                            pending = assembler.collector.len(),
                            "capture stream ended without a payload"
                        );
                        return Err(CaptureError::Ended);
                    }
                },
            };

            if let Some(pacer) = pacer.as_mut() {
                if !pacer.allow() {
                    tracing::trace!("scan result skipped, over rate");
                    continue;
                }
            }

            if let Some(payload) = assembler.accept(&text) {
                session.close();
                tracing::info!(
                    chars = payload.chars().count(),
                    digest = %payload_digest(&payload),
                    "scan complete"
                );
                return Ok(ScanOutcome::Completed(payload));
            }
        }
    }
}

impl ScanPacer {
    fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_at: None,
        }
    }

    fn allow(&mut self) -> bool {
        let now = Instant::now();
        match self.next_at {
            Some(next_at) if now < next_at => false,
            _ => {
                self.next_at = Some(now + self.spacing);
                true
            }
        }
    }
}

fn cancelled<S: CaptureSource + ?Sized>(session: &mut CaptureSession<'_, S>) -> ScanOutcome {
    session.close();
    tracing::info!("scan cancelled");
    ScanOutcome::Cancelled
}

impl Assembler<'_> {
    /// Handle one decoded text. Returns the payload when scanning should stop.
    fn accept(&mut self, text: &str) -> Option<String> {
        if text.is_empty() {
            return None;
        }

        if let Some(frame) = parse_frame(text) {
            let session_id = frame.session_id.clone();
            let index = frame.index;
            return match self.collector.add_frame(frame) {
                Some(payload) => self.validated(payload),
                None => {
                    if let Some(p) = self.collector.progress(&session_id) {
                        tracing::debug!(
                            session = %session_id,
                            index,
                            collected = p.collected,
                            total = p.total,
                            "frame collected"
                        );
                        self.progress.send_replace(ScanProgress {
                            session_id: Some(session_id),
                            collected: p.collected,
                            total: p.total,
                        });
                    }
                    None
                }
            };
        }

        if has_frame_tag(text) {
            tracing::debug!(chars = text.len(), "malformed frame ignored");
            return None;
        }

        self.validated(text.to_string())
    }

    fn validated(&self, payload: String) -> Option<String> {
        match self.validator {
            Some(valid) if !valid(&payload) => {
                tracing::debug!(
                    chars = payload.chars().count(),
                    digest = %payload_digest(&payload),
                    "unrecognised payload ignored"
                );
                None
            }
            _ => Some(payload),
        }
    }
}
