//! Capture sources — where decoded visual-code text comes from.
//!
//! A source is acquired with `start`, which hands back a stream of decoded
//! texts, and given back with `release`. The consumer owns the source for the
//! duration of one scan and guarantees `release` runs exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The device could not be acquired. Recoverable; callers fall back to
    /// manual entry.
    #[error("capture source unavailable: {0}")]
    Unavailable(String),

    #[error("capture stream ended before a payload was complete")]
    Ended,
}

pub trait CaptureSource: Send {
    /// Acquire the device and begin decoding.
    fn start(&mut self) -> Result<mpsc::Receiver<String>, CaptureError>;

    /// Give the device back. Called once per successful `start`.
    fn release(&mut self);
}

// ── Line capture ──────────────────────────────────────────────────────────────

/// Reads one decoded text per line, e.g. from a scanner tool piped to stdin.
pub struct LineCapture<R> {
    reader: Option<R>,
    capacity: usize,
    task: Option<JoinHandle<()>>,
}

impl<R> LineCapture<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(reader: R, capacity: usize) -> Self {
        Self {
            reader: Some(reader),
            capacity: capacity.max(1),
            task: None,
        }
    }
}

impl<R> CaptureSource for LineCapture<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    fn start(&mut self) -> Result<mpsc::Receiver<String>, CaptureError> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| CaptureError::Unavailable("line source already consumed".into()))?;
        let (tx, rx) = mpsc::channel(self.capacity);

        self.task = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim_end_matches('\r').to_string();
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!("line capture reached end of input");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "line capture read failed");
                        break;
                    }
                }
            }
        }));
        Ok(rx)
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        tracing::debug!("line capture released");
    }
}

// ── Channel capture ───────────────────────────────────────────────────────────

/// A source fed through an in-process channel. Used for loopback between a
/// transmitter and a consumer in one process.
pub struct ChannelCapture {
    results: Option<mpsc::Receiver<String>>,
    releases: Arc<AtomicUsize>,
}

impl ChannelCapture {
    /// Returns the source and the sender that feeds it.
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                results: Some(rx),
                releases: Arc::new(AtomicUsize::new(0)),
            },
            tx,
        )
    }

    /// Shared count of `release` calls.
    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        self.releases.clone()
    }
}

impl CaptureSource for ChannelCapture {
    fn start(&mut self) -> Result<mpsc::Receiver<String>, CaptureError> {
        self.results
            .take()
            .ok_or_else(|| CaptureError::Unavailable("channel source already consumed".into()))
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Capture session ───────────────────────────────────────────────────────────

/// One acquired capture. Closes the decode stream, then releases the source,
/// exactly once: on `close` or on drop.
pub(crate) struct CaptureSession<'a, S: CaptureSource + ?Sized> {
    source: &'a mut S,
    results: Option<mpsc::Receiver<String>>,
}

impl<'a, S: CaptureSource + ?Sized> CaptureSession<'a, S> {
    pub(crate) fn open(source: &'a mut S) -> Result<Self, CaptureError> {
        let results = source.start()?;
        Ok(Self {
            source,
            results: Some(results),
        })
    }

    /// Next decoded text, or `None` once the stream ends or the session is
    /// closed.
    pub(crate) async fn next(&mut self) -> Option<String> {
        match self.results.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    pub(crate) fn close(&mut self) {
        if let Some(results) = self.results.take() {
            drop(results);
            self.source.release();
        }
    }
}

impl<S: CaptureSource + ?Sized> Drop for CaptureSession<'_, S> {
    fn drop(&mut self) {
        self.close();
    }
}
