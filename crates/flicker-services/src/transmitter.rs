//! Animated transmitter — cycles a payload's frames on screen.
//!
//! The payload is chunked once per `start`. Frame 0 is rendered immediately;
//! every cycle interval the cursor advances (wrapping) and the next frame is
//! rendered on the blocking pool. Cycling is blind and perpetual: there is no
//! back channel, the receiver simply keeps scanning until it has every index.
//!
//! Only the most recently requested render may reach the display. Each render
//! carries the tick at which it was requested; if the tick has moved on by the
//! time it finishes (a later frame was requested) or the run was stopped, the
//! result is dropped. Rendering and displaying both happen on the blocking
//! pool, so a slow display never holds up the cycle loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};

use flicker_core::config::TransportConfig;
use flicker_core::frame::{chunk_with, payload_digest, FrameError};

use crate::render::{FrameDisplay, FrameRenderer};

/// How a payload is cut and paced.
#[derive(Debug, Clone)]
pub struct TransmitSettings {
    pub threshold_chars: usize,
    pub frame_chars: usize,
    pub cycle_interval: Duration,
}

impl Default for TransmitSettings {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

impl From<&TransportConfig> for TransmitSettings {
    fn from(config: &TransportConfig) -> Self {
        Self {
            threshold_chars: config.threshold_chars,
            frame_chars: config.frame_chars,
            cycle_interval: config.cycle_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransmitError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("cycle interval must be greater than zero")]
    ZeroInterval,
}

/// State shared between one run's cycle loop and its renders.
///
/// `latest` is the tick of the most recent render request; the loop bumps it
/// without locking. `stopped` is only locked by renders while they display
/// and by `stop`, so once `stop` has taken it nothing else reaches the screen.
#[derive(Default)]
struct RunState {
    latest: AtomicU64,
    stopped: Mutex<bool>,
}

impl RunState {
    fn advance(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, requested: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == requested
    }

    fn gate(&self) -> MutexGuard<'_, bool> {
        self.stopped.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct Run {
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
    state: Arc<RunState>,
    total: usize,
}

pub struct AnimatedTransmitter<R: FrameRenderer, D: FrameDisplay<R::Output>> {
    renderer: Arc<R>,
    display: Arc<D>,
    settings: TransmitSettings,
    run: Option<Run>,
}

impl<R: FrameRenderer, D: FrameDisplay<R::Output>> AnimatedTransmitter<R, D> {
    pub fn new(renderer: R, display: D, settings: TransmitSettings) -> Self {
        Self {
            renderer: Arc::new(renderer),
            display: Arc::new(display),
            settings,
            run: None,
        }
    }

    /// Begin showing `payload`. Any previous run is stopped first.
    ///
    /// Must be called from within a tokio runtime. Returns the number of
    /// frames being cycled.
    pub fn start(&mut self, payload: &str) -> Result<usize, TransmitError> {
        self.stop();

        if self.settings.cycle_interval.is_zero() {
            return Err(TransmitError::ZeroInterval);
        }
        let set = chunk_with(
            payload,
            self.settings.threshold_chars,
            self.settings.frame_chars,
        )?;
        let total = set.len();
        let texts = Arc::new(set.texts());

        tracing::info!(
            session = %set.session_id,
            total,
            chunked = set.is_chunked,
            chars = payload.chars().count(),
            digest = %payload_digest(payload),
            "transmitter starting"
        );

        let state = Arc::new(RunState::default());
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(cycle_loop(
            texts,
            self.renderer.clone(),
            self.display.clone(),
            state.clone(),
            self.settings.cycle_interval,
            shutdown_rx,
        ));

        self.run = Some(Run {
            shutdown,
            task,
            state,
            total,
        });
        Ok(total)
    }

    /// Stop cycling. No render result reaches the display after this returns.
    ///
    /// If a frame is being displayed at that moment, waits for that display
    /// call to finish.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            *run.state.gate() = true;
            let _ = run.shutdown.send(());
            run.task.abort();
            tracing::debug!(total = run.total, "transmitter stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Frames in the current run.
    pub fn frame_count(&self) -> Option<usize> {
        self.run.as_ref().map(|r| r.total)
    }
}

impl<R: FrameRenderer, D: FrameDisplay<R::Output>> Drop for AnimatedTransmitter<R, D> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Tick → advance cursor → render. Runs until shutdown; a single-frame
/// payload is rendered once and never rescheduled.
async fn cycle_loop<R, D>(
    texts: Arc<Vec<String>>,
    renderer: Arc<R>,
    display: Arc<D>,
    state: Arc<RunState>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) where
    R: FrameRenderer,
    D: FrameDisplay<R::Output>,
{
    let total = texts.len();
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut renders = JoinSet::new();
    let mut cursor = 0usize;
    let mut cycling = true;

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,

            _ = interval.tick(), if cycling => {
                let requested = state.advance();
                let (texts, renderer, display, state) =
                    (texts.clone(), renderer.clone(), display.clone(), state.clone());
                renders.spawn_blocking(move || {
                    render_frame(&texts, cursor, &*renderer, &*display, &state, requested)
                });
                cursor = (cursor + 1) % total;
                cycling = total > 1;
            }

            Some(joined) = renders.join_next(), if !renders.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::warn!(error = %e, "render job panicked");
                    }
                }
            }
        }
    }

    renders.abort_all();
}

/// Blocking: render, then display unless overtaken or stopped.
fn render_frame<R, D>(
    texts: &[String],
    index: usize,
    renderer: &R,
    display: &D,
    state: &RunState,
    requested: u64,
) where
    R: FrameRenderer,
    D: FrameDisplay<R::Output>,
{
    let total = texts.len();
    let output = match renderer.render(&texts[index]) {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(index, total, error = %e, "frame render failed, skipped");
            return;
        }
    };

    let stopped = state.gate();
    if *stopped || !state.is_current(requested) {
        tracing::trace!(index, total, "stale render dropped");
        return;
    }
    display.show(output, index, total);
    tracing::trace!(index, total, "frame shown");
}
