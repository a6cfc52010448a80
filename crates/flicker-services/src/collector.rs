//! Chunk collector — reassembles chunked frames into the original payload.
//!
//! Frames arrive in any order and repeat indefinitely while the sender cycles.
//! Storing a slice is idempotent per index; a session completes the first time
//! every index in `0..total` is present, and is forgotten at that point.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use flicker_core::config::CollectorConfig;
use flicker_core::frame::{payload_digest, Frame};

/// Distinct frames collected so far for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub collected: usize,
    pub total: usize,
}

struct Session {
    total: usize,
    slices: HashMap<usize, String>,
    started_at: Instant,
}

impl Session {
    fn new(total: usize) -> Self {
        Self {
            total,
            slices: HashMap::new(),
            started_at: Instant::now(),
        }
    }

    fn is_complete(&self) -> bool {
        self.slices.len() == self.total
    }

    /// Concatenate slices in index order. Only valid once complete.
    fn assemble(mut self) -> String {
        (0..self.total)
            .filter_map(|i| self.slices.remove(&i))
            .collect()
    }
}

/// In-progress reassembly state, keyed by session id.
///
/// Unbounded unless limits are set; see `with_limits`.
#[derive(Default)]
pub struct ChunkCollector {
    sessions: HashMap<String, Session>,
    max_sessions: Option<usize>,
    session_ttl: Option<Duration>,
}

impl ChunkCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the number of concurrent incomplete sessions (oldest evicted
    /// first) and/or their age.
    pub fn with_limits(max_sessions: Option<usize>, session_ttl: Option<Duration>) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
            session_ttl,
        }
    }

    pub fn from_config(config: &CollectorConfig) -> Self {
        Self::with_limits(config.max_sessions(), config.session_ttl())
    }

    /// Store one frame. Returns the reassembled payload when this frame
    /// completes its session.
    pub fn add_frame(&mut self, frame: Frame) -> Option<String> {
        self.cleanup_stale();

        let Frame {
            session_id,
            index,
            total,
            slice,
        } = frame;

        if total == 0 || index >= total {
            tracing::debug!(session = %session_id, index, total, "frame out of range, dropped");
            return None;
        }

        if !self.sessions.contains_key(&session_id) {
            self.make_room();
            self.sessions.insert(session_id.clone(), Session::new(total));
            tracing::debug!(session = %session_id, total, "new chunk session");
        }

        let session = self.sessions.get_mut(&session_id)?;
        if session.total != total {
            tracing::debug!(
                session = %session_id,
                index,
                total,
                expected = session.total,
                "frame total disagrees with session, dropped"
            );
            return None;
        }

        session.slices.entry(index).or_insert(slice);
        if !session.is_complete() {
            return None;
        }

        let payload = self.sessions.remove(&session_id)?.assemble();
        tracing::info!(
            session = %session_id,
            total,
            chars = payload.chars().count(),
            digest = %payload_digest(&payload),
            "chunk session complete"
        );
        Some(payload)
    }

    pub fn progress(&self, session_id: &str) -> Option<Progress> {
        self.sessions.get(session_id).map(|s| Progress {
            collected: s.slices.len(),
            total: s.total,
        })
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    pub fn clear_session(&mut self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Number of incomplete sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    /// Remove sessions older than the configured TTL.
    fn cleanup_stale(&mut self) {
        let Some(ttl) = self.session_ttl else {
            return;
        };
        self.sessions.retain(|session_id, session| {
            let stale = session.started_at.elapsed() > ttl;
            if stale {
                tracing::warn!(
                    session = %session_id,
                    collected = session.slices.len(),
                    total = session.total,
                    "removing stale chunk session (timed out)"
                );
            }
            !stale
        });
    }

    /// Evict oldest sessions until one more fits under `max_sessions`.
    fn make_room(&mut self) {
        let Some(max) = self.max_sessions else {
            return;
        };
        while self.sessions.len() >= max.max(1) {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|(_, s)| s.started_at)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    self.sessions.remove(&id);
                    tracing::warn!(session = %id, "evicting oldest chunk session");
                }
                None => break,
            }
        }
    }
}
