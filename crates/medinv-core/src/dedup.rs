//! # Dedup Window
//!
//! Suppresses repeated reads of the same tag inside a time window.
//!
//! ## Acceptance Rule
//! ```text
//!   tag 42 read at t0        → accepted, last_seen[42] = t0
//!   tag 42 read at t0 + 1s   → suppressed (inside 2s window), unchanged
//!   tag 42 read at t0 + 3s   → accepted, last_seen[42] = t0 + 3s
//! ```
//!
//! A suppressed read does not refresh the timestamp, so a tag held
//! against the reader is accepted again once every window.
//!
//! The map is bounded: at `capacity`, entries older than `retention` are
//! pruned, and if that frees nothing the oldest entry is evicted.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::trace;

/// Dedup window tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupConfig {
    pub window: Duration,
    /// Entries older than this may be pruned.
    pub retention: Duration,
    pub capacity: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        let window = Duration::from_secs(2);
        DedupConfig {
            window,
            retention: window * 5,
            capacity: 1024,
        }
    }
}

/// Last-seen bookkeeping per tag id.
#[derive(Debug)]
pub struct DedupWindow {
    config: DedupConfig,
    last_seen: HashMap<i64, Instant>,
}

impl DedupWindow {
    pub fn new(config: DedupConfig) -> Self {
        DedupWindow {
            config,
            last_seen: HashMap::new(),
        }
    }

    /// Returns true if the read should be processed.
    ///
    /// `now` is supplied by the caller.
    pub fn should_accept(&mut self, tag_id: i64, now: Instant) -> bool {
        if let Some(&last) = self.last_seen.get(&tag_id) {
            if now.saturating_duration_since(last) < self.config.window {
                trace!(tag_id, "Duplicate tag read suppressed");
                return false;
            }
        } else if self.last_seen.len() >= self.config.capacity {
            self.make_room(now);
        }

        self.last_seen.insert(tag_id, now);
        true
    }

    /// Number of tracked tags.
    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    fn make_room(&mut self, now: Instant) {
        let retention = self.config.retention;
        self.last_seen
            .retain(|_, seen| now.saturating_duration_since(*seen) < retention);

        if self.last_seen.len() >= self.config.capacity {
            let oldest = self
                .last_seen
                .iter()
                .min_by_key(|(_, seen)| **seen)
                .map(|(id, _)| *id);
            if let Some(id) = oldest {
                trace!(tag_id = id, "Evicting oldest dedup entry");
                self.last_seen.remove(&id);
            }
        }
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}
