use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Per-actor count of submissions the gate rejected. Each actor's window
/// opens at its first failure and restarts once it has passed.
pub struct FailureTracker {
    window: Duration,
    /// actor -> (failed_count, window_start)
    entries: DashMap<String, (u32, Instant)>,
}

impl FailureTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: DashMap::new(),
        }
    }

    /// Number of failures recorded for the actor in the current window.
    pub fn count(&self, actor: &str) -> u32 {
        let now = Instant::now();

        let Some(entry) = self.entries.get(actor) else {
            return 0;
        };

        let (count, start) = entry.value();
        if now.duration_since(*start) > self.window {
            return 0;
        }
        *count
    }

    pub fn record_failure(&self, actor: &str) {
        let now = Instant::now();

        let mut entry = self.entries.entry(actor.to_string()).or_insert((0, now));
        let (count, start) = entry.value_mut();

        if now.duration_since(*start) > self.window {
            *count = 1;
            *start = now;
        } else {
            *count = count.saturating_add(1);
        }
    }

    /// Drop entries whose window has passed.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries
            .retain(|_, (_, start)| now.duration_since(*start) <= self.window);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
