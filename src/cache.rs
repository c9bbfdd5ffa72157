use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Tag carried by every cached form page. Invalidated whenever the
/// protection settings are saved.
pub const PROTECTED_FORMS_TAG: &str = "protected-forms-config-changed";

#[derive(Debug, Clone)]
pub struct CachedPage {
    pub body: String,
    pub tags: Vec<String>,
    stored_at: Instant,
}

/// In-process page cache for anonymous form pages, keyed by request path.
pub struct PageCache {
    ttl: Duration,
    entries: DashMap<String, CachedPage>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.body.clone())
    }

    pub fn insert(&self, key: &str, body: String, tags: &[&str]) {
        self.entries.insert(
            key.to_string(),
            CachedPage {
                body,
                tags: tags.iter().map(|t| t.to_string()).collect(),
                stored_at: Instant::now(),
            },
        );
    }

    /// Insert only while `is_current` holds, checking again afterwards so a
    /// concurrent invalidation cannot be overtaken by a page rendered before
    /// it. Returns whether the page stayed cached.
    pub fn insert_if_current(
        &self,
        key: &str,
        body: String,
        tags: &[&str],
        is_current: impl Fn() -> bool,
    ) -> bool {
        if !is_current() {
            return false;
        }
        self.insert(key, body, tags);
        if !is_current() {
            self.entries.remove(key);
            return false;
        }
        true
    }

    /// Remove every page carrying `tag`. Returns how many were dropped.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, page| !page.tags.iter().any(|t| t == tag));
        let removed = before.saturating_sub(self.entries.len());
        tracing::debug!("Invalidated {removed} cached pages tagged {tag}");
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
