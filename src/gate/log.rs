use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;

/// One rejected submission, as handed to the block log.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
pub struct BlockedSubmission {
    pub id: Uuid,
    pub form_id: String,
    pub reason: String,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

/// Sink for rejected submissions. `record` is fire-and-forget: it must not
/// block the caller and never fails from the caller's point of view.
#[async_trait]
pub trait BlockLog: Send + Sync {
    fn record(&self, entry: BlockedSubmission);
    async fn recent(&self, limit: usize) -> Vec<BlockedSubmission>;
}

fn trace(entry: &BlockedSubmission) {
    tracing::warn!(
        form_id = %entry.form_id,
        reason = %entry.reason,
        actor = %entry.actor,
        "Blocked submission"
    );
}

/// Keeps the most recent entries in memory.
pub struct MemoryBlockLog {
    capacity: usize,
    entries: Mutex<VecDeque<BlockedSubmission>>,
}

impl MemoryBlockLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }
}

impl Default for MemoryBlockLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl BlockLog for MemoryBlockLog {
    fn record(&self, entry: BlockedSubmission) {
        trace(&entry);
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    async fn recent(&self, limit: usize) -> Vec<BlockedSubmission> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        entries.iter().rev().take(limit).cloned().collect()
    }
}

/// Writes entries to the `blocked_submissions` table on a background task.
pub struct PgBlockLog {
    pool: PgPool,
}

impl PgBlockLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlockLog for PgBlockLog {
    fn record(&self, entry: BlockedSubmission) {
        trace(&entry);
        let pool = self.pool.clone();
        tokio::spawn(async move {
            if let Err(e) = db::blocked::create(&pool, &entry).await {
                tracing::error!("Failed to store blocked submission: {e}");
            }
        });
    }

    async fn recent(&self, limit: usize) -> Vec<BlockedSubmission> {
        db::blocked::list_recent(&self.pool, limit as i64)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Failed to list blocked submissions: {e}");
                Vec::new()
            })
    }
}
