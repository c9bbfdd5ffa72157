pub mod memory;
pub mod pg;

use async_trait::async_trait;

use crate::settings::ProtectionConfig;

pub use memory::MemoryConfigStore;
pub use pg::PgConfigStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for the single named protection settings object.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// The saved settings, or `None` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<ProtectionConfig>, StoreError>;
    async fn save(&self, config: &ProtectionConfig) -> Result<(), StoreError>;
}
