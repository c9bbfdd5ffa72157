use async_trait::async_trait;
use sqlx::PgPool;

use crate::db;
use crate::settings::{CONFIG_NAME, ProtectionConfig};

use super::{ConfigStore, StoreError};

/// Stores the settings as a JSONB row of the `config` table.
pub struct PgConfigStore {
    pool: PgPool,
}

impl PgConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn load(&self) -> Result<Option<ProtectionConfig>, StoreError> {
        Ok(db::config::find(&self.pool, CONFIG_NAME).await?)
    }

    async fn save(&self, config: &ProtectionConfig) -> Result<(), StoreError> {
        db::config::upsert(&self.pool, CONFIG_NAME, config).await?;
        Ok(())
    }
}
