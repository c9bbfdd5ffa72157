use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::settings::ProtectionConfig;

use super::{ConfigStore, StoreError};

#[derive(Default)]
pub struct MemoryConfigStore {
    config: RwLock<Option<ProtectionConfig>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ProtectionConfig) -> Self {
        Self {
            config: RwLock::new(Some(config)),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<Option<ProtectionConfig>, StoreError> {
        Ok(self.config.read().await.clone())
    }

    async fn save(&self, config: &ProtectionConfig) -> Result<(), StoreError> {
        *self.config.write().await = Some(config.clone());
        Ok(())
    }
}
