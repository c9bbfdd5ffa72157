use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::cache::PageCache;
use crate::config::Config;
use crate::failures::FailureTracker;
use crate::forms::FormRegistry;
use crate::gate::Gate;
use crate::gate::timestamp::TimestampCodec;
use crate::settings::ProtectionConfig;
use crate::store::ConfigStore;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ConfigStore>,
    /// Live protection settings. Each request works from one snapshot.
    pub protection: ArcSwap<ProtectionConfig>,
    pub gate: Gate,
    pub codec: TimestampCodec,
    pub forms: FormRegistry,
    pub failures: FailureTracker,
    pub page_cache: PageCache,
}

impl AppState {
    pub fn protection(&self) -> Arc<ProtectionConfig> {
        self.protection.load_full()
    }
}
