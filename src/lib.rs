pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod failures;
pub mod forms;
pub mod gate;
pub mod routes;
pub mod settings;
pub mod state;
pub mod store;
pub mod submission;
pub mod views;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::Router;
use axum::http::{HeaderName, HeaderValue};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::cache::PageCache;
use crate::config::Config;
use crate::error::AppError;
use crate::failures::FailureTracker;
use crate::forms::FormRegistry;
use crate::gate::Gate;
use crate::gate::extension::{ExtensionRegistry, FailureBackoff, FlaggedFieldDelay};
use crate::gate::log::BlockLog;
use crate::gate::timestamp::TimestampCodec;
use crate::settings::ProtectionConfig;
use crate::state::{AppState, SharedState};
use crate::store::ConfigStore;

/// Time limit extensions enabled through the environment.
pub fn configured_extensions(config: &Config) -> ExtensionRegistry {
    let mut extensions = ExtensionRegistry::new();
    if let Some(base) = config.failure_backoff {
        extensions.register(Arc::new(FailureBackoff::new(base)));
    }
    for (field, seconds) in &config.flagged_fields {
        extensions.register(Arc::new(FlaggedFieldDelay::new(field.clone(), *seconds)));
    }
    extensions
}

/// Load the protection settings, installing the defaults on first start.
/// Invalid saved settings abort startup rather than reach the gate.
pub async fn load_protection(store: &dyn ConfigStore) -> Result<ProtectionConfig, AppError> {
    let config = match store.load().await? {
        Some(config) => config,
        None => {
            let defaults = ProtectionConfig::default();
            store.save(&defaults).await?;
            tracing::info!("Installed default honeypot settings");
            defaults
        }
    };
    config.validate()?;
    Ok(config)
}

pub async fn build_app(
    store: Arc<dyn ConfigStore>,
    block_log: Arc<dyn BlockLog>,
    extensions: ExtensionRegistry,
    config: Config,
) -> Result<(Router, SharedState), AppError> {
    let protection = load_protection(store.as_ref()).await?;

    let codec = TimestampCodec::from_secret(config.timestamp_key.as_deref());
    if matches!(codec, TimestampCodec::Plain) {
        tracing::info!("Render timestamps are not sealed; set HONEYPOT_TIMESTAMP_KEY to seal them");
    }

    let state: SharedState = Arc::new(AppState {
        store,
        protection: ArcSwap::from_pointee(protection),
        gate: Gate::new(extensions, block_log),
        codec,
        forms: FormRegistry::with_defaults(),
        failures: FailureTracker::new(Duration::from_secs(config.failure_window_secs)),
        page_cache: PageCache::new(Duration::from_secs(config.page_cache_ttl_secs)),
        config,
    });

    let max_body_size = state.config.max_body_size;

    let app = Router::new()
        .merge(routes::api_routes())
        .merge(routes::form_routes())
        .merge(views::view_routes())
        .route("/health", axum::routing::get(health))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state.clone());

    Ok((app, state))
}

async fn health() -> &'static str {
    "ok"
}
