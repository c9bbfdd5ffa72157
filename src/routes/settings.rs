use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::extractor::AuthUser;
use crate::cache::PROTECTED_FORMS_TAG;
use crate::error::AppError;
use crate::gate::log::BlockedSubmission;
use crate::settings::{ProtectionConfig, SettingsForm};
use crate::state::SharedState;

pub async fn get(auth: AuthUser, State(state): State<SharedState>) -> Result<Json<Value>, AppError> {
    auth.require_admin()?;

    let config = state.protection();
    let forms: Vec<Value> = state
        .forms
        .list()
        .iter()
        .map(|f| {
            json!({
                "id": f.id,
                "label": f.label,
                "enabled": config.form_setting(&f.id),
            })
        })
        .collect();

    Ok(Json(json!({
        "settings": config.as_ref(),
        "forms": forms,
        "extensions": state.gate.extensions().ids(),
    })))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    body: Result<Json<SettingsForm>, JsonRejection>,
) -> Result<Json<ProtectionConfig>, AppError> {
    auth.require_admin()?;

    let Json(form) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let config = form.apply()?;
    state.store.save(&config).await?;
    state.protection.store(std::sync::Arc::new(config.clone()));

    // Cached pages may embed the old protection state
    let removed = state.page_cache.invalidate_tag(PROTECTED_FORMS_TAG);
    tracing::info!(
        user = %auth.user_id,
        invalidated = removed,
        "Honeypot settings saved"
    );

    Ok(Json(config))
}

#[derive(Deserialize)]
pub struct BlockedQuery {
    pub limit: Option<usize>,
}

pub async fn blocked(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<BlockedQuery>,
) -> Result<Json<Vec<BlockedSubmission>>, AppError> {
    auth.require_admin()?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    Ok(Json(state.gate.block_log().recent(limit).await))
}
