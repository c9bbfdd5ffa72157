use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::auth::BYPASS_CAPABILITY;
use crate::auth::extractor::MaybeAuthUser;
use crate::error::AppError;
use crate::gate::REJECTION_MESSAGE;
use crate::state::SharedState;
use crate::submission::pipeline::PostedForm;
use crate::submission::{metadata, parser, pipeline};

pub async fn submit(
    State(state): State<SharedState>,
    Path(form_id): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    actor: MaybeAuthUser,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    if state.forms.get(&form_id).is_none() {
        return Err(AppError::NotFound("Form not found".to_string()));
    }

    let values = parser::parse_form(&headers, body)
        .await
        .map_err(AppError::BadRequest)?;

    let identity = metadata::actor_identity(
        &actor,
        &headers,
        Some(addr.ip()),
        &state.config.trusted_proxies,
    );

    let outcome = pipeline::run(
        &state,
        PostedForm {
            form_id: &form_id,
            actor: &identity,
            bypassed: actor.has_capability(BYPASS_CAPABILITY),
            values,
            submitted_at: Utc::now().timestamp(),
        },
    );

    if !outcome.accepted {
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": REJECTION_MESSAGE })),
        )
            .into_response());
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "accepted",
            "form_id": form_id,
        })),
    )
        .into_response())
}
