use std::sync::Arc;

use askama::Template;
use axum::extract::{OriginalUri, Path, State};
use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderName, HeaderValue};
use axum::response::{Html, IntoResponse, Response};
use chrono::Utc;

use crate::auth::BYPASS_CAPABILITY;
use crate::auth::extractor::MaybeAuthUser;
use crate::cache::PROTECTED_FORMS_TAG;
use crate::error::AppError;
use crate::forms::FormField;
use crate::gate::{self, TIMESTAMP_FIELD};
use crate::state::SharedState;

pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-honeypot-cache");

#[derive(Template)]
#[template(path = "form.html")]
struct FormTemplate {
    form_id: String,
    label: String,
    fields: Vec<FormField>,
    honeypot: Option<HoneypotInput>,
}

struct HoneypotInput {
    id: String,
    name: String,
    timestamp_field: &'static str,
    timestamp: Option<String>,
}

pub async fn form_page(
    State(state): State<SharedState>,
    Path(form_id): Path<String>,
    OriginalUri(uri): OriginalUri,
    actor: MaybeAuthUser,
) -> Result<Response, AppError> {
    let form = state
        .forms
        .get(&form_id)
        .ok_or_else(|| AppError::NotFound("Form not found".to_string()))?;

    let cache_key = uri.path().to_string();
    let anonymous = actor.is_anonymous();

    if anonymous {
        if let Some(body) = state.page_cache.get(&cache_key) {
            return Ok(with_cache_status(Html(body), "HIT"));
        }
    }

    let config = state.protection();
    let bypassed = actor.has_capability(BYPASS_CAPABILITY);
    let (context, field) =
        gate::attach_protection(&config, &form.id, bypassed, Utc::now().timestamp());

    let honeypot = match field {
        Some(field) => {
            let timestamp = field
                .rendered_at
                .map(|ts| state.codec.encode(ts))
                .transpose()
                .map_err(AppError::Internal)?;
            Some(HoneypotInput {
                id: field.html_id(),
                name: field.element_name,
                timestamp_field: TIMESTAMP_FIELD,
                timestamp,
            })
        }
        None => None,
    };

    let template = FormTemplate {
        form_id: form.id.clone(),
        label: form.label.clone(),
        fields: form.fields.clone(),
        honeypot,
    };
    let body = template
        .render()
        .map_err(|e| AppError::Internal(format!("Template render failed: {e}")))?;

    if !context.cacheable() {
        let mut response = Html(body).into_response();
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static("no-store, private"));
        return Ok(response);
    }

    if anonymous {
        // Settings saved mid-render must not leave this page behind
        state.page_cache.insert_if_current(
            &cache_key,
            body.clone(),
            &[PROTECTED_FORMS_TAG],
            || Arc::ptr_eq(&config, &state.protection.load()),
        );
    }
    Ok(with_cache_status(Html(body), "MISS"))
}

fn with_cache_status(page: Html<String>, status: &'static str) -> Response {
    let mut response = page.into_response();
    response
        .headers_mut()
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static(status));
    response
}
