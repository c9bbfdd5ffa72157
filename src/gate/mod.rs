pub mod extension;
pub mod log;
pub mod timestamp;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::settings::ProtectionConfig;

use extension::ExtensionRegistry;
use log::{BlockLog, BlockedSubmission};

/// Hidden field carrying the encoded render timestamp.
pub const TIMESTAMP_FIELD: &str = "honeypot_time";

/// Message shown for every rejection. Never says which check failed.
pub const REJECTION_MESSAGE: &str =
    "There was a problem with your form submission. Please refresh the page and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    None,
    HoneypotFieldFilled,
    SubmittedTooFast,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::None => "none",
            RejectionReason::HoneypotFieldFilled => "honeypot_field_filled",
            RejectionReason::SubmittedTooFast => "submitted_too_fast",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionOutcome {
    pub accepted: bool,
    pub rejection_reason: RejectionReason,
    pub cacheable: bool,
}

impl SubmissionOutcome {
    fn accept(cacheable: bool) -> Self {
        Self {
            accepted: true,
            rejection_reason: RejectionReason::None,
            cacheable,
        }
    }

    fn reject(reason: RejectionReason, cacheable: bool) -> Self {
        Self {
            accepted: false,
            rejection_reason: reason,
            cacheable,
        }
    }
}

/// State of one rendered form instance. Evaluation takes it by value, so a
/// context can back at most one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormContext {
    pub form_id: String,
    pub rendered_at: Option<i64>,
    pub bypassed: bool,
    pub protected: bool,
    time_limited: bool,
}

impl FormContext {
    fn unprotected(form_id: &str, bypassed: bool) -> Self {
        Self {
            form_id: form_id.to_string(),
            rendered_at: None,
            bypassed,
            protected: false,
            time_limited: false,
        }
    }

    /// Rebuild the context of a posted form from the echoed render timestamp.
    /// A missing or undecodable timestamp is carried as `None`.
    pub fn submitted(
        config: &ProtectionConfig,
        form_id: &str,
        bypassed: bool,
        rendered_at: Option<i64>,
    ) -> Self {
        let protected = should_protect(config, form_id, bypassed);
        Self {
            form_id: form_id.to_string(),
            rendered_at,
            bypassed,
            protected,
            time_limited: protected && config.time_limit > 0,
        }
    }

    /// Whether the page holding this form may be served from a shared cache.
    /// A page embedding a render timestamp must not be: the cached copy would
    /// hand every later viewer the same stale timestamp.
    pub fn cacheable(&self) -> bool {
        !self.time_limited
    }
}

/// A page is cacheable only when every form on it is.
pub fn page_cacheable<'a>(contexts: impl IntoIterator<Item = &'a FormContext>) -> bool {
    contexts.into_iter().all(FormContext::cacheable)
}

/// Fields to render into a protected form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Name of the honeypot input. Always rendered empty.
    pub element_name: String,
    /// Render time to embed in [`TIMESTAMP_FIELD`], present when the time
    /// check is enabled.
    pub rendered_at: Option<i64>,
}

impl FieldSpec {
    pub fn html_id(&self) -> String {
        format!("edit-{}", self.element_name.replace('_', "-"))
    }
}

pub fn should_protect(config: &ProtectionConfig, form_id: &str, is_bypassed: bool) -> bool {
    if is_bypassed {
        return false;
    }
    if config.protect_all_forms {
        return true;
    }
    config.form_setting(form_id)
}

pub fn attach_protection(
    config: &ProtectionConfig,
    form_id: &str,
    is_bypassed: bool,
    now: i64,
) -> (FormContext, Option<FieldSpec>) {
    if !should_protect(config, form_id, is_bypassed) {
        return (FormContext::unprotected(form_id, is_bypassed), None);
    }

    let time_limited = config.time_limit > 0;
    let rendered_at = time_limited.then_some(now);

    let context = FormContext {
        form_id: form_id.to_string(),
        rendered_at,
        bypassed: false,
        protected: true,
        time_limited,
    };
    let field = FieldSpec {
        element_name: config.element_name.clone(),
        rendered_at,
    };
    (context, Some(field))
}

/// A posted form awaiting a decision.
#[derive(Debug)]
pub struct Submission<'a> {
    pub context: FormContext,
    pub values: &'a Map<String, Value>,
    pub submitted_at: i64,
    pub actor: &'a str,
    pub prior_failures: u32,
}

/// Honeypot field check. Absent, null and empty-string values pass; anything
/// else a bot might have typed into the field fails.
pub fn honeypot_filled(values: &Map<String, Value>, element_name: &str) -> bool {
    if element_name.is_empty() {
        return false;
    }

    match values.get(element_name) {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

/// Seconds between render and submit. Missing timestamps, clock skew into
/// the future and differences that overflow all count as zero, so they fall
/// on the too-fast side.
pub fn elapsed_seconds(rendered_at: Option<i64>, submitted_at: i64) -> u64 {
    rendered_at
        .and_then(|rendered| submitted_at.checked_sub(rendered))
        .and_then(|elapsed| u64::try_from(elapsed).ok())
        .unwrap_or(0)
}

pub struct Gate {
    extensions: ExtensionRegistry,
    block_log: Arc<dyn BlockLog>,
}

impl Gate {
    pub fn new(extensions: ExtensionRegistry, block_log: Arc<dyn BlockLog>) -> Self {
        Self {
            extensions,
            block_log,
        }
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn block_log(&self) -> &Arc<dyn BlockLog> {
        &self.block_log
    }

    /// Effective minimum time for a submission: the configured limit plus
    /// every extension's addition.
    pub fn effective_time_limit(
        &self,
        config: &ProtectionConfig,
        form_id: &str,
        values: &Map<String, Value>,
        prior_failures: u32,
    ) -> u64 {
        config
            .time_limit
            .saturating_add(self.extensions.total(form_id, values, prior_failures))
    }

    pub fn evaluate(&self, config: &ProtectionConfig, submission: Submission<'_>) -> SubmissionOutcome {
        let Submission {
            context,
            values,
            submitted_at,
            actor,
            prior_failures,
        } = submission;

        let cacheable = context.cacheable();

        if context.bypassed || !should_protect(config, &context.form_id, context.bypassed) {
            return SubmissionOutcome::accept(cacheable);
        }

        let reason = if honeypot_filled(values, &config.element_name) {
            Some(RejectionReason::HoneypotFieldFilled)
        } else if config.time_limit > 0 {
            let limit = self.effective_time_limit(config, &context.form_id, values, prior_failures);
            let elapsed = elapsed_seconds(context.rendered_at, submitted_at);
            (elapsed < limit).then_some(RejectionReason::SubmittedTooFast)
        } else {
            None
        };

        let Some(reason) = reason else {
            return SubmissionOutcome::accept(cacheable);
        };

        tracing::debug!(
            form_id = %context.form_id,
            reason = reason.as_str(),
            "Submission rejected"
        );

        if config.log {
            self.block_log.record(BlockedSubmission {
                id: Uuid::now_v7(),
                form_id: context.form_id.clone(),
                reason: reason.as_str().to_string(),
                actor: actor.to_string(),
                created_at: DateTime::from_timestamp(submitted_at, 0).unwrap_or_else(Utc::now),
            });
        }

        SubmissionOutcome::reject(reason, cacheable)
    }
}
