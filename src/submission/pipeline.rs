use serde_json::{Map, Value};

use crate::gate::{FormContext, Submission, SubmissionOutcome, TIMESTAMP_FIELD};
use crate::state::SharedState;

/// A parsed form post, ready for the gate.
pub struct PostedForm<'a> {
    pub form_id: &'a str,
    pub actor: &'a str,
    pub bypassed: bool,
    pub values: Map<String, Value>,
    pub submitted_at: i64,
}

/// Run one posted form through the gate and keep the failure count current.
pub fn run(state: &SharedState, posted: PostedForm<'_>) -> SubmissionOutcome {
    let config = state.protection();

    let rendered_at = posted
        .values
        .get(TIMESTAMP_FIELD)
        .and_then(Value::as_str)
        .and_then(|token| state.codec.decode(token));

    let context = FormContext::submitted(&config, posted.form_id, posted.bypassed, rendered_at);
    let prior_failures = state.failures.count(posted.actor);

    let outcome = state.gate.evaluate(
        &config,
        Submission {
            context,
            values: &posted.values,
            submitted_at: posted.submitted_at,
            actor: posted.actor,
            prior_failures,
        },
    );

    if !outcome.accepted {
        state.failures.record_failure(posted.actor);
        tracing::info!(
            form_id = posted.form_id,
            prior_failures,
            "Form submission blocked"
        );
    }

    outcome
}
