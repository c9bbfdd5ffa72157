use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use honeypot::gate::extension::{
    ExtensionError, ExtensionRegistry, FailureBackoff, FlaggedFieldDelay, TimeLimitExtension,
};
use honeypot::gate::log::{BlockLog, MemoryBlockLog};
use honeypot::gate::timestamp::TimestampCodec;
use honeypot::gate::{
    FormContext, Gate, RejectionReason, Submission, SubmissionOutcome, attach_protection,
    elapsed_seconds, page_cacheable, should_protect,
};
use honeypot::settings::{ProtectionConfig, SettingsForm, parse_time_limit};

const T: i64 = 1_700_000_000;

fn config(time_limit: u64) -> ProtectionConfig {
    ProtectionConfig {
        element_name: "url".to_string(),
        time_limit,
        protect_all_forms: true,
        log: false,
        form_settings: BTreeMap::new(),
    }
}

fn values(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

fn gate() -> Gate {
    Gate::new(ExtensionRegistry::new(), Arc::new(MemoryBlockLog::default()))
}

fn evaluate(
    gate: &Gate,
    config: &ProtectionConfig,
    bypassed: bool,
    submitted: &Map<String, Value>,
    rendered_at: Option<i64>,
    submitted_at: i64,
) -> SubmissionOutcome {
    let context = FormContext::submitted(config, "contact_site_form", bypassed, rendered_at);
    gate.evaluate(
        config,
        Submission {
            context,
            values: submitted,
            submitted_at,
            actor: "ip:127.0.0.1",
            prior_failures: 0,
        },
    )
}

// ── should_protect ──────────────────────────────────────────────

#[test]
fn unlisted_form_is_not_protected() {
    let mut cfg = config(5);
    cfg.protect_all_forms = false;
    cfg.form_settings.insert("user_pass".to_string(), true);

    assert!(!should_protect(&cfg, "contact_site_form", false));
    assert!(should_protect(&cfg, "user_pass", false));
}

#[test]
fn disabled_form_setting_is_not_protected() {
    let mut cfg = config(5);
    cfg.protect_all_forms = false;
    cfg.form_settings.insert("user_pass".to_string(), false);

    assert!(!should_protect(&cfg, "user_pass", false));
}

#[test]
fn bypass_wins_over_protect_all() {
    let cfg = config(5);
    assert!(should_protect(&cfg, "anything", false));
    assert!(!should_protect(&cfg, "anything", true));
}

// ── attach_protection ───────────────────────────────────────────

#[test]
fn attach_adds_honeypot_and_timestamp() {
    let (context, field) = attach_protection(&config(5), "user_register_form", false, T);
    let field = field.expect("protected form gets fields");

    assert!(context.protected);
    assert_eq!(context.rendered_at, Some(T));
    assert_eq!(field.element_name, "url");
    assert_eq!(field.rendered_at, Some(T));
    assert_eq!(field.html_id(), "edit-url");
    assert!(!context.cacheable());
}

#[test]
fn attach_without_time_limit_has_no_timestamp() {
    let (context, field) = attach_protection(&config(0), "user_register_form", false, T);
    let field = field.unwrap();

    assert_eq!(field.rendered_at, None);
    assert_eq!(context.rendered_at, None);
    assert!(context.cacheable());
}

#[test]
fn attach_for_bypassed_actor_renders_nothing() {
    let (context, field) = attach_protection(&config(5), "user_register_form", true, T);

    assert!(field.is_none());
    assert!(!context.protected);
    assert!(context.bypassed);
    assert!(context.cacheable());
}

#[test]
fn page_is_cacheable_only_without_timed_forms() {
    let mut cfg = config(5);
    cfg.protect_all_forms = false;
    cfg.form_settings.insert("user_pass".to_string(), true);

    let (unprotected, _) = attach_protection(&cfg, "contact_site_form", false, T);
    let (timed, _) = attach_protection(&cfg, "user_pass", false, T);

    assert!(page_cacheable([&unprotected]));
    assert!(!page_cacheable([&unprotected, &timed]));

    let untimed_cfg = ProtectionConfig {
        time_limit: 0,
        ..cfg
    };
    let (untimed, _) = attach_protection(&untimed_cfg, "user_pass", false, T);
    assert!(page_cacheable([&unprotected, &untimed]));
}

// ── evaluate ────────────────────────────────────────────────────

#[test]
fn filled_honeypot_is_rejected() {
    let submitted = values(json!({ "url": "http://spam.example/" }));
    let outcome = evaluate(&gate(), &config(0), false, &submitted, Some(T), T);

    assert!(!outcome.accepted);
    assert_eq!(outcome.rejection_reason, RejectionReason::HoneypotFieldFilled);
}

#[test]
fn empty_honeypot_without_time_limit_is_accepted() {
    let submitted = values(json!({ "url": "" }));
    let outcome = evaluate(&gate(), &config(0), false, &submitted, Some(T), T);

    assert!(outcome.accepted);
    assert_eq!(outcome.rejection_reason, RejectionReason::None);
    assert!(outcome.cacheable);
}

#[test]
fn absent_or_null_honeypot_passes() {
    let cfg = config(0);
    let absent = values(json!({ "name": "Ann" }));
    let null = values(json!({ "url": null }));

    assert!(evaluate(&gate(), &cfg, false, &absent, None, T).accepted);
    assert!(evaluate(&gate(), &cfg, false, &null, None, T).accepted);
}

#[test]
fn non_string_honeypot_value_counts_as_filled() {
    let submitted = values(json!({ "url": ["x"] }));
    let outcome = evaluate(&gate(), &config(0), false, &submitted, None, T);
    assert_eq!(outcome.rejection_reason, RejectionReason::HoneypotFieldFilled);
}

#[test]
fn too_fast_submission_is_rejected() {
    let submitted = values(json!({ "url": "" }));
    let outcome = evaluate(&gate(), &config(5), false, &submitted, Some(T), T + 3);

    assert!(!outcome.accepted);
    assert_eq!(outcome.rejection_reason, RejectionReason::SubmittedTooFast);
    assert!(!outcome.cacheable);
}

#[test]
fn slow_enough_submission_is_accepted() {
    let submitted = values(json!({ "url": "" }));
    let gate = gate();

    assert!(evaluate(&gate, &config(5), false, &submitted, Some(T), T + 6).accepted);
    // The limit itself is enough
    assert!(evaluate(&gate, &config(5), false, &submitted, Some(T), T + 5).accepted);
}

#[test]
fn honeypot_check_runs_before_time_check() {
    let submitted = values(json!({ "url": "bot" }));
    let outcome = evaluate(&gate(), &config(5), false, &submitted, Some(T), T + 60);
    assert_eq!(outcome.rejection_reason, RejectionReason::HoneypotFieldFilled);
}

#[test]
fn missing_or_future_timestamp_fails_closed() {
    let submitted = values(json!({ "url": "" }));
    let gate = gate();
    let cfg = config(5);

    let missing = evaluate(&gate, &cfg, false, &submitted, None, T + 1000);
    assert_eq!(missing.rejection_reason, RejectionReason::SubmittedTooFast);

    let future = evaluate(&gate, &cfg, false, &submitted, Some(T + 100), T);
    assert_eq!(future.rejection_reason, RejectionReason::SubmittedTooFast);
}

#[test]
fn overflowing_elapsed_time_fails_closed() {
    assert_eq!(elapsed_seconds(Some(-1), i64::MAX), 0);
    assert_eq!(elapsed_seconds(Some(i64::MIN), 0), 0);
    assert_eq!(elapsed_seconds(Some(i64::MIN), i64::MAX), 0);
    assert_eq!(elapsed_seconds(Some(0), i64::MAX), i64::MAX as u64);

    let submitted = values(json!({ "url": "" }));
    let outcome = evaluate(&gate(), &config(5), false, &submitted, Some(i64::MIN), 0);
    assert!(!outcome.accepted);
    assert_eq!(outcome.rejection_reason, RejectionReason::SubmittedTooFast);
}

#[test]
fn bypassed_actor_is_always_accepted() {
    let submitted = values(json!({ "url": "http://spam.example/" }));
    let gate = gate();

    for time_limit in [0, 5, 3600] {
        let outcome = evaluate(&gate, &config(time_limit), true, &submitted, None, T);
        assert!(outcome.accepted, "time_limit {time_limit}");
        assert!(outcome.cacheable);
    }
}

#[test]
fn unprotected_form_is_accepted() {
    let mut cfg = config(5);
    cfg.protect_all_forms = false;
    let submitted = values(json!({ "url": "filled" }));

    let outcome = evaluate(&gate(), &cfg, false, &submitted, None, T);
    assert!(outcome.accepted);
    assert!(outcome.cacheable);
}

#[test]
fn evaluation_is_repeatable() {
    let submitted = values(json!({ "url": "", "name": "Ann" }));
    let gate = gate();
    let cfg = config(5);

    let first = evaluate(&gate, &cfg, false, &submitted, Some(T), T + 2);
    let second = evaluate(&gate, &cfg, false, &submitted, Some(T), T + 2);
    assert_eq!(first, second);
}

// ── extensions ──────────────────────────────────────────────────

#[test]
fn flagged_field_extends_time_limit() {
    let mut extensions = ExtensionRegistry::new();
    extensions.register(Arc::new(FlaggedFieldDelay::new("some_interesting_value", 10)));
    let gate = Gate::new(extensions, Arc::new(MemoryBlockLog::default()));
    let cfg = config(5);

    let flagged = values(json!({ "url": "", "some_interesting_value": "yes" }));
    let early = evaluate(&gate, &cfg, false, &flagged, Some(T), T + 8);
    assert_eq!(early.rejection_reason, RejectionReason::SubmittedTooFast);
    assert!(evaluate(&gate, &cfg, false, &flagged, Some(T), T + 16).accepted);

    let plain = values(json!({ "url": "", "some_interesting_value": "0" }));
    assert!(evaluate(&gate, &cfg, false, &plain, Some(T), T + 8).accepted);
}

struct Broken;

impl TimeLimitExtension for Broken {
    fn id(&self) -> &str {
        "broken"
    }

    fn additional_seconds(
        &self,
        _form_id: &str,
        _values: &Map<String, Value>,
        _prior_failures: u32,
    ) -> Result<u64, ExtensionError> {
        Err(ExtensionError::from("lookup failed"))
    }
}

struct Fixed(u64);

impl TimeLimitExtension for Fixed {
    fn id(&self) -> &str {
        "fixed"
    }

    fn additional_seconds(
        &self,
        _form_id: &str,
        _values: &Map<String, Value>,
        _prior_failures: u32,
    ) -> Result<u64, ExtensionError> {
        Ok(self.0)
    }
}

#[test]
fn extensions_are_summed_and_failures_add_nothing() {
    let mut extensions = ExtensionRegistry::new();
    extensions.register(Arc::new(Fixed(3)));
    extensions.register(Arc::new(Broken));
    extensions.register(Arc::new(Fixed(4)));
    assert_eq!(extensions.ids(), vec!["fixed", "broken", "fixed"]);

    let gate = Gate::new(extensions, Arc::new(MemoryBlockLog::default()));
    let limit = gate.effective_time_limit(&config(5), "user_pass", &Map::new(), 0);
    assert_eq!(limit, 12);
}

#[test]
fn failure_backoff_grows_with_prior_failures() {
    let backoff = FailureBackoff::new(5);
    let empty = Map::new();

    assert_eq!(backoff.additional_seconds("f", &empty, 0).unwrap(), 0);
    // 5 + e - 1
    assert_eq!(backoff.additional_seconds("f", &empty, 1).unwrap(), 6);
    // 5 + e^3 - 1
    assert_eq!(backoff.additional_seconds("f", &empty, 3).unwrap(), 24);
    assert_eq!(backoff.additional_seconds("f", &empty, 50).unwrap(), 3600);
}

#[test]
fn failure_backoff_applies_through_the_gate() {
    let mut extensions = ExtensionRegistry::new();
    extensions.register(Arc::new(FailureBackoff::new(5)));
    let gate = Gate::new(extensions, Arc::new(MemoryBlockLog::default()));
    let cfg = config(5);
    let submitted = values(json!({ "url": "" }));

    let submit = |prior_failures| {
        gate.evaluate(
            &cfg,
            Submission {
                context: FormContext::submitted(&cfg, "user_pass", false, Some(T)),
                values: &submitted,
                submitted_at: T + 8,
                actor: "ip:10.0.0.1",
                prior_failures,
            },
        )
    };

    assert!(submit(0).accepted);
    assert_eq!(submit(1).rejection_reason, RejectionReason::SubmittedTooFast);
}

// ── logging ─────────────────────────────────────────────────────

#[tokio::test]
async fn rejections_are_logged_only_when_enabled() {
    let log = Arc::new(MemoryBlockLog::default());
    let gate = Gate::new(ExtensionRegistry::new(), log.clone());
    let submitted = values(json!({ "url": "spam" }));

    let quiet = config(0);
    evaluate(&gate, &quiet, false, &submitted, None, T);
    assert!(log.recent(10).await.is_empty());

    let loud = ProtectionConfig {
        log: true,
        ..config(0)
    };
    evaluate(&gate, &loud, false, &submitted, None, T);
    let accepted = values(json!({ "url": "" }));
    evaluate(&gate, &loud, false, &accepted, None, T);

    let entries = log.recent(10).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].form_id, "contact_site_form");
    assert_eq!(entries[0].reason, "honeypot_field_filled");
    assert_eq!(entries[0].actor, "ip:127.0.0.1");
    assert_eq!(entries[0].created_at.timestamp(), T);
}

#[tokio::test]
async fn memory_log_keeps_most_recent_entries() {
    let log = Arc::new(MemoryBlockLog::new(2));
    let gate = Gate::new(ExtensionRegistry::new(), log.clone());
    let cfg = ProtectionConfig {
        log: true,
        ..config(0)
    };
    let submitted = values(json!({ "url": "spam" }));

    for offset in 0..3 {
        evaluate(&gate, &cfg, false, &submitted, None, T + offset);
    }

    let entries = log.recent(10).await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].created_at.timestamp(), T + 2);
    assert_eq!(entries[1].created_at.timestamp(), T + 1);
}

// ── timestamp codec ─────────────────────────────────────────────

#[test]
fn plain_codec_trusts_digits_only() {
    let codec = TimestampCodec::Plain;
    assert_eq!(codec.encode(T).unwrap(), T.to_string());
    assert_eq!(codec.decode(&T.to_string()), Some(T));
    assert_eq!(codec.decode(""), None);
    assert_eq!(codec.decode("-5"), None);
    assert_eq!(codec.decode("12abc"), None);
}

#[test]
fn sealed_codec_rejects_tampering() {
    let codec = TimestampCodec::sealed("render-secret");
    let token = codec.encode(T).unwrap();

    assert_ne!(token, T.to_string());
    assert_eq!(codec.decode(&token), Some(T));

    // Flip one hex digit of the ciphertext
    let mut bytes = token.into_bytes();
    let last = bytes.len() - 1;
    bytes[last] = if bytes[last] == b'0' { b'1' } else { b'0' };
    let tampered = String::from_utf8(bytes).unwrap();
    assert_eq!(codec.decode(&tampered), None);

    assert_eq!(codec.decode(&T.to_string()), None);
    assert_eq!(TimestampCodec::sealed("other-secret").decode(&codec.encode(T).unwrap()), None);
}

#[test]
fn empty_secret_falls_back_to_plain() {
    assert!(matches!(TimestampCodec::from_secret(Some("")), TimestampCodec::Plain));
    assert!(matches!(TimestampCodec::from_secret(None), TimestampCodec::Plain));
    assert!(matches!(
        TimestampCodec::from_secret(Some("k")),
        TimestampCodec::Sealed(_)
    ));
}

// ── settings validation ─────────────────────────────────────────

#[test]
fn time_limit_accepts_zero_and_positive_integers() {
    assert_eq!(parse_time_limit(&json!("0")), Ok(0));
    assert_eq!(parse_time_limit(&json!("5")), Ok(5));
    assert_eq!(parse_time_limit(&json!("007")), Ok(7));
    assert_eq!(parse_time_limit(&json!(5)), Ok(5));
    assert_eq!(parse_time_limit(&json!(0)), Ok(0));
}

#[test]
fn time_limit_rejects_everything_else() {
    for bad in [
        json!("-1"),
        json!("1.5"),
        json!("00"),
        json!(" 5"),
        json!(""),
        json!("+5"),
        json!(-1),
        json!(1.5),
        json!(null),
        json!(true),
    ] {
        assert!(parse_time_limit(&bad).is_err(), "accepted {bad}");
    }
}

#[test]
fn settings_form_collects_every_field_error() {
    let form: SettingsForm = serde_json::from_value(json!({
        "element_name": "home page",
        "time_limit": "abc",
    }))
    .unwrap();

    let errors = form.apply().unwrap_err();
    assert!(errors.fields.contains_key("element_name"));
    assert!(errors.fields.contains_key("time_limit"));
}

#[test]
fn settings_form_rejects_empty_or_reserved_element_name() {
    for name in ["", "honeypot_time", "a.b"] {
        let form: SettingsForm = serde_json::from_value(json!({
            "element_name": name,
            "time_limit": 5,
        }))
        .unwrap();
        assert!(form.apply().is_err(), "accepted {name:?}");
    }
}

#[test]
fn settings_form_requires_text_element_name() {
    let missing: SettingsForm = serde_json::from_value(json!({ "time_limit": 5 })).unwrap();
    let errors = missing.apply().unwrap_err();
    assert!(errors.fields.contains_key("element_name"));

    let number: SettingsForm =
        serde_json::from_value(json!({ "element_name": 7, "time_limit": 5 })).unwrap();
    let errors = number.apply().unwrap_err();
    assert_eq!(errors.fields.len(), 1);
    assert!(errors.fields.contains_key("element_name"));
}

#[test]
fn settings_form_builds_config() {
    let form: SettingsForm = serde_json::from_value(json!({
        "element_name": "home-page_2",
        "time_limit": "10",
        "protect_all_forms": false,
        "log": true,
        "form_settings": { "user_pass": true },
    }))
    .unwrap();

    let config = form.apply().unwrap();
    assert_eq!(config.element_name, "home-page_2");
    assert_eq!(config.time_limit, 10);
    assert!(config.log);
    assert!(config.form_setting("user_pass"));
    assert!(!config.form_setting("user_register_form"));
}

#[test]
fn persisted_layout_uses_settings_keys() {
    let value = serde_json::to_value(ProtectionConfig::default()).unwrap();
    let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();

    for key in ["element_name", "time_limit", "protect_all_forms", "log", "form_settings"] {
        assert!(keys.contains(&key), "missing {key}");
    }
    assert!(ProtectionConfig::default().validate().is_ok());
}
