use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gate::TIMESTAMP_FIELD;

/// Name of the persisted configuration object.
pub const CONFIG_NAME: &str = "honeypot.settings";

static ELEMENT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-_a-zA-Z0-9]+$").expect("valid element name pattern"));

/// Site-wide protection settings. Read-only to the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionConfig {
    pub element_name: String,
    pub time_limit: u64,
    pub protect_all_forms: bool,
    pub log: bool,
    #[serde(default)]
    pub form_settings: BTreeMap<String, bool>,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            element_name: "url".to_string(),
            time_limit: 5,
            protect_all_forms: false,
            log: false,
            form_settings: BTreeMap::from([("user_register_form".to_string(), true)]),
        }
    }
}

impl ProtectionConfig {
    /// Per-form opt-in. Forms without a saved setting are unprotected.
    pub fn form_setting(&self, form_id: &str) -> bool {
        self.form_settings.get(form_id).copied().unwrap_or(false)
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Err(msg) = validate_element_name(&self.element_name) {
            errors.add("element_name", msg);
        }
        errors.into_result()
    }
}

/// Field-level validation messages, keyed by settings field name.
#[derive(Debug, Default, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("invalid settings ({} field errors)", .fields.len())]
pub struct ValidationErrors {
    pub fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields.insert(field.to_string(), message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

pub fn validate_element_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Honeypot element name is required.".to_string());
    }
    if !ELEMENT_NAME.is_match(name) {
        return Err(
            "The element name cannot contain spaces or other special characters.".to_string(),
        );
    }
    if name == TIMESTAMP_FIELD {
        return Err(format!("The element name \"{TIMESTAMP_FIELD}\" is reserved."));
    }
    Ok(())
}

/// Parse a time limit the way the settings screen accepts it: a JSON integer
/// >= 0, or a string that is exactly "0" or a run of ASCII digits above zero.
pub fn parse_time_limit(value: &Value) -> Result<u64, String> {
    const MESSAGE: &str = "The time limit must be a positive integer or 0.";

    match value {
        Value::Number(n) => n.as_u64().ok_or_else(|| MESSAGE.to_string()),
        Value::String(s) => {
            if s == "0" {
                return Ok(0);
            }
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(MESSAGE.to_string());
            }
            match s.parse::<u64>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(MESSAGE.to_string()),
            }
        }
        _ => Err(MESSAGE.to_string()),
    }
}

/// Values posted from the administrative settings screen.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub element_name: Value,
    #[serde(default)]
    pub time_limit: Value,
    #[serde(default)]
    pub protect_all_forms: bool,
    #[serde(default)]
    pub log: bool,
    #[serde(default)]
    pub form_settings: BTreeMap<String, bool>,
}

impl SettingsForm {
    /// Validate every field and build the config to persist.
    pub fn apply(self) -> Result<ProtectionConfig, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let time_limit = match parse_time_limit(&self.time_limit) {
            Ok(n) => n,
            Err(msg) => {
                errors.add("time_limit", msg);
                0
            }
        };
        let element_name = match self.element_name {
            Value::String(name) => name,
            Value::Null => String::new(),
            _ => {
                errors.add("element_name", "The element name must be text.");
                String::new()
            }
        };
        if !errors.fields.contains_key("element_name") {
            if let Err(msg) = validate_element_name(&element_name) {
                errors.add("element_name", msg);
            }
        }
        errors.into_result()?;

        Ok(ProtectionConfig {
            element_name,
            time_limit,
            protect_all_forms: self.protect_all_forms,
            log: self.log,
            form_settings: self.form_settings,
        })
    }
}
