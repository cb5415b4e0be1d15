//! Request Validation
//!
//! Per-endpoint rule sets consumed by the management API layer. Rules are
//! built once at startup and only read afterwards.
//!
//! ## Policy
//! - A missing required field short-circuits with a single error
//! - Every other check runs, so callers see all violations at once
//! - Password fields are never sanitized (they must reach the hasher byte-for-byte)

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, LazyLock};

use kernel::error::kind::ErrorKind;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::sanitize::{detect_sql_injection, sanitize_string};

/// Characters shown from an over-long value in an error
const TRUNCATED_VALUE_LEN: usize = 50;

/// Stands in for values that must not be echoed back
const REDACTED: &str = "[REDACTED]";

/// Custom validator hook
pub type CustomValidator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_.-]{3,50}$").expect("valid username pattern"));

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email pattern")
});

/// Validation criteria for one field
#[derive(Clone, Default)]
pub struct ValidationRule {
    pub required: bool,
    /// Minimum length in bytes, `0` disables the check
    pub min_length: usize,
    /// Maximum length in bytes, `0` disables the check
    pub max_length: usize,
    pub pattern: Option<Regex>,
    /// Whitelist of characters, empty disables the check
    pub allowed_chars: String,
    pub sanitize: bool,
    pub custom: Option<CustomValidator>,
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRule")
            .field("required", &self.required)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("allowed_chars", &self.allowed_chars)
            .field("sanitize", &self.sanitize)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

impl ValidationRule {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    pub fn optional() -> Self {
        Self::default()
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = min;
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = max;
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn allowed_chars(mut self, chars: impl Into<String>) -> Self {
        self.allowed_chars = chars.into();
        self
    }

    pub fn sanitized(mut self) -> Self {
        self.sanitize = true;
        self
    }

    pub fn custom<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(validator));
        self
    }
}

/// Validation rules and envelope limits for one endpoint
#[derive(Debug, Clone, Default)]
pub struct ValidationConfig {
    /// Maximum body size in bytes, `0` disables the check
    pub max_request_size: u64,
    pub allowed_methods: Vec<String>,
    pub required_headers: Vec<String>,
    pub rules: BTreeMap<String, ValidationRule>,
}

impl ValidationConfig {
    pub fn rule(mut self, field: impl Into<String>, rule: ValidationRule) -> Self {
        self.rules.insert(field.into(), rule);
        self
    }
}

/// One field-level violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>, value: Option<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            value,
        }
    }
}

/// Outcome of validating a whole request body
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    /// Input with sanitization applied where the rules ask for it
    pub data: Map<String, Value>,
}

/// Envelope-level rejection (size, method, headers)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Request too large")]
    TooLarge,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Missing required header: {0}")]
    MissingHeader(String),
}

impl EnvelopeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EnvelopeError::TooLarge => ErrorKind::PayloadTooLarge,
            EnvelopeError::MethodNotAllowed => ErrorKind::MethodNotAllowed,
            EnvelopeError::MissingHeader(_) => ErrorKind::BadRequest,
        }
    }
}

fn is_password_field(field: &str) -> bool {
    field.to_ascii_lowercase().contains("password")
}

/// Basic sanitization for fields without a rule
fn sanitize_value(field: &str, value: &Value) -> Value {
    match value {
        Value::String(s) if !is_password_field(field) => Value::String(sanitize_string(s)),
        other => other.clone(),
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate_for_display(value: &str) -> String {
    let truncated: String = value.chars().take(TRUNCATED_VALUE_LEN).collect();
    format!("{truncated}...")
}

/// Validate a single field against its rule
///
/// `value` is `None` when the field is absent from the request.
pub fn validate_field(field: &str, value: Option<&Value>, rule: &ValidationRule) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let text = value.map(value_as_text).unwrap_or_default();

    if rule.required && text.is_empty() {
        errors.push(FieldError::new(field, "field is required", None));
        return errors;
    }

    if text.is_empty() {
        return errors;
    }

    if detect_sql_injection(&text) {
        errors.push(FieldError::new(
            field,
            "potentially dangerous content detected",
            Some(REDACTED.to_string()),
        ));
    }

    if rule.min_length > 0 && text.len() < rule.min_length {
        errors.push(FieldError::new(
            field,
            format!("minimum length is {} characters", rule.min_length),
            Some(text.clone()),
        ));
    }

    if rule.max_length > 0 && text.len() > rule.max_length {
        errors.push(FieldError::new(
            field,
            format!("maximum length is {} characters", rule.max_length),
            Some(truncate_for_display(&text)),
        ));
    }

    if !rule.allowed_chars.is_empty() && !text.chars().all(|c| rule.allowed_chars.contains(c)) {
        errors.push(FieldError::new(
            field,
            "field contains invalid characters",
            Some(text.clone()),
        ));
    }

    if let Some(pattern) = &rule.pattern {
        if !pattern.is_match(&text) {
            errors.push(FieldError::new(
                field,
                "field format is invalid",
                Some(text.clone()),
            ));
        }
    }

    if let (Some(custom), Some(value)) = (&rule.custom, value) {
        if let Err(message) = custom(value) {
            errors.push(FieldError::new(field, message, Some(text.clone())));
        }
    }

    errors
}

/// Endpoint-keyed validation registry
#[derive(Debug, Clone, Default)]
pub struct Validator {
    configs: HashMap<String, ValidationConfig>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator preloaded with the management API's standard endpoints
    pub fn standard() -> Self {
        let mut validator = Self::new();

        let username = ValidationRule::required()
            .min_length(3)
            .max_length(50)
            .pattern(USERNAME_PATTERN.clone())
            .sanitized();
        let password = ValidationRule::required().min_length(12).max_length(100);
        let json_post = |max_request_size| ValidationConfig {
            max_request_size,
            allowed_methods: vec!["POST".to_string()],
            required_headers: vec!["Content-Type".to_string()],
            rules: BTreeMap::new(),
        };

        validator.set_config(
            "/api/v1/auth/login",
            json_post(1024)
                .rule("username", username.clone())
                .rule("password", password.clone()),
        );

        validator.set_config(
            "/api/v1/users",
            json_post(2048)
                .rule("username", username)
                .rule(
                    "email",
                    ValidationRule::required()
                        .max_length(100)
                        .pattern(EMAIL_PATTERN.clone())
                        .sanitized(),
                )
                .rule("password", password.clone())
                .rule(
                    "full_name",
                    ValidationRule::optional().max_length(100).sanitized(),
                ),
        );

        validator.set_config(
            "/api/v1/auth/change-password",
            json_post(1024)
                .rule("current_password", ValidationRule::required())
                .rule("new_password", password),
        );

        validator
    }

    pub fn set_config(&mut self, endpoint: impl Into<String>, config: ValidationConfig) {
        self.configs.insert(endpoint.into(), config);
    }

    pub fn config(&self, endpoint: &str) -> Option<&ValidationConfig> {
        self.configs.get(endpoint)
    }

    /// Size, method and header checks done before the body is parsed
    pub fn check_envelope(
        &self,
        endpoint: &str,
        method: &str,
        content_length: Option<u64>,
        header_names: &[&str],
    ) -> Result<(), EnvelopeError> {
        let Some(config) = self.configs.get(endpoint) else {
            return Ok(());
        };

        if config.max_request_size > 0
            && content_length.is_some_and(|len| len > config.max_request_size)
        {
            return Err(EnvelopeError::TooLarge);
        }

        if !config.allowed_methods.is_empty()
            && !config.allowed_methods.iter().any(|m| m == method)
        {
            return Err(EnvelopeError::MethodNotAllowed);
        }

        for required in &config.required_headers {
            if !header_names.iter().any(|h| h.eq_ignore_ascii_case(required)) {
                return Err(EnvelopeError::MissingHeader(required.clone()));
            }
        }

        Ok(())
    }

    /// Validate a decoded JSON body against the endpoint's rules
    pub fn validate_request(&self, endpoint: &str, data: &Map<String, Value>) -> ValidationOutcome {
        let Some(config) = self.configs.get(endpoint) else {
            return ValidationOutcome {
                valid: true,
                errors: Vec::new(),
                data: data
                    .iter()
                    .map(|(field, value)| (field.clone(), sanitize_value(field, value)))
                    .collect(),
            };
        };

        let mut errors = Vec::new();
        let mut cleaned = Map::new();

        for (field, rule) in &config.rules {
            let value = data.get(field);
            let field_errors = validate_field(field, value, rule);

            if let Some(value) = value {
                let sanitize = rule.sanitize && field_errors.is_empty() && !is_password_field(field);
                let stored = match value {
                    Value::String(s) if sanitize => Value::String(sanitize_string(s)),
                    other => other.clone(),
                };
                cleaned.insert(field.clone(), stored);
            }

            errors.extend(field_errors);
        }

        for (field, value) in data {
            if config.rules.contains_key(field) {
                continue;
            }
            cleaned.insert(field.clone(), sanitize_value(field, value));
        }

        if !errors.is_empty() {
            tracing::debug!(endpoint, violations = errors.len(), "Request failed validation");
        }

        ValidationOutcome {
            valid: errors.is_empty(),
            errors,
            data: cleaned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test body must be an object"),
        }
    }

    #[test]
    fn test_required_missing_short_circuits() {
        let rule = ValidationRule::required().min_length(5).pattern(Regex::new("^x$").unwrap());
        let errors = validate_field("name", None, &rule);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "field is required");

        let errors = validate_field("name", Some(&json!("")), &rule);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_optional_empty_passes() {
        let rule = ValidationRule::optional().min_length(5);
        assert!(validate_field("name", None, &rule).is_empty());
        assert!(validate_field("name", Some(&Value::Null), &rule).is_empty());
    }

    #[test]
    fn test_errors_accumulate() {
        let rule = ValidationRule::required()
            .min_length(40)
            .pattern(Regex::new("^[a-z]+$").unwrap());
        let errors = validate_field("q", Some(&json!("1 OR 1=1")), &rule);
        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "potentially dangerous content detected",
                "minimum length is 40 characters",
                "field format is invalid",
            ]
        );
    }

    #[test]
    fn test_max_length_truncates_value() {
        let rule = ValidationRule::optional().max_length(10);
        let long = "a".repeat(80);
        let errors = validate_field("bio", Some(&json!(long)), &rule);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].value.as_deref(), Some(&*format!("{}...", "a".repeat(50))));
    }

    #[test]
    fn test_allowed_chars() {
        let rule = ValidationRule::optional().allowed_chars("0123456789");
        assert!(validate_field("pin", Some(&json!("1234")), &rule).is_empty());
        assert_eq!(validate_field("pin", Some(&json!("12a4")), &rule).len(), 1);
    }

    #[test]
    fn test_custom_validator() {
        let rule = ValidationRule::optional().custom(|v| match v.as_u64() {
            Some(n) if n <= 100 => Ok(()),
            _ => Err("must be at most 100".to_string()),
        });
        assert!(validate_field("limit", Some(&json!(50)), &rule).is_empty());
        let errors = validate_field("limit", Some(&json!(500)), &rule);
        assert_eq!(errors[0].message, "must be at most 100");
        assert_eq!(errors[0].value.as_deref(), Some("500"));
    }

    #[test]
    fn test_standard_login() {
        let validator = Validator::standard();
        let outcome = validator.validate_request(
            "/api/v1/auth/login",
            &body(json!({"username": "alice", "password": "correct horse battery <staple>"})),
        );
        assert!(outcome.valid, "{:?}", outcome.errors);
        assert_eq!(outcome.data["password"], json!("correct horse battery <staple>"));
        assert_eq!(outcome.data["username"], json!("alice"));
    }

    #[test]
    fn test_standard_login_reports_every_violation() {
        let validator = Validator::standard();
        let outcome = validator.validate_request(
            "/api/v1/auth/login",
            &body(json!({"username": "a!", "password": "short"})),
        );
        assert!(!outcome.valid);
        let fields: Vec<_> = outcome.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"username"));
        assert!(fields.contains(&"password"));
    }

    #[test]
    fn test_unruled_fields_sanitized_except_passwords() {
        let validator = Validator::standard();
        let outcome = validator.validate_request(
            "/api/v1/auth/login",
            &body(json!({
                "username": "alice",
                "password": "correct horse battery",
                "note": "<b>hi</b>",
                "backup_password": "<keep & exact>",
            })),
        );
        assert_eq!(outcome.data["note"], json!("&lt;b&gt;hi&lt;/b&gt;"));
        assert_eq!(outcome.data["backup_password"], json!("<keep & exact>"));
    }

    #[test]
    fn test_unknown_endpoint_gets_basic_sanitization() {
        let validator = Validator::standard();
        let data = body(json!({
            "anything": "<script>x</script>",
            "password": "<keep>",
            "count": 3,
        }));
        let outcome = validator.validate_request("/nope", &data);
        assert!(outcome.valid);
        assert!(outcome.errors.is_empty());
        assert_eq!(
            outcome.data["anything"],
            json!("&lt;script&gt;x&lt;/script&gt;")
        );
        assert_eq!(outcome.data["password"], json!("<keep>"));
        assert_eq!(outcome.data["count"], json!(3));
    }

    #[test]
    fn test_dangerous_content_is_redacted() {
        let rule = ValidationRule::required();
        let errors = validate_field("password", Some(&json!("hunter2 union select secretpw")), &rule);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "potentially dangerous content detected");
        assert_eq!(errors[0].value.as_deref(), Some("[REDACTED]"));
    }

    #[test]
    fn test_check_envelope() {
        let validator = Validator::standard();
        let endpoint = "/api/v1/auth/login";
        assert_eq!(
            validator.check_envelope(endpoint, "POST", Some(100), &["content-type"]),
            Ok(())
        );
        assert_eq!(
            validator.check_envelope(endpoint, "POST", Some(4096), &["Content-Type"]),
            Err(EnvelopeError::TooLarge)
        );
        assert_eq!(
            validator.check_envelope(endpoint, "GET", None, &["Content-Type"]),
            Err(EnvelopeError::MethodNotAllowed)
        );
        let missing = validator.check_envelope(endpoint, "POST", None, &[]);
        assert_eq!(
            missing,
            Err(EnvelopeError::MissingHeader("Content-Type".to_string()))
        );
        assert_eq!(missing.unwrap_err().kind(), ErrorKind::BadRequest);
        assert_eq!(validator.check_envelope("/free", "DELETE", None, &[]), Ok(()));
    }

    #[test]
    fn test_field_error_serialization() {
        let error = FieldError::new("email", "field is required", None);
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"field":"email","message":"field is required"}"#);
    }
}
