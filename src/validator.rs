// SPDX-License-Identifier: PMPL-1.0-or-later

//! Schema validation for the public forms.
//!
//! Payloads arrive as raw JSON bodies. Every rule is checked and all failures
//! are reported together; on success the form is normalised (trimmed, email
//! lowercased) into a typed record.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All field failures for one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Whether `field` has at least one failure.
    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.iter().map(|e| e.field).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for FieldErrors {}

/// Raw contact/inquiry form as posted by the browser.
///
/// Fields hold the JSON value as sent, so a wrongly typed field is reported
/// on its own. `None` means absent; an explicit `null` is `Some(Value::Null)`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionForm {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub email: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub inquiry_type: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub links: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub message: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub turnstile_token: Option<Value>,
}

/// Raw newsletter form.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterForm {
    #[serde(default, deserialize_with = "present")]
    pub email: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub turnstile_token: Option<Value>,
}

// Keeps `null` distinguishable from a missing key.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// How a single raw field presents itself.
enum Input<'a> {
    Missing,
    Text(&'a str),
    NotText,
}

impl<'a> Input<'a> {
    fn of(value: &'a Option<Value>) -> Self {
        match value {
            None => Input::Missing,
            Some(Value::String(text)) => Input::Text(text.as_str()),
            Some(_) => Input::NotText,
        }
    }
}

/// A validated, normalised submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSubmission {
    pub name: String,
    pub email: String,
    pub inquiry_type: String,
    pub links: String,
    pub message: String,
    pub turnstile_token: String,
}

/// A validated, normalised newsletter signup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignup {
    pub email: String,
    pub turnstile_token: String,
}

const NAME_LEN: (usize, usize) = (2, 80);
const INQUIRY_TYPE_LEN: (usize, usize) = (2, 80);
const MESSAGE_LEN: (usize, usize) = (10, 2000);
const LINKS_MAX: usize = 300;
const EMAIL_MAX: usize = 120;
const TOKEN_MIN: usize = 10;

/// Decode a request body into `T`. Empty, non-JSON or non-object bodies
/// decode as `T::default()` so that every field is reported as missing.
pub fn parse_body<T>(body: &[u8]) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return T::default();
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_else(|e| {
            debug!(error = %e, "Form body could not be decoded");
            T::default()
        }),
        Ok(_) | Err(_) => {
            debug!("Form body is not a JSON object");
            T::default()
        }
    }
}

/// Validate a contact/inquiry submission.
pub fn validate_submission(form: &SubmissionForm) -> Result<ValidSubmission, FieldErrors> {
    let mut errors = FieldErrors::default();

    check_length(&mut errors, "name", &form.name, NAME_LEN);
    check_email(&mut errors, &form.email);
    check_length(&mut errors, "inquiryType", &form.inquiry_type, INQUIRY_TYPE_LEN);
    match Input::of(&form.links) {
        Input::Missing => {}
        Input::NotText => errors.push("links", NOT_TEXT),
        Input::Text(links) if char_len(links) > LINKS_MAX => {
            errors.push("links", format!("must be at most {} characters", LINKS_MAX))
        }
        Input::Text(_) => {}
    }
    check_length(&mut errors, "message", &form.message, MESSAGE_LEN);
    check_token(&mut errors, &form.turnstile_token);

    if !errors.is_empty() {
        debug!(%errors, "Submission failed validation");
        return Err(errors);
    }

    Ok(ValidSubmission {
        name: text(&form.name).trim().to_string(),
        email: normalize_email(text(&form.email)),
        inquiry_type: text(&form.inquiry_type).trim().to_string(),
        links: text(&form.links).trim().to_string(),
        message: text(&form.message).trim().to_string(),
        turnstile_token: text(&form.turnstile_token).to_string(),
    })
}

/// Validate a newsletter signup.
pub fn validate_signup(form: &NewsletterForm) -> Result<ValidSignup, FieldErrors> {
    let mut errors = FieldErrors::default();

    check_email(&mut errors, &form.email);
    check_token(&mut errors, &form.turnstile_token);

    if !errors.is_empty() {
        debug!(%errors, "Newsletter signup failed validation");
        return Err(errors);
    }

    Ok(ValidSignup {
        email: normalize_email(text(&form.email)),
        turnstile_token: text(&form.turnstile_token).to_string(),
    })
}

/// Lowercase and trim an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

const NOT_TEXT: &str = "must be a string";

// Only called once validation has passed.
fn text(value: &Option<Value>) -> &str {
    match value {
        Some(Value::String(text)) => text.as_str(),
        _ => "",
    }
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn check_length(
    errors: &mut FieldErrors,
    field: &'static str,
    value: &Option<Value>,
    (min, max): (usize, usize),
) {
    match Input::of(value) {
        Input::Missing => errors.push(field, "is required"),
        Input::NotText => errors.push(field, NOT_TEXT),
        Input::Text(text) if char_len(text) < min => {
            errors.push(field, format!("must be at least {} characters", min))
        }
        Input::Text(text) if char_len(text) > max => {
            errors.push(field, format!("must be at most {} characters", max))
        }
        Input::Text(_) => {}
    }
}

fn check_email(errors: &mut FieldErrors, value: &Option<Value>) {
    match Input::of(value) {
        Input::Missing => errors.push("email", "is required"),
        Input::NotText => errors.push("email", NOT_TEXT),
        Input::Text(email) if !is_email(email) => {
            errors.push("email", "must be a valid email address")
        }
        Input::Text(email) if char_len(email) > EMAIL_MAX => {
            errors.push("email", format!("must be at most {} characters", EMAIL_MAX))
        }
        Input::Text(_) => {}
    }
}

fn check_token(errors: &mut FieldErrors, value: &Option<Value>) {
    match Input::of(value) {
        Input::Missing => errors.push("turnstileToken", "is required"),
        Input::NotText => errors.push("turnstileToken", NOT_TEXT),
        Input::Text(token) if char_len(token) < TOKEN_MIN => {
            errors.push("turnstileToken", "is invalid")
        }
        Input::Text(_) => {}
    }
}

/// Structural email check: one `@`, a non-empty local part without
/// whitespace or dot-edge problems, and a dotted domain of alphanumeric
/// labels with a TLD of at least two letters.
pub fn is_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    let local_ok = local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._%+-'".contains(c));
    if !local_ok {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    let tld = labels[labels.len() - 1];
    labels_ok && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}
