//! Schema checks for lead and activity payloads.
//!
//! Raw request bodies deserialize into the loose `*Input` structs below and
//! are then turned into the typed payloads in `models` (`NewLead`,
//! `LeadPatch`, `NewActivity`). Every failed check is collected so the caller
//! sees all offending fields at once.
use bigdecimal::BigDecimal;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::errors::{AppError, FieldError};
use crate::models::{ActivityType, LeadPatch, LeadStatus, LeadType, NewActivity, NewLead};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .expect("email regex is valid")
});

/// Body of a create request. Every field is optional at this stage so that
/// missing required fields are reported as validation errors rather than
/// deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadInput {
    pub lead_type: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub notes: Option<String>,
    pub call_recording: Option<String>,
    pub estimate: Option<Value>,
    pub mao: Option<Value>,
    pub offer_price: Option<Value>,
    pub equity: Option<Value>,
    pub status: Option<String>,
}

/// Body of a partial update. Outer `None` means the key was absent, inner
/// `None` means it was sent as `null`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadUpdateInput {
    #[serde(default, deserialize_with = "double_option")]
    pub lead_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub state: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub zip_code: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub call_recording: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub estimate: Option<Option<Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub mao: Option<Option<Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub offer_price: Option<Option<Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub equity: Option<Option<Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub status: Option<Option<String>>,
}

/// Body of an activity create request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInput {
    pub lead_id: Option<String>,
    pub activity_type: Option<String>,
    pub description: Option<String>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Validate email address shape (`local@domain.tld`).
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') {
        return false;
    }

    EMAIL_REGEX.is_match(email)
}

/// Validate an absolute URL such as a call-recording link.
pub fn is_valid_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(parsed) => parsed.has_host(),
        Err(_) => false,
    }
}

/// Empty or whitespace-only text normalizes to absent.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_enum<T: FromStr>(field: &str, raw: &str, errors: &mut Vec<FieldError>) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(FieldError::new(field, e.to_string()));
            None
        }
    }
}

/// Reads a JSON number, or a string holding one, as an exact decimal.
///
/// Blank strings count as absent.
fn parse_decimal(
    field: &str,
    value: Option<&Value>,
    errors: &mut Vec<FieldError>,
) -> Option<BigDecimal> {
    let parsed = match value? {
        Value::Null => return None,
        Value::Number(n) => BigDecimal::from_str(&n.to_string()),
        Value::String(s) if s.trim().is_empty() => return None,
        Value::String(s) => BigDecimal::from_str(s.trim()),
        _ => {
            errors.push(FieldError::new(field, "Expected a number"));
            return None;
        }
    };

    match parsed {
        Ok(decimal) => Some(decimal),
        Err(_) => {
            errors.push(FieldError::new(field, "Expected a number"));
            None
        }
    }
}

fn check_name(name: &str, errors: &mut Vec<FieldError>) {
    if name.trim().is_empty() {
        errors.push(FieldError::new("name", "Name is required"));
    }
}

fn check_email(email: Option<&str>, errors: &mut Vec<FieldError>) {
    if let Some(email) = email {
        if !is_valid_email(email) {
            errors.push(FieldError::new("email", "Invalid email"));
        }
    }
}

fn check_call_recording(url: Option<&str>, errors: &mut Vec<FieldError>) {
    if let Some(url) = url {
        if !is_valid_url(url) {
            errors.push(FieldError::new("callRecording", "Invalid URL"));
        }
    }
}

fn check_non_negative(field: &str, amount: Option<&BigDecimal>, errors: &mut Vec<FieldError>) {
    if let Some(amount) = amount {
        if *amount < BigDecimal::from(0) {
            errors.push(FieldError::new(field, "Must be zero or greater"));
        }
    }
}

/// Invariant checks shared by direct entry and CSV import.
pub fn check_new_lead(lead: &NewLead) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_name(&lead.name, &mut errors);
    check_email(lead.email.as_deref(), &mut errors);
    check_call_recording(lead.call_recording.as_deref(), &mut errors);
    check_non_negative("estimate", lead.estimate.as_ref(), &mut errors);
    check_non_negative("mao", lead.mao.as_ref(), &mut errors);
    check_non_negative("offerPrice", lead.offer_price.as_ref(), &mut errors);
    errors
}

/// Full schema, used on create.
pub fn validate_new_lead(input: LeadInput) -> Result<NewLead, AppError> {
    let mut errors = Vec::new();

    let lead_type = match non_blank(input.lead_type) {
        Some(raw) => parse_enum::<LeadType>("leadType", &raw, &mut errors),
        None => {
            errors.push(FieldError::new("leadType", "Lead type is required"));
            None
        }
    };
    let status = match non_blank(input.status) {
        Some(raw) => parse_enum::<LeadStatus>("status", &raw, &mut errors),
        None => Some(LeadStatus::default()),
    };

    let estimate = parse_decimal("estimate", input.estimate.as_ref(), &mut errors);
    let mao = parse_decimal("mao", input.mao.as_ref(), &mut errors);
    let offer_price = parse_decimal("offerPrice", input.offer_price.as_ref(), &mut errors);
    let equity = parse_decimal("equity", input.equity.as_ref(), &mut errors);

    let name = input.name.unwrap_or_default();
    let email = non_blank(input.email);
    let call_recording = non_blank(input.call_recording);

    check_name(&name, &mut errors);
    check_email(email.as_deref(), &mut errors);
    check_call_recording(call_recording.as_deref(), &mut errors);
    check_non_negative("estimate", estimate.as_ref(), &mut errors);
    check_non_negative("mao", mao.as_ref(), &mut errors);
    check_non_negative("offerPrice", offer_price.as_ref(), &mut errors);

    match (lead_type, status) {
        (Some(lead_type), Some(status)) if errors.is_empty() => Ok(NewLead {
            lead_type,
            name,
            phone: non_blank(input.phone),
            email,
            address: non_blank(input.address),
            city: non_blank(input.city),
            state: non_blank(input.state),
            zip_code: non_blank(input.zip_code),
            notes: non_blank(input.notes),
            call_recording,
            estimate,
            mao,
            offer_price,
            equity,
            status,
        }),
        _ => Err(AppError::Validation(errors)),
    }
}

fn required_patch<T: FromStr>(
    field: &str,
    value: Option<Option<String>>,
    errors: &mut Vec<FieldError>,
) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => None,
        Some(None) => {
            errors.push(FieldError::new(field, "Cannot be cleared"));
            None
        }
        Some(Some(raw)) => parse_enum::<T>(field, &raw, errors),
    }
}

fn text_patch(value: Option<Option<String>>) -> Option<Option<String>> {
    value.map(non_blank)
}

fn decimal_patch(
    field: &str,
    value: Option<Option<Value>>,
    errors: &mut Vec<FieldError>,
) -> Option<Option<BigDecimal>> {
    value.map(|inner| parse_decimal(field, inner.as_ref(), errors))
}

/// Partial schema, used on update: every field is optional but checked if present.
pub fn validate_lead_patch(input: LeadUpdateInput) -> Result<LeadPatch, AppError> {
    let mut errors = Vec::new();

    let lead_type = required_patch::<LeadType>("leadType", input.lead_type, &mut errors);
    let status = required_patch::<LeadStatus>("status", input.status, &mut errors);

    let name = match input.name {
        None => None,
        Some(name) => {
            let name = name.unwrap_or_default();
            check_name(&name, &mut errors);
            Some(name)
        }
    };

    let patch = LeadPatch {
        lead_type,
        name,
        phone: text_patch(input.phone),
        email: text_patch(input.email),
        address: text_patch(input.address),
        city: text_patch(input.city),
        state: text_patch(input.state),
        zip_code: text_patch(input.zip_code),
        notes: text_patch(input.notes),
        call_recording: text_patch(input.call_recording),
        estimate: decimal_patch("estimate", input.estimate, &mut errors),
        mao: decimal_patch("mao", input.mao, &mut errors),
        offer_price: decimal_patch("offerPrice", input.offer_price, &mut errors),
        equity: decimal_patch("equity", input.equity, &mut errors),
        status,
    };

    check_email(patch.email.clone().flatten().as_deref(), &mut errors);
    check_call_recording(patch.call_recording.clone().flatten().as_deref(), &mut errors);
    check_non_negative("estimate", patch.estimate.clone().flatten().as_ref(), &mut errors);
    check_non_negative("mao", patch.mao.clone().flatten().as_ref(), &mut errors);
    check_non_negative(
        "offerPrice",
        patch.offer_price.clone().flatten().as_ref(),
        &mut errors,
    );

    if errors.is_empty() {
        Ok(patch)
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Validates an activity payload. Whether the lead exists is checked later
/// against the store.
pub fn validate_new_activity(input: ActivityInput) -> Result<NewActivity, AppError> {
    let mut errors = Vec::new();

    let lead_id = match non_blank(input.lead_id) {
        Some(raw) => match Uuid::parse_str(raw.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.push(FieldError::new("leadId", "Invalid lead id"));
                None
            }
        },
        None => {
            errors.push(FieldError::new("leadId", "Lead id is required"));
            None
        }
    };

    let activity_type = match non_blank(input.activity_type) {
        Some(raw) => parse_enum::<ActivityType>("activityType", &raw, &mut errors),
        None => {
            errors.push(FieldError::new("activityType", "Activity type is required"));
            None
        }
    };

    let description = input.description.unwrap_or_default();
    if description.trim().is_empty() {
        errors.push(FieldError::new("description", "Description is required"));
    }

    match (lead_id, activity_type) {
        (Some(lead_id), Some(activity_type)) if errors.is_empty() => Ok(NewActivity {
            lead_id,
            activity_type,
            description,
        }),
        _ => Err(AppError::Validation(errors)),
    }
}
