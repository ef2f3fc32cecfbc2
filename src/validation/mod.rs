use serde_json::Value;
use std::fmt;

/// Each listing is a single physical item, so an order always covers exactly one unit.
pub const SINGLE_UNIT_QUANTITY: i64 = 1;
pub const QUANTITY_MESSAGE: &str = "Each product is single unit only. Quantity must be 1.";
pub const SHIPPING_ADDRESS_MAX_LEN: usize = 500;
pub const BUYER_PHONE_MAX_LEN: usize = 32;
pub const TRACKING_NUMBER_MAX_LEN: usize = 100;
pub const NOTES_MAX_LEN: usize = 1000;
pub const ACTOR_MAX_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Collapses every run of whitespace (newlines included) to one space and drops the remaining
/// control characters.
pub fn sanitize_string(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| word.chars().filter(|ch| !ch.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sanitizes optional free text; blank input is treated as absent.
pub fn sanitize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(sanitize_string)
        .filter(|sanitized| !sanitized.is_empty())
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Absent quantity means one unit. A present value must be a JSON number equal to one, so
/// `1.0` passes while `null`, strings and fractions are rejected.
pub fn validate_quantity(quantity: Option<&Value>) -> Result<u32, ValidationError> {
    let Some(value) = quantity else {
        return Ok(1);
    };

    let is_one = match value {
        Value::Number(n) => match n.as_i64() {
            Some(whole) => whole == SINGLE_UNIT_QUANTITY,
            None => n.as_f64() == Some(1.0),
        },
        _ => false,
    };

    if is_one {
        Ok(1)
    } else {
        Err(ValidationError::new("quantity", QUANTITY_MESSAGE))
    }
}

pub fn validate_optional_text(
    field: &'static str,
    value: Option<&str>,
    max_len: usize,
) -> Result<Option<String>, ValidationError> {
    let sanitized = sanitize_optional(value);
    if let Some(text) = &sanitized {
        validate_max_len(field, text, max_len)?;
    }

    Ok(sanitized)
}
