use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required value is missing or blank.
    #[error("`{field}` must be set{hint}")]
    MissingValue {
        field: &'static str,
        hint: &'static str,
    },
    /// The UTC offset cannot be represented as a fixed offset.
    #[error("`timezone.utc_offset_hours` must be between -23 and 23, got {0}")]
    UtcOffsetOutOfRange(i32),
    /// A zero timeout would fail every request immediately.
    #[error("`secrets.timeout_secs` cannot be zero")]
    ZeroTimeout,
}

impl ValidationError {
    pub(crate) fn missing(field: &'static str) -> Self {
        ValidationError::MissingValue { field, hint: "" }
    }

    pub(crate) fn missing_with_hint(field: &'static str, hint: &'static str) -> Self {
        ValidationError::MissingValue { field, hint }
    }
}
