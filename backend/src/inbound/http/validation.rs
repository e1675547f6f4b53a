//! Shared validation helpers for inbound HTTP adapters.
//!
//! Path and query values arrive as strings; these helpers turn them into
//! domain identifiers and report failures as `invalid_request` errors whose
//! details name the offending field.

use serde_json::json;
use uuid::Uuid;

use crate::domain::{
    DeviceId, DeviceValidationError, Error, LocationName, PairingValidationError,
    ReconciliationErrorId, SpoolId, ToolheadIndex,
};

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidDeviceId,
    InvalidToolhead,
    InvalidSpoolId,
    InvalidUuid,
    InvalidLocation,
    InvalidDevice,
    InvalidUsage,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidDeviceId => "invalid_device_id",
            ErrorCode::InvalidToolhead => "invalid_toolhead",
            ErrorCode::InvalidSpoolId => "invalid_spool_id",
            ErrorCode::InvalidUuid => "invalid_uuid",
            ErrorCode::InvalidLocation => "invalid_location",
            ErrorCode::InvalidDevice => "invalid_device",
            ErrorCode::InvalidUsage => "invalid_usage",
        }
    }
}

/// Newtype wrapper for HTTP field names to provide type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    fn as_str(&self) -> &str {
        self.0
    }
}

/// Builder for validation errors with field context.
struct ValidationError {
    field: String,
    message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    fn with_code(self, code: ErrorCode) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "code": code.as_str(),
        }))
    }

    fn with_value(self, code: ErrorCode, value: impl Into<String>) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "value": value.into(),
            "code": code.as_str(),
        }))
    }
}

pub(crate) fn parse_device_id(value: &str, field: FieldName) -> Result<DeviceId, Error> {
    DeviceId::new(value).map_err(|err| {
        ValidationError::new(field.as_str(), format!("{}: {err}", field.as_str()))
            .with_value(ErrorCode::InvalidDeviceId, value)
    })
}

pub(crate) fn parse_toolhead(value: &str, field: FieldName) -> Result<ToolheadIndex, Error> {
    value.trim().parse::<u16>().map(ToolheadIndex::new).map_err(|_| {
        ValidationError::new(
            field.as_str(),
            format!("{} must be a zero-based toolhead index", field.as_str()),
        )
        .with_value(ErrorCode::InvalidToolhead, value)
    })
}

pub(crate) fn parse_spool_id(value: i64, field: FieldName) -> Result<SpoolId, Error> {
    SpoolId::new(value).map_err(|err| {
        ValidationError::new(field.as_str(), err.to_string())
            .with_value(ErrorCode::InvalidSpoolId, value.to_string())
    })
}

pub(crate) fn parse_error_id(value: &str, field: FieldName) -> Result<ReconciliationErrorId, Error> {
    Uuid::parse_str(value)
        .map(ReconciliationErrorId::from_uuid)
        .map_err(|_| {
            ValidationError::new(field.as_str(), format!("{} must be a valid UUID", field.as_str()))
                .with_value(ErrorCode::InvalidUuid, value)
        })
}

pub(crate) fn parse_location(value: String, field: FieldName) -> Result<LocationName, Error> {
    LocationName::new(value).map_err(|err: PairingValidationError| {
        ValidationError::new(field.as_str(), err.to_string()).with_code(ErrorCode::InvalidLocation)
    })
}

/// Report a device draft rejected by domain validation.
pub(crate) fn invalid_device_error(err: &DeviceValidationError) -> Error {
    let field = match err {
        DeviceValidationError::EmptyId
        | DeviceValidationError::IdTooLong { .. }
        | DeviceValidationError::InvalidIdCharacters => "id",
        DeviceValidationError::EmptyName | DeviceValidationError::NameTooLong { .. } => "name",
        DeviceValidationError::InvalidAddress { .. } => "address",
        DeviceValidationError::ToolheadCountOutOfRange { .. }
        | DeviceValidationError::ToolheadOutOfRange { .. } => "toolheadCount",
    };
    ValidationError::new(field, err.to_string()).with_code(ErrorCode::InvalidDevice)
}

/// Report a usage map entry that is not a valid toolhead/grams pair.
pub(crate) fn invalid_usage_error(field: FieldName, key: &str, message: &str) -> Error {
    ValidationError::new(field.as_str(), format!("{}: {message}", field.as_str()))
        .with_value(ErrorCode::InvalidUsage, key)
}
