//! Spoolman request and response payloads.

use serde::{Deserialize, Serialize};

/// Subset of `GET /api/v1/spool/{id}` the adapter depends on.
#[derive(Debug, Deserialize)]
pub(super) struct SpoolDto {
    #[serde(default)]
    pub(super) used_weight: f64,
}

/// `PATCH /api/v1/spool/{id}` body updating consumption.
#[derive(Debug, Serialize)]
pub(super) struct UsagePatchDto {
    pub(super) used_weight: f64,
}

/// `PATCH /api/v1/spool/{id}` body updating (or clearing) the location.
#[derive(Debug, Serialize)]
pub(super) struct LocationPatchDto<'a> {
    pub(super) location: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn spool_decoding_ignores_unrelated_fields() {
        let body = r#"{"id":12,"used_weight":131.5,"remaining_weight":868.5,"filament":{"id":3}}"#;
        let spool: SpoolDto = serde_json::from_str(body).expect("decode");
        assert!((spool.used_weight - 131.5).abs() < f64::EPSILON);
    }

    #[rstest]
    fn clearing_location_sends_null() {
        let body = serde_json::to_string(&LocationPatchDto { location: None }).expect("encode");
        assert_eq!(body, r#"{"location":null}"#);
    }
}
