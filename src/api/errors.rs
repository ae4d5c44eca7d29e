//! Error bodies reported by the licensing service.
//!
//! The service wraps failures as:
//!
//! ```json
//! {
//!   "error": {
//!     "type": "LicenseNotFound",
//!     "message": "Invalid license key.",
//!     "code": "license_not_found",
//!     "http": 404
//!   }
//! }
//! ```
//!
//! `code` has been seen both as a string and as a number, and some endpoints
//! answer with a bare string in place of the object, so parsing goes through
//! `serde_json::Value` instead of a strict derive.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Code used when the service reports an error without one.
pub const UNKNOWN_ERROR_CODE: &str = "unknown";

/// An error reported by the licensing service (code + message).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message, suitable for showing to an administrator.
    pub message: String,
    /// HTTP status the service attached to the error, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<u16>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            http: None,
        }
    }

    /// Top-level error for a failed HTTP exchange whose body carried no
    /// usable JSON.
    pub fn from_status(status: StatusCode) -> Self {
        Self {
            code: format!("http_{}", status.as_u16()),
            message: status
                .canonical_reason()
                .unwrap_or("Unexpected HTTP status")
                .to_string(),
            http: Some(status.as_u16()),
        }
    }

    /// Parse the value of an `error` field.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => {
                let code = match map.get("code") {
                    Some(Value::String(s)) if !s.is_empty() => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    _ => UNKNOWN_ERROR_CODE.to_string(),
                };
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let http = map
                    .get("http")
                    .and_then(Value::as_u64)
                    .and_then(|h| u16::try_from(h).ok());
                Self {
                    code,
                    message,
                    http,
                }
            }
            Value::String(message) => Self::new(UNKNOWN_ERROR_CODE, message.clone()),
            other => Self::new(UNKNOWN_ERROR_CODE, other.to_string()),
        }
    }

    /// Extract the `error` field of a decoded response body, if any.
    pub fn from_body(body: &Value) -> Option<Self> {
        match body.get("error") {
            None | Some(Value::Null) => None,
            Some(err) => Some(Self::from_value(err)),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_service_error_body() {
        let body = json!({
            "error": {
                "type": "LicenseNotFound",
                "message": "Invalid license key.",
                "code": "license_not_found",
                "http": 404
            }
        });

        let err = ApiError::from_body(&body).expect("error field present");
        assert_eq!(err.code, "license_not_found");
        assert_eq!(err.message, "Invalid license key.");
        assert_eq!(err.http, Some(404));
    }

    #[test]
    fn numeric_code_is_kept_as_text() {
        let err = ApiError::from_value(&json!({"code": 401, "message": "Unauthorized"}));
        assert_eq!(err.code, "401");
    }

    #[test]
    fn bare_string_error_becomes_message() {
        let err = ApiError::from_value(&json!("Something broke"));
        assert_eq!(err.code, UNKNOWN_ERROR_CODE);
        assert_eq!(err.message, "Something broke");
    }

    #[test]
    fn null_error_field_is_not_an_error() {
        assert!(ApiError::from_body(&json!({"error": null, "id": 5})).is_none());
        assert!(ApiError::from_body(&json!({"id": 5})).is_none());
    }

    #[test]
    fn status_error_carries_reason() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY);
        assert_eq!(err.code, "http_502");
        assert_eq!(err.message, "Bad Gateway");
        assert_eq!(err.to_string(), "http_502: Bad Gateway");
    }
}
