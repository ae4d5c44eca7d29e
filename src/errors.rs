//! Error types for the license activation client.
//!
//! Every failure is returned to the immediate caller as a value. Nothing in
//! this crate retries or treats an error as fatal; the caller decides what
//! the user gets to see.

use thiserror::Error;

use crate::api::errors::ApiError;

/// Errors produced by the activation client, its store and its config.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The licensing service reported an error.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// The service answered with something that is not the expected JSON.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A field failed validation on assignment.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A completeness check failed; carries every missing-field message.
    #[error("validation failed: {}", .0.join(", "))]
    ValidationFailed(Vec<String>),

    /// The stored activation state does not allow the requested operation.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("storage error: {0}")]
    StorageError(#[from] std::io::Error),

    #[error("keyring error: {0}")]
    KeyringError(#[from] keyring::Error),

    #[error("encryption error: {0}")]
    EncryptionError(String),

    #[error("decryption error: {0}")]
    DecryptionError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl LicenseError {
    /// Returns the API error code when the service reported the failure.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            LicenseError::Api(err) => Some(err.code.as_str()),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type LicenseResult<T> = Result<T, LicenseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_failed_lists_every_message() {
        let err = LicenseError::ValidationFailed(vec![
            "Missing License Key".to_string(),
            "Missing Product Id".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: Missing License Key, Missing Product Id"
        );
    }

    #[test]
    fn api_code_is_exposed_for_api_errors_only() {
        let err = LicenseError::Api(ApiError::new("license_expired", "License has expired"));
        assert_eq!(err.api_code(), Some("license_expired"));

        let err = LicenseError::Precondition("not activated".to_string());
        assert_eq!(err.api_code(), None);
    }
}
