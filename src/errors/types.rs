//! # Error Types
//!
//! Error taxonomy for the submission pipeline using `thiserror`.
//!
//! Errors fall into two groups. Construction-time errors (unknown backend,
//! missing configuration, key resolution, configuration validation) stop the
//! process before any secret is written. Per-item errors are recorded by the
//! dispatcher and processing moves on to the next pair.

/// Custom result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for the secrets sync pipeline
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    /// Empty or otherwise unusable secret key
    #[error("Invalid key: {reason}")]
    InvalidKey { reason: String },

    /// Absent or empty secret value
    #[error("Invalid value: {reason}")]
    InvalidValue { reason: String },

    /// The target backend cannot represent the value's type
    #[error("{backend} does not support {value_type} values, {expected}")]
    UnsupportedValueType {
        backend: String,
        value_type: &'static str,
        expected: &'static str,
    },

    /// Encryption key reference did not resolve to an existing key
    #[error("Failed to resolve KMS key '{reference}': {message}")]
    KeyResolution { reference: String, message: String },

    /// Backend name outside the supported set
    #[error("Backend '{name}' is not valid, must be one of: {supported}")]
    UnknownBackend { name: String, supported: String },

    /// Backend-specific prerequisite is absent
    #[error("Missing required {what} for {backend} backend")]
    MissingConfiguration { backend: String, what: String },

    /// Configuration rule violations
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Any wrapped-service call failure, including encryption and write
    #[error("{operation} failed: {message}")]
    Upstream { operation: String, message: String },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// JSON decoding errors
    #[error("{context}: {source}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },
}

impl SyncError {
    /// Create an invalid key error
    pub fn invalid_key<S: Into<String>>(reason: S) -> Self {
        Self::InvalidKey { reason: reason.into() }
    }

    /// Create an invalid value error
    pub fn invalid_value<S: Into<String>>(reason: S) -> Self {
        Self::InvalidValue { reason: reason.into() }
    }

    /// Create an unsupported value type error
    pub fn unsupported_value_type<B: Into<String>>(
        backend: B,
        value_type: &'static str,
        expected: &'static str,
    ) -> Self {
        Self::UnsupportedValueType { backend: backend.into(), value_type, expected }
    }

    /// Create a key resolution error
    pub fn key_resolution<R: Into<String>, M: Into<String>>(reference: R, message: M) -> Self {
        Self::KeyResolution { reference: reference.into(), message: message.into() }
    }

    /// Create an unknown backend error
    pub fn unknown_backend<N: Into<String>, S: Into<String>>(name: N, supported: S) -> Self {
        Self::UnknownBackend { name: name.into(), supported: supported.into() }
    }

    /// Create a missing configuration error
    pub fn missing_configuration<B: Into<String>, W: Into<String>>(backend: B, what: W) -> Self {
        Self::MissingConfiguration { backend: backend.into(), what: what.into() }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Create an upstream failure for a named service operation
    pub fn upstream<O: Into<String>, M: ToString>(operation: O, message: M) -> Self {
        Self::Upstream { operation: operation.into(), message: message.to_string() }
    }

    /// Create an I/O error with context
    pub fn io<S: Into<String>>(source: std::io::Error, context: S) -> Self {
        Self::Io { source, context: context.into() }
    }

    /// Whether this error must stop the process before any batch processing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::UnknownBackend { .. }
                | SyncError::MissingConfiguration { .. }
                | SyncError::KeyResolution { .. }
                | SyncError::Validation { .. }
        )
    }
}

// Error conversions for common external error types
impl From<std::io::Error> for SyncError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "error decoding json".to_string() }
    }
}

impl From<validator::ValidationErrors> for SyncError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
