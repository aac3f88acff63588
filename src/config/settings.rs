//! # Configuration Settings
//!
//! Defines the configuration for a sync run and the context handed to the
//! backend factory once the encryption key has been resolved.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{Result, SyncError};
use crate::secrets::backends::s3::DEFAULT_STORAGE_CLASS;
use crate::secrets::backends::BackendKind;
use crate::secrets::clients::ParameterTier;
use crate::secrets::kms::ResolvedKey;

/// Configuration for a sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SyncConfig {
    /// Backend name, matched case-insensitively
    pub backend: String,

    /// DynamoDB table name
    pub table: Option<String>,

    /// S3 bucket name
    pub bucket: Option<String>,

    /// KMS key alias, ID or ARN
    pub kms_key: Option<String>,

    /// S3 storage class
    #[validate(length(min = 1, message = "Storage class cannot be empty"))]
    pub storage_class: String,

    /// SSM parameter tier
    pub parameter_tier: ParameterTier,

    /// AWS region override
    #[validate(length(min = 1, message = "Region cannot be empty"))]
    pub region: Option<String>,

    /// AWS endpoint override, for local stacks
    pub endpoint_url: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backend: String::new(),
            table: None,
            bucket: None,
            kms_key: None,
            storage_class: DEFAULT_STORAGE_CLASS.to_string(),
            parameter_tier: ParameterTier::Standard,
            region: None,
            endpoint_url: None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl SyncConfig {
    pub fn for_backend(backend: impl Into<String>) -> Self {
        Self { backend: backend.into(), ..Self::default() }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_kms_key(mut self, kms_key: impl Into<String>) -> Self {
        self.kms_key = Some(kms_key.into());
        self
    }

    pub fn with_parameter_tier(mut self, tier: ParameterTier) -> Self {
        self.parameter_tier = tier;
        self
    }

    pub fn with_storage_class(mut self, storage_class: impl Into<String>) -> Self {
        self.storage_class = storage_class.into();
        self
    }

    /// Treat blank optional settings as unset.
    ///
    /// Environment variables exported as empty strings arrive as `Some("")`.
    pub fn normalized(self) -> Self {
        Self {
            table: non_empty(self.table),
            bucket: non_empty(self.bucket),
            kms_key: non_empty(self.kms_key),
            region: non_empty(self.region),
            endpoint_url: non_empty(self.endpoint_url),
            ..self
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(SyncError::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint_url {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(SyncError::validation(
                    "Endpoint URL must start with 'http://' or 'https://'",
                ));
            }
        }
        Ok(())
    }

    /// Parse the configured backend name.
    pub fn backend_kind(&self) -> Result<BackendKind> {
        self.backend.parse()
    }

    /// Table name, required by the dynamodb backend.
    pub fn require_table(&self) -> Result<&str> {
        self.table.as_deref().filter(|t| !t.is_empty()).ok_or_else(|| {
            SyncError::missing_configuration(BackendKind::DynamoDb.as_str(), "table name")
        })
    }

    /// Bucket name, required by the s3 backend.
    pub fn require_bucket(&self) -> Result<&str> {
        self.bucket.as_deref().filter(|b| !b.is_empty()).ok_or_else(|| {
            SyncError::missing_configuration(BackendKind::S3.as_str(), "bucket name")
        })
    }

    /// Key reference, required by backends that encrypt with a named key.
    pub fn require_kms_key(&self, kind: BackendKind) -> Result<&str> {
        self.kms_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SyncError::missing_configuration(kind.as_str(), "KMS key"))
    }
}

/// Configuration plus the resolved encryption key, built once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncContext {
    config: SyncConfig,
    key: Option<ResolvedKey>,
}

impl SyncContext {
    pub fn new(config: SyncConfig, key: Option<ResolvedKey>) -> Self {
        Self { config, key }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn key(&self) -> Option<&ResolvedKey> {
        self.key.as_ref()
    }

    /// The resolved key, for backends that cannot be built without one.
    pub fn require_key(&self, kind: BackendKind) -> Result<&ResolvedKey> {
        self.key
            .as_ref()
            .ok_or_else(|| SyncError::missing_configuration(kind.as_str(), "resolved KMS key"))
    }
}

/// Interpret an environment flag value. Only the usual spellings of true
/// count; anything else, including unparseable text, is false.
pub fn parse_truthy(value: &str) -> bool {
    matches!(value, "1" | "t" | "T" | "TRUE" | "true" | "True")
}

/// Read a boolean flag from the environment. Unset means false.
pub fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|value| parse_truthy(&value)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage_class, "STANDARD");
        assert_eq!(config.parameter_tier, ParameterTier::Standard);
    }

    #[test]
    fn test_empty_storage_class_is_invalid() {
        let config = SyncConfig::for_backend("s3").with_storage_class("");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
        assert!(err.to_string().contains("Storage class cannot be empty"));
    }

    #[test]
    fn test_endpoint_scheme_is_checked() {
        let mut config = SyncConfig::for_backend("ssm");
        config.endpoint_url = Some("localhost:4566".to_string());
        assert!(config.validate().is_err());

        config.endpoint_url = Some("http://localhost:4566".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_normalized_drops_blank_values() {
        let mut config = SyncConfig::for_backend("dynamodb").with_table("").with_kms_key("  ");
        config.region = Some(String::new());
        let config = config.normalized();
        assert_eq!(config.table, None);
        assert_eq!(config.kms_key, None);
        assert_eq!(config.region, None);
    }

    #[test]
    fn test_required_settings() {
        let config = SyncConfig::for_backend("dynamodb");
        assert!(matches!(config.require_table(), Err(SyncError::MissingConfiguration { .. })));
        assert!(config.require_bucket().is_err());
        assert!(config.require_kms_key(BackendKind::DynamoDb).is_err());

        let config = config.with_table("secrets").with_bucket("b").with_kms_key("alias/app");
        assert_eq!(config.require_table().unwrap(), "secrets");
        assert_eq!(config.require_bucket().unwrap(), "b");
        assert_eq!(config.require_kms_key(BackendKind::S3).unwrap(), "alias/app");
    }

    #[test]
    fn test_context_requires_key() {
        let context = SyncContext::new(SyncConfig::for_backend("s3"), None);
        let err = context.require_key(BackendKind::S3).unwrap_err();
        assert!(err.to_string().contains("s3"));
    }

    #[test]
    fn test_parse_truthy() {
        for value in ["1", "t", "T", "TRUE", "true", "True"] {
            assert!(parse_truthy(value), "{value} should be true");
        }
        for value in ["0", "f", "F", "FALSE", "false", "False", "", "alwet", "yes", " true"] {
            assert!(!parse_truthy(value), "{value} should be false");
        }
    }

    #[test]
    fn test_env_flag() {
        std::env::set_var("AWS_SECRETS_SYNC_TEST_FLAG_SET", "true");
        std::env::set_var("AWS_SECRETS_SYNC_TEST_FLAG_BAD", "alwet");
        assert!(env_flag("AWS_SECRETS_SYNC_TEST_FLAG_SET"));
        assert!(!env_flag("AWS_SECRETS_SYNC_TEST_FLAG_BAD"));
        assert!(!env_flag("AWS_SECRETS_SYNC_TEST_FLAG_UNSET"));
    }
}
