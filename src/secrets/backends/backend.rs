//! Storage backend trait and types
//!
//! Defines the interface every storage variant implements and the static
//! facts the factory needs about each variant before building it.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{Result, SyncError};
use crate::secrets::value::{SecretKey, SecretValue};

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Key-value table, values encrypted client-side
    DynamoDb,
    /// Hierarchical parameter store, secure strings
    #[serde(rename = "ssm")]
    ParameterStore,
    /// Dedicated secret vault
    SecretsManager,
    /// Object store with server-side encryption
    S3,
}

/// How a backend uses the operator's encryption key reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    /// A key must be supplied and resolved before the backend is built
    Required,
    /// Resolved and passed on only when the operator supplies one
    Optional,
    /// Ignored; the service encrypts with its own default key
    Unused,
}

/// Static facts about a backend variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub key_usage: KeyUsage,
    /// Service-imposed payload ceiling, advisory only
    pub size_limit_bytes: Option<usize>,
}

impl BackendDescriptor {
    pub fn kms_required(&self) -> bool {
        self.key_usage == KeyUsage::Required
    }
}

/// Item payload ceiling for client-side encryption of a table value.
pub const TABLE_VALUE_LIMIT: usize = 4096;
/// Standard tier parameter ceiling.
pub const PARAMETER_STANDARD_LIMIT: usize = 4096;
/// Advanced tier parameter ceiling.
pub const PARAMETER_ADVANCED_LIMIT: usize = 8192;
/// Secret value ceiling.
pub const SECRET_VALUE_LIMIT: usize = 7168;

impl BackendKind {
    pub const ALL: [BackendKind; 4] =
        [Self::DynamoDb, Self::S3, Self::SecretsManager, Self::ParameterStore];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DynamoDb => "dynamodb",
            Self::ParameterStore => "ssm",
            Self::SecretsManager => "secretsmanager",
            Self::S3 => "s3",
        }
    }

    /// Supported names, comma separated, for error messages and help text.
    pub fn supported_names() -> String {
        Self::ALL.iter().map(|kind| kind.as_str()).collect::<Vec<_>>().join(", ")
    }

    pub fn descriptor(&self) -> BackendDescriptor {
        let (key_usage, size_limit_bytes) = match self {
            Self::DynamoDb => (KeyUsage::Required, Some(TABLE_VALUE_LIMIT)),
            Self::ParameterStore => (KeyUsage::Optional, Some(PARAMETER_STANDARD_LIMIT)),
            Self::SecretsManager => (KeyUsage::Unused, Some(SECRET_VALUE_LIMIT)),
            Self::S3 => (KeyUsage::Required, None),
        };
        BackendDescriptor { kind: *self, key_usage, size_limit_bytes }
    }

    pub fn kms_required(&self) -> bool {
        self.descriptor().kms_required()
    }
}

impl FromStr for BackendKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SyncError::unknown_backend(s, Self::supported_names()))
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for storage backends
///
/// Implementations must be Send + Sync for use in async contexts. A backend
/// is built once per process and only ever writes.
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Whether this backend needed a resolved encryption key to be built
    fn kms_required(&self) -> bool;

    /// Write one value under `key`, completely or not at all
    ///
    /// Keys and values have already been checked for presence. Backends
    /// reject value shapes they cannot represent with
    /// [`SyncError::UnsupportedValueType`] and report service failures as
    /// [`SyncError::Upstream`].
    async fn store(&self, key: &SecretKey, value: SecretValue) -> Result<()>;
}

/// Log a warning when a value of known size exceeds a service ceiling.
///
/// The value is still sent unchanged; the service decides whether to accept it.
pub(crate) fn warn_if_oversized(
    backend: BackendKind,
    limit: Option<usize>,
    key: &SecretKey,
    size: Option<usize>,
) {
    if let (Some(limit), Some(size)) = (limit, size) {
        if size > limit {
            warn!(
                backend = %backend,
                key = %key,
                size,
                limit,
                "value exceeds the backend size limit, the write may be rejected"
            );
        }
    }
}
