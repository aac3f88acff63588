//! Pluggable storage backend architecture
//!
//! Each backend writes secrets to one AWS service through the capability
//! traits in [`crate::secrets::clients`]. The set of backends is closed and
//! chosen by name at startup through [`BackendRegistry`].
//!
//! ## Supported Backends
//!
//! - **dynamodb**: one item per secret, value encrypted client-side with KMS
//! - **ssm**: `SecureString` parameters, text values only
//! - **secretsmanager**: new secret versions, text or binary
//! - **s3**: one object per secret, SSE-KMS at rest

pub mod backend;
pub mod dynamodb;
pub mod parameter_store;
pub mod registry;
pub mod s3;
pub mod secrets_manager;

pub use backend::{BackendDescriptor, BackendKind, KeyUsage, StorageBackend};
pub use dynamodb::DynamoDbBackend;
pub use parameter_store::ParameterStoreBackend;
pub use registry::{create_backend, BackendRegistry};
pub use s3::S3Backend;
pub use secrets_manager::SecretsManagerBackend;
