//! # aws-secrets-sync
//!
//! Writes key/value secrets into one of four AWS storage services: a
//! DynamoDB table, SSM Parameter Store, Secrets Manager or an S3 bucket.
//!
//! ## Architecture
//!
//! ```text
//! input ─► envelope decoding ─► JSON objects ─► Dispatcher ─► StorageBackend::store
//!          (plain/base64/gzip)    (key, value)                 │
//!                                                              ├─► KMS encrypt (dynamodb)
//!                                                              └─► service write
//! ```
//!
//! - [`secrets::envelope`] strips optional base64 and gzip layers from batch input
//! - [`secrets::value`] holds the accepted value shapes and their byte coercion
//! - [`secrets::backends`] implements one [`StorageBackend`] per service and the
//!   [`BackendRegistry`] that builds them
//! - [`secrets::kms`] resolves the operator's key reference once per run
//! - [`dispatch`] stores each pair, counting failures without stopping
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use aws_secrets_sync::{
//!     secrets::{aws::load_service_clients, envelope::EnvelopeSource},
//!     Submission, SyncConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> aws_secrets_sync::Result<()> {
//!     let config = SyncConfig::for_backend("ssm");
//!     let clients = load_service_clients(&config).await;
//!     let batch = Submission::Batch(EnvelopeSource::Inline(r#"{"/app/token": "abc"}"#.into()));
//!
//!     let result = aws_secrets_sync::sync(config, clients, batch).await?;
//!     std::process::exit(result.exit_code().into());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod observability;
pub mod secrets;

// Re-export commonly used types and traits
pub use config::{SyncConfig, SyncContext};
pub use dispatch::{BatchResult, Dispatcher, Submission};
pub use errors::{Result, SyncError};
pub use secrets::backends::{BackendKind, BackendRegistry, StorageBackend};
pub use secrets::clients::ServiceClients;
pub use secrets::value::{SecretKey, SecretValue};

use tracing::info;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Build the configured backend and run one submission against it.
///
/// Construction failures and a failed single pair are returned as errors.
/// Batch item failures are counted in the returned [`BatchResult`].
pub async fn sync(
    config: SyncConfig,
    clients: ServiceClients,
    submission: Submission,
) -> Result<BatchResult> {
    let registry = BackendRegistry::new(clients);
    let (context, backend) = registry.prepare(config).await?;

    info!(
        app_name = APP_NAME,
        version = VERSION,
        backend = %context.config().backend.to_ascii_lowercase(),
        kms_key = context.key().map(|k| k.arn()).unwrap_or("none"),
        "starting sync"
    );

    Dispatcher::new(backend.as_ref()).run(submission).await
}
