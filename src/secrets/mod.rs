//! Secret values, storage backends and the services behind them.
//!
//! # Architecture
//!
//! Backends never talk to AWS directly. Each one holds a handle to a
//! capability trait from [`clients`], so the same backend code runs against
//! the SDK clients in [`aws`] or the in-memory doubles in `mock` (feature `test-support`):
//!
//! ```text
//! StorageBackend ──► KeyService / TableService / ParameterService
//!                    SecretService / ObjectService
//!                        │                    │
//!                    aws::Aws*Service     mock::Mock*Service
//! ```
//!
//! Values flow in as a [`SecretValue`] and are coerced to bytes only when a
//! backend needs bytes. Text is kept in a redacting [`SecretString`].

pub mod aws;
pub mod backends;
pub mod clients;
pub mod envelope;
pub mod kms;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;
pub mod types;
pub mod value;

pub use backends::{BackendKind, BackendRegistry, StorageBackend};
pub use clients::ServiceClients;
pub use envelope::{decode_envelope, Encoding, Envelope, EnvelopeSource};
pub use kms::{KeyResolver, ResolvedKey};
pub use types::SecretString;
pub use value::{to_bytes, SecretKey, SecretValue, ValueStream};
