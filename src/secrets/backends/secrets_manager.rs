//! Secrets Manager backend
//!
//! Writes a new version of an existing secret. Text is sent as the secret
//! string; every other shape is coerced to bytes and sent as the secret
//! binary. The service encrypts with the secret's own key.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::backend::{warn_if_oversized, BackendKind, StorageBackend};
use crate::errors::Result;
use crate::secrets::clients::{PutSecretValueRequest, SecretPayload, SecretService};
use crate::secrets::value::{SecretKey, SecretValue};

pub struct SecretsManagerBackend {
    secrets: Arc<dyn SecretService>,
}

impl std::fmt::Debug for SecretsManagerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsManagerBackend").finish_non_exhaustive()
    }
}

impl SecretsManagerBackend {
    pub fn new(secrets: Arc<dyn SecretService>) -> Self {
        Self { secrets }
    }
}

#[async_trait]
impl StorageBackend for SecretsManagerBackend {
    fn kms_required(&self) -> bool {
        false
    }

    async fn store(&self, key: &SecretKey, value: SecretValue) -> Result<()> {
        let descriptor = BackendKind::SecretsManager.descriptor();
        warn_if_oversized(descriptor.kind, descriptor.size_limit_bytes, key, value.known_len());

        let payload = match value {
            SecretValue::Text(text) => SecretPayload::String(text),
            other => SecretPayload::Binary(other.into_bytes().await?),
        };

        let output = self
            .secrets
            .put_secret_value(PutSecretValueRequest { secret_id: key.to_string(), payload })
            .await?;

        debug!(
            key = %key,
            version_id = output.version_id.as_deref().unwrap_or("unknown"),
            "secret version written"
        );
        Ok(())
    }
}
