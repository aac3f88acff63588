//! Storage backend registry
//!
//! Turns a backend name and a [`SyncContext`] into a ready-to-use
//! [`StorageBackend`]. All checks that can fail before the first write
//! happen here, in a fixed order:
//!
//! 1. the backend name is one of the supported names
//! 2. backend-specific settings (table, bucket) are present
//! 3. the encryption key is resolved, when the backend uses one
//! 4. the backend is built; the table backend introspects its table
//!
//! Every failure in these steps is fatal for the run.

use tracing::{debug, info};

use super::backend::{BackendKind, KeyUsage, StorageBackend};
use super::dynamodb::DynamoDbBackend;
use super::parameter_store::ParameterStoreBackend;
use super::s3::S3Backend;
use super::secrets_manager::SecretsManagerBackend;
use crate::config::{SyncConfig, SyncContext};
use crate::errors::Result;
use crate::secrets::clients::ServiceClients;
use crate::secrets::kms::{KeyResolver, ResolvedKey};

/// Builds storage backends over a shared set of service clients.
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    clients: ServiceClients,
    resolver: KeyResolver,
}

impl BackendRegistry {
    pub fn new(clients: ServiceClients) -> Self {
        let resolver = KeyResolver::new(clients.keys.clone());
        Self { clients, resolver }
    }

    /// Names accepted by [`BackendRegistry::create_backend`].
    pub fn supported_backends() -> [BackendKind; 4] {
        BackendKind::ALL
    }

    /// Check the settings `kind` needs, without calling any service.
    pub fn check_prerequisites(kind: BackendKind, config: &SyncConfig) -> Result<()> {
        match kind {
            BackendKind::DynamoDb => {
                config.require_table()?;
                config.require_kms_key(kind)?;
            }
            BackendKind::S3 => {
                config.require_bucket()?;
                config.require_kms_key(kind)?;
            }
            BackendKind::ParameterStore | BackendKind::SecretsManager => {}
        }
        Ok(())
    }

    /// Resolve the configured key if `kind` uses one.
    ///
    /// Required keys are always resolved. Optional keys are resolved only
    /// when supplied. Backends that do not use a key never trigger a lookup.
    pub async fn resolve_key(
        &self,
        kind: BackendKind,
        config: &SyncConfig,
    ) -> Result<Option<ResolvedKey>> {
        match kind.descriptor().key_usage {
            KeyUsage::Required => {
                let reference = config.require_kms_key(kind)?;
                self.resolver.resolve(reference).await.map(Some)
            }
            KeyUsage::Optional => match config.kms_key.as_deref() {
                Some(reference) if !reference.is_empty() => {
                    self.resolver.resolve(reference).await.map(Some)
                }
                _ => Ok(None),
            },
            KeyUsage::Unused => {
                if config.kms_key.is_some() {
                    debug!(backend = %kind, "ignoring KMS key, the backend encrypts with its own key");
                }
                Ok(None)
            }
        }
    }

    /// Build the backend named `name` from an already prepared context.
    pub async fn create_backend(
        &self,
        name: &str,
        context: &SyncContext,
    ) -> Result<Box<dyn StorageBackend>> {
        let kind: BackendKind = name.parse()?;
        let config = context.config();
        Self::check_prerequisites(kind, config)?;

        let backend: Box<dyn StorageBackend> = match kind {
            BackendKind::DynamoDb => Box::new(
                DynamoDbBackend::with_table(
                    self.clients.tables.clone(),
                    self.clients.keys.clone(),
                    config.require_table()?,
                    context.require_key(kind)?.clone(),
                )
                .await?,
            ),
            BackendKind::ParameterStore => Box::new(ParameterStoreBackend::new(
                self.clients.parameters.clone(),
                config.parameter_tier,
                context.key().cloned(),
            )),
            BackendKind::SecretsManager => {
                Box::new(SecretsManagerBackend::new(self.clients.secrets.clone()))
            }
            BackendKind::S3 => Box::new(S3Backend::new(
                self.clients.objects.clone(),
                config.require_bucket()?,
                config.storage_class.clone(),
                context.require_key(kind)?.clone(),
            )),
        };

        info!(backend = %kind, "storage backend ready");
        Ok(backend)
    }

    /// Validate `config`, resolve its key and build the configured backend.
    pub async fn prepare(
        &self,
        config: SyncConfig,
    ) -> Result<(SyncContext, Box<dyn StorageBackend>)> {
        config.validate()?;
        let kind = config.backend_kind()?;
        Self::check_prerequisites(kind, &config)?;

        let key = self.resolve_key(kind, &config).await?;
        let context = SyncContext::new(config, key);
        let backend = self.create_backend(kind.as_str(), &context).await?;

        Ok((context, backend))
    }

    pub fn clients(&self) -> &ServiceClients {
        &self.clients
    }
}

/// Resolve, validate and build in one step. See [`BackendRegistry::prepare`].
pub async fn create_backend(
    config: SyncConfig,
    clients: ServiceClients,
) -> Result<(SyncContext, Box<dyn StorageBackend>)> {
    BackendRegistry::new(clients).prepare(config).await
}
