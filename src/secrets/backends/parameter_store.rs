//! SSM Parameter Store backend
//!
//! Every value is written as a `SecureString` parameter, overwriting any
//! existing version. Only text values are accepted. When the operator
//! supplied a KMS key the resolved ARN is passed as the parameter key,
//! otherwise the service default key applies.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::backend::{
    warn_if_oversized, BackendKind, StorageBackend, PARAMETER_ADVANCED_LIMIT,
    PARAMETER_STANDARD_LIMIT,
};
use crate::errors::{Result, SyncError};
use crate::secrets::clients::{ParameterService, ParameterTier, PutParameterRequest};
use crate::secrets::kms::ResolvedKey;
use crate::secrets::value::{SecretKey, SecretValue};

pub struct ParameterStoreBackend {
    parameters: Arc<dyn ParameterService>,
    tier: ParameterTier,
    key: Option<ResolvedKey>,
}

impl std::fmt::Debug for ParameterStoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStoreBackend")
            .field("tier", &self.tier)
            .field("key", &self.key)
            .finish()
    }
}

impl ParameterStoreBackend {
    pub fn new(
        parameters: Arc<dyn ParameterService>,
        tier: ParameterTier,
        key: Option<ResolvedKey>,
    ) -> Self {
        Self { parameters, tier, key }
    }

    pub fn tier(&self) -> ParameterTier {
        self.tier
    }

    fn size_limit(&self) -> usize {
        match self.tier {
            ParameterTier::Standard => PARAMETER_STANDARD_LIMIT,
            ParameterTier::Advanced => PARAMETER_ADVANCED_LIMIT,
        }
    }
}

#[async_trait]
impl StorageBackend for ParameterStoreBackend {
    fn kms_required(&self) -> bool {
        false
    }

    async fn store(&self, key: &SecretKey, value: SecretValue) -> Result<()> {
        let text = match value {
            SecretValue::Text(text) => text,
            other => {
                return Err(SyncError::unsupported_value_type(
                    BackendKind::ParameterStore.as_str(),
                    other.type_name(),
                    "expected a string",
                ))
            }
        };

        warn_if_oversized(BackendKind::ParameterStore, Some(self.size_limit()), key, Some(text.len()));

        let request = PutParameterRequest {
            name: key.to_string(),
            value: text,
            tier: self.tier,
            overwrite: true,
            key_id: self.key.as_ref().map(|k| k.arn().to_string()),
        };

        let version = self.parameters.put_parameter(request).await?;
        debug!(key = %key, version, "parameter written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::mock::MockParameterService;

    const ARN: &str = "arn:aws:kms:eu-west-1:111122223333:key/param-key";

    #[tokio::test]
    async fn test_store_text_with_default_key() {
        let parameters = Arc::new(MockParameterService::new());
        let backend = ParameterStoreBackend::new(parameters.clone(), ParameterTier::Standard, None);

        backend.store(&SecretKey::new("/app/token").unwrap(), "abc".into()).await.unwrap();

        let requests = parameters.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name, "/app/token");
        assert_eq!(requests[0].value.expose_secret(), "abc");
        assert_eq!(requests[0].tier, ParameterTier::Standard);
        assert!(requests[0].overwrite);
        assert_eq!(requests[0].key_id, None);
        assert!(!backend.kms_required());
    }

    #[tokio::test]
    async fn test_store_with_operator_key_and_advanced_tier() {
        let parameters = Arc::new(MockParameterService::new());
        let key = ResolvedKey::parse(ARN).unwrap();
        let backend =
            ParameterStoreBackend::new(parameters.clone(), ParameterTier::Advanced, Some(key));

        backend.store(&SecretKey::new("/app/large").unwrap(), "v".into()).await.unwrap();

        let requests = parameters.requests();
        assert_eq!(requests[0].key_id.as_deref(), Some(ARN));
        assert_eq!(requests[0].tier, ParameterTier::Advanced);
        assert_eq!(backend.tier(), ParameterTier::Advanced);
    }

    #[tokio::test]
    async fn test_rejects_non_text_values() {
        let parameters = Arc::new(MockParameterService::new());
        let backend = ParameterStoreBackend::new(parameters.clone(), ParameterTier::Standard, None);
        let key = SecretKey::new("/app/bin").unwrap();

        let err = backend.store(&key, SecretValue::bytes(vec![1, 2, 3])).await.unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedValueType { value_type: "binary", .. }));

        let number = SecretValue::from_json(serde_json::json!(42)).unwrap();
        let err = backend.store(&key, number).await.unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedValueType { value_type: "number", .. }));

        let err = backend.store(&key, SecretValue::stream(tokio::io::empty())).await.unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedValueType { value_type: "stream", .. }));

        assert!(parameters.requests().is_empty());
    }

    #[tokio::test]
    async fn test_service_failure() {
        let parameters = Arc::new(MockParameterService::new().fail_on("/denied"));
        let backend = ParameterStoreBackend::new(parameters, ParameterTier::Standard, None);

        let err = backend.store(&SecretKey::new("/denied").unwrap(), "v".into()).await.unwrap_err();
        assert!(matches!(err, SyncError::Upstream { .. }));
    }
}
