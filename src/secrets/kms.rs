//! Encryption key resolution.
//!
//! Operators reference a key by alias, ID or ARN. Backends that encrypt (or
//! ask the service to encrypt) need the canonical ARN, so the reference is
//! resolved once before the backend is built and the result is carried in
//! [`SyncContext`](crate::config::SyncContext).

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::clients::KeyService;
use crate::errors::{Result, SyncError};

/// A canonical key ARN returned by the key service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedKey(String);

impl ResolvedKey {
    /// Wrap `arn` after checking it has the
    /// `arn:partition:service:region:account:resource` shape.
    pub fn parse(arn: impl Into<String>) -> Result<Self> {
        let arn = arn.into();
        let parts: Vec<&str> = arn.splitn(6, ':').collect();

        let well_formed = parts.len() == 6
            && parts[0] == "arn"
            && !parts[1].is_empty()
            && !parts[2].is_empty()
            && !parts[5].is_empty();

        if !well_formed {
            return Err(SyncError::key_resolution(
                arn.clone(),
                format!("'{}' is not a valid ARN", arn),
            ));
        }

        Ok(Self(arn))
    }

    pub fn arn(&self) -> &str {
        &self.0
    }

    /// The service segment, `kms` for keys from the key service.
    pub fn service(&self) -> &str {
        self.0.split(':').nth(2).unwrap_or_default()
    }
}

impl fmt::Display for ResolvedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves key references through a [`KeyService`].
#[derive(Clone)]
pub struct KeyResolver {
    keys: Arc<dyn KeyService>,
}

impl KeyResolver {
    pub fn new(keys: Arc<dyn KeyService>) -> Self {
        Self { keys }
    }

    /// Resolve an alias, key ID or ARN to the key's canonical ARN.
    ///
    /// Lookup failures and malformed responses both surface as
    /// [`SyncError::KeyResolution`] naming the original reference.
    pub async fn resolve(&self, reference: &str) -> Result<ResolvedKey> {
        if reference.trim().is_empty() {
            return Err(SyncError::key_resolution(reference, "key reference is empty"));
        }

        debug!(reference = %reference, "describing KMS key");
        let arn = self
            .keys
            .describe_key(reference)
            .await
            .map_err(|e| SyncError::key_resolution(reference, e.to_string()))?;

        let key = ResolvedKey::parse(arn)
            .map_err(|e| SyncError::key_resolution(reference, e.to_string()))?;

        info!(reference = %reference, arn = %key, "resolved KMS key");
        Ok(key)
    }
}

impl fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::mock::MockKeyService;

    const ARN: &str = "arn:aws:kms:us-east-1:111122223333:key/1234abcd-12ab-34cd-56ef-1234567890ab";

    #[test]
    fn test_parse_accepts_key_arn() {
        let key = ResolvedKey::parse(ARN).unwrap();
        assert_eq!(key.arn(), ARN);
        assert_eq!(key.service(), "kms");
        assert_eq!(key.to_string(), ARN);
    }

    #[test]
    fn test_parse_rejects_non_arns() {
        for bad in ["", "alias/app", "1234abcd", "arn:aws:kms", "arn::kms:r:a:key/x", "urn:a:b:c:d:e"] {
            let err = ResolvedKey::parse(bad).unwrap_err();
            assert!(matches!(err, SyncError::KeyResolution { .. }), "accepted {bad:?}");
        }
    }

    #[tokio::test]
    async fn test_resolve_alias() {
        let keys = Arc::new(MockKeyService::new().with_key("alias/app", ARN));
        let resolver = KeyResolver::new(keys.clone());

        let key = resolver.resolve("alias/app").await.unwrap();
        assert_eq!(key.arn(), ARN);
        assert_eq!(keys.describe_calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown_reference() {
        let resolver = KeyResolver::new(Arc::new(MockKeyService::new()));

        let err = resolver.resolve("alias/missing").await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("alias/missing"));
    }

    #[tokio::test]
    async fn test_resolve_malformed_response() {
        let keys = MockKeyService::new().with_key("alias/odd", "not-an-arn");
        let resolver = KeyResolver::new(Arc::new(keys));

        let err = resolver.resolve("alias/odd").await.unwrap_err();
        assert!(matches!(err, SyncError::KeyResolution { ref reference, .. } if reference == "alias/odd"));
    }

    #[tokio::test]
    async fn test_resolve_empty_reference_skips_service() {
        let keys = Arc::new(MockKeyService::new());
        let resolver = KeyResolver::new(keys.clone());

        assert!(resolver.resolve("  ").await.is_err());
        assert_eq!(keys.describe_calls(), 0);
    }
}
