//! S3 object store backend
//!
//! Each secret becomes one object in the configured bucket, encrypted at rest
//! with `aws:kms` server-side encryption under the resolved key. Streamed
//! values are handed to the object service as streams; every other shape is
//! coerced to bytes first.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::backend::StorageBackend;
use crate::errors::Result;
use crate::secrets::clients::{ObjectBody, ObjectService, PutObjectRequest};
use crate::secrets::kms::ResolvedKey;
use crate::secrets::value::{SecretKey, SecretValue};

/// Storage class used when none is configured.
pub const DEFAULT_STORAGE_CLASS: &str = "STANDARD";

pub struct S3Backend {
    objects: Arc<dyn ObjectService>,
    bucket: String,
    storage_class: String,
    key: ResolvedKey,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("storage_class", &self.storage_class)
            .field("key", &self.key)
            .finish()
    }
}

impl S3Backend {
    pub fn new(
        objects: Arc<dyn ObjectService>,
        bucket: impl Into<String>,
        storage_class: impl Into<String>,
        key: ResolvedKey,
    ) -> Self {
        Self { objects, bucket: bucket.into(), storage_class: storage_class.into(), key }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn kms_required(&self) -> bool {
        true
    }

    async fn store(&self, key: &SecretKey, value: SecretValue) -> Result<()> {
        let body = match value {
            SecretValue::Stream(reader) => ObjectBody::Stream(reader),
            other => ObjectBody::Bytes(other.into_bytes().await?),
        };

        let request = PutObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            body,
            sse_kms_key_id: self.key.arn().to_string(),
            storage_class: self.storage_class.clone(),
        };

        let etag = self.objects.put_object(request).await?;
        debug!(bucket = %self.bucket, key = %key, etag = etag.as_deref().unwrap_or(""), "object written");
        Ok(())
    }
}
