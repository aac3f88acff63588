//! In-memory service clients and a recording backend.
//!
//! Used by the crate's own tests and by downstream tests that want to drive
//! the pipeline without network access. Every mock records what it was asked
//! to do and can be told to fail for a given key.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use super::backends::StorageBackend;
use super::clients::{
    AttributeValue, KeyService, ObjectBody, ObjectService, ParameterService, PutItemRequest,
    PutObjectRequest, PutParameterRequest, PutSecretValueOutput, PutSecretValueRequest,
    SecretService, ServiceClients, TableDescription, TableService,
};
use super::value::{SecretKey, SecretValue};
use crate::errors::{Result, SyncError};

/// Largest plaintext the key service accepts for direct encryption.
pub const MAX_ENCRYPT_BYTES: usize = 4096;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn access_denied(operation: &str, key: &str) -> SyncError {
    SyncError::upstream(operation, format!("AccessDeniedException: not allowed to write {}", key))
}

/// Key service backed by a reference-to-ARN map. Encryption is the identity.
#[derive(Debug, Default)]
pub struct MockKeyService {
    keys: HashMap<String, String>,
    describe_calls: AtomicUsize,
    encrypted: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MockKeyService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `reference` as resolving to `arn`. The ARN also resolves to itself.
    pub fn with_key(mut self, reference: impl Into<String>, arn: impl Into<String>) -> Self {
        let arn = arn.into();
        self.keys.insert(arn.clone(), arn.clone());
        self.keys.insert(reference.into(), arn);
        self
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    /// `(key_id, plaintext)` pairs passed to `encrypt`, in call order.
    pub fn encrypted(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.encrypted).clone()
    }
}

#[async_trait]
impl KeyService for MockKeyService {
    async fn describe_key(&self, reference: &str) -> Result<String> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        self.keys.get(reference).cloned().ok_or_else(|| {
            SyncError::upstream("kms:DescribeKey", format!("NotFoundException: {} is not found", reference))
        })
    }

    async fn encrypt(&self, key_id: &str, plaintext: Vec<u8>) -> Result<Vec<u8>> {
        if plaintext.is_empty() || plaintext.len() > MAX_ENCRYPT_BYTES {
            return Err(SyncError::upstream(
                "kms:Encrypt",
                format!("plaintext must be between 1 and {} bytes", MAX_ENCRYPT_BYTES),
            ));
        }
        lock(&self.encrypted).push((key_id.to_string(), plaintext.clone()));
        Ok(plaintext)
    }
}

/// Table service holding described tables and written items.
#[derive(Debug, Default)]
pub struct MockTableService {
    tables: HashMap<String, TableDescription>,
    failing: HashSet<String>,
    items: Mutex<Vec<PutItemRequest>>,
}

impl MockTableService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, description: TableDescription) -> Self {
        self.tables.insert(name.into(), description);
        self
    }

    /// Fail `put_item` for items whose partition key value is `key`.
    pub fn fail_on(mut self, key: impl Into<String>) -> Self {
        self.failing.insert(key.into());
        self
    }

    pub fn items(&self) -> Vec<PutItemRequest> {
        lock(&self.items).clone()
    }
}

#[async_trait]
impl TableService for MockTableService {
    async fn describe_table(&self, table_name: &str) -> Result<TableDescription> {
        self.tables.get(table_name).cloned().ok_or_else(|| {
            SyncError::upstream(
                "dynamodb:DescribeTable",
                format!("ResourceNotFoundException: table {} not found", table_name),
            )
        })
    }

    async fn put_item(&self, request: PutItemRequest) -> Result<()> {
        let description = self.tables.get(&request.table_name).ok_or_else(|| {
            SyncError::upstream("dynamodb:PutItem", "ResourceNotFoundException")
        })?;

        if let Some(AttributeValue::S(key)) =
            description.partition_key().and_then(|pk| request.item.get(pk))
        {
            if self.failing.contains(key) {
                return Err(access_denied("dynamodb:PutItem", key));
            }
        }

        lock(&self.items).push(request);
        Ok(())
    }
}

/// Parameter store recording every write.
#[derive(Debug, Default)]
pub struct MockParameterService {
    failing: HashSet<String>,
    version: AtomicI64,
    requests: Mutex<Vec<PutParameterRequest>>,
}

impl MockParameterService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    pub fn requests(&self) -> Vec<PutParameterRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl ParameterService for MockParameterService {
    async fn put_parameter(&self, request: PutParameterRequest) -> Result<i64> {
        if self.failing.contains(&request.name) {
            return Err(access_denied("ssm:PutParameter", &request.name));
        }
        lock(&self.requests).push(request);
        Ok(self.version.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Secret vault recording every write.
#[derive(Debug, Default)]
pub struct MockSecretService {
    failing: HashSet<String>,
    requests: Mutex<Vec<PutSecretValueRequest>>,
}

impl MockSecretService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, secret_id: impl Into<String>) -> Self {
        self.failing.insert(secret_id.into());
        self
    }

    pub fn requests(&self) -> Vec<PutSecretValueRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl SecretService for MockSecretService {
    async fn put_secret_value(
        &self,
        request: PutSecretValueRequest,
    ) -> Result<PutSecretValueOutput> {
        if self.failing.contains(&request.secret_id) {
            return Err(access_denied("secretsmanager:PutSecretValue", &request.secret_id));
        }
        let output = PutSecretValueOutput {
            name: Some(request.secret_id.clone()),
            version_id: Some(format!("v{}", lock(&self.requests).len() + 1)),
        };
        lock(&self.requests).push(request);
        Ok(output)
    }
}

/// An upload as seen by [`MockObjectService`], with the body drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub streamed: bool,
    pub sse_kms_key_id: String,
    pub storage_class: String,
}

/// Object store recording every upload.
#[derive(Debug, Default)]
pub struct MockObjectService {
    failing: HashSet<String>,
    objects: Mutex<Vec<StoredObject>>,
}

impl MockObjectService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, key: impl Into<String>) -> Self {
        self.failing.insert(key.into());
        self
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        lock(&self.objects).clone()
    }
}

#[async_trait]
impl ObjectService for MockObjectService {
    async fn put_object(&self, request: PutObjectRequest) -> Result<Option<String>> {
        if self.failing.contains(&request.key) {
            return Err(access_denied("s3:PutObject", &request.key));
        }

        let (body, streamed) = match request.body {
            ObjectBody::Bytes(bytes) => (bytes, false),
            ObjectBody::Stream(mut reader) => {
                let mut buf = Vec::new();
                reader
                    .read_to_end(&mut buf)
                    .await
                    .map_err(|e| SyncError::upstream("s3:PutObject", e))?;
                (buf, true)
            }
        };

        let etag = format!("\"{:016x}\"", body.len());
        lock(&self.objects).push(StoredObject {
            bucket: request.bucket,
            key: request.key,
            body,
            streamed,
            sse_kms_key_id: request.sse_kms_key_id,
            storage_class: request.storage_class,
        });
        Ok(Some(etag))
    }
}

/// A full set of mock services with shared handles for inspection.
#[derive(Debug, Clone)]
pub struct MockServices {
    pub keys: Arc<MockKeyService>,
    pub tables: Arc<MockTableService>,
    pub parameters: Arc<MockParameterService>,
    pub secrets: Arc<MockSecretService>,
    pub objects: Arc<MockObjectService>,
}

impl Default for MockServices {
    fn default() -> Self {
        Self::new(MockKeyService::new(), MockTableService::new())
    }
}

impl MockServices {
    pub fn new(keys: MockKeyService, tables: MockTableService) -> Self {
        Self {
            keys: Arc::new(keys),
            tables: Arc::new(tables),
            parameters: Arc::new(MockParameterService::new()),
            secrets: Arc::new(MockSecretService::new()),
            objects: Arc::new(MockObjectService::new()),
        }
    }

    pub fn with_parameters(mut self, parameters: MockParameterService) -> Self {
        self.parameters = Arc::new(parameters);
        self
    }

    pub fn with_secrets(mut self, secrets: MockSecretService) -> Self {
        self.secrets = Arc::new(secrets);
        self
    }

    pub fn with_objects(mut self, objects: MockObjectService) -> Self {
        self.objects = Arc::new(objects);
        self
    }

    pub fn clients(&self) -> ServiceClients {
        ServiceClients {
            keys: self.keys.clone(),
            tables: self.tables.clone(),
            parameters: self.parameters.clone(),
            secrets: self.secrets.clone(),
            objects: self.objects.clone(),
        }
    }
}

/// A backend that keeps stored values in memory.
///
/// Rejects empty keys and empty text on its own, so it can also be driven
/// directly without a dispatcher in front of it.
#[derive(Debug, Default)]
pub struct MockBackend {
    kms_required: bool,
    failing: HashSet<String>,
    stored: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requiring_kms(mut self) -> Self {
        self.kms_required = true;
        self
    }

    pub fn fail_on(mut self, key: impl Into<String>) -> Self {
        self.failing.insert(key.into());
        self
    }

    /// Stored `(key, bytes)` pairs in write order.
    pub fn stored(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.stored).clone()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.stored).iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn kms_required(&self) -> bool {
        self.kms_required
    }

    async fn store(&self, key: &SecretKey, value: SecretValue) -> Result<()> {
        value.ensure_present()?;
        if self.failing.contains(key.as_str()) {
            return Err(access_denied("mock:Store", key.as_str()));
        }
        let bytes = value.into_bytes().await?;
        lock(&self.stored).push((key.to_string(), bytes));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend_records_and_fails() {
        let backend = MockBackend::new().fail_on("/denied");

        backend.store(&SecretKey::new("/ok").unwrap(), "v".into()).await.unwrap();
        assert_eq!(backend.get("/ok"), Some(b"v".to_vec()));

        let err = backend.store(&SecretKey::new("/denied").unwrap(), "v".into()).await;
        assert!(matches!(err, Err(SyncError::Upstream { .. })));

        let err = backend.store(&SecretKey::new("/empty").unwrap(), "".into()).await;
        assert!(matches!(err, Err(SyncError::InvalidValue { .. })));
        assert_eq!(backend.stored().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_key_service_limits() {
        let keys = MockKeyService::new();
        assert!(keys.encrypt("k", Vec::new()).await.is_err());
        assert!(keys.encrypt("k", vec![0; MAX_ENCRYPT_BYTES + 1]).await.is_err());
        assert_eq!(keys.encrypt("k", b"x".to_vec()).await.unwrap(), b"x");
        assert_eq!(keys.encrypted(), vec![("k".to_string(), b"x".to_vec())]);
    }
}
