//! DynamoDB table backend
//!
//! Values are encrypted client-side with the resolved KMS key and written as
//! one item per secret:
//!
//! | attribute         | type | content                       |
//! |-------------------|------|-------------------------------|
//! | *partition key*   | S    | secret key                    |
//! | `value`           | S    | base64 of the KMS ciphertext  |
//! | `encrypted`       | BOOL | `true`                        |
//!
//! The partition key attribute name is read from the table description when
//! the backend is built.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info};

use super::backend::{warn_if_oversized, BackendKind, StorageBackend};
use crate::errors::{Result, SyncError};
use crate::secrets::clients::{AttributeValue, KeyService, PutItemRequest, TableService};
use crate::secrets::kms::ResolvedKey;
use crate::secrets::value::{SecretKey, SecretValue};

pub const VALUE_ATTRIBUTE: &str = "value";
pub const ENCRYPTED_ATTRIBUTE: &str = "encrypted";

pub struct DynamoDbBackend {
    tables: Arc<dyn TableService>,
    keys: Arc<dyn KeyService>,
    table: String,
    partition_key: String,
    key: ResolvedKey,
}

impl std::fmt::Debug for DynamoDbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbBackend")
            .field("table", &self.table)
            .field("partition_key", &self.partition_key)
            .field("key", &self.key)
            .finish()
    }
}

impl DynamoDbBackend {
    /// Build a backend for `table`, discovering its partition key attribute.
    pub async fn with_table(
        tables: Arc<dyn TableService>,
        keys: Arc<dyn KeyService>,
        table: &str,
        key: ResolvedKey,
    ) -> Result<Self> {
        let description = tables.describe_table(table).await?;
        let partition_key = description.partition_key().map(str::to_string).ok_or_else(|| {
            SyncError::missing_configuration(
                BackendKind::DynamoDb.as_str(),
                format!("partition key attribute on table '{}'", table),
            )
        })?;

        info!(table = %table, partition_key = %partition_key, "using DynamoDB table");
        Ok(Self { tables, keys, table: table.to_string(), partition_key, key })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    async fn encrypt(&self, value: SecretValue) -> Result<String> {
        let plaintext = value.into_bytes().await?;
        let ciphertext = self.keys.encrypt(self.key.arn(), plaintext).await?;
        Ok(STANDARD.encode(ciphertext))
    }
}

#[async_trait]
impl StorageBackend for DynamoDbBackend {
    fn kms_required(&self) -> bool {
        true
    }

    async fn store(&self, key: &SecretKey, value: SecretValue) -> Result<()> {
        let descriptor = BackendKind::DynamoDb.descriptor();
        warn_if_oversized(descriptor.kind, descriptor.size_limit_bytes, key, value.known_len());

        let encoded = self.encrypt(value).await?;
        debug!(key = %key, encoded_len = encoded.len(), "encrypted value");

        let item = BTreeMap::from([
            (self.partition_key.clone(), AttributeValue::S(key.to_string())),
            (VALUE_ATTRIBUTE.to_string(), AttributeValue::S(encoded)),
            (ENCRYPTED_ATTRIBUTE.to_string(), AttributeValue::Bool(true)),
        ]);

        self.tables.put_item(PutItemRequest { table_name: self.table.clone(), item }).await
    }
}
