//! Capability traits for the wrapped storage and key services.
//!
//! Each backend talks to its service through one of these traits. The AWS SDK
//! implementations live in [`super::aws`]; `mock` provides in-memory
//! ones behind the `test-support` feature. Every method either succeeds completely or returns
//! [`SyncError::Upstream`](crate::errors::SyncError::Upstream).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::SecretString;
use super::value::ValueStream;
use crate::errors::Result;

/// Key management: lookup and encryption.
#[async_trait]
pub trait KeyService: Send + Sync {
    /// Look up a key by ARN, ID or alias and return its canonical ARN.
    async fn describe_key(&self, reference: &str) -> Result<String>;

    /// Encrypt `plaintext` under `key_id`, returning the ciphertext blob.
    async fn encrypt(&self, key_id: &str, plaintext: Vec<u8>) -> Result<Vec<u8>>;
}

/// Role of an attribute in a table's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Hash,
    Range,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: KeyType,
}

impl KeySchemaElement {
    pub fn hash(attribute_name: impl Into<String>) -> Self {
        Self { attribute_name: attribute_name.into(), key_type: KeyType::Hash }
    }

    pub fn range(attribute_name: impl Into<String>) -> Self {
        Self { attribute_name: attribute_name.into(), key_type: KeyType::Range }
    }
}

/// The parts of a table description the table backend needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDescription {
    pub key_schema: Vec<KeySchemaElement>,
}

impl TableDescription {
    /// Name of the partition (HASH) key attribute, if the schema has one.
    pub fn partition_key(&self) -> Option<&str> {
        self.key_schema
            .iter()
            .find(|element| element.key_type == KeyType::Hash)
            .map(|element| element.attribute_name.as_str())
    }
}

/// Item attribute values written by the table backend.
#[derive(Clone, PartialEq, Eq)]
pub enum AttributeValue {
    S(String),
    Bool(bool),
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => write!(f, "S({} chars)", s.len()),
            Self::Bool(b) => write!(f, "Bool({})", b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutItemRequest {
    pub table_name: String,
    pub item: BTreeMap<String, AttributeValue>,
}

/// Table storage: introspection and item writes.
#[async_trait]
pub trait TableService: Send + Sync {
    async fn describe_table(&self, table_name: &str) -> Result<TableDescription>;

    async fn put_item(&self, request: PutItemRequest) -> Result<()>;
}

/// Parameter store capacity tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterTier {
    #[default]
    Standard,
    Advanced,
}

impl ParameterTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Advanced => "Advanced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutParameterRequest {
    pub name: String,
    pub value: SecretString,
    pub tier: ParameterTier,
    pub overwrite: bool,
    /// Only set when the operator supplied a key.
    pub key_id: Option<String>,
}

/// Parameter store writes. Every parameter is a secure string.
#[async_trait]
pub trait ParameterService: Send + Sync {
    /// Returns the new parameter version.
    async fn put_parameter(&self, request: PutParameterRequest) -> Result<i64>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretPayload {
    String(SecretString),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutSecretValueRequest {
    pub secret_id: String,
    pub payload: SecretPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutSecretValueOutput {
    pub name: Option<String>,
    pub version_id: Option<String>,
}

/// Secret vault writes.
#[async_trait]
pub trait SecretService: Send + Sync {
    async fn put_secret_value(&self, request: PutSecretValueRequest)
        -> Result<PutSecretValueOutput>;
}

/// Object body, either already in memory or still a stream.
pub enum ObjectBody {
    Bytes(Vec<u8>),
    Stream(ValueStream),
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => write!(f, "ObjectBody::Bytes({} bytes)", b.len()),
            Self::Stream(_) => write!(f, "ObjectBody::Stream"),
        }
    }
}

#[derive(Debug)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: ObjectBody,
    /// Key used for `aws:kms` server-side encryption.
    pub sse_kms_key_id: String,
    pub storage_class: String,
}

/// Object store uploads.
#[async_trait]
pub trait ObjectService: Send + Sync {
    /// Returns the object's ETag when the service reports one.
    async fn put_object(&self, request: PutObjectRequest) -> Result<Option<String>>;
}

/// One handle per wrapped service, shared by the factory and the backends.
#[derive(Clone)]
pub struct ServiceClients {
    pub keys: Arc<dyn KeyService>,
    pub tables: Arc<dyn TableService>,
    pub parameters: Arc<dyn ParameterService>,
    pub secrets: Arc<dyn SecretService>,
    pub objects: Arc<dyn ObjectService>,
}

impl fmt::Debug for ServiceClients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClients").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_key_lookup() {
        let description = TableDescription {
            key_schema: vec![KeySchemaElement::range("version"), KeySchemaElement::hash("name")],
        };
        assert_eq!(description.partition_key(), Some("name"));

        let range_only = TableDescription { key_schema: vec![KeySchemaElement::range("version")] };
        assert_eq!(range_only.partition_key(), None);
        assert_eq!(TableDescription::default().partition_key(), None);
    }

    #[test]
    fn test_attribute_value_debug_hides_content() {
        let debug = format!("{:?}", AttributeValue::S("ciphertext".to_string()));
        assert_eq!(debug, "S(10 chars)");
    }

    #[test]
    fn test_parameter_tier_names() {
        assert_eq!(ParameterTier::default(), ParameterTier::Standard);
        assert_eq!(ParameterTier::Advanced.as_str(), "Advanced");
    }
}
