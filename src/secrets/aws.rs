//! AWS SDK implementations of the service capability traits.
//!
//! Every client is built from one shared SDK configuration, so region,
//! credentials and endpoint overrides apply to all services alike.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::types::{
    AttributeValue as DynamoAttribute, KeySchemaElement as DynamoKeySchemaElement,
    KeyType as DynamoKeyType,
};
use aws_sdk_kms::error::DisplayErrorContext;
use aws_sdk_kms::primitives::Blob as KmsBlob;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{ServerSideEncryption, StorageClass};
use aws_sdk_secretsmanager::primitives::Blob as SecretBlob;
use aws_sdk_ssm::types::{ParameterTier as SsmTier, ParameterType};
use aws_types::region::Region;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::clients::{
    AttributeValue, KeySchemaElement, KeyService, KeyType, ObjectBody, ObjectService,
    ParameterService, ParameterTier, PutItemRequest, PutObjectRequest, PutParameterRequest,
    PutSecretValueOutput, PutSecretValueRequest, SecretPayload, SecretService, ServiceClients,
    TableDescription, TableService,
};
use crate::config::SyncConfig;
use crate::errors::{Result, SyncError};

fn service_error<E>(operation: &str, err: E) -> SyncError
where
    E: std::error::Error + 'static,
{
    SyncError::upstream(operation, DisplayErrorContext(&err))
}

/// Load the shared SDK configuration and build one client per service.
pub async fn load_service_clients(config: &SyncConfig) -> ServiceClients {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = config.region.as_deref() {
        loader = loader.region(Region::new(region.to_string()));
    }
    if let Some(endpoint) = config.endpoint_url.as_deref() {
        debug!(endpoint = %endpoint, "using custom AWS endpoint");
        loader = loader.endpoint_url(endpoint);
    }
    let shared_config = loader.load().await;

    // Local stacks serve buckets by path rather than by virtual host.
    let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
        .force_path_style(config.endpoint_url.is_some())
        .build();

    ServiceClients {
        keys: Arc::new(AwsKeyService::new(aws_sdk_kms::Client::new(&shared_config))),
        tables: Arc::new(AwsTableService::new(aws_sdk_dynamodb::Client::new(&shared_config))),
        parameters: Arc::new(AwsParameterService::new(aws_sdk_ssm::Client::new(&shared_config))),
        secrets: Arc::new(AwsSecretService::new(aws_sdk_secretsmanager::Client::new(
            &shared_config,
        ))),
        objects: Arc::new(AwsObjectService::new(aws_sdk_s3::Client::from_conf(s3_config))),
    }
}

#[derive(Debug, Clone)]
pub struct AwsKeyService {
    client: aws_sdk_kms::Client,
}

impl AwsKeyService {
    pub fn new(client: aws_sdk_kms::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeyService for AwsKeyService {
    async fn describe_key(&self, reference: &str) -> Result<String> {
        let output = self
            .client
            .describe_key()
            .key_id(reference)
            .send()
            .await
            .map_err(|e| service_error("kms:DescribeKey", e))?;

        output
            .key_metadata()
            .and_then(|metadata| metadata.arn())
            .map(str::to_string)
            .ok_or_else(|| SyncError::upstream("kms:DescribeKey", "response carried no key ARN"))
    }

    async fn encrypt(&self, key_id: &str, plaintext: Vec<u8>) -> Result<Vec<u8>> {
        let output = self
            .client
            .encrypt()
            .key_id(key_id)
            .plaintext(KmsBlob::new(plaintext))
            .send()
            .await
            .map_err(|e| service_error("kms:Encrypt", e))?;

        output
            .ciphertext_blob()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| SyncError::upstream("kms:Encrypt", "response carried no ciphertext"))
    }
}

#[derive(Debug, Clone)]
pub struct AwsTableService {
    client: aws_sdk_dynamodb::Client,
}

impl AwsTableService {
    pub fn new(client: aws_sdk_dynamodb::Client) -> Self {
        Self { client }
    }
}

fn key_schema_from(elements: &[DynamoKeySchemaElement]) -> Vec<KeySchemaElement> {
    elements
        .iter()
        .filter_map(|element| {
            let key_type = match element.key_type() {
                DynamoKeyType::Hash => KeyType::Hash,
                DynamoKeyType::Range => KeyType::Range,
                _ => return None,
            };
            Some(KeySchemaElement { attribute_name: element.attribute_name().to_string(), key_type })
        })
        .collect()
}

fn dynamo_item(item: impl IntoIterator<Item = (String, AttributeValue)>) -> HashMap<String, DynamoAttribute> {
    item.into_iter()
        .map(|(name, value)| {
            let value = match value {
                AttributeValue::S(s) => DynamoAttribute::S(s),
                AttributeValue::Bool(b) => DynamoAttribute::Bool(b),
            };
            (name, value)
        })
        .collect()
}

#[async_trait]
impl TableService for AwsTableService {
    async fn describe_table(&self, table_name: &str) -> Result<TableDescription> {
        let output = self
            .client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|e| service_error("dynamodb:DescribeTable", e))?;

        let elements = output.table().map(|table| table.key_schema()).unwrap_or_default();
        Ok(TableDescription { key_schema: key_schema_from(elements) })
    }

    async fn put_item(&self, request: PutItemRequest) -> Result<()> {
        self.client
            .put_item()
            .table_name(request.table_name)
            .set_item(Some(dynamo_item(request.item)))
            .send()
            .await
            .map_err(|e| service_error("dynamodb:PutItem", e))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AwsParameterService {
    client: aws_sdk_ssm::Client,
}

impl AwsParameterService {
    pub fn new(client: aws_sdk_ssm::Client) -> Self {
        Self { client }
    }
}

fn ssm_tier(tier: ParameterTier) -> SsmTier {
    match tier {
        ParameterTier::Standard => SsmTier::Standard,
        ParameterTier::Advanced => SsmTier::Advanced,
    }
}

#[async_trait]
impl ParameterService for AwsParameterService {
    async fn put_parameter(&self, request: PutParameterRequest) -> Result<i64> {
        let output = self
            .client
            .put_parameter()
            .name(request.name)
            .value(request.value.into_inner())
            .r#type(ParameterType::SecureString)
            .tier(ssm_tier(request.tier))
            .overwrite(request.overwrite)
            .set_key_id(request.key_id)
            .send()
            .await
            .map_err(|e| service_error("ssm:PutParameter", e))?;
        Ok(output.version())
    }
}

#[derive(Debug, Clone)]
pub struct AwsSecretService {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretService {
    pub fn new(client: aws_sdk_secretsmanager::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretService for AwsSecretService {
    async fn put_secret_value(
        &self,
        request: PutSecretValueRequest,
    ) -> Result<PutSecretValueOutput> {
        let builder = self.client.put_secret_value().secret_id(request.secret_id);
        let builder = match request.payload {
            SecretPayload::String(text) => builder.secret_string(text.into_inner()),
            SecretPayload::Binary(bytes) => builder.secret_binary(SecretBlob::new(bytes)),
        };

        let output = builder
            .send()
            .await
            .map_err(|e| service_error("secretsmanager:PutSecretValue", e))?;

        Ok(PutSecretValueOutput {
            name: output.name().map(str::to_string),
            version_id: output.version_id().map(str::to_string),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AwsObjectService {
    client: aws_sdk_s3::Client,
}

impl AwsObjectService {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectService for AwsObjectService {
    async fn put_object(&self, request: PutObjectRequest) -> Result<Option<String>> {
        // PutObject needs a content length, so streams are buffered here.
        let bytes = match request.body {
            ObjectBody::Bytes(bytes) => bytes,
            ObjectBody::Stream(mut reader) => {
                let mut buf = Vec::new();
                reader
                    .read_to_end(&mut buf)
                    .await
                    .map_err(|e| SyncError::io(e, "reading object body"))?;
                buf
            }
        };

        let output = self
            .client
            .put_object()
            .bucket(request.bucket)
            .key(request.key)
            .body(ByteStream::from(bytes))
            .server_side_encryption(ServerSideEncryption::AwsKms)
            .ssekms_key_id(request.sse_kms_key_id)
            .storage_class(StorageClass::from(request.storage_class.as_str()))
            .send()
            .await
            .map_err(|e| service_error("s3:PutObject", e))?;

        Ok(output.e_tag().map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_key_schema_conversion() {
        let elements = vec![
            DynamoKeySchemaElement::builder()
                .attribute_name("name")
                .key_type(DynamoKeyType::Hash)
                .build()
                .unwrap(),
            DynamoKeySchemaElement::builder()
                .attribute_name("version")
                .key_type(DynamoKeyType::Range)
                .build()
                .unwrap(),
        ];

        let schema = key_schema_from(&elements);
        assert_eq!(schema, vec![KeySchemaElement::hash("name"), KeySchemaElement::range("version")]);
    }

    #[test]
    fn test_item_conversion() {
        let item = BTreeMap::from([
            ("id".to_string(), AttributeValue::S("/app/db".to_string())),
            ("encrypted".to_string(), AttributeValue::Bool(true)),
        ]);

        let converted = dynamo_item(item);
        assert_eq!(converted["id"], DynamoAttribute::S("/app/db".to_string()));
        assert_eq!(converted["encrypted"], DynamoAttribute::Bool(true));
    }

    #[test]
    fn test_tier_conversion() {
        assert_eq!(ssm_tier(ParameterTier::Standard), SsmTier::Standard);
        assert_eq!(ssm_tier(ParameterTier::Advanced), SsmTier::Advanced);
    }

    #[test]
    fn test_storage_class_parsing() {
        assert_eq!(StorageClass::from("STANDARD"), StorageClass::Standard);
        assert_eq!(StorageClass::from("GLACIER_IR"), StorageClass::GlacierIr);
    }
}
