//! Common test utilities for all integration tests.
//!
//! Provides mock AWS services preloaded with one KMS key and one table.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use aws_secrets_sync::secrets::clients::{KeySchemaElement, TableDescription};
use aws_secrets_sync::secrets::envelope::EnvelopeSource;
use aws_secrets_sync::secrets::mock::{MockKeyService, MockServices, MockTableService};
use aws_secrets_sync::Submission;

pub const KEY_ALIAS: &str = "alias/secrets-sync";
pub const KEY_ARN: &str =
    "arn:aws:kms:us-east-1:111122223333:key/1234abcd-12ab-34cd-56ef-1234567890ab";
pub const TABLE: &str = "secrets";
pub const PARTITION_KEY: &str = "name";
pub const BUCKET: &str = "secrets-bucket";

/// `{"/gzip": "test"}` as base64 of gzip.
pub const GZIP_PAYLOAD: &str = "H4sIABrNnlwAA6tW0k+vyixQslJQKkktLlGq5QIANZyavxIAAAA=";
/// `{"/base64": "value"}` as base64.
pub const BASE64_PAYLOAD: &str = "eyIvYmFzZTY0IjogInZhbHVlIn0K";
/// `{"/bad": "json"` (unterminated) as base64 of gzip.
pub const BAD_JSON_PAYLOAD: &str = "H4sIAH7PnlwAA6tW0k9KTFGyUlDKKs7PU+ICADjxdc8QAAAA";

pub fn key_service() -> MockKeyService {
    MockKeyService::new().with_key(KEY_ALIAS, KEY_ARN)
}

pub fn table_service() -> MockTableService {
    MockTableService::new().with_table(
        TABLE,
        TableDescription { key_schema: vec![KeySchemaElement::hash(PARTITION_KEY)] },
    )
}

pub fn services() -> MockServices {
    MockServices::new(key_service(), table_service())
}

pub fn batch(input: &str) -> Submission {
    Submission::Batch(EnvelopeSource::Inline(input.to_string()))
}

pub fn single(key: &str, value: &str) -> Submission {
    Submission::Single { key: key.to_string(), value: Some(value.into()) }
}
