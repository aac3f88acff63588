//! # Batch Dispatch
//!
//! Feeds key/value pairs to the active backend one at a time. Per-item
//! failures are logged and counted and never stop the batch. A malformed
//! JSON object stops the rest of the stream and counts as one failure.

use std::io::Read;

use serde_json::{Map, Value};
use tracing::{debug, error, info, Instrument};

use crate::errors::{Result, SyncError};
use crate::secrets::backends::StorageBackend;
use crate::secrets::envelope::EnvelopeSource;
use crate::secrets::value::{SecretKey, SecretValue};

/// Largest exit status a process can report.
const MAX_EXIT_CODE: usize = 255;

/// What one invocation asks to store.
pub enum Submission {
    /// One explicit pair. An absent value is reported as a nil value.
    Single { key: String, value: Option<SecretValue> },
    /// A stream of JSON objects, possibly base64 or base64+gzip encoded.
    Batch(EnvelopeSource),
}

/// Outcome counters for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    stored: usize,
    failures: usize,
}

impl BatchResult {
    pub fn stored(&self) -> usize {
        self.stored
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn is_success(&self) -> bool {
        self.failures == 0
    }

    /// Process exit status: the failure count, saturating at 255.
    pub fn exit_code(&self) -> u8 {
        self.failures.min(MAX_EXIT_CODE) as u8
    }
}

/// Sequential dispatcher over one backend.
pub struct Dispatcher<'a> {
    backend: &'a dyn StorageBackend,
}

impl<'a> Dispatcher<'a> {
    pub fn new(backend: &'a dyn StorageBackend) -> Self {
        Self { backend }
    }

    /// Check a pair and hand it to the backend.
    ///
    /// Fails with [`SyncError::InvalidKey`] for an empty key and with
    /// [`SyncError::InvalidValue`] for an absent or empty value, before the
    /// backend is called.
    pub async fn submit(&self, key: &str, value: Option<SecretValue>) -> Result<()> {
        let key = SecretKey::new(key)?;
        let value = value.ok_or_else(|| SyncError::invalid_value("nil value"))?;
        value.ensure_present()?;

        self.backend.store(&key, value).instrument(crate::store_span!(key)).await
    }

    /// Store exactly one pair. The error is returned, not counted.
    pub async fn dispatch_single(&self, key: &str, value: Option<SecretValue>) -> Result<()> {
        self.submit(key, value).await?;
        info!(key = %key, "updated secret");
        Ok(())
    }

    /// Store every field of every JSON object read from `reader`.
    pub async fn dispatch_json<R: Read>(&self, reader: R) -> BatchResult {
        let mut result = BatchResult::default();
        let objects = serde_json::Deserializer::from_reader(reader).into_iter::<Map<String, Value>>();

        for object in objects {
            let object = match object {
                Ok(object) => object,
                Err(e) => {
                    let err = SyncError::from(e);
                    error!(error = %err, "error decoding json");
                    result.failures += 1;
                    break;
                }
            };

            for (key, value) in object {
                match self.submit(&key, SecretValue::from_json(value)).await {
                    Ok(()) => {
                        result.stored += 1;
                        info!(key = %key, "updated secret");
                    }
                    Err(e) => {
                        result.failures += 1;
                        error!(key = %key, error = %e, "error storing secret");
                    }
                }
            }
        }

        result
    }

    /// Decode the batch source's transport encoding, then dispatch its JSON.
    ///
    /// Only a failure to read the source itself is returned as an error.
    pub async fn dispatch_envelope(&self, source: EnvelopeSource) -> Result<BatchResult> {
        let envelope = source.decode().await?;
        debug!(
            encoding = envelope.encoding().as_str(),
            bytes = envelope.as_bytes().len(),
            "decoded batch input"
        );
        Ok(self.dispatch_json(envelope.into_reader()).await)
    }

    pub async fn run(&self, submission: Submission) -> Result<BatchResult> {
        match submission {
            Submission::Single { key, value } => {
                self.dispatch_single(&key, value).await?;
                Ok(BatchResult { stored: 1, failures: 0 })
            }
            Submission::Batch(source) => self.dispatch_envelope(source).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::mock::MockBackend;
    use std::io::Cursor;

    async fn dispatch(backend: &MockBackend, input: &str) -> BatchResult {
        Dispatcher::new(backend).dispatch_json(Cursor::new(input.as_bytes().to_vec())).await
    }

    #[tokio::test]
    async fn test_all_fields_of_all_objects_are_stored() {
        let backend = MockBackend::new();
        let result = dispatch(&backend, r#"{"a": "1", "b": "2"} {"c": "3"}"#).await;

        assert_eq!(result, BatchResult { stored: 3, failures: 0 });
        assert!(result.is_success());
        assert_eq!(backend.get("c"), Some(b"3".to_vec()));
    }

    #[tokio::test]
    async fn test_invalid_pairs_are_counted_and_skipped() {
        let backend = MockBackend::new();
        let result =
            dispatch(&backend, r#"{"a": "", "": "v", "n": null, "ok": "v", "num": 1}"#).await;

        assert_eq!(result.failures(), 3);
        assert_eq!(result.stored(), 2);
        assert_eq!(result.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_empty_input_and_empty_object() {
        let backend = MockBackend::new();
        assert_eq!(dispatch(&backend, "").await, BatchResult::default());
        assert_eq!(dispatch(&backend, " \n").await, BatchResult::default());
        assert_eq!(dispatch(&backend, "{}").await, BatchResult::default());
    }

    #[tokio::test]
    async fn test_malformed_object_stops_the_stream() {
        let backend = MockBackend::new();
        let result = dispatch(&backend, r#"{"a": "1"} {"b": } {"c": "3"}"#).await;

        assert_eq!(result, BatchResult { stored: 1, failures: 1 });
        assert_eq!(backend.get("c"), None);
    }

    #[tokio::test]
    async fn test_non_object_json_is_a_failure() {
        let backend = MockBackend::new();
        assert_eq!(dispatch(&backend, r#"["a", "b"]"#).await.failures(), 1);
        assert_eq!(dispatch(&backend, "not json").await.failures(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_abort() {
        let backend = MockBackend::new().fail_on("b");
        let result = dispatch(&backend, r#"{"a": "1", "b": "2", "c": "3"}"#).await;

        assert_eq!(result, BatchResult { stored: 2, failures: 1 });
    }

    #[tokio::test]
    async fn test_single_pair() {
        let backend = MockBackend::new();
        let dispatcher = Dispatcher::new(&backend);

        dispatcher.dispatch_single("key", Some("value".into())).await.unwrap();
        assert!(matches!(
            dispatcher.dispatch_single("key", None).await,
            Err(SyncError::InvalidValue { .. })
        ));
        assert!(matches!(
            dispatcher.dispatch_single("", Some("v".into())).await,
            Err(SyncError::InvalidKey { .. })
        ));
        assert_eq!(backend.stored().len(), 1);
    }

    #[tokio::test]
    async fn test_run_single_with_stream_value() {
        let backend = MockBackend::new();
        let submission = Submission::Single {
            key: "piped".to_string(),
            value: Some(SecretValue::stream(Cursor::new(b"from stdin".to_vec()))),
        };

        let result = Dispatcher::new(&backend).run(submission).await.unwrap();
        assert_eq!(result.stored(), 1);
        assert_eq!(backend.get("piped"), Some(b"from stdin".to_vec()));
    }

    #[tokio::test]
    async fn test_run_encoded_batch() {
        let backend = MockBackend::new();
        let source =
            EnvelopeSource::Inline("H4sIABrNnlwAA6tW0k+vyixQslJQKkktLlGq5QIANZyavxIAAAA=".to_string());

        let result = Dispatcher::new(&backend).run(Submission::Batch(source)).await.unwrap();
        assert_eq!(result, BatchResult { stored: 1, failures: 0 });
        assert_eq!(backend.get("/gzip"), Some(b"test".to_vec()));
    }

    #[test]
    fn test_exit_code_saturates() {
        let result = BatchResult { stored: 0, failures: 300 };
        assert_eq!(result.exit_code(), 255);
        assert_eq!(BatchResult { stored: 4, failures: 0 }.exit_code(), 0);
    }
}
