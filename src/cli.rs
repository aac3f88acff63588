//! # Command Line Interface
//!
//! Binds flags and environment variables to a [`SyncConfig`], builds the AWS
//! clients and runs one submission. The exit status is the number of failed
//! writes; configuration and single-pair failures exit with status 1.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::config::{env_flag, SyncConfig};
use crate::dispatch::Submission;
use crate::observability::{init_logging, LogFormat};
use crate::secrets::aws::load_service_clients;
use crate::secrets::backends::s3::DEFAULT_STORAGE_CLASS;
use crate::secrets::clients::ParameterTier;
use crate::secrets::envelope::EnvelopeSource;
use crate::secrets::value::SecretValue;

#[derive(Parser, Debug)]
#[command(name = "aws-secrets-sync")]
#[command(about = "Write key/value secrets into DynamoDB, SSM Parameter Store, Secrets Manager or S3")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "Boolean switches can also be set through ONE_SHOT, VERBOSE and SSM_ADVANCED \
                        (1, t, T, TRUE, true or True).")]
pub struct Cli {
    /// Storage backend: dynamodb, s3, secretsmanager or ssm
    #[arg(short = 's', long, env = "SECRETS_BACKEND")]
    pub backend: Option<String>,

    /// DynamoDB table name
    #[arg(short = 't', long, env = "DYNAMODB_TABLE")]
    pub table: Option<String>,

    /// S3 bucket name
    #[arg(short = 'b', long, env = "S3_BUCKET")]
    pub bucket: Option<String>,

    /// KMS key ARN, ID or alias
    #[arg(short = 'k', long, env = "KMS_KEY")]
    pub kms_key: Option<String>,

    /// S3 storage class
    #[arg(long, env = "S3_STORAGE_CLASS", default_value = DEFAULT_STORAGE_CLASS)]
    pub storage_class: String,

    /// Store SSM parameters in the advanced tier
    #[arg(long)]
    pub advanced: bool,

    /// Store a single KEY [VALUE] pair; VALUE is read from stdin when omitted
    #[arg(short = 'o', long)]
    pub one_shot: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// AWS region override
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// AWS endpoint override, e.g. a local emulator
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// JSON batch (plain, base64 or base64 gzip), or KEY [VALUE] with --one-shot.
    /// The batch is read from stdin when omitted.
    #[arg(value_name = "INPUT")]
    pub args: Vec<String>,
}

impl Cli {
    pub fn one_shot(&self) -> bool {
        self.one_shot || env_flag("ONE_SHOT")
    }

    pub fn verbose(&self) -> bool {
        self.verbose || env_flag("VERBOSE")
    }

    pub fn parameter_tier(&self) -> ParameterTier {
        if self.advanced || env_flag("SSM_ADVANCED") {
            ParameterTier::Advanced
        } else {
            ParameterTier::Standard
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            backend: self.backend.clone().unwrap_or_default(),
            table: self.table.clone(),
            bucket: self.bucket.clone(),
            kms_key: self.kms_key.clone(),
            storage_class: self.storage_class.clone(),
            parameter_tier: self.parameter_tier(),
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
        }
        .normalized()
    }

    /// Build the submission from the positional arguments, falling back to stdin.
    pub fn submission(&self) -> Submission {
        if self.one_shot() {
            if self.args.len() > 2 {
                warn!(count = self.args.len() - 2, "ignoring extra arguments after KEY VALUE");
            }
            let key = self.args.first().cloned().unwrap_or_default();
            let value = match self.args.get(1) {
                Some(value) => SecretValue::text(value.clone()),
                None => SecretValue::stream(tokio::io::stdin()),
            };
            return Submission::Single { key, value: Some(value) };
        }

        if self.args.len() > 1 {
            warn!(count = self.args.len() - 1, "ignoring extra arguments after the batch input");
        }
        match self.args.first().filter(|input| !input.is_empty()) {
            Some(input) => Submission::Batch(EnvelopeSource::Inline(input.clone())),
            None => Submission::Batch(EnvelopeSource::Stream(Box::new(tokio::io::stdin()))),
        }
    }
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose(), cli.log_format);

    let config = cli.sync_config();
    let clients = load_service_clients(&config).await;
    let one_shot = cli.one_shot();

    let result = crate::sync(config, clients, cli.submission())
        .await
        .context(if one_shot { "error storing secret" } else { "sync failed" })?;

    info!(stored = result.stored(), failures = result.failures(), "sync complete");
    Ok(ExitCode::from(result.exit_code()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("aws-secrets-sync").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_command_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_map_to_config() {
        let cli = parse(&[
            "-s", "S3", "-b", "secrets-bucket", "-k", "alias/app", "--storage-class", "STANDARD_IA",
        ]);
        let config = cli.sync_config();

        assert_eq!(config.backend, "S3");
        assert_eq!(config.bucket.as_deref(), Some("secrets-bucket"));
        assert_eq!(config.kms_key.as_deref(), Some("alias/app"));
        assert_eq!(config.storage_class, "STANDARD_IA");
    }

    #[test]
    fn test_advanced_tier_flag() {
        assert_eq!(parse(&["-s", "ssm", "--advanced"]).parameter_tier(), ParameterTier::Advanced);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let cli = parse(&["-s", "dynamodb", "-t", "", "-k", ""]);
        let config = cli.sync_config();
        assert_eq!(config.table, None);
        assert_eq!(config.kms_key, None);
    }

    #[test]
    fn test_one_shot_submission() {
        let cli = parse(&["-s", "ssm", "-o", "/app/key", "value"]);
        assert!(cli.one_shot());

        match cli.submission() {
            Submission::Single { key, value: Some(SecretValue::Text(text)) } => {
                assert_eq!(key, "/app/key");
                assert_eq!(text.expose_secret(), "value");
            }
            _ => panic!("expected a single text pair"),
        }
    }

    #[test]
    fn test_one_shot_without_value_reads_stdin() {
        let cli = parse(&["-o", "/app/key"]);
        assert!(matches!(
            cli.submission(),
            Submission::Single { value: Some(SecretValue::Stream(_)), .. }
        ));
    }

    #[test]
    fn test_batch_submission() {
        let cli = parse(&["-s", "ssm", r#"{"a": "1"}"#]);
        assert!(matches!(
            cli.submission(),
            Submission::Batch(EnvelopeSource::Inline(ref input)) if input == r#"{"a": "1"}"#
        ));

        let cli = parse(&["-s", "ssm"]);
        assert!(matches!(cli.submission(), Submission::Batch(EnvelopeSource::Stream(_))));
    }

    #[test]
    fn test_empty_batch_argument_reads_stdin() {
        let cli = parse(&["-s", "ssm", ""]);
        assert!(matches!(cli.submission(), Submission::Batch(EnvelopeSource::Stream(_))));
    }

    #[test]
    fn test_log_format_flag() {
        assert_eq!(parse(&["--log-format", "json"]).log_format, LogFormat::Json);
    }
}
