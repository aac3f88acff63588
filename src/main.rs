use std::process::ExitCode;

use aws_secrets_sync::cli::run_cli;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    run_cli().await
}
