use clap::Parser;
use proxy_pool_service::cli::Cli;
use proxy_pool_service::telemetry;

#[tokio::main]
async fn main() -> Result<(), String> {
    telemetry::setup_tracing()?;

    let cli = Cli::parse();
    cli.execute().await
}
