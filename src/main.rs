use anyhow::Result;
use clap::Parser;
use sweep::cli::Cli;
use sweep::config::Settings;
use sweep::output;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .init();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load().unwrap_or_else(|e| {
            warn!(error = %e, "could not load settings, using defaults");
            Settings::default()
        }),
    };

    cli.scan.execute(&settings, cli.quiet).await?;
    Ok(())
}
