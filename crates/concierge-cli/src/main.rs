//! Concierge - notes vault indexing and search entry point

use clap::Parser;
use concierge_cli::config::LogFormat;
use concierge_cli::{Cli, ConciergeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(config: &ConciergeConfig) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_directives()),
    );
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output on stdout stays clean.
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ConciergeConfig::load(cli.config.as_deref())?;
    init_tracing(&config);

    tracing::debug!("Starting concierge v{}", env!("CARGO_PKG_VERSION"));

    let output = concierge_cli::run(cli, config).await?;
    println!("{output}");
    Ok(())
}
