use clap::Parser;
use radscan::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("radscan=info")),
        )
        .init();

    let cli = Cli::parse();
    cli::run(cli)?;
    Ok(())
}
