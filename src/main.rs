//! Phantom Words CLI
//!
//! Command-line interface for the Phantom Words engine.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use phantom_words::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Phantom Words v{}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Play { session } => commands::play(session),
        Commands::Render {
            session,
            out,
            sample_rate,
        } => commands::render(session, out, *sample_rate),
        Commands::Probe { file, slot } => commands::probe(file, *slot),
    }
}
