//! Granular CLI - Real-time granular playback
//!
//! Command-line host for the granular synthesis engine.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use granular::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Granular engine v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Granular engine v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Info { file } => commands::info(&file)?,
        Commands::Window {
            window_type,
            length,
        } => commands::window(&window_type, length)?,
        Commands::Play(args) => commands::play(&args)?,
    }
    Ok(())
}
