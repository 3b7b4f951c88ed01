//! Command-line runner for troupe stage files.

pub mod commands;
pub mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use troupe::config::ScriptConfig;
use troupe::ActorTypeRegistry;
use troupe_handler_script::ScriptHost;

use crate::error::CliError;

/// Troupe - run actors from a stage file.
#[derive(Debug, Parser)]
#[command(name = "troupe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Spawn the actors of a stage file and run until terminated
    #[command(name = "run")]
    Run(commands::run::RunArgs),

    /// List the registered actor types and their slots
    #[command(name = "types")]
    Types(commands::types::TypesArgs),

    /// Parse a stage file and print it back normalised
    #[command(name = "dump")]
    Dump(commands::dump::DumpArgs),
}

/// Run one CLI invocation.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let result = match &cli.command {
        Commands::Run(args) => commands::run::execute_async(args).await,
        Commands::Types(args) => commands::types::execute(args),
        Commands::Dump(args) => commands::dump::execute(args),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

/// Every actor type this build knows about.
///
/// ## Parameters
///
/// * `script` - Resolution paths for script imports
///
/// ## Returns
///
/// * `Ok(ActorTypeRegistry)` - Native and script types, plus the media
///   player when built with the `gstreamer` feature
/// * `Err(CliError)` - If a type's descriptor fails to parse
pub fn build_registry(script: &ScriptConfig) -> Result<ActorTypeRegistry, CliError> {
    let mut registry = ActorTypeRegistry::new();
    troupe_handler_native::register(&mut registry).map_err(CliError::Registration)?;

    let search_paths: Vec<PathBuf> = script.search_paths.clone();
    let host = Arc::new(ScriptHost::new(search_paths));
    troupe_handler_script::register(&mut registry, host).map_err(CliError::Registration)?;

    #[cfg(feature = "gstreamer")]
    troupe_handler_media::register(&mut registry).map_err(CliError::Registration)?;

    Ok(registry)
}
