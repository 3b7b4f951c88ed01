use clap::Parser;
use std::path::{Path, PathBuf};
use troupe::StageConfig;

use crate::error::CliError;

#[derive(Debug, Parser)]
pub struct DumpArgs {
    /// Path to the stage file
    #[arg(required = true)]
    pub stage: PathBuf,
}

/// Parse a stage file and serialise it again.
pub fn normalise(path: &Path) -> Result<String, CliError> {
    let config = StageConfig::from_file(path).map_err(|e| CliError::invalid_stage(path, e))?;
    config.to_toml().map_err(CliError::Serialise)
}

pub fn execute(args: &DumpArgs) -> Result<(), CliError> {
    print!("{}", normalise(&args.stage)?);
    Ok(())
}
