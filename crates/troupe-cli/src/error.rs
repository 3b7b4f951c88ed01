use std::path::PathBuf;
use thiserror::Error;
use troupe::TroupeError;

/// Errors the CLI reports to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid stage file {path}")]
    InvalidStage {
        path: PathBuf,
        #[source]
        source: TroupeError,
    },

    #[error("Failed to register actor types")]
    Registration(#[source] TroupeError),

    #[error("Failed to set up logging: {0:#}")]
    Logging(anyhow::Error),

    #[error("Failed to start stage")]
    StageLoad(#[source] TroupeError),

    #[error("Failed to listen for signals")]
    Signal(#[source] std::io::Error),

    #[error("Failed to serialise stage")]
    Serialise(#[source] TroupeError),
}

impl CliError {
    pub fn invalid_stage(path: impl Into<PathBuf>, source: TroupeError) -> Self {
        Self::InvalidStage {
            path: path.into(),
            source,
        }
    }

    /// One line for the terminal, including the underlying cause.
    pub fn user_message(&self) -> String {
        match std::error::Error::source(self) {
            Some(source) => format!("{}: {}", self, source),
            None => self.to_string(),
        }
    }
}
