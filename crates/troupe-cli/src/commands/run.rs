use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use troupe::config::LogOutput;
use troupe::logging::{setup_global_logging, setup_stdout_logging};
use troupe::{Stage, StageConfig, Termination, TerminationRequest};

use crate::error::CliError;

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Path to the stage file
    #[arg(required = true)]
    pub stage: PathBuf,

    /// Override the stage file's log level
    #[arg(short, long)]
    pub log_level: Option<String>,
}

/// Why the stage is going down.
#[derive(Debug)]
enum Stop {
    Interrupt,
    Terminate,
    Requested(TerminationRequest),
}

pub async fn execute_async(args: &RunArgs) -> Result<(), CliError> {
    let mut config = StageConfig::from_file(&args.stage)
        .map_err(|e| CliError::invalid_stage(&args.stage, e))?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    let level = config.logging.tracing_level();
    let logging = match config.logging.output {
        LogOutput::Stdout => setup_stdout_logging(&level),
        LogOutput::File => setup_global_logging(config.logging.log_path(), &level, false),
    };
    logging.map_err(CliError::Logging)?;

    let registry = crate::build_registry(&config.script)?;
    debug!(types = registry.len(), "registered actor types");

    let (termination_tx, mut termination_rx) = mpsc::unbounded_channel();
    let mut stage = Stage::new(registry).with_termination(Termination::notify(termination_tx));

    if let Err(e) = stage.load(&config) {
        stage.shutdown().await;
        return Err(CliError::StageLoad(e));
    }
    info!(
        stage = %args.stage.display(),
        actors = config.actors.len(),
        "stage running"
    );

    let stop = wait_for_stop(&mut termination_rx).await?;
    match &stop {
        Stop::Requested(request) => {
            info!(actor = %request.actor, reason = %request.reason, "actor requested termination")
        }
        other => info!(signal = ?other, "received signal"),
    }

    stage.shutdown().await;
    info!("stage stopped");
    Ok(())
}

async fn wait_for_stop(
    requests: &mut mpsc::UnboundedReceiver<TerminationRequest>,
) -> Result<Stop, CliError> {
    let terminate = terminate_signal();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(CliError::Signal)?;
            Ok(Stop::Interrupt)
        }
        result = terminate => {
            result?;
            Ok(Stop::Terminate)
        }
        request = requests.recv() => match request {
            Some(request) => Ok(Stop::Requested(request)),
            None => {
                warn!("termination channel closed");
                Ok(Stop::Terminate)
            }
        },
    }
}

#[cfg(unix)]
async fn terminate_signal() -> Result<(), CliError> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).map_err(CliError::Signal)?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate_signal() -> Result<(), CliError> {
    std::future::pending().await
}
