use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter string for a level: everything at `level`, the runtime at
/// `level`, and the embedded interpreter at `info`.
pub fn filter_directives(log_level: &tracing::Level) -> String {
    format!(
        "{},troupe={},rhai={}",
        log_level.as_str(),
        log_level.as_str(),
        "info"
    )
}

pub fn setup_global_logging(
    log_path: impl AsRef<Path>,
    log_level: &tracing::Level,
    with_stdout: bool,
) -> Result<()> {
    let log_path = log_path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }

    let enhanced_filter = filter_directives(log_level);

    let file = File::create(log_path)
        .with_context(|| format!("creating log file {}", log_path.display()))?;
    let file_writer = std::sync::Mutex::new(file).with_max_level(tracing::Level::TRACE);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(false)
        .with_filter(EnvFilter::builder().parse(&enhanced_filter)?);

    if with_stdout {
        let stdout_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            .with_target(true)
            .with_ansi(true)
            .pretty()
            .with_filter(EnvFilter::builder().parse(&enhanced_filter)?);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stdout_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    } else {
        tracing_subscriber::registry()
            .with(file_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    }

    Ok(())
}

/// Stdout-only variant, for runs without a log file.
pub fn setup_stdout_logging(log_level: &tracing::Level) -> Result<()> {
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_filter(EnvFilter::builder().parse(filter_directives(log_level))?);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_include_runtime_and_interpreter() {
        assert_eq!(
            filter_directives(&tracing::Level::DEBUG),
            "DEBUG,troupe=DEBUG,rhai=info"
        );
        assert!(EnvFilter::builder()
            .parse(filter_directives(&tracing::Level::WARN))
            .is_ok());
    }
}
