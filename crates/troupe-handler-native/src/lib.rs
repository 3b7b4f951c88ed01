//! # Native Backends
//!
//! Actor backends implemented directly in Rust. Each one is a small state
//! machine: timer and socket events run synchronous transitions, and there is
//! no embedded runtime to guard.
//!
//! * [`Pulse`]: emits a counter on a fixed interval
//! * [`Count`]: counts inbound frames
//! * [`Log`]: traces inbound frames and passes them through

pub mod count;
pub mod log;
pub mod pulse;

pub use count::Count;
pub use log::Log;
pub use pulse::Pulse;

use thiserror::Error;
use troupe::{ActorTypeRegistry, ApiCall, TroupeError, Value};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("{command} expects an argument")]
    MissingArgument { command: &'static str },

    #[error("{command}: invalid argument {value:?}")]
    InvalidArgument { command: &'static str, value: Value },
}

/// Integer argument, accepting any numeric wire type.
pub(crate) fn int_argument(command: &'static str, call: &ApiCall) -> Result<i64, CommandError> {
    let value = call
        .argument
        .as_ref()
        .ok_or(CommandError::MissingArgument { command })?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| CommandError::InvalidArgument {
            command,
            value: value.clone(),
        })
}

/// String argument, empty allowed.
pub(crate) fn string_argument(command: &'static str, call: &ApiCall) -> Result<String, CommandError> {
    let value = call
        .argument
        .as_ref()
        .ok_or(CommandError::MissingArgument { command })?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| CommandError::InvalidArgument {
            command,
            value: value.clone(),
        })
}

/// Non-empty string argument.
pub(crate) fn text_argument(command: &'static str, call: &ApiCall) -> Result<String, CommandError> {
    let value = call
        .argument
        .as_ref()
        .ok_or(CommandError::MissingArgument { command })?;
    match value.as_str() {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(CommandError::InvalidArgument {
            command,
            value: value.clone(),
        }),
    }
}

/// Register `Pulse`, `Count` and `Log`.
pub fn register(registry: &mut ActorTypeRegistry) -> Result<(), TroupeError> {
    registry.register("Pulse", Some(pulse::PULSE_CAPABILITIES), Pulse::new)?;
    registry.register("Count", Some(count::COUNT_CAPABILITIES), Count::new)?;
    registry.register("Log", Some(log::LOG_CAPABILITIES), Log::new)?;
    Ok(())
}
