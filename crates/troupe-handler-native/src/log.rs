//! Pass-through tracer.

use tracing::{info, warn};
use troupe::{ApiCall, Backend, Event, Frame, Message};

use crate::{string_argument, CommandError};

pub const LOG_CAPABILITIES: &str = "\
capabilities
    data
        name = \"prefix\"
        type = \"string\"
        help = \"Text logged in front of every frame\"
        value = \"\"
        api_call = \"SET PREFIX\"
        api_value = \"s\"
inputs
    input
        type = \"Any\"
outputs
    output
        type = \"Any\"
";

#[derive(Debug, Clone, PartialEq)]
enum LogCommand {
    SetPrefix(String),
    Unsupported(String),
}

impl LogCommand {
    fn parse(call: &ApiCall) -> Result<Self, CommandError> {
        Ok(match call.command.as_str() {
            // An empty prefix is a valid value here.
            "SET PREFIX" => LogCommand::SetPrefix(string_argument("SET PREFIX", call)?),
            other => LogCommand::Unsupported(other.to_string()),
        })
    }
}

/// Logs every inbound frame under the `troupe::log` target and forwards the
/// message unchanged.
#[derive(Debug, Default)]
pub struct Log {
    prefix: String,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for Log {
    fn on_api(&mut self, event: Event) -> Option<Message> {
        let call = match event.decode_api() {
            Ok(call) => call,
            Err(e) => {
                warn!(actor = %event.name, "malformed api payload: {}", e);
                return None;
            }
        };
        match LogCommand::parse(&call) {
            Ok(LogCommand::SetPrefix(prefix)) => self.prefix = prefix,
            Ok(LogCommand::Unsupported(command)) => {
                warn!(actor = %event.name, %command, "unknown command")
            }
            Err(e) => warn!(actor = %event.name, "rejected api call: {}", e),
        }
        None
    }

    fn on_socket(&mut self, mut event: Event) -> Option<Message> {
        let message = event.take_payload()?;
        for frame in message.frames() {
            match frame {
                Frame::Envelope(envelope) => {
                    info!(target: "troupe::log", actor = %event.name, "{}{}", self.prefix, envelope)
                }
                Frame::Raw(bytes) => match frame.to_envelope() {
                    Ok(envelope) => {
                        info!(target: "troupe::log", actor = %event.name, "{}{} (raw)", self.prefix, envelope)
                    }
                    Err(e) => warn!(
                        actor = %event.name,
                        len = bytes.len(),
                        "undecodable raw frame: {}",
                        e
                    ),
                },
            }
        }
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use troupe::Value;

    #[test]
    fn parses_commands() {
        assert_eq!(
            LogCommand::parse(&ApiCall::with_argument("SET PREFIX", "> ")),
            Ok(LogCommand::SetPrefix("> ".to_string()))
        );
        assert_eq!(
            LogCommand::parse(&ApiCall::with_argument("SET PREFIX", "")),
            Ok(LogCommand::SetPrefix(String::new()))
        );
        assert_eq!(
            LogCommand::parse(&ApiCall::with_argument("SET PREFIX", 7)),
            Err(CommandError::InvalidArgument {
                command: "SET PREFIX",
                value: Value::Int32(7)
            })
        );
        assert_eq!(
            LogCommand::parse(&ApiCall::new("SET PREFIX")),
            Err(CommandError::MissingArgument {
                command: "SET PREFIX"
            })
        );
        assert_eq!(
            LogCommand::parse(&ApiCall::new("FLUSH")),
            Ok(LogCommand::Unsupported("FLUSH".to_string()))
        );
    }
}
