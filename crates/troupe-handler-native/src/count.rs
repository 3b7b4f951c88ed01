//! Frame counter.

use tracing::warn;
use troupe::{ApiCall, Backend, Envelope, Event, Message};

pub const COUNT_CAPABILITIES: &str = "\
capabilities
    data
        name = \"reset\"
        type = \"trigger\"
        help = \"Reset the count to zero\"
        api_call = \"RESET\"
inputs
    input
        type = \"Any\"
outputs
    output
        type = \"OSC\"
";

#[derive(Debug, Clone, PartialEq)]
enum CountCommand {
    Reset,
    Unsupported(String),
}

impl CountCommand {
    fn parse(call: &ApiCall) -> Self {
        match call.command.as_str() {
            "RESET" => CountCommand::Reset,
            other => CountCommand::Unsupported(other.to_string()),
        }
    }
}

/// Counts inbound frames. Every socket event emits `[/count, h total]` and
/// refreshes the `count` report field.
#[derive(Debug, Default)]
pub struct Count {
    total: i64,
}

impl Count {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self, event: &Event) {
        event
            .handle
            .set_report(Envelope::new().with("count").with(self.total));
    }
}

impl Backend for Count {
    fn on_init(&mut self, event: Event) -> Option<Message> {
        self.publish(&event);
        None
    }

    fn on_api(&mut self, event: Event) -> Option<Message> {
        match event.decode_api().map(|call| CountCommand::parse(&call)) {
            Ok(CountCommand::Reset) => {
                self.total = 0;
                self.publish(&event);
            }
            Ok(CountCommand::Unsupported(command)) => {
                warn!(actor = %event.name, %command, "unknown command")
            }
            Err(e) => warn!(actor = %event.name, "malformed api payload: {}", e),
        }
        None
    }

    fn on_socket(&mut self, event: Event) -> Option<Message> {
        let frames = event.payload.as_ref().map_or(0, |m| m.frames().len());
        self.total += frames as i64;
        self.publish(&event);
        Some(Message::from(
            Envelope::new().with("/count").with(self.total),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(CountCommand::parse(&ApiCall::new("RESET")), CountCommand::Reset);
        // A stray argument does not matter to a trigger.
        assert_eq!(
            CountCommand::parse(&ApiCall::with_argument("RESET", 1)),
            CountCommand::Reset
        );
        assert_eq!(
            CountCommand::parse(&ApiCall::new("CLEAR")),
            CountCommand::Unsupported("CLEAR".to_string())
        );
    }
}
