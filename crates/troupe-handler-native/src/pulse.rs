//! Interval generator.

use tracing::{debug, warn};
use troupe::{ApiCall, Backend, Envelope, Event, Message};

use crate::{int_argument, text_argument, CommandError};

pub const PULSE_CAPABILITIES: &str = "\
capabilities
    data
        name = \"rate\"
        type = \"int\"
        min = \"0\"
        max = \"10000\"
        step = \"10\"
        help = \"Milliseconds between pulses, 0 stops\"
        value = \"1000\"
        api_call = \"SET RATE\"
        api_value = \"i\"
    data
        name = \"address\"
        type = \"string\"
        help = \"Address of emitted messages\"
        value = \"/pulse\"
        api_call = \"SET ADDRESS\"
        api_value = \"s\"
outputs
    output
        type = \"OSC\"
";

const DEFAULT_RATE: i64 = 1000;

#[derive(Debug, Clone, PartialEq)]
enum PulseCommand {
    SetRate(i64),
    SetAddress(String),
    Unsupported(String),
}

impl PulseCommand {
    fn parse(call: &ApiCall) -> Result<Self, CommandError> {
        Ok(match call.command.as_str() {
            "SET RATE" => PulseCommand::SetRate(int_argument("SET RATE", call)?),
            "SET ADDRESS" => PulseCommand::SetAddress(text_argument("SET ADDRESS", call)?),
            other => PulseCommand::Unsupported(other.to_string()),
        })
    }
}

/// Emits `[address, i counter]` every `rate` milliseconds.
#[derive(Debug)]
pub struct Pulse {
    rate: i64,
    address: String,
    counter: i32,
}

impl Default for Pulse {
    fn default() -> Self {
        Self::new()
    }
}

impl Pulse {
    pub fn new() -> Self {
        Self {
            rate: DEFAULT_RATE,
            address: "/pulse".to_string(),
            counter: 0,
        }
    }

    fn timer_interval(&self) -> i64 {
        if self.rate <= 0 {
            -1
        } else {
            self.rate
        }
    }
}

impl Backend for Pulse {
    fn on_init(&mut self, event: Event) -> Option<Message> {
        event.handle.set_timeout(self.timer_interval());
        None
    }

    fn on_api(&mut self, event: Event) -> Option<Message> {
        let command = event
            .decode_api()
            .map_err(|e| e.to_string())
            .and_then(|call| PulseCommand::parse(&call).map_err(|e| e.to_string()));
        match command {
            Ok(PulseCommand::SetRate(rate)) => {
                self.rate = rate.max(0);
                debug!(actor = %event.name, rate = self.rate, "pulse rate");
                event.handle.set_timeout(self.timer_interval());
            }
            Ok(PulseCommand::SetAddress(address)) => self.address = address,
            Ok(PulseCommand::Unsupported(command)) => {
                warn!(actor = %event.name, %command, "unknown command")
            }
            Err(e) => warn!(actor = %event.name, "rejected api call: {}", e),
        }
        None
    }

    fn on_timer(&mut self, _event: Event) -> Option<Message> {
        self.counter = self.counter.wrapping_add(1);
        Some(Message::from(
            Envelope::new()
                .with(self.address.as_str())
                .with(self.counter),
        ))
    }

    fn on_stop(&mut self, event: Event) -> Option<Message> {
        event.handle.set_timeout(-1);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use troupe::Value;

    #[test]
    fn parses_commands() {
        assert_eq!(
            PulseCommand::parse(&ApiCall::with_argument("SET RATE", 250)),
            Ok(PulseCommand::SetRate(250))
        );
        assert_eq!(
            PulseCommand::parse(&ApiCall::with_argument("SET RATE", "40")),
            Ok(PulseCommand::SetRate(40))
        );
        assert_eq!(
            PulseCommand::parse(&ApiCall::new("SET RATE")),
            Err(CommandError::MissingArgument {
                command: "SET RATE"
            })
        );
        assert_eq!(
            PulseCommand::parse(&ApiCall::with_argument("SET ADDRESS", "")),
            Err(CommandError::InvalidArgument {
                command: "SET ADDRESS",
                value: Value::Str(String::new())
            })
        );
        assert_eq!(
            PulseCommand::parse(&ApiCall::new("JUMP")),
            Ok(PulseCommand::Unsupported("JUMP".to_string()))
        );
    }

    #[test]
    fn zero_rate_disables_timer() {
        let mut pulse = Pulse::new();
        assert_eq!(pulse.timer_interval(), 1000);
        pulse.rate = 0;
        assert_eq!(pulse.timer_interval(), -1);
    }
}
