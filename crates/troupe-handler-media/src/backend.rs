use crate::pipeline::{BusMessage, MediaPipeline, PipelineError, PipelineState};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use troupe::{ActorHandle, ApiCall, Backend, Envelope, Event, Message, Value, TIMER_NEVER};

/// Timer interval while playing, so the engine's loop keeps being pumped
/// even when no other events arrive.
pub const PLAYING_TIMEOUT_MS: i64 = 500;

#[derive(Error, Debug, Clone, PartialEq)]
enum CommandError {
    #[error("{command} expects an argument")]
    MissingArgument { command: &'static str },

    #[error("{command}: empty value rejected")]
    Empty { command: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
enum MediaCommand {
    SetUrl(String),
    Play,
    Pause,
    Back,
    SetLoopPlay(bool),
    SetAutoplay(bool),
    Unsupported(String),
}

impl MediaCommand {
    fn parse(call: &ApiCall) -> Result<Self, CommandError> {
        Ok(match call.command.as_str() {
            "SET URL" => {
                let url = call
                    .argument
                    .as_ref()
                    .and_then(Value::as_str)
                    .ok_or(CommandError::MissingArgument { command: "SET URL" })?;
                if url.is_empty() {
                    return Err(CommandError::Empty { command: "SET URL" });
                }
                MediaCommand::SetUrl(url.to_string())
            }
            "PLAY" => MediaCommand::Play,
            "PAUSE" => MediaCommand::Pause,
            "BACK" => MediaCommand::Back,
            "SET LOOPPLAY" => MediaCommand::SetLoopPlay(flag("SET LOOPPLAY", call)?),
            "SET AUTOPLAY" => MediaCommand::SetAutoplay(flag("SET AUTOPLAY", call)?),
            other => MediaCommand::Unsupported(other.to_string()),
        })
    }
}

/// `True` / `False` as text or a bool.
fn flag(command: &'static str, call: &ApiCall) -> Result<bool, CommandError> {
    match call.argument.as_ref() {
        Some(Value::Str(text)) => Ok(text == "True"),
        Some(other) => Ok(other.as_bool().or_else(|| other.as_i64().map(|i| i != 0)).unwrap_or(false)),
        None => Err(CommandError::MissingArgument { command }),
    }
}

fn loop_seek<P: MediaPipeline>(pipeline: &mut P) -> Result<(), PipelineError> {
    if !pipeline.is_seekable() {
        return Err(PipelineError::NotSeekable);
    }
    pipeline.seek_to_start()
}

/// Drives a [`MediaPipeline`] from actor events.
///
/// The pipeline is built on INIT. After every dispatch the engine's loop is
/// drained without blocking, so a dispatch may observe state changes from
/// work queued before it began.
pub struct MediaBackend<P: MediaPipeline> {
    build: Box<dyn FnMut() -> Result<P, PipelineError> + Send>,
    pipeline: Option<P>,
    playing: bool,
    loop_play: bool,
    autoplay: bool,
}

impl<P: MediaPipeline + 'static> MediaBackend<P> {
    pub fn new<F>(build: F) -> Self
    where
        F: FnMut() -> Result<P, PipelineError> + Send + 'static,
    {
        Self {
            build: Box::new(build),
            pipeline: None,
            playing: false,
            loop_play: false,
            autoplay: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    fn play(&mut self, name: &str) -> Result<(), PipelineError> {
        let pipeline = self.pipeline.as_mut().ok_or(PipelineError::NotBuilt)?;
        match pipeline.set_state(PipelineState::Playing) {
            Ok(()) => {
                self.playing = true;
                Ok(())
            }
            Err(e) => {
                error!(actor = %name, "unable to set the pipeline to the playing state");
                self.playing = false;
                Err(e)
            }
        }
    }

    fn apply(&mut self, handle: &ActorHandle, command: MediaCommand) -> Result<(), PipelineError> {
        let name = handle.name();
        match command {
            MediaCommand::SetUrl(url) => {
                self.pipeline
                    .as_mut()
                    .ok_or(PipelineError::NotBuilt)?
                    .set_uri(&url)?;
                info!(actor = %name, %url, "media source set");
                if self.autoplay {
                    self.play(name)?;
                }
            }
            MediaCommand::Play => {
                self.play(name)?;
                handle.set_timeout(PLAYING_TIMEOUT_MS);
            }
            MediaCommand::Pause => {
                self.pipeline
                    .as_mut()
                    .ok_or(PipelineError::NotBuilt)?
                    .set_state(PipelineState::Paused)?;
                self.playing = false;
            }
            MediaCommand::Back => {
                let pipeline = self.pipeline.as_mut().ok_or(PipelineError::NotBuilt)?;
                loop_seek(pipeline)?;
            }
            MediaCommand::SetLoopPlay(on) => self.loop_play = on,
            MediaCommand::SetAutoplay(on) => {
                self.autoplay = on;
                if on {
                    self.play(name)?;
                }
            }
            MediaCommand::Unsupported(command) => {
                warn!(actor = %name, %command, "unknown command");
            }
        }
        Ok(())
    }

    /// Drain the engine and react to what it posted, then refresh the report.
    fn pump(&mut self, handle: &ActorHandle) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        for message in pipeline.pump() {
            match message {
                BusMessage::Error {
                    source,
                    message,
                    debug: details,
                } => error!(
                    actor = %handle.name(),
                    source = source.as_deref().unwrap_or("unknown"),
                    debug = details.as_deref().unwrap_or("none"),
                    "pipeline error: {}",
                    message
                ),
                BusMessage::EndOfStream | BusMessage::SegmentDone if self.loop_play => {
                    match loop_seek(pipeline) {
                        Ok(()) => info!(actor = %handle.name(), "looping stream"),
                        Err(e) => warn!(actor = %handle.name(), "cannot loop: {}", e),
                    }
                }
                BusMessage::EndOfStream => info!(actor = %handle.name(), "end of stream reached"),
                BusMessage::SegmentDone => debug!(actor = %handle.name(), "segment done"),
                BusMessage::StateChanged { old, new } => {
                    debug!(actor = %handle.name(), %old, %new, "pipeline state changed");
                    self.playing = new == PipelineState::Playing;
                }
            }
        }
        handle.set_report(
            Envelope::new()
                .with("playing")
                .with(self.playing)
                .with("loop")
                .with(self.loop_play)
                .with("autoplay")
                .with(self.autoplay),
        );
    }
}

impl<P: MediaPipeline + 'static> Backend for MediaBackend<P> {
    fn on_init(&mut self, event: Event) -> Option<Message> {
        match (self.build)() {
            Ok(pipeline) => {
                debug!(actor = %event.name, "media pipeline built");
                self.pipeline = Some(pipeline);
            }
            Err(e) => error!(actor = %event.name, "failed to build media pipeline: {}", e),
        }
        self.pump(&event.handle);
        None
    }

    fn on_api(&mut self, event: Event) -> Option<Message> {
        match event.decode_api() {
            Ok(call) => match MediaCommand::parse(&call) {
                Ok(command) => {
                    if let Err(e) = self.apply(&event.handle, command) {
                        error!(actor = %event.name, command = %call.command, "{}", e);
                    }
                }
                Err(e) => warn!(actor = %event.name, "rejected api call: {}", e),
            },
            Err(e) => warn!(actor = %event.name, "malformed api payload: {}", e),
        }
        self.pump(&event.handle);
        None
    }

    fn on_timer(&mut self, event: Event) -> Option<Message> {
        self.pump(&event.handle);
        None
    }

    fn on_socket(&mut self, event: Event) -> Option<Message> {
        self.pump(&event.handle);
        None
    }

    fn on_custom_fd(&mut self, event: Event) -> Option<Message> {
        self.pump(&event.handle);
        None
    }

    fn on_stop(&mut self, event: Event) -> Option<Message> {
        event.handle.set_timeout(TIMER_NEVER);
        self.pump(&event.handle);
        None
    }

    fn on_destroy(mut self: Box<Self>, event: Event) -> Option<Message> {
        if let Some(mut pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.set_state(PipelineState::Null) {
                warn!(actor = %event.name, "{}", e);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_commands() {
        assert_eq!(
            MediaCommand::parse(&ApiCall::with_argument("SET URL", "file:///a.mp4")),
            Ok(MediaCommand::SetUrl("file:///a.mp4".to_string()))
        );
        assert_eq!(
            MediaCommand::parse(&ApiCall::with_argument("SET URL", "")),
            Err(CommandError::Empty { command: "SET URL" })
        );
        assert_eq!(
            MediaCommand::parse(&ApiCall::new("SET URL")),
            Err(CommandError::MissingArgument { command: "SET URL" })
        );
        assert_eq!(
            MediaCommand::parse(&ApiCall::with_argument("SET LOOPPLAY", "True")),
            Ok(MediaCommand::SetLoopPlay(true))
        );
        assert_eq!(
            MediaCommand::parse(&ApiCall::with_argument("SET LOOPPLAY", "yes")),
            Ok(MediaCommand::SetLoopPlay(false))
        );
        assert_eq!(
            MediaCommand::parse(&ApiCall::with_argument("SET AUTOPLAY", true)),
            Ok(MediaCommand::SetAutoplay(true))
        );
        assert_eq!(MediaCommand::parse(&ApiCall::new("BACK")), Ok(MediaCommand::Back));
        assert_eq!(
            MediaCommand::parse(&ApiCall::new("REWIND")),
            Ok(MediaCommand::Unsupported("REWIND".to_string()))
        );
    }
}
