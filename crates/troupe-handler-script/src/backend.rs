//! The script actor.

use crate::codec::{self, Reply};
use crate::host::ScriptHost;
use crate::reload::{ReloadOutcome, ScriptRuntime};
use crate::watch::{FileWatch, WatchChange};
use crate::ScriptError;
use rhai::FuncArgs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use troupe::{
    ActorHandle, ApiCall, Backend, Event, InteropLock, Message, SourceToken, Value, TIMER_NEVER,
};

#[derive(Debug, Clone, PartialEq)]
enum ScriptCommand {
    SetFile(PathBuf),
    Unsupported(String),
}

impl ScriptCommand {
    fn parse(call: &ApiCall) -> Result<Self, ScriptError> {
        match call.command.as_str() {
            // Only a removed file unloads; an empty filename keeps what runs.
            "SET FILE" => match &call.argument {
                Some(Value::Str(path)) if !path.is_empty() => {
                    Ok(ScriptCommand::SetFile(PathBuf::from(path)))
                }
                Some(Value::Str(_)) | None => Err(ScriptError::EmptyArgument {
                    command: "SET FILE",
                }),
                Some(other) => Err(ScriptError::UnsupportedValue(other.tag().to_string())),
            },
            other => Ok(ScriptCommand::Unsupported(other.to_string())),
        }
    }
}

struct ArmedWatch {
    token: SourceToken,
    watch: FileWatch,
}

/// Runs a script file as an actor and reloads it whenever the file changes.
///
/// Everything touching the interpreter runs inside the actor's
/// [`InteropLock`]: handler calls, reloads requested through `SET FILE`, and
/// reloads requested by the file watch.
pub struct ScriptBackend {
    runtime: InteropLock<ScriptRuntime>,
    watch: Option<ArmedWatch>,
}

impl ScriptBackend {
    pub fn new(host: Arc<ScriptHost>) -> Self {
        Self {
            runtime: InteropLock::new("script", ScriptRuntime::new(host)),
            watch: None,
        }
    }

    fn load(&mut self, handle: &ActorHandle, path: &Path) {
        let outcome = self.runtime.enter(|rt| {
            let outcome = rt.load(path);
            (outcome, rt.instance().and_then(|i| i.timeout()))
        });
        match outcome {
            (Ok(ReloadOutcome::Unloaded), _) => {
                self.disarm(handle);
                info!(actor = %handle.name(), "script unloaded");
            }
            (Ok(ReloadOutcome::Reloaded), timeout) => {
                handle.set_timeout(timeout.unwrap_or(TIMER_NEVER));
            }
            (Ok(ReloadOutcome::Fresh), timeout) => {
                self.arm(handle, path);
                handle.set_timeout(timeout.unwrap_or(TIMER_NEVER));
            }
            (Err(e), _) => {
                error!(actor = %handle.name(), path = %path.display(), "failed to load script: {}", e);
                if !self.runtime.enter(|rt| rt.is_loaded()) {
                    self.disarm(handle);
                    handle.set_timeout(TIMER_NEVER);
                }
            }
        }
    }

    fn arm(&mut self, handle: &ActorHandle, path: &Path) {
        self.disarm(handle);
        let token = SourceToken::next();
        let notifier = handle.register_source(token);
        match FileWatch::arm(path, move || {
            notifier.ready();
        }) {
            Ok(watch) => {
                debug!(actor = %handle.name(), path = %path.display(), %token, "watching script");
                self.watch = Some(ArmedWatch { token, watch });
            }
            Err(e) => {
                warn!(actor = %handle.name(), path = %path.display(), "cannot watch script: {}", e);
                handle.unregister_source(token);
            }
        }
    }

    fn disarm(&mut self, handle: &ActorHandle) {
        if let Some(armed) = self.watch.take() {
            handle.unregister_source(armed.token);
            debug!(actor = %handle.name(), path = %armed.watch.path().display(), "stopped watching script");
        }
    }

    /// Call a handler and turn its return value into a reply. Refreshes the
    /// actor's timer from the instance's `timeout` member afterwards.
    fn invoke(&self, event: &Event, method: &str, args: impl FuncArgs) -> Option<Reply> {
        let (result, timeout) = self.runtime.enter(|rt| {
            let result = rt.call(method, args);
            (result, rt.instance().and_then(|i| i.timeout()))
        });
        event.handle.set_timeout(timeout.unwrap_or(TIMER_NEVER));

        match result.and_then(codec::encode_reply) {
            Ok(Reply::Exit) => {
                info!(actor = %event.name, "script returned SystemExit, terminating");
                event.handle.terminate_process("SystemExit");
                None
            }
            Ok(reply) => Some(reply),
            Err(e) => {
                error!(actor = %event.name, "{}", e);
                None
            }
        }
    }

    fn has_instance(&self) -> bool {
        self.runtime.enter(|rt| rt.is_loaded())
    }
}

fn event_args(event: &Event) -> (String, String, String) {
    (
        event.kind.as_str().to_string(),
        event.name.clone(),
        event.correlation_id.to_string(),
    )
}

impl Backend for ScriptBackend {
    fn on_api(&mut self, event: Event) -> Option<Message> {
        let command = event
            .decode_api()
            .map_err(|e| ScriptError::Frame(e.into()))
            .and_then(|call| ScriptCommand::parse(&call));
        match command {
            Ok(ScriptCommand::SetFile(path)) => self.load(&event.handle, &path),
            Ok(ScriptCommand::Unsupported(command)) => {
                warn!(actor = %event.name, %command, "unknown command")
            }
            Err(e) => warn!(actor = %event.name, "rejected api call: {}", e),
        }
        None
    }

    fn on_timer(&mut self, event: Event) -> Option<Message> {
        if !self.has_instance() {
            return None;
        }
        match self.invoke(&event, "handleTimer", event_args(&event))? {
            Reply::Frame(frame) => Some(Message::single(frame)),
            _ => None,
        }
    }

    fn on_socket(&mut self, mut event: Event) -> Option<Message> {
        let inbound = event.take_payload()?;
        if !self.has_instance() {
            debug!(actor = %event.name, "no script loaded, dropping message");
            return None;
        }

        let mut outbound = Message::new();
        for frame in inbound.frames() {
            let decoded = frame
                .to_envelope()
                .map_err(ScriptError::from)
                .and_then(|envelope| codec::decode_socket(&envelope));
            let (address, args) = match decoded {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!(actor = %event.name, "skipping frame: {}", e);
                    continue;
                }
            };
            let (kind, name, uuid) = event_args(&event);
            if let Some(Reply::Frame(reply)) =
                self.invoke(&event, "handleSocket", (address, args, kind, name, uuid))
            {
                outbound.push(reply);
            }
        }
        (!outbound.is_empty()).then_some(outbound)
    }

    fn on_custom_fd(&mut self, event: Event) -> Option<Message> {
        let token = event.source_token()?;
        let change = match &self.watch {
            Some(armed) if armed.token == token => armed.watch.take_change(),
            _ => {
                debug!(actor = %event.name, %token, "readiness for unknown source");
                return None;
            }
        };
        match change {
            Some(WatchChange::Removed) => {
                warn!(actor = %event.name, "watched script was removed");
                self.load(&event.handle, Path::new(""));
            }
            Some(WatchChange::Written) => {
                let current = self.runtime.enter(|rt| rt.current_path().map(Path::to_path_buf));
                let path = current.unwrap_or_else(|| {
                    self.watch
                        .as_ref()
                        .map(|armed| armed.watch.path().to_path_buf())
                        .unwrap_or_default()
                });
                self.load(&event.handle, &path);
            }
            None => {}
        }
        None
    }

    fn on_stop(&mut self, event: Event) -> Option<Message> {
        if self.has_instance() {
            self.invoke(&event, "handleStop", event_args(&event));
        }
        self.disarm(&event.handle);
        None
    }

    fn on_destroy(self: Box<Self>, event: Event) -> Option<Message> {
        let runtime = self.runtime.into_inner();
        debug!(actor = %event.name, phase = runtime.phase().name(), "destroying script actor");
        drop(runtime);
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
            ScriptCommand::parse(&ApiCall::with_argument("SET FILE", "a.rhai")).unwrap(),
            ScriptCommand::SetFile(PathBuf::from("a.rhai"))
        );
        assert!(matches!(
            ScriptCommand::parse(&ApiCall::with_argument("SET FILE", "")),
            Err(ScriptError::EmptyArgument { command: "SET FILE" })
        ));
        assert!(matches!(
            ScriptCommand::parse(&ApiCall::new("SET FILE")),
            Err(ScriptError::EmptyArgument { .. })
        ));
        assert_eq!(
            ScriptCommand::parse(&ApiCall::new("RUN")).unwrap(),
            ScriptCommand::Unsupported("RUN".to_string())
        );
        assert!(ScriptCommand::parse(&ApiCall::with_argument("SET FILE", 3)).is_err());
    }
}
