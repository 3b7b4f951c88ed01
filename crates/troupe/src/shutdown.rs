use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Default timeout for waiting for an actor to finish STOP and DESTROY
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A backend asking for the whole process to go down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationRequest {
    pub actor: String,
    pub reason: String,
}

#[derive(Debug)]
enum TerminationMode {
    /// SIGTERM to the process group, or exit where there are no signals
    Signal,
    Notify(mpsc::UnboundedSender<TerminationRequest>),
}

/// Process-level termination channel.
///
/// This is not a normal actor shutdown: a backend that raises it is asking
/// for everything to stop. The default mode delivers a real signal so the
/// embedding process runs its usual signal handling; [`Termination::notify`]
/// hands the request to a channel instead.
#[derive(Debug, Clone)]
pub struct Termination {
    mode: Arc<TerminationMode>,
}

impl Default for Termination {
    fn default() -> Self {
        Self::signal()
    }
}

impl Termination {
    pub fn signal() -> Self {
        Self {
            mode: Arc::new(TerminationMode::Signal),
        }
    }

    pub fn notify(sender: mpsc::UnboundedSender<TerminationRequest>) -> Self {
        Self {
            mode: Arc::new(TerminationMode::Notify(sender)),
        }
    }

    pub fn raise(&self, request: TerminationRequest) {
        warn!(actor = %request.actor, reason = %request.reason, "process termination requested");
        match self.mode.as_ref() {
            TerminationMode::Signal => raise_process_signal(),
            TerminationMode::Notify(sender) => {
                if sender.send(request).is_err() {
                    error!("termination listener is gone, raising the process signal instead");
                    raise_process_signal();
                }
            }
        }
    }
}

#[cfg(unix)]
fn raise_process_signal() {
    // SAFETY: kill(2) with pid 0 targets our own process group and has no
    // memory safety requirements.
    let rc = unsafe { libc::kill(0, libc::SIGTERM) };
    if rc != 0 {
        error!("failed to raise SIGTERM: {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn raise_process_signal() {
    std::process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_mode_delivers_request() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let termination = Termination::notify(tx);
        termination.raise(TerminationRequest {
            actor: "script".to_string(),
            reason: "SystemExit".to_string(),
        });
        let request = rx.try_recv().unwrap();
        assert_eq!(request.actor, "script");
        assert_eq!(request.reason, "SystemExit");
    }
}
