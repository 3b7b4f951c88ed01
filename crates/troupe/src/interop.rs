//! # Interop Serialization Lock
//!
//! An embedded runtime is not safe to enter from two threads at once. Each
//! backend that hosts one wraps all of the runtime's state in an
//! [`InteropLock`] and touches it only inside [`InteropLock::enter`]. The
//! guard is released when the closure returns, including early returns and
//! unwinding, so no call site can leave the runtime locked.
//!
//! The lock is named after the actor it belongs to so contention shows up
//! in traces with something readable attached.

use parking_lot::Mutex;
use std::fmt;
use tracing::trace;

pub struct InteropLock<T> {
    name: String,
    state: Mutex<T>,
}

impl<T> InteropLock<T> {
    pub fn new(name: impl Into<String>, state: T) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(state),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `f` with exclusive access to the runtime state.
    ///
    /// Blocks while another thread is inside. This is the only point where a
    /// dispatch may wait on another actor's work.
    pub fn enter<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = match self.state.try_lock() {
            Some(guard) => guard,
            None => {
                trace!(lock = %self.name, "waiting for interop lock");
                self.state.lock()
            }
        };
        f(&mut guard)
    }

    /// Like [`enter`](Self::enter) but gives up instead of waiting.
    pub fn try_enter<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.state.try_lock().map(|mut guard| f(&mut guard))
    }

    pub fn is_held(&self) -> bool {
        self.state.is_locked()
    }

    pub fn into_inner(self) -> T {
        self.state.into_inner()
    }
}

impl<T> fmt::Debug for InteropLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteropLock")
            .field("name", &self.name)
            .field("held", &self.is_held())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn at_most_one_thread_inside() {
        let lock = Arc::new(InteropLock::new("test", 0u32));
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let lock = lock.clone();
                let inside = inside.clone();
                let peak = peak.clone();
                thread::spawn(move || {
                    for _ in 0..20 {
                        lock.enter(|count| {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            thread::sleep(Duration::from_micros(50));
                            *count += 1;
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(lock.enter(|count| *count), 160);
    }

    #[test]
    fn released_on_error_and_panic() {
        let lock = InteropLock::new("test", Vec::<u8>::new());

        let result: Result<(), &str> = lock.enter(|_| Err("boom"));
        assert!(result.is_err());
        assert!(!lock.is_held());

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            lock.enter(|_| panic!("inside runtime"));
        }));
        assert!(panicked.is_err());
        assert!(!lock.is_held());
        assert_eq!(lock.try_enter(|v| v.len()), Some(0));
    }

    #[test]
    fn try_enter_gives_up_while_held() {
        let lock = InteropLock::new("test", ());
        lock.enter(|_| {
            assert!(lock.is_held());
            assert_eq!(lock.try_enter(|_| ()), None);
        });
    }
}
