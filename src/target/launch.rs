//! One-shot background launcher.
//!
//! Mobile hosts start the application runtime from a UI callback that may
//! fire more than once (surface recreated, activity resumed). The runtime
//! must start exactly once, on its own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Starts a task on a background thread at most once
#[derive(Debug, Default)]
pub struct OneShotLauncher {
    started: AtomicBool,
}

/// Launcher for the application runtime
pub static RUNTIME_LAUNCHER: OneShotLauncher = OneShotLauncher::new();

impl OneShotLauncher {
    /// A launcher that has not started anything yet
    pub const fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
        }
    }

    /// Whether a task has been started
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Start `task` on a named thread unless a task was already started.
    ///
    /// Returns the thread handle for the first call and `None` afterwards.
    /// If the thread cannot be spawned the launcher is re-armed.
    pub fn launch<F>(&self, name: &str, task: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("{} already started, ignoring launch request", name);
            return None;
        }

        match std::thread::Builder::new().name(name.to_string()).spawn(task) {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to start {}: {}", name, e);
                self.started.store(false, Ordering::Release);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn second_launch_is_ignored() {
        let launcher = OneShotLauncher::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&runs);
        let handle = launcher
            .launch("runtime", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let counter = Arc::clone(&runs);
        assert!(
            launcher
                .launch("runtime", move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .is_none()
        );

        handle.join().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(launcher.has_started());
    }

    #[test]
    fn concurrent_callbacks_start_one_task() {
        let launcher = Arc::new(OneShotLauncher::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let callers: Vec<_> = (0..8)
            .map(|_| {
                let launcher = Arc::clone(&launcher);
                let runs = Arc::clone(&runs);
                std::thread::spawn(move || {
                    launcher.launch("runtime", move || {
                        runs.fetch_add(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();

        let handles: Vec<_> = callers
            .into_iter()
            .filter_map(|caller| caller.join().unwrap())
            .collect();
        assert_eq!(handles.len(), 1);
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    // The only test that touches the process-wide launcher
    #[test]
    fn runtime_launcher_starts_once_per_process() {
        let (tx, rx) = std::sync::mpsc::channel();

        let first = tx.clone();
        let handle = RUNTIME_LAUNCHER
            .launch("app-runtime", move || first.send("started").unwrap())
            .unwrap();
        assert!(
            RUNTIME_LAUNCHER
                .launch("app-runtime", move || tx.send("restarted").unwrap())
                .is_none()
        );

        handle.join().unwrap();
        assert!(RUNTIME_LAUNCHER.has_started());
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec!["started"]);
    }
}
