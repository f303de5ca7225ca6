//! Failure isolation — rolling-window deduplication of system failures.
//!
//! A system that fails every pulse would otherwise flood the error sink at
//! frame rate. The isolator keeps a set of `(system, message)` keys seen in
//! the current window; only the first occurrence per window is reported.
//! The state is owned per scheduler instance, so parallel schedulers (for
//! example in tests) never share suppression state.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default suppression window for repeated failure reports.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct DedupWindow {
    last_reset: Instant,
    seen: HashSet<String>,
}

/// Per-scheduler failure dedup state.
#[derive(Debug)]
pub struct FailureIsolator {
    window: Duration,
    state: Mutex<DedupWindow>,
}

impl FailureIsolator {
    /// Create an isolator with the given suppression window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(DedupWindow {
                last_reset: Instant::now(),
                seen: HashSet::new(),
            }),
        }
    }

    /// Returns the suppression window length.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a failure and decide whether to report it.
    ///
    /// Returns `true` exactly once per `(system, message)` pair per window;
    /// repeats within the window return `false`. If the window has expired,
    /// the seen-set is cleared and the timer restarts.
    pub fn should_report(&self, system: &str, message: &str) -> bool {
        let mut state = self.state.lock().expect("isolator lock poisoned");
        if state.last_reset.elapsed() > self.window {
            state.seen.clear();
            state.last_reset = Instant::now();
        }
        state.seen.insert(format!("{system}: {message}"))
    }

    /// Forget all seen failures and restart the window.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("isolator lock poisoned");
        state.seen.clear();
        state.last_reset = Instant::now();
    }
}

impl Default for FailureIsolator {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
