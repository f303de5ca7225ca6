//! Reporting seams — the error sink and the profiling hook.
//!
//! Both are collaborator interfaces the scheduler consumes, not defines:
//! hosts plug in their own implementations, and the defaults route through
//! `tracing` so an unconfigured scheduler is still observable.

use std::time::Duration;

use tracing::{error, trace};

/// A runtime fault captured by the driver.
///
/// These never stop the process; they are handed to the [`ErrorSink`] and
/// execution continues.
#[derive(Debug, Clone)]
pub enum FaultReport {
    /// A system's work function returned an error or panicked. Reported at
    /// most once per `(system, message)` pair per suppression window.
    SystemFailure {
        /// Name of the failing system.
        system: String,
        /// The failure message (error chain or panic payload).
        message: String,
        /// How long repeats of this report will be suppressed.
        window: Duration,
    },
    /// The previous pulse of a trigger group was still running when the
    /// next one fired. The stale pulse was terminated; its remaining
    /// systems were skipped. Never suppressed.
    PulseOverrun {
        /// The trigger group whose pulse overran.
        trigger: String,
        /// The system that was executing when the pulse was terminated,
        /// if it had reached one.
        last_system: Option<String>,
    },
}

/// Non-blocking sink for runtime fault reports.
pub trait ErrorSink: Send + Sync {
    /// Deliver one report. Must not block the pulse path.
    fn report(&self, report: FaultReport);
}

/// Default sink: structured `tracing` error events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, report: FaultReport) {
        match report {
            FaultReport::SystemFailure {
                system,
                message,
                window,
            } => {
                error!(
                    system = %system,
                    message = %message,
                    suppress_secs = window.as_secs(),
                    "system failed; repeats suppressed for the rest of the window"
                );
            }
            FaultReport::PulseOverrun {
                trigger,
                last_system,
            } => {
                error!(
                    trigger = %trigger,
                    last_system = last_system.as_deref().unwrap_or("<none>"),
                    "pulse overrun: previous pulse terminated mid-run; \
                     yielding inside a system is unsupported and its remaining work was skipped"
                );
            }
        }
    }
}

/// Profiling hook invoked around every system call.
///
/// `end` is guaranteed to run even when the system fails.
pub trait Profiler: Send + Sync {
    /// A system invocation is about to start.
    fn begin(&self, system: &str);
    /// The invocation finished (successfully or not).
    fn end(&self, system: &str);
}

/// Default profiler: `trace`-level span markers.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProfiler;

impl Profiler for TracingProfiler {
    fn begin(&self, system: &str) {
        trace!(system = %system, "system begin");
    }

    fn end(&self, system: &str) {
        trace!(system = %system, "system end");
    }
}
