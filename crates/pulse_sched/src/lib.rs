//! # pulse_sched
//!
//! Per-frame scheduler for named systems driven by pulse sources.
//!
//! Hosts declare [`System`]s (a work function plus priority, trigger group,
//! and run-after edges), register them with a [`Scheduler`], and wire each
//! trigger group to a pulse source with [`Scheduler::start`]. Registration
//! resolves every trigger group into a deterministic execution order; each
//! pulse then runs that order sequentially, with per-system failure
//! isolation and a reentrancy guard that terminates a pulse still running
//! when the next one fires.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//!
//! use pulse_sched::{Scheduler, System};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scheduler = Scheduler::default();
//!     scheduler.register_all(vec![
//!         System::new("physics", |_ctx| Ok(())),
//!         System::new("movement", |_ctx| Ok(())).after("physics"),
//!     ])?;
//!
//!     let (tick, source) = tokio::sync::mpsc::unbounded_channel();
//!     let handles = scheduler.start(HashMap::from([("default".to_owned(), source)]));
//!
//!     tick.send(())?; // one pulse: physics, then movement
//!     # drop(handles);
//!     Ok(())
//! }
//! ```

pub mod driver;
pub mod error;
pub mod isolate;
pub mod resolve;
pub mod scheduler;
pub mod sink;

pub use driver::{Middleware, Pulse, PulseSource, Step, SubscriptionHandle};
pub use error::SchedError;
pub use isolate::{DEFAULT_WINDOW, FailureIsolator};
pub use resolve::{RegisteredSystem, resolve};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use sink::{ErrorSink, FaultReport, Profiler, TracingProfiler, TracingSink};

pub use pulse_system::{
    DEFAULT_TRIGGER, SharedState, StateMap, System, SystemContext, SystemFn, SystemId,
};
