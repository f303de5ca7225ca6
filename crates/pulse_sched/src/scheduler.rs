//! Scheduling registry — owns the system set, resolved orders, and wiring.
//!
//! Registration re-resolves every trigger group wholesale and commits only
//! if all of them resolve; a failure surfaces synchronously and leaves the
//! registry untouched. This is the simple invariant-preserving strategy:
//! resolution is deterministic and idempotent, and registration is rare
//! relative to ticking.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info};

use pulse_system::{SharedState, StateMap, System, SystemId};

use crate::driver::{self, Middleware, PulseSource, Step, SubscriptionHandle};
use crate::error::SchedError;
use crate::isolate::{DEFAULT_WINDOW, FailureIsolator};
use crate::resolve::{RegisteredSystem, resolve};
use crate::sink::{ErrorSink, Profiler, TracingProfiler, TracingSink};

/// Configuration for a [`Scheduler`].
pub struct SchedulerConfig {
    /// Shared context values handed to every system invocation.
    pub shared: SharedState,
    /// Sink for runtime fault reports.
    pub error_sink: Arc<dyn ErrorSink>,
    /// Profiling hook invoked around each system call.
    pub profiler: Arc<dyn Profiler>,
    /// Suppression window for repeated failure reports.
    pub dedup_window: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            shared: SharedState::new(),
            error_sink: Arc::new(TracingSink),
            profiler: Arc::new(TracingProfiler),
            dedup_window: DEFAULT_WINDOW,
        }
    }
}

impl fmt::Debug for SchedulerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerConfig")
            .field("shared", &self.shared)
            .field("dedup_window", &self.dedup_window)
            .finish_non_exhaustive()
    }
}

/// Shared scheduler internals, reachable from pulse tasks.
pub(crate) struct SchedInner {
    /// Shared context values for every invocation.
    pub(crate) shared: SharedState,
    /// All registered systems, in registration order.
    systems: Mutex<Vec<Arc<RegisteredSystem>>>,
    /// Resolved execution order per trigger group. Pulse tasks re-read this
    /// every pulse, so late registration is picked up without rewiring.
    pub(crate) orders: DashMap<String, Arc<Vec<Arc<RegisteredSystem>>>>,
    /// Per-system local state, keyed by reference identity.
    pub(crate) states: DashMap<SystemId, Mutex<StateMap>>,
    /// Middleware chain, applied at wiring time in registration order.
    middleware: Mutex<Vec<Middleware>>,
    /// Failure dedup state for this scheduler instance.
    pub(crate) isolator: FailureIsolator,
    /// Runtime fault sink.
    pub(crate) error_sink: Arc<dyn ErrorSink>,
    /// Per-system profiling hook.
    pub(crate) profiler: Arc<dyn Profiler>,
}

/// The per-frame scheduler.
///
/// Cloning is cheap and every clone drives the same registry, so a handle
/// can be kept for late registration after [`Scheduler::start`].
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedInner>,
}

impl Scheduler {
    /// Create a scheduler from a full configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(SchedInner {
                shared: config.shared,
                systems: Mutex::new(Vec::new()),
                orders: DashMap::new(),
                states: DashMap::new(),
                middleware: Mutex::new(Vec::new()),
                isolator: FailureIsolator::new(config.dedup_window),
                error_sink: config.error_sink,
                profiler: config.profiler,
            }),
        }
    }

    /// Create a scheduler with default reporting and the given shared
    /// context values.
    #[must_use]
    pub fn create(shared: SharedState) -> Self {
        Self::new(SchedulerConfig {
            shared,
            ..SchedulerConfig::default()
        })
    }

    /// Register a single system. See [`Scheduler::register_all`].
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::register_all`].
    pub fn register(&self, system: System) -> Result<(), SchedError> {
        self.register_all(vec![system])
    }

    /// Register a batch of systems.
    ///
    /// Each gets a fresh identity and an empty local-state map, then every
    /// trigger group is re-resolved. The batch commits atomically: on any
    /// resolution failure nothing is installed and the registry is left as
    /// it was.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::DuplicateName`] if a name collides with an
    /// existing or batch-mate system, or any resolver error from
    /// [`resolve`].
    pub fn register_all(&self, batch: Vec<System>) -> Result<(), SchedError> {
        let mut systems = self.inner.systems.lock().expect("registry lock poisoned");

        let mut names: HashSet<String> = systems
            .iter()
            .map(|s| s.system.name().to_owned())
            .collect();
        for system in &batch {
            if !names.insert(system.name().to_owned()) {
                return Err(SchedError::DuplicateName(system.name().to_owned()));
            }
        }

        let added: Vec<Arc<RegisteredSystem>> = batch
            .into_iter()
            .map(|system| {
                Arc::new(RegisteredSystem {
                    id: SystemId::new(),
                    system,
                })
            })
            .collect();

        let mut candidate = systems.clone();
        candidate.extend(added.iter().cloned());

        // BTreeMap for a deterministic resolution (and failure) order.
        let mut groups: BTreeMap<String, Vec<Arc<RegisteredSystem>>> = BTreeMap::new();
        for s in &candidate {
            groups
                .entry(s.system.trigger().to_owned())
                .or_default()
                .push(s.clone());
        }

        let mut resolved: Vec<(String, Vec<Arc<RegisteredSystem>>)> =
            Vec::with_capacity(groups.len());
        for (group, members) in &groups {
            resolved.push((group.clone(), resolve(group, members)?));
        }

        // All groups resolved; commit.
        for s in &added {
            self.inner.states.insert(s.id, Mutex::new(StateMap::new()));
        }
        for (group, order) in resolved {
            debug!(trigger = %group, systems = order.len(), "resolved execution order");
            self.inner.orders.insert(group, Arc::new(order));
        }
        let added_count = added.len();
        *systems = candidate;

        info!(
            added = added_count,
            total = systems.len(),
            "registered systems"
        );
        Ok(())
    }

    /// Append a middleware transform to the chain.
    ///
    /// Middleware is applied when a trigger is wired by [`Scheduler::start`];
    /// triggers wired earlier are not rewrapped.
    pub fn add_middleware<F>(&self, transform: F)
    where
        F: Fn(Step) -> Step + Send + Sync + 'static,
    {
        self.inner
            .middleware
            .lock()
            .expect("middleware lock poisoned")
            .push(Arc::new(transform));
    }

    /// Wire pulse sources to trigger groups.
    ///
    /// One listener task is spawned per trigger that currently has a
    /// non-empty resolved order; sources for empty triggers are dropped.
    /// Returns a teardown handle per wired trigger.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(
        &self,
        sources: HashMap<String, PulseSource>,
    ) -> HashMap<String, SubscriptionHandle> {
        let middleware = self
            .inner
            .middleware
            .lock()
            .expect("middleware lock poisoned")
            .clone();

        let mut handles = HashMap::new();
        for (trigger, source) in sources {
            let populated = self
                .inner
                .orders
                .get(&trigger)
                .is_some_and(|order| !order.is_empty());
            if !populated {
                debug!(trigger = %trigger, "no systems for trigger, skipping");
                continue;
            }
            info!(trigger = %trigger, "wiring pulse source");
            let handle = driver::wire(Arc::clone(&self.inner), trigger.clone(), source, &middleware);
            handles.insert(trigger, handle);
        }
        handles
    }

    /// Returns the number of registered systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.inner.systems.lock().expect("registry lock poisoned").len()
    }

    /// Returns the shared context values.
    #[must_use]
    pub fn shared(&self) -> &SharedState {
        &self.inner.shared
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("systems", &self.system_count())
            .field("triggers", &self.inner.orders.len())
            .finish_non_exhaustive()
    }
}
