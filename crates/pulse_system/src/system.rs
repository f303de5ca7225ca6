//! System declaration — the schedulable unit of work.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use crate::context::SystemContext;

/// Trigger group used when a system does not name one.
pub const DEFAULT_TRIGGER: &str = "default";

/// The work function of a system.
///
/// Invoked once per pulse of the system's trigger group. Returning an error
/// (or panicking) is isolated by the scheduler and never affects sibling
/// systems in the same pulse.
pub type SystemFn = Arc<dyn Fn(&mut SystemContext<'_>) -> Result<()> + Send + Sync>;

/// Unique reference identity assigned to a system at registration.
///
/// Names are the human-readable (and enforced-unique) label; the id is what
/// the scheduler keys its internal maps by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId(Uuid);

impl SystemId {
    /// Mint a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SystemId {
    fn default() -> Self {
        Self::new()
    }
}

/// A declared system: the work function plus its scheduling attributes.
///
/// Built with [`System::new`] and the `with_*`/`after` builder methods:
///
/// ```rust
/// use pulse_system::System;
///
/// let movement = System::new("movement", |_ctx| Ok(()))
///     .with_priority(1)
///     .after("physics");
/// ```
#[derive(Clone)]
pub struct System {
    /// Unique human-readable name, used for ordering tie-breaks and reports.
    name: String,
    /// The work function.
    run: SystemFn,
    /// Scheduling priority; lower runs earlier, in a strictly separate band.
    priority: i32,
    /// Trigger group whose pulses drive this system.
    trigger: String,
    /// Names of systems that must run earlier in the same priority band.
    after: Vec<String>,
}

impl System {
    /// Declare a system with the given unique name and work function.
    ///
    /// Defaults: priority 0, trigger group [`DEFAULT_TRIGGER`], no
    /// dependencies.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&mut SystemContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            run: Arc::new(run),
            priority: 0,
            trigger: DEFAULT_TRIGGER.to_owned(),
            after: Vec::new(),
        }
    }

    /// Set the scheduling priority. Lower values run earlier; distinct
    /// values form strictly separated priority bands.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Assign the system to a trigger group.
    #[must_use]
    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = trigger.into();
        self
    }

    /// Require another system (by name) to run earlier in the same priority
    /// band.
    #[must_use]
    pub fn after(mut self, dependency: impl Into<String>) -> Self {
        self.after.push(dependency.into());
        self
    }

    /// Require several systems to run earlier in the same priority band.
    #[must_use]
    pub fn after_all<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.after.extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Returns the system's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the scheduling priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the trigger group name.
    #[must_use]
    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    /// Returns the names of the systems this one must run after.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.after
    }

    /// Invoke the work function for one pulse.
    ///
    /// # Errors
    ///
    /// Propagates whatever the work function returns; the caller is expected
    /// to isolate it.
    pub fn run(&self, ctx: &mut SystemContext<'_>) -> Result<()> {
        (self.run)(ctx)
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("trigger", &self.trigger)
            .field("after", &self.after)
            .finish_non_exhaustive()
    }
}
