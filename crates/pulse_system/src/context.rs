//! Per-pulse execution context provided to system work functions.

use std::time::Duration;

use crate::shared::SharedState;
use crate::state::StateMap;

/// Context scoped to exactly one system invocation.
///
/// Constructed by the driver before the call and dropped right after,
/// success or failure. Carries the pulse metadata plus the system's own
/// [`StateMap`] and the scheduler-wide [`SharedState`].
#[derive(Debug)]
pub struct SystemContext<'a> {
    /// Wall time elapsed since the trigger group's previous pulse
    /// (zero on the first pulse).
    dt: Duration,
    /// Alternating per-pulse flag; flips every pulse of the trigger group,
    /// letting consumers detect a frame boundary without a counter.
    generation: bool,
    /// The invoked system's private local state.
    state: &'a mut StateMap,
    /// Scheduler-wide shared values.
    shared: &'a SharedState,
}

impl<'a> SystemContext<'a> {
    /// Build the context for one invocation.
    #[must_use]
    pub fn new(
        dt: Duration,
        generation: bool,
        state: &'a mut StateMap,
        shared: &'a SharedState,
    ) -> Self {
        Self {
            dt,
            generation,
            state,
            shared,
        }
    }

    /// Elapsed wall time since the previous pulse of this trigger group.
    #[must_use]
    pub fn dt(&self) -> Duration {
        self.dt
    }

    /// The alternating generation flag for this pulse.
    #[must_use]
    pub fn generation(&self) -> bool {
        self.generation
    }

    /// The system's private local state.
    #[must_use]
    pub fn state(&self) -> &StateMap {
        self.state
    }

    /// Mutable access to the system's private local state.
    pub fn state_mut(&mut self) -> &mut StateMap {
        self.state
    }

    /// Scheduler-wide shared values.
    #[must_use]
    pub fn shared(&self) -> &SharedState {
        self.shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_exposes_pulse_metadata() {
        let mut state = StateMap::new();
        let shared = SharedState::new().with(60u32);
        let mut ctx = SystemContext::new(Duration::from_millis(16), true, &mut state, &shared);

        assert_eq!(ctx.dt(), Duration::from_millis(16));
        assert!(ctx.generation());
        assert_eq!(ctx.shared().get::<u32>(0), Some(&60));

        ctx.state_mut().insert("ticks", 1u64);
        assert_eq!(ctx.state().get::<u64>("ticks"), Some(&1));
    }
}
