//! # pulse_system
//!
//! Declaration surface for schedulable units of work ("systems").
//!
//! A system is a named work function with a scheduling priority, a trigger
//! group, and a set of run-after dependencies. The scheduler invokes it once
//! per pulse of its trigger group with a [`SystemContext`] carrying the pulse
//! delta time, the alternating generation flag, the system's private
//! [`StateMap`], and the scheduler-wide [`SharedState`].
//!
//! ## Usage
//!
//! ```rust
//! use pulse_system::System;
//!
//! let physics = System::new("physics", |ctx| {
//!     let steps = ctx.state_mut().get_or_insert_with("steps", || 0u64);
//!     *steps += 1;
//!     Ok(())
//! })
//! .with_priority(-1)
//! .with_trigger("fixed_update");
//!
//! assert_eq!(physics.name(), "physics");
//! ```

pub mod context;
pub mod shared;
pub mod state;
pub mod system;

pub use context::SystemContext;
pub use shared::SharedState;
pub use state::StateMap;
pub use system::{DEFAULT_TRIGGER, System, SystemFn, SystemId};
