//! Scheduler error types.

/// Errors raised while registering systems and resolving execution orders.
///
/// All of these are fatal to the triggering call and surface synchronously;
/// a failed registration leaves the scheduler exactly as it was. Runtime
/// faults (a system failing mid-pulse, a pulse overrun) are not errors in
/// this sense — they are isolated and reported through the error sink
/// instead of being returned.
#[derive(Debug, thiserror::Error)]
pub enum SchedError {
    /// A system was registered under a name that is already taken. Names
    /// are the ordering tie-break and the report label, so they must be
    /// unique within a scheduler.
    #[error("duplicate system name `{0}`")]
    DuplicateName(String),

    /// A declared dependency does not name any system registered in the
    /// same trigger group.
    #[error(
        "system `{system}` depends on `{dependency}`, which is not registered in trigger group `{group}`"
    )]
    UnknownDependency {
        /// Trigger group being resolved.
        group: String,
        /// The system declaring the dependency.
        system: String,
        /// The missing dependency name.
        dependency: String,
    },

    /// A dependency crosses priority bands. Bands are strictly separated
    /// passes, so an edge between them is a modeling mistake rather than an
    /// ordering constraint the resolver could honour.
    #[error(
        "system `{system}` (priority {priority}) depends on `{dependency}` (priority {dependency_priority}) in a different priority band"
    )]
    CrossBandDependency {
        /// The system declaring the dependency.
        system: String,
        /// Its priority band.
        priority: i32,
        /// The dependency's name.
        dependency: String,
        /// The dependency's priority band.
        dependency_priority: i32,
    },

    /// A priority band contains a dependency cycle and cannot be ordered.
    #[error("unschedulable dependency graph in trigger group `{group}`: cannot order {remaining:?}")]
    UnschedulableGraph {
        /// Trigger group being resolved.
        group: String,
        /// Names of the systems that could not be placed.
        remaining: Vec<String>,
    },
}
