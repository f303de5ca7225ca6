//! Dependency resolver — priority-banded topological ordering.
//!
//! Converts the unordered set of systems assigned to one trigger group into
//! a single linear execution order, or fails if the set cannot be ordered.
//! The order satisfies:
//!
//! 1. All systems of a lower priority run before any system of a higher
//!    priority (strict band separation).
//! 2. Within a band, every declared dependency runs earlier.
//! 3. Systems with no constraint between them fall back to the
//!    `(priority, name)` sort, so the result is identical for every
//!    registration order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use pulse_system::{System, SystemId};

use crate::error::SchedError;

/// A system as held by the scheduler: the declaration plus its assigned
/// reference identity.
#[derive(Debug, Clone)]
pub struct RegisteredSystem {
    /// Identity minted at registration; keys the local-state map.
    pub id: SystemId,
    /// The declared system.
    pub system: System,
}

/// Resolve one trigger group's systems into their execution order.
///
/// The algorithm sorts by `(priority, name)` and then schedules one priority
/// band at a time. Within a band it repeatedly scans left to right, placing
/// every system whose dependencies are already placed; a full scan that
/// places nothing means the remainder is cyclic. Worst case O(n²) per band,
/// which is fine: n is small and resolution only happens at registration,
/// never per pulse.
///
/// # Errors
///
/// - [`SchedError::UnknownDependency`] if a dependency names no system in
///   this group.
/// - [`SchedError::CrossBandDependency`] if a dependency crosses priority
///   bands.
/// - [`SchedError::UnschedulableGraph`] if a band contains a cycle.
pub fn resolve(
    group: &str,
    systems: &[Arc<RegisteredSystem>],
) -> Result<Vec<Arc<RegisteredSystem>>, SchedError> {
    let mut sorted: Vec<Arc<RegisteredSystem>> = systems.to_vec();
    sorted.sort_by(|a, b| {
        a.system
            .priority()
            .cmp(&b.system.priority())
            .then_with(|| a.system.name().cmp(b.system.name()))
    });

    // Validate edges up front so the band loop only ever sees satisfiable
    // or cyclic constraints.
    let priorities: HashMap<&str, i32> = sorted
        .iter()
        .map(|s| (s.system.name(), s.system.priority()))
        .collect();
    for s in &sorted {
        for dep in s.system.dependencies() {
            match priorities.get(dep.as_str()) {
                None => {
                    return Err(SchedError::UnknownDependency {
                        group: group.to_owned(),
                        system: s.system.name().to_owned(),
                        dependency: dep.clone(),
                    });
                }
                Some(&p) if p != s.system.priority() => {
                    return Err(SchedError::CrossBandDependency {
                        system: s.system.name().to_owned(),
                        priority: s.system.priority(),
                        dependency: dep.clone(),
                        dependency_priority: p,
                    });
                }
                Some(_) => {}
            }
        }
    }

    let mut order: Vec<Arc<RegisteredSystem>> = Vec::with_capacity(sorted.len());
    let mut placed: HashSet<String> = HashSet::with_capacity(sorted.len());

    let mut band_start = 0;
    while band_start < sorted.len() {
        let band_priority = sorted[band_start].system.priority();
        let band_end = sorted[band_start..]
            .iter()
            .position(|s| s.system.priority() != band_priority)
            .map_or(sorted.len(), |offset| band_start + offset);

        let mut pending: Vec<Arc<RegisteredSystem>> = sorted[band_start..band_end].to_vec();
        while !pending.is_empty() {
            let before = pending.len();
            // One left-to-right scan; `retain` keeps the scan order stable.
            pending.retain(|s| {
                let ready = s
                    .system
                    .dependencies()
                    .iter()
                    .all(|dep| placed.contains(dep));
                if ready {
                    placed.insert(s.system.name().to_owned());
                    order.push(s.clone());
                }
                !ready
            });
            if pending.len() == before {
                return Err(SchedError::UnschedulableGraph {
                    group: group.to_owned(),
                    remaining: pending.iter().map(|s| s.system.name().to_owned()).collect(),
                });
            }
        }

        band_start = band_end;
    }

    Ok(order)
}
