//! Tick driver — pulse listeners, the middleware chain, and the
//! reentrancy guard.
//!
//! One listener task is wired per trigger group. On each pulse it measures
//! the elapsed wall time since the previous pulse, toggles the generation
//! flag, and calls the composed step function. The innermost step runs the
//! resolved order on its own cancellable task; the guard wrapped around it
//! aborts a still-running previous pulse (reporting which system it was in)
//! before starting the next one. Registered middleware wraps the guard, in
//! registration order, outermost last.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use pulse_system::SystemContext;

use crate::resolve::RegisteredSystem;
use crate::scheduler::SchedInner;
use crate::sink::FaultReport;

/// Metadata for one firing of a trigger group.
#[derive(Debug, Clone, Copy)]
pub struct Pulse {
    /// Wall time elapsed since this trigger's previous pulse (zero on the
    /// first pulse).
    pub dt: Duration,
    /// Alternating flag; flips every pulse.
    pub generation: bool,
}

/// The per-pulse step function middleware wraps.
pub type Step = Arc<dyn Fn(Pulse) + Send + Sync>;

/// A middleware transform: receives the next step, returns the replacement.
pub type Middleware = Arc<dyn Fn(Step) -> Step + Send + Sync>;

/// A source of "fire now" signals for one trigger group.
pub type PulseSource = mpsc::UnboundedReceiver<()>;

/// Teardown handle for one wired trigger group.
#[derive(Debug)]
pub struct SubscriptionHandle {
    trigger: String,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    /// Returns the wired trigger group's name.
    #[must_use]
    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    /// Returns `true` once the listener has exited (its source closed or
    /// the handle was stopped).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Tear down the listener. Pulses already in flight are not interrupted.
    pub fn stop(self) {
        self.task.abort();
    }
}

/// Wire one trigger group's pulse source. Spawns the listener task and
/// returns its teardown handle.
pub(crate) fn wire(
    inner: Arc<SchedInner>,
    trigger: String,
    mut source: PulseSource,
    middleware: &[Middleware],
) -> SubscriptionHandle {
    // Label of the system currently executing, for overrun attribution.
    let current: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    // The in-flight pulse task, if any.
    let in_flight: Arc<Mutex<Option<JoinHandle<()>>>> = Arc::new(Mutex::new(None));

    // Innermost step plus the built-in reentrancy guard: spawn each pulse on
    // its own cancellable task, terminating a still-live predecessor first.
    let step: Step = {
        let inner = Arc::clone(&inner);
        let trigger = trigger.clone();
        let current = Arc::clone(&current);
        Arc::new(move |pulse: Pulse| {
            let mut slot = in_flight.lock().expect("guard lock poisoned");
            if let Some(previous) = slot.take()
                && !previous.is_finished()
            {
                previous.abort();
                let last_system = current.lock().expect("guard lock poisoned").clone();
                // Overrun reports bypass the dedup window on purpose: each
                // one means work was skipped.
                inner.error_sink.report(FaultReport::PulseOverrun {
                    trigger: trigger.clone(),
                    last_system,
                });
            }
            *slot = Some(tokio::spawn(run_order(
                Arc::clone(&inner),
                trigger.clone(),
                Arc::clone(&current),
                pulse,
            )));
        })
    };

    // Middleware wraps the guard in registration order, outermost last.
    let step = middleware
        .iter()
        .fold(step, |next, transform| transform(next));

    let listener_trigger = trigger.clone();
    let task = tokio::spawn(async move {
        let mut last_pulse: Option<Instant> = None;
        let mut generation = false;
        while source.recv().await.is_some() {
            let now = Instant::now();
            let dt = last_pulse.map_or(Duration::ZERO, |previous| now.duration_since(previous));
            last_pulse = Some(now);
            generation = !generation;
            step(Pulse { dt, generation });
        }
        debug!(trigger = %listener_trigger, "pulse source closed, listener exiting");
    });

    SubscriptionHandle { trigger, task }
}

/// Execute one pulse: every system of the trigger's resolved order, in
/// order, each behind the failure isolator.
///
/// The order is re-read from the registry each pulse so systems registered
/// after `start` are picked up. The `yield_now` between invocations is the
/// cancellation point: an aborted pulse stops at the next system boundary.
async fn run_order(
    inner: Arc<SchedInner>,
    trigger: String,
    current: Arc<Mutex<Option<String>>>,
    pulse: Pulse,
) {
    let Some(order) = inner.orders.get(&trigger).map(|o| Arc::clone(o.value())) else {
        return;
    };

    trace!(
        trigger = %trigger,
        systems = order.len(),
        dt_us = pulse.dt.as_micros() as u64,
        generation = pulse.generation,
        "pulse start"
    );

    for entry in order.iter() {
        *current.lock().expect("guard lock poisoned") = Some(entry.system.name().to_owned());
        invoke(&inner, entry, pulse);
        tokio::task::yield_now().await;
    }

    *current.lock().expect("guard lock poisoned") = None;
}

/// Invoke one system with scoped context construction and failure isolation.
fn invoke(inner: &SchedInner, entry: &RegisteredSystem, pulse: Pulse) {
    let name = entry.system.name();
    inner.profiler.begin(name);

    let outcome = match inner.states.get(&entry.id) {
        Some(state) => {
            let mut state = state.lock().expect("state lock poisoned");
            let mut ctx =
                SystemContext::new(pulse.dt, pulse.generation, &mut state, &inner.shared);
            catch_unwind(AssertUnwindSafe(|| entry.system.run(&mut ctx)))
        }
        // No state context means the system is gone from the registry.
        None => {
            inner.profiler.end(name);
            return;
        }
    };

    inner.profiler.end(name);

    let message = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(format!("{err:#}")),
        Err(payload) => Some(panic_message(payload.as_ref())),
    };

    if let Some(message) = message
        && inner.isolator.should_report(name, &message)
    {
        inner.error_sink.report(FaultReport::SystemFailure {
            system: name.to_owned(),
            message,
            window: inner.isolator.window(),
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "system panicked".to_owned()
    }
}
