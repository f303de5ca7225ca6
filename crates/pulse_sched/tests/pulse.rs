//! End-to-end pulse behaviour: wiring, ordering, isolation, and the
//! reentrancy guard.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::mpsc::{self, UnboundedSender};

use pulse_sched::{
    ErrorSink, FaultReport, Scheduler, SchedulerConfig, SharedState, Step, System,
};

/// Sink that records every report for later assertions.
#[derive(Debug, Default)]
struct RecordingSink {
    reports: Mutex<Vec<FaultReport>>,
}

impl RecordingSink {
    fn reports(&self) -> Vec<FaultReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, report: FaultReport) {
        self.reports.lock().unwrap().push(report);
    }
}

type Log = Arc<Mutex<Vec<String>>>;

fn log_system(name: &str, log: &Log) -> System {
    let log = Arc::clone(log);
    let label = name.to_owned();
    System::new(name, move |_ctx| {
        log.lock().unwrap().push(label.clone());
        Ok(())
    })
}

fn wire(scheduler: &Scheduler, trigger: &str) -> (UnboundedSender<()>, pulse_sched::SubscriptionHandle) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let (tx, rx) = mpsc::unbounded_channel();
    let mut handles = scheduler.start(HashMap::from([(trigger.to_owned(), rx)]));
    let handle = handles.remove(trigger).expect("trigger should be wired");
    (tx, handle)
}

/// Let in-flight pulse tasks run to completion.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn test_pulse_runs_resolved_order() {
    let scheduler = Scheduler::default();
    let log: Log = Log::default();
    scheduler
        .register_all(vec![
            log_system("movement", &log).after("physics"),
            log_system("physics", &log),
            log_system("render", &log).with_priority(1),
        ])
        .unwrap();

    let (tx, _handle) = wire(&scheduler, "default");
    tx.send(()).unwrap();
    settle().await;

    assert_eq!(*log.lock().unwrap(), ["physics", "movement", "render"]);
}

#[tokio::test]
async fn test_trigger_groups_are_isolated() {
    let scheduler = Scheduler::default();
    let render_log: Log = Log::default();
    let physics_log: Log = Log::default();
    scheduler
        .register_all(vec![
            log_system("draw", &render_log).with_trigger("render"),
            log_system("cull", &render_log).with_trigger("render").after("draw"),
            log_system("step", &physics_log).with_trigger("physics"),
        ])
        .unwrap();

    let (render_tx, _render_handle) = wire(&scheduler, "render");
    let (_physics_tx, _physics_handle) = wire(&scheduler, "physics");

    render_tx.send(()).unwrap();
    settle().await;
    render_tx.send(()).unwrap();
    settle().await;

    assert_eq!(*render_log.lock().unwrap(), ["draw", "cull", "draw", "cull"]);
    assert!(
        physics_log.lock().unwrap().is_empty(),
        "physics systems must not run on render pulses"
    );
}

#[tokio::test]
async fn test_trigger_without_systems_is_not_wired() {
    let scheduler = Scheduler::default();
    let log: Log = Log::default();
    scheduler.register(log_system("step", &log)).unwrap();

    let (_tx, rx) = mpsc::unbounded_channel();
    let handles = scheduler.start(HashMap::from([("ghost".to_owned(), rx)]));
    assert!(handles.is_empty());
}

#[tokio::test]
async fn test_generation_flag_and_dt() {
    let scheduler = Scheduler::default();
    let observed: Arc<Mutex<Vec<(bool, Duration)>>> = Arc::default();
    let sink = Arc::clone(&observed);
    scheduler
        .register(System::new("observer", move |ctx| {
            sink.lock().unwrap().push((ctx.generation(), ctx.dt()));
            Ok(())
        }))
        .unwrap();

    let (tx, _handle) = wire(&scheduler, "default");
    for _ in 0..3 {
        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    let observed = observed.lock().unwrap();
    let generations: Vec<bool> = observed.iter().map(|(g, _)| *g).collect();
    assert_eq!(generations, [true, false, true], "flag alternates per pulse");
    assert_eq!(observed[0].1, Duration::ZERO, "first pulse has zero dt");
    assert!(observed[1].1 >= Duration::from_millis(20));
    assert!(observed[2].1 >= Duration::from_millis(20));
}

#[tokio::test]
async fn test_shared_state_reaches_every_system() {
    let scheduler = Scheduler::create(SharedState::new().with("level-1".to_owned()).with(60u32));
    let seen: Arc<Mutex<Vec<(String, u32)>>> = Arc::default();
    let sink = Arc::clone(&seen);
    scheduler
        .register(System::new("reader", move |ctx| {
            let level = ctx
                .shared()
                .get::<String>(0)
                .ok_or_else(|| anyhow!("missing level"))?;
            let rate = ctx.shared().get::<u32>(1).ok_or_else(|| anyhow!("missing rate"))?;
            sink.lock().unwrap().push((level.clone(), *rate));
            Ok(())
        }))
        .unwrap();

    let (tx, _handle) = wire(&scheduler, "default");
    tx.send(()).unwrap();
    settle().await;

    assert_eq!(*seen.lock().unwrap(), [("level-1".to_owned(), 60)]);
}

#[tokio::test]
async fn test_local_state_persists_across_pulses() {
    let scheduler = Scheduler::default();
    let observed: Arc<Mutex<Vec<u64>>> = Arc::default();
    let sink = Arc::clone(&observed);
    scheduler
        .register(System::new("counter", move |ctx| {
            let count = ctx.state_mut().get_or_insert_with("count", || 0u64);
            *count += 1;
            sink.lock().unwrap().push(*count);
            Ok(())
        }))
        .unwrap();

    let (tx, _handle) = wire(&scheduler, "default");
    for _ in 0..3 {
        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    settle().await;

    assert_eq!(*observed.lock().unwrap(), [1, 2, 3]);
}

#[tokio::test]
async fn test_failing_system_is_isolated_and_deduplicated() {
    let sink = Arc::new(RecordingSink::default());
    let scheduler = Scheduler::new(SchedulerConfig {
        error_sink: Arc::clone(&sink) as Arc<dyn ErrorSink>,
        ..SchedulerConfig::default()
    });

    let attempts: Arc<Mutex<u32>> = Arc::default();
    let attempt_counter = Arc::clone(&attempts);
    let survivor_log: Log = Log::default();
    scheduler
        .register_all(vec![
            System::new("broken", move |_ctx| {
                *attempt_counter.lock().unwrap() += 1;
                Err(anyhow!("always fails"))
            }),
            log_system("survivor", &survivor_log).after("broken"),
        ])
        .unwrap();

    let (tx, _handle) = wire(&scheduler, "default");
    for _ in 0..10 {
        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    settle().await;

    assert_eq!(*attempts.lock().unwrap(), 10, "failing system runs every pulse");
    assert_eq!(
        survivor_log.lock().unwrap().len(),
        10,
        "a failing system never halts its successors"
    );

    let reports = sink.reports();
    assert_eq!(reports.len(), 1, "one report per (system, message) per window");
    match &reports[0] {
        FaultReport::SystemFailure { system, message, .. } => {
            assert_eq!(system, "broken");
            assert!(message.contains("always fails"));
        }
        other => panic!("expected SystemFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_panicking_system_is_caught() {
    let sink = Arc::new(RecordingSink::default());
    let scheduler = Scheduler::new(SchedulerConfig {
        error_sink: Arc::clone(&sink) as Arc<dyn ErrorSink>,
        ..SchedulerConfig::default()
    });

    let survivor_log: Log = Log::default();
    scheduler
        .register_all(vec![
            System::new("panicky", |_ctx| panic!("unexpected state")),
            log_system("survivor", &survivor_log).after("panicky"),
        ])
        .unwrap();

    let (tx, _handle) = wire(&scheduler, "default");
    tx.send(()).unwrap();
    settle().await;

    assert_eq!(*survivor_log.lock().unwrap(), ["survivor"]);
    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert!(matches!(
        &reports[0],
        FaultReport::SystemFailure { system, message, .. }
            if system == "panicky" && message.contains("unexpected state")
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pulse_overrun_terminates_stale_pulse() {
    let sink = Arc::new(RecordingSink::default());
    let scheduler = Scheduler::new(SchedulerConfig {
        error_sink: Arc::clone(&sink) as Arc<dyn ErrorSink>,
        ..SchedulerConfig::default()
    });

    let log: Log = Log::default();
    let slow_log = Arc::clone(&log);
    scheduler
        .register_all(vec![
            System::new("slow", move |_ctx| {
                slow_log.lock().unwrap().push("slow".to_owned());
                std::thread::sleep(Duration::from_millis(80));
                Ok(())
            }),
            log_system("tail", &log).after("slow"),
        ])
        .unwrap();

    let (tx, _handle) = wire(&scheduler, "default");
    tx.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(15)).await;
    // Previous pulse is still inside `slow`; this one must terminate it.
    tx.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let reports = sink.reports();
    assert_eq!(reports.len(), 1, "overrun reported immediately, never suppressed");
    match &reports[0] {
        FaultReport::PulseOverrun {
            trigger,
            last_system,
        } => {
            assert_eq!(trigger, "default");
            assert_eq!(last_system.as_deref(), Some("slow"));
        }
        other => panic!("expected PulseOverrun, got {other:?}"),
    }

    let log = log.lock().unwrap();
    let slow_runs = log.iter().filter(|e| *e == "slow").count();
    let tail_runs = log.iter().filter(|e| *e == "tail").count();
    assert_eq!(slow_runs, 2, "second pulse restarts from the top of the order");
    assert_eq!(tail_runs, 1, "terminated pulse skipped its remaining systems");
}

#[tokio::test]
async fn test_registration_after_start_is_picked_up() {
    let scheduler = Scheduler::default();
    let log: Log = Log::default();
    scheduler.register(log_system("physics", &log)).unwrap();

    let (tx, _handle) = wire(&scheduler, "default");
    tx.send(()).unwrap();
    settle().await;

    scheduler
        .register(log_system("movement", &log).after("physics"))
        .unwrap();
    tx.send(()).unwrap();
    settle().await;

    assert_eq!(
        *log.lock().unwrap(),
        ["physics", "physics", "movement"],
        "later pulses use the freshly resolved order"
    );
}

#[tokio::test]
async fn test_middleware_wraps_in_registration_order() {
    let scheduler = Scheduler::default();
    let log: Log = Log::default();
    scheduler.register(log_system("sys", &log)).unwrap();

    for tag in ["first", "second"] {
        let log = Arc::clone(&log);
        scheduler.add_middleware(move |next| {
            let log = Arc::clone(&log);
            let step: Step = Arc::new(move |pulse| {
                log.lock().unwrap().push(format!("mw-{tag}"));
                next(pulse);
            });
            step
        });
    }

    let (tx, _handle) = wire(&scheduler, "default");
    tx.send(()).unwrap();
    settle().await;

    // Last registered middleware is outermost; the system runs innermost.
    assert_eq!(*log.lock().unwrap(), ["mw-second", "mw-first", "sys"]);
}

#[tokio::test]
async fn test_stopped_subscription_ignores_pulses() {
    let scheduler = Scheduler::default();
    let log: Log = Log::default();
    scheduler.register(log_system("sys", &log)).unwrap();

    let (tx, handle) = wire(&scheduler, "default");
    tx.send(()).unwrap();
    settle().await;
    handle.stop();
    settle().await;

    tx.send(()).unwrap();
    settle().await;
    assert_eq!(*log.lock().unwrap(), ["sys"], "no pulses after teardown");
}
