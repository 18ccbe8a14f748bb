//! Runner – executes every registered probe once, in order, and assembles
//! the [`Report`].
//!
//! The runner always completes: a probe that returns an error or panics is
//! recorded as a failed entry and the pass moves on to the next probe.

use crate::context::ProbeContext;
use crate::registry::{ProbeError, ProbeRegistry};
use crate::report::{Report, ReportEntry};
use crate::types::*;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
}

/// Side-channel progress notifications. Not part of the report data.
pub trait RunObserver {
    fn probe_started(&self, _index: usize, _total: usize, _name: &str) {}
    fn probe_finished(&self, _index: usize, _total: usize, _name: &str, _outcome: &ProbeOutcome) {}
}

/// Observer that ignores every notification.
pub struct Silent;

impl RunObserver for Silent {}

pub struct Runner {
    registry: ProbeRegistry,
    ctx: Arc<ProbeContext>,
    state: RunState,
}

impl Runner {
    pub fn new(registry: ProbeRegistry, ctx: Arc<ProbeContext>) -> Self {
        Self {
            registry,
            ctx,
            state: RunState::NotStarted,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub async fn run_all(&mut self) -> Report {
        self.run_all_with(&Silent).await
    }

    pub async fn run_all_with(&mut self, observer: &dyn RunObserver) -> Report {
        self.state = RunState::Running;
        let run_id = new_run_id();
        let start = Instant::now();
        let total = self.registry.len();
        let mut entries = Vec::with_capacity(total);

        tracing::info!(run_id = %run_id, probes = total, "starting diagnostic run");

        for (index, entry) in self.registry.all().iter().enumerate() {
            observer.probe_started(index, total, &entry.name);
            tracing::info!(probe = %entry.name, index, total, "running probe");

            let probe_start = Instant::now();
            let probe = Arc::clone(&entry.probe);
            let ctx = Arc::clone(&self.ctx);
            // A task per probe turns a panic into a JoinError instead of
            // unwinding through the runner. It is awaited before the next
            // probe starts, so execution stays strictly sequential.
            let joined = tokio::spawn(async move { probe.run(&ctx).await }).await;
            let elapsed = probe_start.elapsed().as_millis() as u64;

            let outcome = match joined {
                Ok(Ok(value)) => ProbeOutcome::pass(value, elapsed),
                Ok(Err(e)) => outcome_from_error(&e, elapsed),
                Err(join_err) => {
                    let message = if join_err.is_panic() {
                        format!("panicked: {}", panic_message(join_err.into_panic()))
                    } else {
                        "probe task was cancelled".to_string()
                    };
                    ProbeOutcome::failure(Status::Error, ErrorCode::Panicked, message, elapsed)
                }
            };

            match outcome.status {
                Status::Pass => {
                    tracing::info!(probe = %entry.name, timing_ms = elapsed, "probe passed")
                }
                Status::Skip | Status::Fail => tracing::info!(
                    probe = %entry.name,
                    status = ?outcome.status,
                    reason = outcome.error.as_ref().map(|e| e.message.as_str()).unwrap_or_default(),
                    "probe did not pass"
                ),
                Status::Error => tracing::warn!(
                    probe = %entry.name,
                    error = outcome.error.as_ref().map(|e| e.message.as_str()).unwrap_or_default(),
                    "probe failed"
                ),
            }

            observer.probe_finished(index, total, &entry.name, &outcome);
            entries.push(ReportEntry {
                name: entry.name.clone(),
                outcome,
            });
        }

        let total_ms = start.elapsed().as_millis() as u64;
        tracing::info!(run_id = %run_id, total_ms, "diagnostic run completed");
        self.state = RunState::Completed;
        Report::new(run_id, entries, total_ms)
    }
}

fn outcome_from_error(e: &ProbeError, elapsed: u64) -> ProbeOutcome {
    let mut message = e.to_string();
    if message.trim().is_empty() {
        message = format!("{} with no description", e.error_code());
    }
    ProbeOutcome::failure(e.status(), e.error_code(), message, elapsed)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{probe_fn, Probe, ProbeResult};
    use crate::testing::empty_context;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Recording {
        counter: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<(String, usize)>>>,
        name: String,
    }

    #[async_trait::async_trait]
    impl Probe for Recording {
        async fn run(&self, _ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push((self.name.clone(), n));
            Ok(ProbeValue::text(format!("call {}", n)))
        }
    }

    struct Panicking;

    #[async_trait::async_trait]
    impl Probe for Panicking {
        async fn run(&self, _ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
            panic!("sensor bus exploded");
        }
    }

    fn runner(registry: ProbeRegistry) -> Runner {
        Runner::new(registry, Arc::new(empty_context()))
    }

    #[tokio::test]
    async fn test_one_entry_per_probe_even_when_failing() {
        let mut reg = ProbeRegistry::new();
        reg.register("ok", probe_fn(|_| Ok("fine".into()))).unwrap();
        reg.register("err", probe_fn(|_| Err(ProbeError::Other("boom".into()))))
            .unwrap();
        reg.register("absent", probe_fn(|_| Err(ProbeError::Unsupported("Not available".into()))))
            .unwrap();
        reg.register("panic", Arc::new(Panicking)).unwrap();
        reg.register("last", probe_fn(|_| Ok("still ran".into()))).unwrap();

        let report = runner(reg).run_all().await;
        assert_eq!(report.len(), 5);
        assert_eq!(report.names(), vec!["ok", "err", "absent", "panic", "last"]);
        assert_eq!(report.get("last").unwrap().status, Status::Pass);
        assert_eq!(report.get("absent").unwrap().status, Status::Skip);
    }

    #[tokio::test]
    async fn test_execution_order_matches_registration() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut reg = ProbeRegistry::new();
        for name in ["first", "second", "third", "fourth"] {
            reg.register(
                name,
                Arc::new(Recording {
                    counter: Arc::clone(&counter),
                    seen: Arc::clone(&seen),
                    name: name.to_string(),
                }),
            )
            .unwrap();
        }
        runner(reg).run_all().await;
        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("first".to_string(), 0),
                ("second".to_string(), 1),
                ("third".to_string(), 2),
                ("fourth".to_string(), 3),
            ]
        );
    }

    #[tokio::test]
    async fn test_fault_scenario() {
        let mut reg = ProbeRegistry::new();
        reg.register("A", probe_fn(|_| Ok("ok".into()))).unwrap();
        reg.register("B", Arc::new(Panicking)).unwrap();

        let report = runner(reg).run_all().await;
        assert_eq!(report.names(), vec!["A", "B"]);
        assert_eq!(report.get("A").unwrap().display_value(), ProbeValue::text("ok"));

        let b = report.get("B").unwrap();
        assert_eq!(b.status, Status::Error);
        assert_eq!(b.error.as_ref().unwrap().code, ErrorCode::Panicked);
        let text = b.display_value().to_string();
        assert!(text.contains("failed"), "got {text}");
        assert!(text.contains("sensor bus exploded"), "got {text}");
    }

    #[tokio::test]
    async fn test_state_machine() {
        let mut reg = ProbeRegistry::new();
        reg.register("A", probe_fn(|_| Err(ProbeError::Other("x".into()))))
            .unwrap();
        let mut r = runner(reg);
        assert_eq!(r.state(), RunState::NotStarted);
        r.run_all().await;
        assert_eq!(r.state(), RunState::Completed);
    }

    #[tokio::test]
    async fn test_repeat_runs_have_same_shape() {
        let mut reg = ProbeRegistry::new();
        reg.register("x", probe_fn(|_| Ok("1".into()))).unwrap();
        reg.register("y", probe_fn(|_| Ok(ProbeValue::map([("a", "b")])))).unwrap();
        let mut r = runner(reg);
        let first = r.run_all().await;
        let second = r.run_all().await;
        assert_eq!(first.names(), second.names());
        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first.render_json().unwrap(), second.render_json().unwrap());
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let mut r = runner(ProbeRegistry::new());
        let report = r.run_all().await;
        assert!(report.is_empty());
        assert_eq!(r.state(), RunState::Completed);
    }

    #[tokio::test]
    async fn test_observer_sees_every_probe() {
        struct Log(Mutex<Vec<String>>);
        impl RunObserver for Log {
            fn probe_started(&self, index: usize, total: usize, name: &str) {
                self.0.lock().unwrap().push(format!("start {}/{} {}", index, total, name));
            }
            fn probe_finished(&self, _index: usize, _total: usize, name: &str, outcome: &ProbeOutcome) {
                self.0
                    .lock()
                    .unwrap()
                    .push(format!("done {} {:?}", name, outcome.status));
            }
        }

        let mut reg = ProbeRegistry::new();
        reg.register("A", probe_fn(|_| Ok("ok".into()))).unwrap();
        reg.register("B", probe_fn(|_| Err(ProbeError::CheckFailed("no link".into()))))
            .unwrap();
        let log = Log(Mutex::new(Vec::new()));
        runner(reg).run_all_with(&log).await;
        assert_eq!(
            log.0.into_inner().unwrap(),
            vec!["start 0/2 A", "done A Pass", "start 1/2 B", "done B Fail"]
        );
    }
}
