//! Progress sinks.

use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use uniquify_common::{RateGate, Stopwatch};
use uniquify_model::ProgressEvent;

/// Receives progress updates. Implementations must tolerate calls from any
/// worker thread.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Shared handle passed down through pipelines and backends.
pub type SharedProgress = Arc<dyn ProgressSink>;

/// Convenience for backends: build and report in one call.
pub fn emit(sink: &dyn ProgressSink, stage: &str, fraction: f64, message: impl Into<String>) {
    sink.report(&ProgressEvent::new(stage, fraction, message));
}

/// Drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Logs every event at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, event: &ProgressEvent) {
        tracing::info!(
            stage = %event.stage,
            percent = format_args!("{:.1}", event.percent()),
            "{}",
            event.message
        );
    }
}

/// Forwards events into a std channel. A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(tx: Sender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, event: &ProgressEvent) {
        self.tx.send(event.clone()).ok();
    }
}

/// Adapts a closure.
pub struct FnProgress<F>(pub F);

impl<F> ProgressSink for FnProgress<F>
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn report(&self, event: &ProgressEvent) {
        (self.0)(event)
    }
}

/// Prefixes the stage name (`v003/visual`) before forwarding.
pub struct ScopedProgress {
    scope: String,
    inner: SharedProgress,
}

impl ScopedProgress {
    pub fn new(scope: impl Into<String>, inner: SharedProgress) -> Self {
        Self {
            scope: scope.into(),
            inner,
        }
    }
}

impl ProgressSink for ScopedProgress {
    fn report(&self, event: &ProgressEvent) {
        let mut scoped = event.clone();
        scoped.stage = format!("{}/{}", self.scope, event.stage);
        self.inner.report(&scoped);
    }
}

/// Forwards an event only when progress moved by at least 1% or a second has
/// passed since the last forwarded event for the same stage. The first and
/// final events of each stage always pass. Stages are gated independently,
/// so interleaved reports from parallel workers stay bounded.
pub struct ThrottledProgress {
    inner: SharedProgress,
    watch: Stopwatch,
    gates: Mutex<HashMap<String, RateGate>>,
}

impl ThrottledProgress {
    pub fn new(inner: SharedProgress) -> Self {
        Self {
            inner,
            watch: Stopwatch::start(),
            gates: Mutex::new(HashMap::new()),
        }
    }
}

impl ProgressSink for ThrottledProgress {
    fn report(&self, event: &ProgressEvent) {
        let pass = {
            let Ok(mut gates) = self.gates.lock() else {
                return;
            };
            let now_ns = self.watch.elapsed_ns();
            let pass = gates
                .entry(event.stage.clone())
                .or_insert_with(RateGate::per_percent_or_second)
                .should_pass(event.fraction, now_ns);
            if pass && event.fraction >= 1.0 {
                gates.remove(&event.stage);
            }
            pass
        };
        if pass {
            self.inner.report(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_throttle_drops_small_steps() {
        let (tx, rx) = mpsc::channel();
        let sink = ThrottledProgress::new(Arc::new(ChannelProgress::new(tx)));
        for i in 0..=1000 {
            sink.report(&ProgressEvent::new("visual", i as f64 / 1000.0, ""));
        }
        let forwarded: Vec<ProgressEvent> = rx.try_iter().collect();
        // at most one per percent plus first/final
        assert!(forwarded.len() <= 102, "forwarded {}", forwarded.len());
        assert!(forwarded.len() >= 50);
        assert_eq!(forwarded.first().map(|e| e.fraction), Some(0.0));
        assert_eq!(forwarded.last().map(|e| e.fraction), Some(1.0));
    }

    #[test]
    fn test_each_stage_has_its_own_gate() {
        let (tx, rx) = mpsc::channel();
        let sink = ThrottledProgress::new(Arc::new(ChannelProgress::new(tx)));
        sink.report(&ProgressEvent::new("temporal", 0.5, ""));
        sink.report(&ProgressEvent::new("visual", 0.5, ""));
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn test_finished_stage_starts_fresh() {
        let (tx, rx) = mpsc::channel();
        let sink = ThrottledProgress::new(Arc::new(ChannelProgress::new(tx)));
        sink.report(&ProgressEvent::new("visual", 0.0, ""));
        sink.report(&ProgressEvent::new("visual", 1.0, ""));
        sink.report(&ProgressEvent::new("visual", 0.0, ""));
        sink.report(&ProgressEvent::new("visual", 0.001, ""));
        assert_eq!(rx.try_iter().count(), 3);
    }

    #[test]
    fn test_interleaved_versions_stay_throttled() {
        let (tx, rx) = mpsc::channel();
        let throttled: SharedProgress =
            Arc::new(ThrottledProgress::new(Arc::new(ChannelProgress::new(tx))));
        let first = ScopedProgress::new("version_001", Arc::clone(&throttled));
        let second = ScopedProgress::new("version_002", Arc::clone(&throttled));
        for i in 0..=1000 {
            let fraction = i as f64 / 1000.0;
            emit(&first, "visual", fraction, "");
            emit(&second, "visual", fraction, "");
        }
        let forwarded: Vec<ProgressEvent> = rx.try_iter().collect();
        assert!(forwarded.len() <= 2 * 102, "forwarded {}", forwarded.len());
        for scope in ["version_001/visual", "version_002/visual"] {
            let last = forwarded.iter().rev().find(|e| e.stage == scope);
            assert_eq!(last.map(|e| e.fraction), Some(1.0));
        }
    }

    #[test]
    fn test_scoped_prefix() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let inner: SharedProgress = Arc::new(FnProgress(move |e: &ProgressEvent| {
            captured.lock().unwrap().push(e.stage.clone());
        }));
        let scoped = ScopedProgress::new("v002", inner);
        emit(&scoped, "merge", 1.0, "done");
        assert_eq!(seen.lock().unwrap().as_slice(), ["v002/merge".to_string()]);
    }
}
