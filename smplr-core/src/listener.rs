use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::sampler::Sampler;
use crate::stats::{Summary, TimedOutcome};

/// Live notification emitted for every recorded sample.
#[derive(Debug, Clone)]
pub struct SampleEvent {
    pub sampler: Arc<str>,
    /// Zero-based arrival index within the run.
    pub seq: u64,
    pub duration: Duration,
    pub error: Option<String>,
}

pub type SampleFn = Arc<dyn Fn(SampleEvent) + Send + Sync + 'static>;

/// Receives timed outcomes during a run and reduces them once it ends.
///
/// `record` may be called concurrently by pooled workers. `finalize` consumes the listener, so
/// the driver can only call it once, after it holds the sole reference.
pub trait Listener: Send + Sync {
    fn record(&self, sampler: &Sampler, outcome: TimedOutcome);

    fn finalize(self) -> Summary
    where
        Self: Sized;
}

/// Arrival-ordered outcomes of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    entries: Vec<TimedOutcome>,
}

impl Report {
    pub fn push(&mut self, outcome: TimedOutcome) {
        self.entries.push(outcome);
    }

    pub fn entries(&self) -> &[TimedOutcome] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn summarize(&self) -> Summary {
        Summary::from_outcomes(&self.entries)
    }
}

/// In-memory listener: appends every outcome to a [`Report`] under a single lock.
#[derive(Default)]
pub struct ReportListener {
    report: Mutex<Report>,
    on_sample: Option<SampleFn>,
}

impl ReportListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invokes `f` for every sample as it is recorded, in arrival order.
    #[must_use]
    pub fn with_sample_fn(mut self, f: Option<SampleFn>) -> Self {
        self.on_sample = f;
        self
    }

    /// Snapshot of the outcomes recorded so far.
    pub fn report(&self) -> Report {
        self.report.lock().clone()
    }
}

impl Listener for ReportListener {
    fn record(&self, sampler: &Sampler, outcome: TimedOutcome) {
        let mut report = self.report.lock();
        let seq = report.len() as u64;
        let event = self.on_sample.as_ref().map(|_| SampleEvent {
            sampler: sampler.name_arc(),
            seq,
            duration: outcome.duration,
            error: outcome.error.clone(),
        });
        report.push(outcome);

        // Emitted under the lock so live lines keep the report's order.
        if let (Some(f), Some(event)) = (&self.on_sample, event) {
            f(event);
        }
    }

    fn finalize(self) -> Summary {
        self.report.into_inner().summarize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::action_fn;

    fn sampler() -> Sampler {
        Sampler::new("noop", action_fn(|| async { Ok(()) }))
    }

    #[test]
    fn record_appends_in_arrival_order() {
        let listener = ReportListener::new();
        let s = sampler();
        listener.record(&s, TimedOutcome::success(Duration::from_millis(3)));
        listener.record(&s, TimedOutcome::failure(Duration::from_millis(1), "boom"));

        let report = listener.report();
        assert_eq!(report.len(), 2);
        assert_eq!(report.entries()[0].duration, Duration::from_millis(3));
        assert!(report.entries()[1].failed);

        let summary = listener.finalize();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.error_count, 1);
    }

    #[test]
    fn sample_fn_sees_every_record() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener = ReportListener::new().with_sample_fn(Some(Arc::new(move |e: SampleEvent| {
            sink.lock().push((e.sampler.to_string(), e.seq, e.error));
        })));

        let s = sampler();
        listener.record(&s, TimedOutcome::success(Duration::from_millis(2)));
        listener.record(&s, TimedOutcome::failure(Duration::from_millis(2), "status code 500"));

        let seen = seen.lock().clone();
        assert_eq!(
            seen,
            vec![
                ("noop".to_string(), 0, None),
                ("noop".to_string(), 1, Some("status code 500".to_string())),
            ]
        );
    }

    #[test]
    fn concurrent_records_lose_nothing() {
        let listener = Arc::new(ReportListener::new());
        let s = sampler();

        std::thread::scope(|scope| {
            for t in 0..8u64 {
                let listener = listener.clone();
                let s = s.clone();
                scope.spawn(move || {
                    for i in 0..250u64 {
                        listener.record(&s, TimedOutcome::success(Duration::from_micros(t * 1000 + i)));
                    }
                });
            }
        });

        let Ok(listener) = Arc::try_unwrap(listener) else {
            panic!("listener still shared");
        };
        let summary = listener.finalize();
        assert_eq!(summary.count, 2_000);
        assert_eq!(summary.min, Some(Duration::ZERO));
        assert_eq!(summary.max, Some(Duration::from_micros(7_249)));
    }
}
