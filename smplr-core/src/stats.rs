use std::time::Duration;

/// Result of one timed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedOutcome {
    pub duration: Duration,
    pub failed: bool,
    /// Failure message when `failed` is set.
    pub error: Option<String>,
}

impl TimedOutcome {
    pub fn success(duration: Duration) -> Self {
        Self {
            duration,
            failed: false,
            error: None,
        }
    }

    pub fn failure(duration: Duration, error: impl Into<String>) -> Self {
        Self {
            duration,
            failed: true,
            error: Some(error.into()),
        }
    }
}

/// Aggregate statistics of one run.
///
/// `min`, `max` and `avg_ms` are `None` when the run produced no samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub count: u64,
    pub error_count: u64,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
    /// Total duration in whole milliseconds divided by `count`, truncated.
    pub avg_ms: Option<i64>,
    pub total: Duration,
}

impl Summary {
    /// Reduces outcomes in a single linear pass.
    ///
    /// Min and max are tracked independently, so the first sample seeds both.
    pub fn from_outcomes<'a, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'a TimedOutcome>,
    {
        let mut summary = Summary::default();

        for outcome in outcomes {
            summary.count += 1;
            if outcome.failed {
                summary.error_count += 1;
            }

            let d = outcome.duration;
            if summary.max.is_none_or(|max| d > max) {
                summary.max = Some(d);
            }
            if summary.min.is_none_or(|min| d < min) {
                summary.min = Some(d);
            }
            summary.total = summary.total.saturating_add(d);
        }

        if summary.count > 0 {
            let total_ms = i64::try_from(summary.total.as_millis()).unwrap_or(i64::MAX);
            let count = i64::try_from(summary.count).unwrap_or(i64::MAX);
            summary.avg_ms = Some(total_ms / count);
        }

        summary
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
