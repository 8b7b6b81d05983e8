use std::time::Duration;

use tokio::time::Instant;

use crate::action::ActionError;
use crate::sampler::Sampler;
use crate::stats::TimedOutcome;

/// Wall-clock measurement of a single action invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub duration: Duration,
    pub result: Result<(), ActionError>,
}

impl Timing {
    pub fn into_outcome(self) -> TimedOutcome {
        match self.result {
            Ok(()) => TimedOutcome::success(self.duration),
            Err(err) => TimedOutcome::failure(self.duration, err.to_string()),
        }
    }
}

pub struct Timer;

impl Timer {
    /// Invokes the sampler's action exactly once and measures it.
    ///
    /// The clock stops when the action returns, whether it succeeded or not. The action's error
    /// is handed back untouched.
    pub async fn observe(sampler: &Sampler) -> Timing {
        let start = Instant::now();
        let result = sampler.action().execute().await;
        let duration = start.elapsed();
        Timing { duration, result }
    }
}
