use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use super::config::{Concurrency, RunConfig};
use super::error::{Error, Result};
use crate::listener::Listener;
use crate::sampler::Sampler;
use crate::stats::Summary;
use crate::timer::Timer;

/// Drives `freq` invocations of one sampler and reduces them into a [`Summary`].
#[derive(Debug, Clone)]
pub struct ThreadGroup {
    sampler: Sampler,
    config: RunConfig,
}

impl ThreadGroup {
    pub fn new(sampler: Sampler, config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { sampler, config })
    }

    /// Runs to completion and finalizes `listener` exactly once.
    ///
    /// A fatal action error stops dispatch and returns [`Error::Aborted`] without a summary.
    pub async fn start<L>(&self, listener: L) -> Result<Summary>
    where
        L: Listener + 'static,
    {
        tracing::info!(
            sampler = self.sampler.name(),
            freq = self.config.freq,
            concurrency = %self.config.concurrency,
            workers = self.config.concurrency.workers(),
            "run started"
        );

        let summary = match self.config.concurrency {
            Concurrency::Sequential => self.run_sequential(listener).await?,
            Concurrency::Pooled { workers } => self.run_pooled(listener, workers).await?,
        };

        tracing::info!(
            sampler = self.sampler.name(),
            count = summary.count,
            errors = summary.error_count,
            "run finished"
        );
        Ok(summary)
    }

    async fn run_sequential<L: Listener>(&self, listener: L) -> Result<Summary> {
        for _ in 0..self.config.freq {
            let timing = Timer::observe(&self.sampler).await;
            if let Err(err) = &timing.result
                && err.is_fatal()
            {
                return Err(self.aborted(err.clone()));
            }
            listener.record(&self.sampler, timing.into_outcome());
        }

        Ok(listener.finalize())
    }

    async fn run_pooled<L>(&self, listener: L, workers: usize) -> Result<Summary>
    where
        L: Listener + 'static,
    {
        let listener = Arc::new(listener);
        let completed = Arc::new(AtomicU64::new(0));
        let abort = Arc::new(AtomicBool::new(false));

        // Capacity 1: the producer can only run one unit ahead of the slowest hand-off.
        let (tx, rx) = mpsc::channel::<Sampler>(1);
        let rx = Arc::new(Mutex::new(rx));

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let rx = rx.clone();
            let listener = listener.clone();
            let completed = completed.clone();
            let abort = abort.clone();

            pool.spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(sampler) = next else {
                        break;
                    };
                    if abort.load(Ordering::Acquire) {
                        break;
                    }

                    let timing = Timer::observe(&sampler).await;
                    if let Err(err) = &timing.result
                        && err.is_fatal()
                    {
                        abort.store(true, Ordering::Release);
                        tracing::warn!(worker, sampler = sampler.name(), error = %err, "fatal sampler error");
                        return Err(Error::Aborted {
                            sampler: sampler.name().to_string(),
                            source: err.clone(),
                        });
                    }

                    listener.record(&sampler, timing.into_outcome());
                    completed.fetch_add(1, Ordering::AcqRel);
                }
                tracing::debug!(worker, "worker drained");
                Ok(())
            });
        }
        drop(rx);

        for _ in 0..self.config.freq {
            if abort.load(Ordering::Acquire) {
                break;
            }
            if tx.send(self.sampler.clone()).await.is_err() {
                // Every worker is gone; the join below reports why.
                break;
            }
        }
        drop(tx);

        let mut first_err: Option<Error> = None;
        while let Some(joined) = pool.join_next().await {
            let res = joined.map_err(Error::from).and_then(|r| r);
            if let Err(err) = res
                && first_err.is_none()
            {
                first_err = Some(err);
            }
        }
        if let Some(err) = first_err {
            return Err(err);
        }

        let completed = completed.load(Ordering::Acquire);
        if completed != self.config.freq {
            return Err(Error::Incomplete {
                expected: self.config.freq,
                completed,
            });
        }

        let listener = Arc::try_unwrap(listener).map_err(|_| Error::ListenerShared)?;
        Ok(listener.finalize())
    }

    fn aborted(&self, source: crate::action::ActionError) -> Error {
        tracing::warn!(sampler = self.sampler.name(), error = %source, "fatal sampler error");
        Error::Aborted {
            sampler: self.sampler.name().to_string(),
            source,
        }
    }
}
