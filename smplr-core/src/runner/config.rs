use super::error::{Error, Result};

/// How invocations of a sampler are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Concurrency {
    /// One invocation at a time on the calling task.
    Sequential,
    /// A fixed pool of worker tasks pulling from a shared hand-off queue.
    Pooled { workers: usize },
}

impl Concurrency {
    pub fn workers(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Pooled { workers } => *workers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Number of invocations per sampler.
    pub freq: u64,
    pub concurrency: Concurrency,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            freq: 10,
            concurrency: Concurrency::Pooled { workers: 10 },
        }
    }
}

impl RunConfig {
    pub fn sequential(freq: u64) -> Self {
        Self {
            freq,
            concurrency: Concurrency::Sequential,
        }
    }

    pub fn pooled(freq: u64, workers: usize) -> Self {
        Self {
            freq,
            concurrency: Concurrency::Pooled { workers },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Concurrency::Pooled { workers: 0 } = self.concurrency {
            return Err(Error::InvalidWorkers);
        }
        Ok(())
    }
}
