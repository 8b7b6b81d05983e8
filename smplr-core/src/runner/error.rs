use crate::action::ActionError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("`threads` must be a positive integer")]
    InvalidWorkers,

    #[error("sampler `{sampler}` aborted the run: {source}")]
    Aborted {
        sampler: String,
        #[source]
        source: ActionError,
    },

    #[error("run finished with {completed} of {expected} invocations recorded")]
    Incomplete { expected: u64, completed: u64 },

    #[error("listener is still referenced after all workers finished")]
    ListenerShared,
}

impl Error {
    /// True when a sampler's action reported the backend unusable.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}
