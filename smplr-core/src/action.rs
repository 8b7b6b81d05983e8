use std::fmt;
use std::future::Future;

use async_trait::async_trait;

/// Failure reported by a single [`Action`] invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The backend answered, but not successfully. Recorded and counted; the run continues.
    #[error("{0}")]
    Failed(String),

    /// The backend is unreachable or the connection is no longer usable. Aborts the run.
    #[error("{0}")]
    Fatal(String),
}

impl ActionError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// One backend call with a success/failure outcome.
///
/// Implementations may keep private connection state between invocations, but must tolerate
/// being invoked from several workers at once.
#[async_trait]
pub trait Action: Send + Sync + fmt::Debug {
    async fn execute(&self) -> Result<(), ActionError>;
}

/// Adapts an async closure into an [`Action`].
pub struct FnAction<F> {
    f: F,
}

impl<F> fmt::Debug for FnAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnAction")
    }
}

pub fn action_fn<F, Fut>(f: F) -> FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
{
    FnAction { f }
}

#[async_trait]
impl<F, Fut> Action for FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
{
    async fn execute(&self) -> Result<(), ActionError> {
        (self.f)().await
    }
}
