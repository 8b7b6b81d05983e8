use crate::exit_codes::ExitCode;

#[derive(Debug)]
pub enum RunError {
    InvalidInput(anyhow::Error),
    BackendUnavailable(anyhow::Error),
    SamplerAborted(anyhow::Error),
    RuntimeError(anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::BackendUnavailable(_) => ExitCode::BackendUnavailable,
            Self::SamplerAborted(_) => ExitCode::SamplerAborted,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
        }
    }

    #[must_use]
    pub fn anyhow(&self) -> &anyhow::Error {
        match self {
            Self::InvalidInput(e)
            | Self::BackendUnavailable(e)
            | Self::SamplerAborted(e)
            | Self::RuntimeError(e) => e,
        }
    }
}

impl From<smplr_core::Error> for RunError {
    fn from(err: smplr_core::Error) -> Self {
        match err {
            smplr_core::Error::InvalidWorkers => Self::InvalidInput(err.into()),
            err if err.is_aborted() => Self::SamplerAborted(err.into()),
            err => Self::RuntimeError(err.into()),
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.anyhow())
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.anyhow().as_ref())
    }
}
