#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// Every run completed but some samples failed (only with `--fail-on-errors`).
    SampleErrors = 10,

    /// A sampler reported its backend unusable mid-run; no summary was produced for it.
    SamplerAborted = 20,

    /// A backend could not be reached while building samplers; nothing was run.
    BackendUnavailable = 21,

    /// Invalid CLI/config (bad flags, malformed YAML, unknown sampler names, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, unexpected invariants, panics caught at top-level).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_sample_errors(error_count: u64, fail_on_errors: bool) -> Self {
        if fail_on_errors && error_count > 0 {
            Self::SampleErrors
        } else {
            Self::Success
        }
    }
}
