mod action;
mod sampler;
mod timer;

pub mod http;
pub mod listener;
pub mod rserve;
pub mod runner;
pub mod stats;

pub use action::{Action, ActionError, FnAction, action_fn};
pub use http::{HttpClient, HttpPost, HttpRequest, HttpResponse};
pub use listener::{Listener, Report, ReportListener, SampleEvent, SampleFn};
pub use rserve::{RserveClient, RserveEval};
pub use runner::{Concurrency, Error, Result, RunConfig, ThreadGroup};
pub use sampler::Sampler;
pub use stats::{Summary, TimedOutcome};
pub use timer::{Timer, Timing};
