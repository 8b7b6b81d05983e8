mod config;
mod error;
mod run;

pub use config::{Concurrency, RunConfig};
pub use error::{Error, Result};
pub use run::ThreadGroup;
