use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }
    // Bare numbers are seconds.
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s)
        .map_err(|err| format!("invalid duration '{s}' ({err}; expected e.g. 10s, 250ms, 1m)"))
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable per-sample lines and summary.
    HumanReadable,
    /// Emit JSON lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "smplr",
    author,
    version,
    about = "Repeatedly invoke configured samplers and report latency/error statistics",
    long_about = "smplr invokes every sampler from a YAML config file `--freq` times, either across a pool of `--threads` workers or one at a time with `--sequential`, then prints error count and min/max/avg latency per sampler.\n\nA sampler is either an HTTP POST (`http_post: {host, path, data}`) or an Rserve command evaluation (`rserve: {host, port, data}`).",
    after_help = "Examples:\n  smplr --config config.yaml\n  smplr --config config.yaml --freq 100 --threads 20\n  smplr --config config.yaml --sequential --only predict --output json"
)]
pub struct Cli {
    /// Path to the sampler config file
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Invocations per sampler
    #[arg(long, default_value_t = 10)]
    pub freq: u64,

    /// Worker pool size
    #[arg(long, default_value_t = 10, conflicts_with = "sequential")]
    pub threads: usize,

    /// Run invocations one at a time instead of on a worker pool
    #[arg(long)]
    pub sequential: bool,

    /// Only run the named sampler(s) (repeatable)
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,

    /// Timeout for a whole HTTP exchange (e.g. 10s, 250ms); none by default
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// TCP connect timeout for HTTP and Rserve backends
    #[arg(long, value_parser = parse_duration, default_value = "3s")]
    pub connect_timeout: Duration,

    /// Record HTTP transport errors as failed samples instead of aborting the run
    #[arg(long)]
    pub tolerate_transport_errors: bool,

    /// Exit with a non-zero code when any sample failed
    #[arg(long)]
    pub fail_on_errors: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
