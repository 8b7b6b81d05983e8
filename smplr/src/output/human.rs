use std::io::Write as _;
use std::sync::Arc;

mod format;
mod summary;

use format::format_duration;
use summary::render;

use super::{OutputFormatter, RunHeader};

pub(crate) struct HumanReadableOutput;

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, header: &RunHeader<'_>) {
        println!("{}", header.sampler);
        println!(
            "  backend={} freq={} mode={} workers={}",
            header.backend,
            header.config.freq,
            header.config.concurrency,
            header.config.concurrency.workers()
        );
    }

    fn sample_fn(&self) -> Option<smplr_core::SampleFn> {
        Some(Arc::new(|e: smplr_core::SampleEvent| {
            let mut out = std::io::stdout().lock();
            let _ = match &e.error {
                None => writeln!(out, "{}", format_duration(e.duration)),
                Some(err) => writeln!(out, "{} error={err}", format_duration(e.duration)),
            };
        }))
    }

    fn print_summary(&self, _sampler: &str, summary: &smplr_core::Summary) -> anyhow::Result<()> {
        let mut out = std::io::stdout().lock();
        out.write_all(render(summary).as_bytes())?;
        out.flush()?;
        Ok(())
    }
}
