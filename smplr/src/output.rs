use crate::cli::OutputFormat;

mod human;
mod json;

/// What the formatters need to know about the sampler being run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunHeader<'a> {
    pub sampler: &'a str,
    pub backend: &'a str,
    pub config: smplr_core::RunConfig,
}

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, header: &RunHeader<'_>);
    fn sample_fn(&self) -> Option<smplr_core::SampleFn>;
    fn print_summary(&self, sampler: &str, summary: &smplr_core::Summary) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
