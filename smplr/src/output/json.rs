use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use super::{OutputFormatter, RunHeader};

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _header: &RunHeader<'_>) {}

    fn sample_fn(&self) -> Option<smplr_core::SampleFn> {
        Some(Arc::new(|e: smplr_core::SampleEvent| {
            // Live lines are best effort; the summary reports write failures.
            let _ = emit_json_line(&mut std::io::stdout().lock(), &build_sample_line(&e));
        }))
    }

    fn print_summary(&self, sampler: &str, summary: &smplr_core::Summary) -> anyhow::Result<()> {
        let mut out = std::io::stdout().lock();
        emit_json_line(&mut out, &build_summary_line(sampler, summary))?;
        out.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSampleLine<'a> {
    pub kind: &'static str,
    pub sampler: &'a str,
    pub seq: u64,
    pub duration_ms: f64,
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine<'a> {
    pub kind: &'static str,
    pub sampler: &'a str,
    pub count: u64,
    pub error_count: u64,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub avg_ms: Option<i64>,
    pub total_ms: f64,
}

fn millis(d: Duration) -> f64 {
    d.as_micros() as f64 / 1_000.0
}

fn build_sample_line(e: &smplr_core::SampleEvent) -> JsonSampleLine<'_> {
    JsonSampleLine {
        kind: "sample",
        sampler: &e.sampler,
        seq: e.seq,
        duration_ms: millis(e.duration),
        failed: e.error.is_some(),
        error: e.error.as_deref(),
    }
}

fn build_summary_line<'a>(
    sampler: &'a str,
    summary: &smplr_core::Summary,
) -> JsonSummaryLine<'a> {
    JsonSummaryLine {
        kind: "summary",
        sampler,
        count: summary.count,
        error_count: summary.error_count,
        min_ms: summary.min.map(millis),
        max_ms: summary.max.map(millis),
        avg_ms: summary.avg_ms,
        total_ms: millis(summary.total),
    }
}

fn emit_json_line<W: Write, T: Serialize>(out: &mut W, line: &T) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, line)?;
    writeln!(out)?;
    Ok(())
}
