use std::fmt::Write as _;

use super::format::format_duration_opt;

pub(crate) fn render(summary: &smplr_core::Summary) -> String {
    let mut out = String::new();

    writeln!(&mut out, "count: {}", summary.count).ok();
    writeln!(&mut out, "error_count: {}", summary.error_count).ok();

    match summary.avg_ms {
        Some(avg) => {
            writeln!(&mut out, "min: {}", format_duration_opt(summary.min)).ok();
            writeln!(&mut out, "max: {}", format_duration_opt(summary.max)).ok();
            writeln!(&mut out, "avg: {avg}").ok();
        }
        None => out.push_str("min: -\nmax: -\navg: - (no samples)\n"),
    }

    out.push('\n');
    out
}
