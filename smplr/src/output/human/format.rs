use std::time::Duration;

/// Renders a duration with the largest unit that keeps it >= 1, e.g. `1.25s`, `102.4ms`, `830us`.
pub(crate) fn format_duration(d: Duration) -> String {
    const NS_PER_US: u128 = 1_000;
    const NS_PER_MS: u128 = 1_000_000;
    const NS_PER_S: u128 = 1_000_000_000;

    let total_ns = d.as_nanos();

    if total_ns >= NS_PER_S {
        return format!("{}s", trim(total_ns as f64 / NS_PER_S as f64));
    }
    if total_ns >= NS_PER_MS {
        return format!("{}ms", trim(total_ns as f64 / NS_PER_MS as f64));
    }
    if total_ns >= NS_PER_US {
        return format!("{}us", trim(total_ns as f64 / NS_PER_US as f64));
    }
    format!("{total_ns}ns")
}

pub(crate) fn format_duration_opt(d: Option<Duration>) -> String {
    d.map(format_duration).unwrap_or_else(|| "-".to_string())
}

// Two decimals, without trailing zeros.
fn trim(v: f64) -> String {
    let s = format!("{v:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}
