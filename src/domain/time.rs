//! Playback position formatting.

/// Format a position in seconds as `M:SS`, or `H:MM:SS` from one hour up.
///
/// Fractional seconds are floored.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Link to `url` that starts playback at `seconds`
pub fn timestamp_url(url: &str, seconds: f64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}{}t={}s", url, separator, secs)
}

/// Parse a position typed as seconds (`90`, `90.5`), `M:SS` or `H:MM:SS`
pub fn parse_time(input: &str) -> Option<f64> {
    let parts: Vec<&str> = input.trim().split(':').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let (last, units) = parts.split_last()?;
    let seconds: f64 = last.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 || (!units.is_empty() && seconds >= 60.0) {
        return None;
    }

    let mut total = 0.0;
    for (i, unit) in units.iter().enumerate() {
        let value: u32 = unit.parse().ok()?;
        // Minutes only roll over when an hour field precedes them
        if i > 0 && value >= 60 {
            return None;
        }
        total = total * 60.0 + f64::from(value);
    }

    Some(total * 60.0 + seconds)
}
