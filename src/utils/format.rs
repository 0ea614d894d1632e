//! Format - Console Formatting Utilities

use chrono::{DateTime, Local, Utc};

/// Format a UTC datetime in local time for display
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    let local: DateTime<Local> = dt.with_timezone(&Local);
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Optional timestamp, `-` when absent
pub fn format_opt_datetime(dt: Option<&DateTime<Utc>>) -> String {
    dt.map(format_datetime).unwrap_or_else(|| "-".into())
}

/// Format just the time portion
pub fn format_time(dt: &DateTime<Local>) -> String {
    dt.format("%H:%M:%S").to_string()
}

/// Truncate to `max_len` characters with an ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// Battery fill as a ten-segment bar, e.g. `[######----]`
pub fn gauge(fraction: f64) -> String {
    let filled = (fraction.clamp(0.0, 1.0) * 10.0).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(10 - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer message", 9), "a long...");
        assert_eq!(truncate("abcdef", 2), "ab");
        assert_eq!(truncate("ÄÖÜÄÖÜ", 5), "ÄÖ...");
    }

    #[test]
    fn test_format_time() {
        let dt = Local.with_ymd_and_hms(2024, 5, 1, 7, 8, 9).single().expect("valid");
        assert_eq!(format_time(&dt), "07:08:09");
    }

    #[test]
    fn test_missing_datetime() {
        assert_eq!(format_opt_datetime(None), "-");
    }

    #[test]
    fn test_gauge() {
        assert_eq!(gauge(0.0), "[----------]");
        assert_eq!(gauge(0.55), "[######----]");
        assert_eq!(gauge(2.0), "[##########]");
    }
}
