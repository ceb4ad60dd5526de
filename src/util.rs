//! Small shared helpers for timestamps and display strings.

use chrono::{Local, TimeZone};

/// Current time as unix milliseconds, the unit every stored timestamp uses.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// "14:03" for today, "Mar 03 14:03" for older timestamps.
pub fn fmt_time(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms) {
        chrono::LocalResult::Single(dt) => {
            if dt.date_naive() == Local::now().date_naive() {
                dt.format("%H:%M").to_string()
            } else {
                dt.format("%b %d %H:%M").to_string()
            }
        }
        _ => "??:??".to_string(),
    }
}

/// Compact relative age for last-seen displays.
pub fn fmt_ago(ms: i64) -> String {
    let secs = now_ms().saturating_sub(ms) / 1000;
    if secs < 60 {
        return "just now".to_string();
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{}m ago", mins);
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    format!("{}d ago", hours / 24)
}

/// Truncate to at most `max` characters, marking the cut with "...".
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_unchanged() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        assert_eq!(truncate_chars("hello world", 8), "hello...");
    }

    #[test]
    fn test_truncate_multibyte() {
        // Cuts on char boundaries, not bytes.
        let s = "héllö wörld";
        assert_eq!(truncate_chars(s, 8), "héllö...");
    }

    #[test]
    fn test_fmt_ago_recent() {
        assert_eq!(fmt_ago(now_ms()), "just now");
        assert_eq!(fmt_ago(now_ms() - 5 * 60 * 1000), "5m ago");
        assert_eq!(fmt_ago(now_ms() - 3 * 60 * 60 * 1000), "3h ago");
        assert_eq!(fmt_ago(now_ms() - 48 * 60 * 60 * 1000), "2d ago");
    }
}
