//! Presentation helpers for timestamps and long text

use chrono::{DateTime, Local, TimeZone, Utc};

/// Wall-clock time of a message, e.g. `02:05 PM`
pub fn clock_time<Tz: TimeZone>(timestamp: &DateTime<Utc>, zone: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    timestamp.with_timezone(zone).format("%I:%M %p").to_string()
}

/// `clock_time` in the local zone
pub fn local_clock_time(timestamp: &DateTime<Utc>) -> String {
    clock_time(timestamp, &Local)
}

/// Age of a timestamp: `Just now`, `5m ago`, `3h ago`, then the date
pub fn relative_time(timestamp: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let minutes = (*now - *timestamp).num_minutes();
    match minutes {
        m if m < 1 => "Just now".to_string(),
        m if m < 60 => format!("{m}m ago"),
        m if m < 24 * 60 => format!("{}h ago", m / 60),
        _ => timestamp.format("%Y-%m-%d").to_string(),
    }
}

/// Cut `text` to `max_chars` characters, marking the cut with `...`
pub fn truncate(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
