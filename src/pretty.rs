//! Human readable durations, relative times and byte sizes.

use time::OffsetDateTime;

const SECOND: u64 = 1000;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const MONTH: u64 = 30 * DAY;
const YEAR: u64 = 365 * DAY;

const UNITS: [(u64, &str); 7] = [
    (YEAR, "year"),
    (MONTH, "month"),
    (WEEK, "week"),
    (DAY, "day"),
    (HOUR, "hour"),
    (MINUTE, "minute"),
    (SECOND, "second"),
];

/// Renders `ms` milliseconds in the largest unit that fits at least once,
/// e.g. `"3 hours"`.
pub fn format_duration(ms: u64) -> String {
    for (size, name) in UNITS {
        let count = ms / size;
        if count > 0 {
            let plural = if count == 1 { "" } else { "s" };
            return format!("{count} {name}{plural}");
        }
    }
    "less than a second".to_owned()
}

/// Renders how long ago `time` was, relative to `now`.
///
/// Timestamps ahead of `now` (clock skew between client and server) are
/// clamped and render as `"just now"`.
pub fn format_relative(time: OffsetDateTime, now: OffsetDateTime) -> String {
    let age = now - time;
    if age.is_negative() {
        return "just now".to_owned();
    }
    let ms = u64::try_from(age.whole_milliseconds()).unwrap_or(u64::MAX);
    format!("{} ago", format_duration(ms))
}

const BYTE_UNITS: [&str; 6] = ["B", "kB", "MB", "GB", "TB", "PB"];

/// Renders a byte count with SI prefixes and three significant digits.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1000 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 999.5 && unit < BYTE_UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    let decimals = match value {
        v if v >= 100.0 => 0,
        v if v >= 10.0 => 1,
        _ => 2,
    };
    let mut text = format!("{value:.decimals$}");
    if text.contains('.') {
        text.truncate(text.trim_end_matches('0').trim_end_matches('.').len());
    }
    format!("{text} {}", BYTE_UNITS[unit])
}
