use std::{fmt, time::SystemTime};

use chrono::{DateTime, Duration, Local, TimeZone};

const UNITS: &[u8] = b"KMGTPEZY";

/// Size with IEC prefixes: `81533654` => `77.8MiB`, `512` => `512B`.
pub fn format_size(size: u64) -> String {
    let mut n = size as f64;
    let mut idx = 0;
    while n >= 1024.0 && idx < UNITS.len() {
        n /= 1024.0;
        idx += 1;
    }
    if idx == 0 {
        format!("{size}B")
    } else {
        format!("{:.1}{}iB", n, UNITS[idx - 1] as char)
    }
}

/// Timestamps within 12 hours of `now` print only the clock time
/// (`3:04 PM`), anything else only the date (`Jan 2, 2006`).
pub fn format_time<Tz: TimeZone>(ts: &DateTime<Tz>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    let d = ts.clone().signed_duration_since(now.clone());
    let window = Duration::hours(12);
    if -window < d && d < window {
        ts.format("%-I:%M %p").to_string()
    } else {
        ts.format("%b %-d, %Y").to_string()
    }
}

/// [`format_time`] in the server's local time zone.
pub fn format_local_time(ts: SystemTime, now: SystemTime) -> String {
    format_time(&DateTime::<Local>::from(ts), &DateTime::<Local>::from(now))
}
