use chrono::{Local, NaiveDateTime, TimeZone, Utc};

use crate::model::*;

/// Half-width of the conflict window around a reservation's time.
pub const OVERLAP_MARGIN_MS: Ms = 119 * MINUTE_MS;

const INPUT_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// `[target - 119 min, target + 119 min]`. Two reservations whose times are
/// both inside each other's window compete for the same tables.
pub fn overlap_window(target: Ms) -> Window {
    Window::new(
        target.saturating_sub(OVERLAP_MARGIN_MS),
        target.saturating_add(OVERLAP_MARGIN_MS),
    )
}

/// Parse a wall-clock date-time. Times carry no zone: the restaurant's local
/// clock is stored as if it were UTC.
pub fn parse_instant(input: &str) -> Option<Ms> {
    let input = input.trim();
    INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive).timestamp_millis())
}

pub fn format_instant(at: Ms) -> String {
    match Utc.timestamp_millis_opt(at).single() {
        Some(dt) => dt.format(DISPLAY_FORMAT).to_string(),
        None => at.to_string(),
    }
}

/// Current local wall-clock time on the same scale as `parse_instant`.
pub fn now_ms() -> Ms {
    Utc.from_utc_datetime(&Local::now().naive_local())
        .timestamp_millis()
}
