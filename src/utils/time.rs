use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};

pub const LOG_DATE_FORMAT: &str = "%Y-%m-%d";
pub const PRETTY_DATE_FORMAT: &str = "%d/%m (%a)";
/// Largest number of days shown on either side of the selected date.
pub const MAX_WINDOW_DAYS: u32 = 365;

/// This is the standard way of converting a date to a string inside the activity log.
pub fn date_to_log_field(date: NaiveDate) -> String {
    date.format(LOG_DATE_FORMAT).to_string()
}

pub fn log_field_to_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), LOG_DATE_FORMAT)
        .with_context(|| format!("Invalid log date {value:?}"))
}

pub fn pretty_date(date: NaiveDate) -> String {
    date.format(PRETTY_DATE_FORMAT).to_string()
}

/// Returns dates from `days_back` before `selected` up to `days_forward` after it, inclusive.
/// Both counts are capped at [MAX_WINDOW_DAYS].
pub fn date_window(selected: NaiveDate, days_back: u32, days_forward: u32) -> Vec<NaiveDate> {
    let days_back = days_back.min(MAX_WINDOW_DAYS);
    let days_forward = days_forward.min(MAX_WINDOW_DAYS);
    let first = selected
        .checked_sub_days(Days::new(days_back.into()))
        .unwrap_or(NaiveDate::MIN);
    first
        .iter_days()
        .take(days_back as usize + days_forward as usize + 1)
        .collect()
}
