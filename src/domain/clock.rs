use chrono::{Datelike, NaiveDate};

/// Calendar-day marker, `YYYY-MM-DD`.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// ISO-week marker, `YYYY-Www`. The year is the ISO week-year, which differs
/// from the calendar year around January 1st.
pub fn iso_week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

pub fn minutes_of_day(hour: u8, minute: u8) -> u32 {
    hour as u32 * 60 + minute as u32
}

pub fn hour_minute_from_minutes(total_minutes: u32) -> (u8, u8) {
    ((total_minutes / 60) as u8, (total_minutes % 60) as u8)
}

pub fn format_hhmm(hour: u8, minute: u8) -> String {
    format!("{hour:02}:{minute:02}")
}
