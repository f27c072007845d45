use crate::error::{ReconcilerError, Result};
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime};
use std::collections::HashSet;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%Y/%m/%d %H:%M:%S",
];

pub fn first_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    validate_month(month)?;
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ReconcilerError::InvalidPeriod(format!("{:04}-{:02}", year, month)))
}

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    validate_month(month)?;
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    first_day_of_month(next_year, next_month)?
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| ReconcilerError::InvalidPeriod(format!("{:04}-{:02}", year, month)))
}

pub fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(ReconcilerError::InvalidMonth(month));
    }
    Ok(())
}

/// Parses a period string in the format "YYYY-MM"
/// Returns (year, month)
pub fn parse_period_string(period: &str) -> Result<(i32, u32)> {
    let start_str = format!("{}-01", period.trim());
    let start = NaiveDate::parse_from_str(&start_str, "%Y-%m-%d").map_err(|_| {
        ReconcilerError::InvalidPeriod(format!(
            "Invalid period format: {}. Expected YYYY-MM",
            period
        ))
    })?;
    Ok((start.year(), start.month()))
}

/// Parses the date strings commonly found in exported spreadsheets and reports.
/// Any time-of-day part is discarded.
pub fn parse_date_str(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Converts an Excel serial day number (1900 date system) to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let days = serial.trunc() as u64;
    // Serial 60 is Excel's phantom 1900-02-29; later serials are shifted by it
    let epoch = match days {
        60 => return None,
        0..=59 => NaiveDate::from_ymd_opt(1899, 12, 31)?,
        _ => NaiveDate::from_ymd_opt(1899, 12, 30)?,
    };
    epoch.checked_add_days(Days::new(days))
}

/// Cleans a column name by replacing embedded line breaks with single spaces.
pub fn clean_column_name(column: &str) -> String {
    column
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

/// Turns the header row of a raw table into unique column names.
///
/// Line breaks become spaces, missing names become `column_{index}` and
/// repeated names get `.1`, `.2`, ... suffixes.
pub fn normalize_headers(header: &[Option<String>]) -> Vec<String> {
    let mut seen = HashSet::new();
    header
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let base = name
                .as_deref()
                .map(clean_column_name)
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("column_{}", idx));

            let mut candidate = base.clone();
            let mut n = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}.{}", base, n);
                n += 1;
            }
            candidate
        })
        .collect()
}

/// Splits a multi-value cell on line breaks, keeping empty segments so that
/// segment positions stay aligned with their department index.
pub fn split_lines(value: &str) -> Vec<&str> {
    value
        .split('\n')
        .map(|segment| segment.trim_end_matches('\r'))
        .collect()
}
