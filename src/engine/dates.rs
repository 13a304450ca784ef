//! Fuzzy due-date parsing.
//!
//! The extraction oracle is asked for ISO dates but regularly answers with
//! prose ("November 18th, 2024 at 3:30 PM"). Parsing tries RFC 3339, then
//! a list of known layouts with and without time and offset, after
//! dropping ordinal suffixes, filler words and timezone abbreviations.
//! A parse only counts when the text spells out its four-digit year.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::types::PipelineError;

/// Layouts carrying an explicit UTC offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
];

/// Layouts with a time of day and no offset.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %I:%M %p",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y/%m/%d %I:%M %p",
    "%B %d, %Y, %I:%M %p",
    "%B %d, %Y %I:%M %p",
    "%B %d %Y %I:%M %p",
    "%b %d, %Y, %I:%M %p",
    "%b %d, %Y %I:%M %p",
    "%B %d, %Y %H:%M",
    "%b %d, %Y %H:%M",
    "%d %B %Y %H:%M",
    "%d %b %Y %H:%M",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
];

/// Date-only layouts, resolved to midnight.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%A, %B %d, %Y",
    "%m/%d/%Y",
];

const ISO_NAIVE: &str = "%Y-%m-%dT%H:%M:%S";

/// Earliest year accepted as a due date.
const MIN_YEAR: i32 = 1970;

/// A parsed due date: either wall-clock time or a fixed-offset instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueDate {
    Naive(NaiveDateTime),
    Offset(DateTime<FixedOffset>),
}

impl DueDate {
    /// ISO-8601 text, without offset for naive values.
    pub fn to_iso(&self) -> String {
        match self {
            DueDate::Naive(dt) => dt.format(ISO_NAIVE).to_string(),
            DueDate::Offset(dt) => dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
        }
    }

    /// UNIX seconds; naive values are read as UTC.
    pub fn timestamp(&self) -> i64 {
        match self {
            DueDate::Naive(dt) => dt.and_utc().timestamp(),
            DueDate::Offset(dt) => dt.timestamp(),
        }
    }

    pub fn year(&self) -> i32 {
        match self {
            DueDate::Naive(dt) => dt.year(),
            DueDate::Offset(dt) => dt.year(),
        }
    }
}

fn ordinal_pattern() -> &'static Regex {
    static ORDINAL: OnceLock<Regex> = OnceLock::new();
    ORDINAL.get_or_init(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("valid ordinal regex"))
}

fn filler_pattern() -> &'static Regex {
    static FILLER: OnceLock<Regex> = OnceLock::new();
    FILLER.get_or_init(|| {
        Regex::new(
            r"(?i)^(by|on|before|until|end of)\s+|\s+(at|@)\s+|\s*(z|\b(?:utc|gmt|[aecmp][sd]t|bst|cest|cet|eest|eet|ist|jst|kst|aest|hkt|sgt))$",
        )
        .expect("valid filler regex")
    })
}

fn abbreviation_dot_pattern() -> &'static Regex {
    static DOT: OnceLock<Regex> = OnceLock::new();
    DOT.get_or_init(|| Regex::new(r"\b([A-Za-z]{3,4})\.").expect("valid abbreviation regex"))
}

fn month_year_pattern() -> &'static Regex {
    static MONTH_YEAR: OnceLock<Regex> = OnceLock::new();
    MONTH_YEAR.get_or_init(|| Regex::new(r"^([A-Za-z]+),?\s+(\d{4})$").expect("valid month-year regex"))
}

/// Normalise prose dates: drop ordinals, filler words, abbreviation dots
/// and a trailing timezone abbreviation.
fn clean(raw: &str) -> String {
    let no_ordinals = ordinal_pattern().replace_all(raw.trim(), "$1");
    let no_dots = abbreviation_dot_pattern().replace_all(&no_ordinals, "$1");
    let stripped = filler_pattern().replace_all(&no_dots, |caps: &regex::Captures| {
        if caps.get(2).is_some() { " " } else { "" }
    });
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn try_formats(text: &str) -> Option<DueDate> {
    let offset = DateTime::parse_from_rfc3339(text)
        .ok()
        .into_iter()
        .chain(OFFSET_FORMATS.iter().filter_map(|fmt| DateTime::parse_from_str(text, fmt).ok()))
        .map(DueDate::Offset);
    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(DueDate::Naive);
    let date_only = DATE_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .filter_map(|d| d.and_hms_opt(0, 0, 0))
        .map(DueDate::Naive);

    offset
        .chain(naive)
        .chain(date_only)
        .chain(month_year(text))
        .find(|d| spells_year(text, d.year()))
}

/// `%Y` also reads one or two digits, so "November 2024" fits "%B %d %Y"
/// as day 20 of year 24. Keep only parses whose year appears in full.
fn spells_year(text: &str, year: i32) -> bool {
    (MIN_YEAR..=9999).contains(&year) && text.contains(&year.to_string())
}

/// "November 2024" resolves to the last day of that month at midnight.
fn month_year(text: &str) -> Option<DueDate> {
    let caps = month_year_pattern().captures(text)?;
    let first = format!("1 {} {}", &caps[1], &caps[2]);
    let start = NaiveDate::parse_from_str(&first, "%d %B %Y")
        .or_else(|_| NaiveDate::parse_from_str(&first, "%d %b %Y"))
        .ok()?;
    let next_month = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    }?;
    next_month.pred_opt()?.and_hms_opt(0, 0, 0).map(DueDate::Naive)
}

/// Parse a free-form date string.
pub fn parse_due_date(raw: &str) -> Result<DueDate, PipelineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::DateParse(raw.to_string()));
    }
    try_formats(trimmed)
        .or_else(|| try_formats(&clean(trimmed)))
        .ok_or_else(|| PipelineError::DateParse(raw.to_string()))
}

/// Parse and render as ISO-8601.
pub fn normalize_due_date(raw: &str) -> Result<String, PipelineError> {
    parse_due_date(raw).map(|d| d.to_iso())
}

/// UNIX seconds of an ISO due date produced by `normalize_due_date`.
pub fn due_date_to_unix(iso: &str) -> Option<i64> {
    parse_due_date(iso).ok().map(|d| d.timestamp())
}

/// Whether a normalised due date lies in the past relative to `now`.
pub fn is_past(iso: &str, now: DateTime<Utc>) -> bool {
    due_date_to_unix(iso).is_some_and(|ts| ts <= now.timestamp())
}
