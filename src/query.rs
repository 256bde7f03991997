//! Parsing of free-text lookups such as `VRP350/VRP 350, січень-грудень 2024`.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

use crate::model::DateRange;

static PERIOD_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?),\s*(.+?)\s*-\s*(.+?)\s*(\d{4})").expect("query pattern compiles")
});

const MONTHS: [&str; 12] = [
    "січень",
    "лютий",
    "березень",
    "квітень",
    "травень",
    "червень",
    "липень",
    "серпень",
    "вересень",
    "жовтень",
    "листопад",
    "грудень",
];

/// Why a lookup text could not be turned into a [`Query`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// No product code survived normalization.
    #[error("query contains no product code")]
    NoCodes,

    /// At least one of the month names is not in the month table.
    #[error("unrecognized month in '{start}-{end}'")]
    UnknownMonth { start: String, end: String },

    /// The year cannot be represented as a calendar date.
    #[error("invalid year {0}")]
    InvalidYear(String),
}

/// A parsed lookup: normalized product code variants plus an optional period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub variants: Vec<String>,
    pub period: Option<DateRange>,
}

impl Query {
    /// True when the normalized `name` contains any of the query variants.
    pub fn matches(&self, normalized_name: &str) -> bool {
        self.variants
            .iter()
            .any(|variant| normalized_name.contains(variant.as_str()))
    }
}

/// Strips whitespace and hyphens and lower-cases the rest.
///
/// Applied to both query variants and product names before comparison, so
/// `VRP 350`, `vrp-350` and `VRP350` are all the same code.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Parses a lookup.
///
/// Text of the form `<codes>, <month>-<month> <year>` yields a period filter
/// covering the first day of the start month through the last day of the end
/// month. Any other text is taken as a plain slash-separated code list with no
/// period.
pub fn parse(text: &str) -> Result<Query, QueryError> {
    let text = text.to_lowercase().replace('–', "-");

    let (codes, period) = match PERIOD_QUERY.captures(&text) {
        Some(captures) => {
            let start = captures[2].trim();
            let end = captures[3].trim();
            let (Some(start_month), Some(end_month)) = (month_number(start), month_number(end))
            else {
                return Err(QueryError::UnknownMonth {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            };
            let year_text = &captures[4];
            let year: i32 = year_text
                .parse()
                .map_err(|_| QueryError::InvalidYear(year_text.to_string()))?;
            let period = month_span(year, start_month, end_month)
                .ok_or_else(|| QueryError::InvalidYear(year_text.to_string()))?;
            (captures.get(1).map_or("", |m| m.as_str()), Some(period))
        }
        None => (text.as_str(), None),
    };

    let variants = split_codes(codes);
    if variants.is_empty() {
        return Err(QueryError::NoCodes);
    }

    Ok(Query { variants, period })
}

/// Maps a lower-case Ukrainian month name to its number (1-12).
pub fn month_number(name: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|month| *month == name)
        .map(|idx| idx as u32 + 1)
}

fn split_codes(codes: &str) -> Vec<String> {
    codes
        .split('/')
        .filter(|code| !code.trim().is_empty())
        .map(normalize)
        .filter(|code| !code.is_empty())
        .collect()
}

fn month_span(year: i32, start_month: u32, end_month: u32) -> Option<DateRange> {
    let start = NaiveDate::from_ymd_opt(year, start_month, 1)?;
    let end = last_day_of_month(year, end_month)?;
    Some(DateRange::new(start, end))
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}
