//! Metadata normalizer
//!
//! Converts the textual fields of a search result into numbers. Only
//! `to_seconds` can fail; everything else degrades to zero/none so a single
//! odd record never aborts a selection round.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::error::AcquireError;

static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?::\d+){1,2}$").expect("valid duration regex"));

static AGE_YEARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*year").expect("valid age regex"));

/// Duration text did not match `mm:ss` / `h:mm:ss`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed duration: '{0}'")]
pub struct MalformedDurationError(pub String);

impl From<MalformedDurationError> for AcquireError {
    fn from(err: MalformedDurationError) -> Self {
        AcquireError::MalformedInput(err.to_string())
    }
}

/// Parse `mm:ss` or `h:mm:ss` into seconds
pub fn to_seconds(text: &str) -> Result<u64, MalformedDurationError> {
    let trimmed = text.trim();
    if !DURATION_RE.is_match(trimmed) {
        return Err(MalformedDurationError(text.to_string()));
    }

    trimmed.split(':').try_fold(0u64, |acc, part| {
        let value: u64 = part
            .parse()
            .map_err(|_| MalformedDurationError(text.to_string()))?;
        acc.checked_mul(60)
            .and_then(|acc| acc.checked_add(value))
            .ok_or_else(|| MalformedDurationError(text.to_string()))
    })
}

/// `to_seconds`, with malformed input mapped to 0
pub fn to_seconds_or_zero(text: &str) -> u64 {
    to_seconds(text).unwrap_or(0)
}

/// Parse a view count such as `"1,234,567 views"`; anything else is 0
pub fn to_view_count(text: &str) -> u64 {
    text.split_whitespace()
        .next()
        .map(|token| token.replace(',', ""))
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

/// Integer year count in publication-age text (`"3 years ago"` → 3)
pub fn age_years(text: &str) -> Option<u32> {
    AGE_YEARS_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Render seconds in the textual wire form (`m:ss` or `h:mm:ss`)
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Render a view count in the textual wire form (`"1,234 views"`)
pub fn format_view_count(views: u64) -> String {
    let digits = views.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{} views", grouped)
}
