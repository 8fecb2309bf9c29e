//! Core visit types for africax.
//!
//! A [`Visit`] is one normalized row of the visits file. A [`VisitDraft`] is
//! what a caller submits: raw text, normalized on write by the store. The
//! free functions here implement the field coercion rules shared by load and
//! write paths.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Lowest allowed rating.
pub const SCORE_MIN: f64 = 1.0;

/// Highest allowed rating.
pub const SCORE_MAX: f64 = 10.0;

/// Parsed years below this are two-digit years read through `%Y`.
const MIN_VISIT_YEAR: i32 = 1000;

/// Layout used when the configured format cannot render a date.
const FALLBACK_DATE_FORMAT: &str = "%Y-%m-%d";

/// Formats tried, in order, after the configured visit date format.
const LENIENT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%y",
    "%m-%d-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

/// Date-time formats tried when no date-only format matched.
const LENIENT_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Parse a rating from text.
///
/// Empty, non-numeric and non-finite values are absent.
#[must_use]
pub fn parse_score(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Clamp a rating into `[SCORE_MIN, SCORE_MAX]`.
#[must_use]
pub fn clamp_score(value: f64) -> f64 {
    value.clamp(SCORE_MIN, SCORE_MAX)
}

/// Parse and clamp a rating in one step.
#[must_use]
pub fn coerce_score(raw: &str) -> Option<f64> {
    parse_score(raw).map(clamp_score)
}

/// Round to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean of the present scores, rounded to two decimals.
///
/// Returns `None` when no score is present.
#[must_use]
pub fn group_mean<I>(scores: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = scores
        .into_iter()
        .flatten()
        .fold((0.0_f64, 0_u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(round2(sum / f64::from(count)))
    }
}

/// Render a rating the way it is stored: shortest form, always with a
/// fractional part (`8.0`, `7.33`).
#[must_use]
pub fn format_score(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

/// Render an optional rating; absent values are empty strings.
#[must_use]
pub fn format_optional_score(value: Option<f64>) -> String {
    value.map(format_score).unwrap_or_default()
}

/// Parse a visit date.
///
/// The configured `primary` format is tried first, then a fixed list of
/// common date and date-time layouts. Unparseable text is absent.
///
/// A match with a year below 1000 is skipped, so `3/14/24` reaches the
/// two-digit `%y` layout instead of landing in year 24.
#[must_use]
pub fn parse_visit_date(raw: &str, primary: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    std::iter::once(primary)
        .chain(LENIENT_DATE_FORMATS.iter().copied())
        .filter_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .chain(
            LENIENT_DATETIME_FORMATS
                .iter()
                .filter_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date()),
        )
        .chain(
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive()),
        )
        .find(|date| date.year() >= MIN_VISIT_YEAR)
}

/// Format a visit date with `format`, or `None` if the format needs fields a
/// plain date does not have (a time or an offset).
#[must_use]
pub fn try_format_visit_date(date: NaiveDate, format: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", date.format(format)).ok()?;
    Some(out)
}

/// Format a visit date for storage or display.
///
/// Falls back to `%Y-%m-%d` when `format` cannot render a date.
#[must_use]
pub fn format_visit_date(date: NaiveDate, format: &str) -> String {
    try_format_visit_date(date, format)
        .unwrap_or_else(|| date.format(FALLBACK_DATE_FORMAT).to_string())
}

/// One rater's score for a visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaterScore {
    /// Name of the rater.
    pub rater: String,
    /// Score in `[1, 10]`, if given.
    pub score: Option<f64>,
}

/// A normalized visit record, as loaded from the visits file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    /// Zero-based data row index in the backing file at load time.
    pub position: usize,

    /// Stable identifier, if the row carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Country display name.
    pub country: String,

    /// Upper-case ISO-3 country code.
    pub iso_a3: String,

    /// Restaurant name.
    pub restaurant: String,

    /// Per-rater scores, in configured rater order.
    pub scores: Vec<RaterScore>,

    /// Headline rating.
    pub group_rating: Option<f64>,

    /// Date of the visit.
    pub visit_date: Option<NaiveDate>,

    /// Free-text notes.
    pub notes: String,

    /// Comma-separated dish list.
    pub dishes: String,
}

impl Visit {
    /// Score given by the named rater.
    #[must_use]
    pub fn score(&self, rater: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|s| s.rater == rater)
            .and_then(|s| s.score)
    }

    /// Whether any per-rater score or the group rating is present.
    #[must_use]
    pub fn has_any_rating(&self) -> bool {
        self.group_rating.is_some() || self.scores.iter().any(|s| s.score.is_some())
    }

    /// Whether this row counts as a real visit: named restaurant and some rating.
    #[must_use]
    pub fn is_real_visit(&self) -> bool {
        !self.restaurant.trim().is_empty() && self.has_any_rating()
    }

    /// Individual dishes from the comma-separated list.
    #[must_use]
    pub fn dish_list(&self) -> Vec<&str> {
        self.dishes
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .collect()
    }

    /// Convert back into a draft, e.g. to prefill an edit.
    #[must_use]
    pub fn to_draft(&self, date_format: &str) -> VisitDraft {
        VisitDraft {
            country: self.country.clone(),
            iso_a3: self.iso_a3.clone(),
            restaurant: self.restaurant.clone(),
            scores: self
                .scores
                .iter()
                .filter_map(|s| s.score.map(|v| (s.rater.clone(), format_score(v))))
                .collect(),
            group_rating: self.group_rating.map(format_score),
            visit_date: self.visit_date.map(|d| format_visit_date(d, date_format)),
            notes: self.notes.clone(),
            dishes: self.dishes.clone(),
        }
    }
}

/// A visit as submitted for append or update.
///
/// Values are raw text; the store normalizes them on write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitDraft {
    /// Country display name.
    pub country: String,
    /// ISO-3 country code.
    pub iso_a3: String,
    /// Restaurant name; must not be blank.
    pub restaurant: String,
    /// Raw per-rater scores keyed by rater name.
    pub scores: BTreeMap<String, String>,
    /// Raw group rating, used only when no per-rater score is present.
    pub group_rating: Option<String>,
    /// Raw visit date in any recognized layout.
    pub visit_date: Option<String>,
    /// Free-text notes.
    pub notes: String,
    /// Comma-separated dish list.
    pub dishes: String,
}

impl VisitDraft {
    /// Start a draft for a restaurant in the given country.
    #[must_use]
    pub fn new(
        country: impl Into<String>,
        iso_a3: impl Into<String>,
        restaurant: impl Into<String>,
    ) -> Self {
        Self {
            country: country.into(),
            iso_a3: iso_a3.into(),
            restaurant: restaurant.into(),
            ..Self::default()
        }
    }

    /// Set one rater's score.
    #[must_use]
    pub fn with_score(mut self, rater: impl Into<String>, score: impl ToString) -> Self {
        self.scores.insert(rater.into(), score.to_string());
        self
    }

    /// Set the visit date.
    #[must_use]
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.visit_date = Some(date.into());
        self
    }

    /// Set the group rating.
    #[must_use]
    pub fn with_group_rating(mut self, rating: impl ToString) -> Self {
        self.group_rating = Some(rating.to_string());
        self
    }

    /// Set the notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Set the dish list.
    #[must_use]
    pub fn with_dishes(mut self, dishes: impl Into<String>) -> Self {
        self.dishes = dishes.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("7"), Some(7.0));
        assert_eq!(parse_score(" 8.5 "), Some(8.5));
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("great"), None);
        assert_eq!(parse_score("NaN"), None);
        assert_eq!(parse_score("inf"), None);
    }

    #[test]
    fn test_coerce_score_clamps() {
        assert_eq!(coerce_score("15"), Some(10.0));
        assert_eq!(coerce_score("0"), Some(1.0));
        assert_eq!(coerce_score("-3"), Some(1.0));
        assert_eq!(coerce_score("6.2"), Some(6.2));
        assert_eq!(coerce_score("n/a"), None);
    }

    #[test]
    fn test_group_mean_exact() {
        let scores = [7.0, 8.0, 9.0, 10.0, 6.0].map(Some);
        assert_eq!(group_mean(scores), Some(8.0));
    }

    #[test]
    fn test_group_mean_skips_absent_and_rounds() {
        let scores = [Some(7.0), None, Some(8.0), Some(8.0), None];
        assert_eq!(group_mean(scores), Some(7.67));
        assert_eq!(group_mean([None, None]), None);
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(8.0), "8.0");
        assert_eq!(format_score(7.33), "7.33");
        assert_eq!(format_score(10.0), "10.0");
        assert_eq!(format_optional_score(None), "");
    }

    #[test]
    fn test_parse_visit_date_primary_format() {
        let date = parse_visit_date("03/14/2024", "%m/%d/%Y");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 14));
    }

    #[test]
    fn test_parse_visit_date_fallbacks() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 14);
        assert_eq!(parse_visit_date("2024-03-14", "%m/%d/%Y"), expected);
        assert_eq!(parse_visit_date("Mar 14, 2024", "%m/%d/%Y"), expected);
        assert_eq!(parse_visit_date("14 March 2024", "%m/%d/%Y"), expected);
        assert_eq!(
            parse_visit_date("2024-03-14 19:30:00", "%m/%d/%Y"),
            expected
        );
        assert_eq!(
            parse_visit_date("2024-03-14T19:30:00+02:00", "%m/%d/%Y"),
            expected
        );
    }

    #[test]
    fn test_parse_visit_date_unparseable() {
        assert_eq!(parse_visit_date("", "%m/%d/%Y"), None);
        assert_eq!(parse_visit_date("last tuesday", "%m/%d/%Y"), None);
        assert_eq!(parse_visit_date("13/45/2024", "%m/%d/%Y"), None);
    }

    #[test]
    fn test_format_visit_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(format_visit_date(date, "%m/%d/%Y"), "01/05/2024");
    }

    #[test]
    fn test_format_visit_date_time_only_format() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(try_format_visit_date(date, "%H:%M"), None);
        assert_eq!(try_format_visit_date(date, "%z"), None);
        assert_eq!(format_visit_date(date, "%H:%M"), "2024-01-05");
    }

    #[test]
    fn test_parse_visit_date_two_digit_year() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 14);
        assert_eq!(parse_visit_date("3/14/24", "%m/%d/%Y"), expected);
        assert_eq!(parse_visit_date("03/14/24", "%m/%d/%Y"), expected);
    }

    fn sample_visit() -> Visit {
        Visit {
            position: 0,
            id: None,
            country: "Ethiopia".to_string(),
            iso_a3: "ETH".to_string(),
            restaurant: "Lucy".to_string(),
            scores: vec![
                RaterScore {
                    rater: "Fayez".to_string(),
                    score: Some(9.0),
                },
                RaterScore {
                    rater: "Seth".to_string(),
                    score: None,
                },
            ],
            group_rating: Some(9.0),
            visit_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            notes: String::new(),
            dishes: "injera, kitfo,, tibs ".to_string(),
        }
    }

    #[test]
    fn test_visit_score_lookup() {
        let visit = sample_visit();
        assert_eq!(visit.score("Fayez"), Some(9.0));
        assert_eq!(visit.score("Seth"), None);
        assert_eq!(visit.score("Nobody"), None);
    }

    #[test]
    fn test_visit_is_real_visit() {
        let mut visit = sample_visit();
        assert!(visit.is_real_visit());

        visit.restaurant = "  ".to_string();
        assert!(!visit.is_real_visit());

        let mut visit = sample_visit();
        visit.group_rating = None;
        visit.scores.iter_mut().for_each(|s| s.score = None);
        assert!(!visit.is_real_visit());
    }

    #[test]
    fn test_dish_list() {
        assert_eq!(sample_visit().dish_list(), vec!["injera", "kitfo", "tibs"]);
    }

    #[test]
    fn test_to_draft_prefills_edit() {
        let draft = sample_visit().to_draft("%m/%d/%Y");
        assert_eq!(draft.restaurant, "Lucy");
        assert_eq!(draft.scores.get("Fayez").map(String::as_str), Some("9.0"));
        assert!(!draft.scores.contains_key("Seth"));
        assert_eq!(draft.visit_date.as_deref(), Some("02/01/2024"));
    }

    #[test]
    fn test_draft_builder() {
        let draft = VisitDraft::new("Ghana", "GHA", "Chop Bar")
            .with_score("Ian", 7.5)
            .with_date("2024-05-01")
            .with_dishes("jollof")
            .with_notes("busy");
        assert_eq!(draft.scores.get("Ian").map(String::as_str), Some("7.5"));
        assert_eq!(draft.visit_date.as_deref(), Some("2024-05-01"));
        assert_eq!(draft.dishes, "jollof");
        assert_eq!(draft.notes, "busy");
        assert!(draft.group_rating.is_none());
    }
}
