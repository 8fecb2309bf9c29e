//! Aggregates over loaded visits: headline KPIs and per-country panels.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::visit::{round2, Visit};

/// Message shown for a country without visits.
pub const NO_VISITS_MESSAGE: &str = "No visits logged yet";

/// Headline numbers over a set of visits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    /// Distinct country names with a visit.
    pub countries_covered: usize,
    /// Number of visits.
    pub visits: usize,
    /// Mean group rating, rounded to 2 decimals.
    pub average_rating: Option<f64>,
    /// Most recent visit date.
    pub latest_visit: Option<NaiveDate>,
}

/// Compute the KPIs for `visits`.
#[must_use]
pub fn kpis(visits: &[Visit]) -> Kpis {
    let countries: HashSet<&str> = visits.iter().map(|v| v.country.as_str()).collect();
    Kpis {
        countries_covered: countries.len(),
        visits: visits.len(),
        average_rating: average_rating(visits),
        latest_visit: visits.iter().filter_map(|v| v.visit_date).max(),
    }
}

/// Mean of the present group ratings, rounded to 2 decimals.
#[must_use]
pub fn average_rating(visits: &[Visit]) -> Option<f64> {
    let ratings: Vec<f64> = visits.iter().filter_map(|v| v.group_rating).collect();
    if ratings.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
    Some(round2(mean))
}

/// ISO-3 codes with at least one visit.
#[must_use]
pub fn visited_isos(visits: &[Visit]) -> BTreeSet<String> {
    visits
        .iter()
        .filter(|v| !v.iso_a3.is_empty())
        .map(|v| v.iso_a3.clone())
        .collect()
}

/// The visits of one country with their summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryPanel {
    /// Country display name.
    pub name: String,
    /// ISO-3 code.
    pub iso_a3: String,
    /// Visits in load order.
    pub visits: Vec<Visit>,
    /// Number of visits.
    pub count: usize,
    /// Mean group rating of these visits.
    pub average_rating: Option<f64>,
    /// Most recent visit date.
    pub latest_visit: Option<NaiveDate>,
}

impl CountryPanel {
    /// Build the panel for one country from all loaded visits.
    #[must_use]
    pub fn new(name: impl Into<String>, iso_a3: &str, visits: &[Visit]) -> Self {
        let iso_a3 = iso_a3.trim().to_uppercase();
        let visits: Vec<Visit> = visits
            .iter()
            .filter(|v| v.iso_a3 == iso_a3)
            .cloned()
            .collect();
        let summary = kpis(&visits);
        Self {
            name: name.into(),
            iso_a3,
            count: summary.visits,
            average_rating: summary.average_rating,
            latest_visit: summary.latest_visit,
            visits,
        }
    }

    /// Whether the country has no visits yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visit::RaterScore;

    fn visit(
        country: &str,
        iso: &str,
        rating: Option<f64>,
        date: Option<(i32, u32, u32)>,
    ) -> Visit {
        Visit {
            position: 0,
            id: None,
            country: country.to_string(),
            iso_a3: iso.to_string(),
            restaurant: format!("{country} place"),
            scores: vec![RaterScore {
                rater: "Ian".to_string(),
                score: rating,
            }],
            group_rating: rating,
            visit_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            notes: String::new(),
            dishes: String::new(),
        }
    }

    fn sample() -> Vec<Visit> {
        vec![
            visit("Ghana", "GHA", Some(8.0), Some((2024, 3, 1))),
            visit("Ghana", "GHA", Some(7.0), None),
            visit("Kenya", "KEN", Some(9.5), Some((2024, 5, 2))),
        ]
    }

    #[test]
    fn test_kpis() {
        let k = kpis(&sample());
        assert_eq!(k.countries_covered, 2);
        assert_eq!(k.visits, 3);
        assert_eq!(k.average_rating, Some(8.17));
        assert_eq!(k.latest_visit, NaiveDate::from_ymd_opt(2024, 5, 2));
    }

    #[test]
    fn test_kpis_empty() {
        let k = kpis(&[]);
        assert_eq!(k.countries_covered, 0);
        assert_eq!(k.average_rating, None);
        assert_eq!(k.latest_visit, None);
    }

    #[test]
    fn test_visited_isos() {
        let isos = visited_isos(&sample());
        assert_eq!(isos.into_iter().collect::<Vec<_>>(), vec!["GHA", "KEN"]);
    }

    #[test]
    fn test_country_panel() {
        let panel = CountryPanel::new("Ghana", "gha", &sample());
        assert_eq!(panel.iso_a3, "GHA");
        assert_eq!(panel.count, 2);
        assert_eq!(panel.average_rating, Some(7.5));
        assert_eq!(panel.latest_visit, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn test_country_panel_empty() {
        let panel = CountryPanel::new("Mali", "MLI", &sample());
        assert!(panel.is_empty());
        assert_eq!(panel.average_rating, None);
    }
}
