//! Rendering of command results as plain text, aligned tables, or JSON.

use chrono::NaiveDate;
use serde::Serialize;

use super::OutputFormat;
use crate::atlas::Country;
use crate::report::{CountryPanel, Kpis, NO_VISITS_MESSAGE};
use crate::visit::{format_optional_score, format_visit_date, Visit};
use crate::Result;

/// Placeholder for an absent value.
const ABSENT: &str = "-";

/// One line of the country listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryRow {
    /// Country display name.
    pub name: String,
    /// ISO-3 code.
    pub iso_a3: String,
    /// Whether the country has visits.
    pub visited: bool,
    /// Number of visits.
    pub visits: usize,
}

/// Result of resolving a point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    /// Latitude queried.
    pub lat: f64,
    /// Longitude queried.
    pub lon: f64,
    /// Name of the containing country.
    pub name: Option<String>,
    /// ISO-3 code of the containing country.
    pub iso_a3: Option<String>,
}

impl Resolution {
    /// Describe the outcome of a lookup.
    #[must_use]
    pub fn new(lat: f64, lon: f64, country: Option<&Country>) -> Self {
        Self {
            lat,
            lon,
            name: country.map(|c| c.name.clone()),
            iso_a3: country.map(|c| c.iso_a3.clone()),
        }
    }
}

/// Render a point lookup.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_resolution(resolution: &Resolution, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(resolution)?,
        OutputFormat::Plain | OutputFormat::Table => match (&resolution.name, &resolution.iso_a3) {
            (Some(name), Some(iso)) => format!("{name} ({iso})"),
            _ => format!(
                "No country at lat {}, lon {}",
                resolution.lat, resolution.lon
            ),
        },
    })
}

/// Render the country listing.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_countries(rows: &[CountryRow], format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(rows)?,
        OutputFormat::Plain => rows
            .iter()
            .map(|r| {
                let mark = if r.visited { "*" } else { " " };
                format!("{mark} {} {}", r.iso_a3, r.name)
            })
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Table => table(
            &["ISO", "Country", "Visited", "Visits"],
            rows.iter()
                .map(|r| {
                    vec![
                        r.iso_a3.clone(),
                        r.name.clone(),
                        if r.visited { "yes" } else { "no" }.to_string(),
                        r.visits.to_string(),
                    ]
                })
                .collect(),
        ),
    })
}

/// Render a list of visits.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_visits(
    visits: &[Visit],
    raters: &[String],
    date_format: &str,
    format: OutputFormat,
) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(visits)?,
        OutputFormat::Plain => visits
            .iter()
            .map(|v| {
                format!(
                    "[{}] {} ({}, {}) rating {} on {}",
                    v.position,
                    v.restaurant,
                    v.country,
                    v.iso_a3,
                    or_absent(format_optional_score(v.group_rating)),
                    date_text(v.visit_date, date_format)
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Table => {
            let mut headers = vec!["#", "Restaurant", "ISO"];
            headers.extend(raters.iter().map(String::as_str));
            headers.extend(["Group", "Date", "Dishes", "Notes"]);

            let rows = visits
                .iter()
                .map(|v| {
                    let mut row = vec![
                        v.position.to_string(),
                        v.restaurant.clone(),
                        v.iso_a3.clone(),
                    ];
                    row.extend(
                        raters
                            .iter()
                            .map(|r| or_absent(format_optional_score(v.score(r)))),
                    );
                    row.push(or_absent(format_optional_score(v.group_rating)));
                    row.push(date_text(v.visit_date, date_format));
                    row.push(v.dishes.clone());
                    row.push(v.notes.replace('\n', " "));
                    row
                })
                .collect();
            table(&headers, rows)
        }
    })
}

/// Render the headline KPIs.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_kpis(kpis: &Kpis, date_format: &str, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(kpis)?,
        OutputFormat::Plain | OutputFormat::Table => [
            format!("Countries covered: {}", kpis.countries_covered),
            format!("Visits:            {}", kpis.visits),
            format!("Avg rating:        {}", average_text(kpis.average_rating)),
            format!(
                "Latest visit:      {}",
                date_text(kpis.latest_visit, date_format)
            ),
        ]
        .join("\n"),
    })
}

/// Render a country panel.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_panel(
    panel: &CountryPanel,
    raters: &[String],
    date_format: &str,
    format: OutputFormat,
) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(panel)?);
    }

    let mut out = format!("{} ({})\n", panel.name, panel.iso_a3);
    if panel.is_empty() {
        out.push_str(NO_VISITS_MESSAGE);
        out.push('.');
        return Ok(out);
    }

    out.push_str(&render_visits(&panel.visits, raters, date_format, format)?);
    out.push_str("\n\n");
    out.push_str(&format!(
        "Visits: {}  Avg rating: {}  Latest visit: {}",
        panel.count,
        average_text(panel.average_rating),
        date_text(panel.latest_visit, date_format)
    ));
    Ok(out)
}

fn or_absent(text: String) -> String {
    if text.is_empty() {
        ABSENT.to_string()
    } else {
        text
    }
}

fn average_text(value: Option<f64>) -> String {
    value.map_or_else(|| ABSENT.to_string(), |v| format!("{v:.2}"))
}

fn date_text(date: Option<NaiveDate>, date_format: &str) -> String {
    date.map_or_else(|| ABSENT.to_string(), |d| format_visit_date(d, date_format))
}

/// Align `rows` under `headers`, columns separated by two spaces.
fn table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let mut lines = vec![
        line(headers.to_vec()),
        line(rule.iter().map(String::as_str).collect()),
    ];
    for row in &rows {
        lines.push(line(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}
