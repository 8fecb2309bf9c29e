//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::visit::VisitDraft;

/// Resolve command arguments.
#[derive(Debug, Args)]
pub struct ResolveCommand {
    /// Latitude of the point
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude of the point
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Countries command arguments.
#[derive(Debug, Args)]
pub struct CountriesCommand {
    /// Only list countries with at least one visit
    #[arg(long)]
    pub visited: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Map command arguments.
#[derive(Debug, Args)]
pub struct MapCommand {
    /// Write the GeoJSON layer to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// A country chosen by ISO-3 code or by a point inside it.
#[derive(Debug, Clone, Args)]
pub struct CountryTarget {
    /// ISO-3 code of the country
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    pub iso: Option<String>,

    /// Latitude of a point inside the country
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude of a point inside the country
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,
}

impl CountryTarget {
    /// The point, when one was given.
    #[must_use]
    pub fn point(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }
}

/// Panel command arguments.
#[derive(Debug, Args)]
pub struct PanelCommand {
    /// The country to show
    #[command(flatten)]
    pub target: CountryTarget,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Summary command arguments.
#[derive(Debug, Args)]
pub struct SummaryCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Visit management commands.
#[derive(Debug, Subcommand)]
pub enum VisitsCommand {
    /// List visits
    List {
        /// Only visits in this country (ISO-3 code)
        #[arg(long)]
        country: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Log a new visit
    Add {
        /// The country of the restaurant
        #[command(flatten)]
        target: CountryTarget,

        /// Country name to record instead of the one from the geography
        #[arg(long)]
        country: Option<String>,

        /// Visit fields
        #[command(flatten)]
        fields: VisitFields,
    },

    /// Edit an existing visit
    Update {
        /// The row to edit
        #[command(flatten)]
        row: RowTarget,

        /// Fields to change; omitted fields keep their current value
        #[command(flatten)]
        fields: VisitFields,
    },

    /// Delete a visit
    Delete {
        /// The row to delete
        #[command(flatten)]
        row: RowTarget,
    },
}

/// A row chosen by position or by identifier.
#[derive(Debug, Clone, Args)]
pub struct RowTarget {
    /// Zero-based row position in the visits file
    #[arg(required_unless_present = "id")]
    pub position: Option<usize>,

    /// Stable visit identifier
    #[arg(long, conflicts_with = "position")]
    pub id: Option<String>,
}

/// Editable visit fields.
#[derive(Debug, Clone, Default, Args)]
pub struct VisitFields {
    /// Restaurant name
    #[arg(short, long)]
    pub restaurant: Option<String>,

    /// Per-rater score as NAME=VALUE (repeatable)
    #[arg(short, long = "score", value_name = "NAME=VALUE", value_parser = parse_score_arg)]
    pub scores: Vec<(String, String)>,

    /// Group rating, used when no per-rater score is given
    #[arg(short, long)]
    pub group_rating: Option<String>,

    /// Visit date (MM/DD/YYYY, YYYY-MM-DD, ...)
    #[arg(short, long)]
    pub date: Option<String>,

    /// Free-text notes
    #[arg(short, long)]
    pub notes: Option<String>,

    /// Comma-separated dish list
    #[arg(long)]
    pub dishes: Option<String>,
}

impl VisitFields {
    /// Overlay the given fields onto `draft`.
    pub fn apply_to(self, draft: &mut VisitDraft) {
        if let Some(restaurant) = self.restaurant {
            draft.restaurant = restaurant;
        }
        for (rater, score) in self.scores {
            draft.scores.insert(rater, score);
        }
        if let Some(rating) = self.group_rating {
            draft.group_rating = Some(rating);
        }
        if let Some(date) = self.date {
            draft.visit_date = Some(date);
        }
        if let Some(notes) = self.notes {
            draft.notes = notes;
        }
        if let Some(dishes) = self.dishes {
            draft.dishes = dishes;
        }
    }
}

/// Parse a `NAME=VALUE` score argument.
fn parse_score_arg(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing rater name in `{raw}`"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Write the CSV to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
