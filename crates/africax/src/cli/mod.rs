//! Command-line interface for africax.
//!
//! This module provides the CLI structure and output rendering for the
//! `africax` binary. Each invocation is one interaction with the tracker:
//! it loads the geography and the visits, runs one query or mutation, and
//! prints the result.

mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, CountriesCommand, CountryTarget, ExportCommand, MapCommand, OutputFormat,
    PanelCommand, ResolveCommand, RowTarget, SummaryCommand, VisitFields, VisitsCommand,
};

/// africax - Track restaurant visits across African countries
///
/// Logs visits with per-person ratings to a CSV file and maps them onto
/// country polygons.
#[derive(Debug, Parser)]
#[command(name = "africax")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Find the country containing a point
    Resolve(ResolveCommand),

    /// List the countries of the configured continent
    Countries(CountriesCommand),

    /// Write the styled GeoJSON map layer
    Map(MapCommand),

    /// Show the visits and summary of one country
    Panel(PanelCommand),

    /// Show headline numbers
    Summary(SummaryCommand),

    /// List, add, edit or delete visits
    #[command(subcommand)]
    Visits(VisitsCommand),

    /// Export all visits as CSV
    Export(ExportCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
