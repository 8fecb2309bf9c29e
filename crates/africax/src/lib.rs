//! `africax` - A tracker for restaurant visits across African countries
//!
//! This library provides the core functionality: resolving map points to
//! country polygons, and storing visits with per-person ratings in a CSV file
//! with schema normalization and derived group ratings.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod atlas;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod map;
pub mod report;
pub mod store;
pub mod visit;

pub use atlas::{Atlas, Bounds, Country};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use report::{CountryPanel, Kpis};
pub use store::{StoreOptions, VisitStore};
pub use visit::{RaterScore, Visit, VisitDraft};
