//! Configuration management for africax.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::schema::FIXED_COLUMNS;
use crate::visit::try_format_visit_date;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "africax";

/// Default visits file name.
const VISITS_FILE_NAME: &str = "restaurants.csv";

/// Default reference geography file name (Natural Earth, exported as GeoJSON).
const GEOGRAPHY_FILE_NAME: &str = "ne_110m_admin_0_countries.geojson";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `AFRICAX_`)
/// 2. TOML config file at `~/.config/africax/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data file locations.
    pub data: DataConfig,
    /// Reference geography configuration.
    pub geography: GeographyConfig,
    /// Visit store configuration.
    pub store: StoreConfig,
}

/// Data file locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Path to the visits CSV.
    /// Defaults to `~/.local/share/africax/restaurants.csv`
    pub visits_path: Option<PathBuf>,
    /// Path to the country polygon GeoJSON.
    /// Defaults to `~/.local/share/africax/ne_110m_admin_0_countries.geojson`
    pub geography_path: Option<PathBuf>,
}

/// Reference geography configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeographyConfig {
    /// Continent kept when loading the polygon dataset (case-insensitive).
    pub continent: String,
}

/// Visit store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Named raters; each gets its own score column.
    pub raters: Vec<String>,
    /// Textual format of the `Visit Date` column (chrono strftime syntax).
    pub date_format: String,
    /// Keep a caller-supplied group rating on append/update when no per-rater
    /// score is present. When false the group rating is written blank.
    pub keep_supplied_group_rating: bool,
}

impl Default for GeographyConfig {
    fn default() -> Self {
        Self {
            continent: "Africa".to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            raters: default_raters(),
            date_format: "%m/%d/%Y".to_string(),
            keep_supplied_group_rating: true,
        }
    }
}

/// Default team members for per-person ratings.
fn default_raters() -> Vec<String> {
    ["Fayez", "Muhammad", "Seth", "Ian", "Shubham"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `AFRICAX_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("AFRICAX_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.geography.continent.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "geography.continent must not be empty".to_string(),
            });
        }

        if self.store.raters.is_empty() {
            return Err(Error::ConfigValidation {
                message: "store.raters must name at least one rater".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for rater in &self.store.raters {
            let name = rater.trim();
            if name.is_empty() {
                return Err(Error::ConfigValidation {
                    message: "store.raters contains an empty name".to_string(),
                });
            }
            if FIXED_COLUMNS.contains(&name) {
                return Err(Error::ConfigValidation {
                    message: format!("rater name '{name}' clashes with a fixed column"),
                });
            }
            if !seen.insert(name) {
                return Err(Error::ConfigValidation {
                    message: format!("duplicate rater: {name}"),
                });
            }
        }

        let items: Vec<Item<'_>> = StrftimeItems::new(&self.store.date_format).collect();
        let sample = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap_or_default();
        if items.is_empty()
            || items.iter().any(|item| matches!(item, Item::Error))
            || try_format_visit_date(sample, &self.store.date_format).is_none()
        {
            return Err(Error::ConfigValidation {
                message: format!("invalid date format: {}", self.store.date_format),
            });
        }

        Ok(())
    }

    /// Get the visits CSV path, resolving defaults if not set.
    #[must_use]
    pub fn visits_path(&self) -> PathBuf {
        self.data
            .visits_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(VISITS_FILE_NAME))
    }

    /// Get the reference geography path, resolving defaults if not set.
    #[must_use]
    pub fn geography_path(&self) -> PathBuf {
        self.data
            .geography_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(GEOGRAPHY_FILE_NAME))
    }

    /// Rater names with surrounding whitespace removed.
    #[must_use]
    pub fn raters(&self) -> Vec<String> {
        self.store
            .raters
            .iter()
            .map(|r| r.trim().to_string())
            .collect()
    }
}
