//! Error types for africax.
//!
//! This module defines all error types used throughout the africax crate,
//! providing detailed context for debugging and user-friendly error messages.
//! Malformed field values (bad numbers, bad dates) are never errors: they are
//! coerced to absent values by the store.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for africax operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Geography Errors ===
    /// The reference geography file does not exist.
    #[error("missing reference geography file at {path}")]
    GeographyMissing {
        /// Expected path of the geography file.
        path: PathBuf,
    },

    /// The reference geography file could not be parsed.
    #[error("failed to parse geography file {path}: {message}")]
    GeographyParse {
        /// Path to the geography file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// The reference geography lacks a required attribute.
    #[error("geography file is missing expected columns ({expected})")]
    GeographySchema {
        /// Human-readable list of the accepted attribute names.
        expected: String,
    },

    /// No country with the given iso code is loaded.
    #[error("unknown country: {iso}")]
    UnknownCountry {
        /// The requested iso code.
        iso: String,
    },

    /// A coordinate did not fall inside any loaded country.
    #[error("no country at lat {lat}, lon {lon}")]
    NoCountryAt {
        /// Latitude of the point.
        lat: f64,
        /// Longitude of the point.
        lon: f64,
    },

    // === Store Errors ===
    /// Reading or writing the visits CSV failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A submitted visit failed validation and was not written.
    #[error("invalid visit: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// A row position does not exist in the backing file.
    #[error("row {position} out of range (file has {rows} rows)")]
    RowOutOfRange {
        /// The requested row position.
        position: usize,
        /// Number of data rows in the file.
        rows: usize,
    },

    /// No visit carries the given identifier.
    #[error("no visit with id {id}")]
    VisitNotFound {
        /// The requested identifier.
        id: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Replacing the backing file with its rewritten copy failed.
    #[error("failed to replace {path}: {source}")]
    Persist {
        /// Path of the file being replaced.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for africax operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new geography parse error.
    #[must_use]
    pub fn geography_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::GeographyParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a rejected submission.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error means a required input file is missing or unusable.
    ///
    /// These halt an interactive session with a visible message.
    #[must_use]
    pub fn is_missing_input(&self) -> bool {
        matches!(
            self,
            Self::GeographyMissing { .. } | Self::GeographySchema { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::validation("Restaurant name is required.");
        assert_eq!(
            err.to_string(),
            "invalid visit: Restaurant name is required."
        );

        let err = Error::internal("test error");
        assert_eq!(err.to_string(), "internal error: test error");
    }

    #[test]
    fn test_is_validation_error() {
        assert!(Error::validation("empty").is_validation_error());
        assert!(!Error::internal("x").is_validation_error());
    }

    #[test]
    fn test_is_missing_input() {
        let err = Error::GeographyMissing {
            path: PathBuf::from("/data/countries.geojson"),
        };
        assert!(err.is_missing_input());

        let err = Error::GeographySchema {
            expected: "NAME/ADMIN and ISO_A3/ADM0_A3".to_string(),
        };
        assert!(err.is_missing_input());
        assert!(!Error::validation("x").is_missing_input());
    }

    #[test]
    fn test_geography_missing_display() {
        let err = Error::GeographyMissing {
            path: PathBuf::from("/data/countries.geojson"),
        };
        assert!(err.to_string().contains("/data/countries.geojson"));
    }

    #[test]
    fn test_geography_parse_display() {
        let err = Error::geography_parse("/tmp/a.geojson", "expected FeatureCollection");
        let msg = err.to_string();
        assert!(msg.contains("/tmp/a.geojson"));
        assert!(msg.contains("expected FeatureCollection"));
    }

    #[test]
    fn test_row_out_of_range_display() {
        let err = Error::RowOutOfRange {
            position: 7,
            rows: 5,
        };
        assert_eq!(err.to_string(), "row 7 out of range (file has 5 rows)");
    }

    #[test]
    fn test_no_country_at_display() {
        let err = Error::NoCountryAt {
            lat: -30.0,
            lon: -20.0,
        };
        assert!(err.to_string().contains("-30"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "raters must not be empty".to_string(),
        };
        assert!(err.to_string().contains("raters must not be empty"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
