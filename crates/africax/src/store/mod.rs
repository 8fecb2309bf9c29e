//! CSV-backed visit store for africax.
//!
//! The visits file is the only storage. Loading coerces every field, derives
//! the group rating and drops rows that are not real visits; mutations
//! re-read the whole file, change it, and write it back.
//!
//! Rows are addressed by their zero-based position among the data rows of the
//! file. Positions shift whenever a row is deleted, so callers that hold a
//! position across mutations should resolve it again from the row's
//! `Visit_ID` with [`VisitStore::position_of`].

pub mod migrations;
pub mod schema;
pub mod table;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::cache::{FileStamp, Memo};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::visit::{
    clamp_score, coerce_score, format_optional_score, format_visit_date, group_mean,
    parse_score, parse_visit_date, round2, RaterScore, Visit, VisitDraft,
};

use schema::Schema;
use table::Table;

/// What a memoized load depends on besides the file content.
type LoadKey = (FileStamp, Schema, StoreOptions);

/// Memo of one visits file.
type LoadMemo = Memo<LoadKey, Arc<Vec<Visit>>>;

/// Visits memo shared by the whole process, one entry per visits file.
static VISITS_CACHE: Mutex<BTreeMap<PathBuf, LoadMemo>> = Mutex::new(BTreeMap::new());

/// Normalization settings for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Format of the `Visit Date` column.
    pub date_format: String,
    /// Keep a supplied group rating when no per-rater score is present.
    pub keep_supplied_group_rating: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            date_format: "%m/%d/%Y".to_string(),
            keep_supplied_group_rating: true,
        }
    }
}

impl StoreOptions {
    /// Options taken from the store section of the configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            date_format: config.store.date_format.clone(),
            keep_supplied_group_rating: config.store.keep_supplied_group_rating,
        }
    }
}

/// A draft after normalization, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedVisit {
    /// Country display name.
    pub country: String,
    /// Upper-case ISO-3 code.
    pub iso_a3: String,
    /// Trimmed, non-empty restaurant name.
    pub restaurant: String,
    /// Clamped scores in rater order.
    pub scores: Vec<Option<f64>>,
    /// Group rating as it will be written.
    pub group_rating: Option<f64>,
    /// Visit date text as it will be written.
    pub visit_date: String,
    /// Notes.
    pub notes: String,
    /// Dish list.
    pub dishes: String,
}

impl NormalizedVisit {
    /// Declared column values, excluding the identifier.
    fn cells<'a>(&'a self, schema: &'a Schema) -> Vec<(&'a str, String)> {
        let mut cells = vec![
            (schema::COUNTRY, self.country.clone()),
            (schema::ISO_A3, self.iso_a3.clone()),
            (schema::RESTAURANT, self.restaurant.clone()),
        ];
        for (rater, score) in schema.raters().iter().zip(&self.scores) {
            cells.push((rater.as_str(), format_optional_score(*score)));
        }
        cells.push((schema::GROUP_RATING, format_optional_score(self.group_rating)));
        cells.push((schema::VISIT_DATE, self.visit_date.clone()));
        cells.push((schema::NOTES, self.notes.clone()));
        cells.push((schema::DISHES, self.dishes.clone()));
        cells
    }

    /// Overwrite the declared cells of `row`, leaving other columns alone.
    fn apply(&self, schema: &Schema, headers: &[String], row: &mut [String]) {
        for (column, value) in self.cells(schema) {
            if let Some(idx) = headers.iter().position(|h| h == column) {
                row[idx] = value;
            }
        }
    }

    /// A full row in declared column order.
    fn to_row(&self, schema: &Schema, id: &str) -> Vec<String> {
        let mut row = vec![String::new(); schema.columns().len()];
        self.apply(schema, schema.columns(), &mut row);
        if let Some(last) = row.last_mut() {
            *last = id.to_string();
        }
        row
    }
}

/// Visit store backed by a CSV file.
#[derive(Debug)]
pub struct VisitStore {
    /// Path to the visits file.
    path: PathBuf,
    /// Declared column layout.
    schema: Schema,
    /// Normalization settings.
    options: StoreOptions,
}

impl VisitStore {
    /// Create a store for the file at `path`. Nothing is read yet.
    #[must_use]
    pub fn new(path: impl AsRef<Path>, schema: Schema, options: StoreOptions) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            schema,
            options,
        }
    }

    /// Create a store from the configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.visits_path(),
            Schema::new(config.raters()),
            StoreOptions::from_config(config),
        )
    }

    /// Get the path to the visits file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the declared column layout.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Get the normalization settings.
    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Number of loads of this file served from the process-wide memo.
    ///
    /// # Errors
    ///
    /// Returns an error if the memo lock is poisoned.
    pub fn cache_hits(&self) -> Result<u64> {
        self.with_cache(|memo| memo.hits())
    }

    /// Whether a load of this file is currently memoized.
    ///
    /// # Errors
    ///
    /// Returns an error if the memo lock is poisoned.
    pub fn is_cached(&self) -> Result<bool> {
        self.with_cache(|memo| memo.is_cached())
    }

    /// Drop the memoized load of this file.
    ///
    /// # Errors
    ///
    /// Returns an error if the memo lock is poisoned.
    pub fn invalidate(&self) -> Result<()> {
        self.with_cache(Memo::invalidate)
    }

    fn with_cache<T>(&self, f: impl FnOnce(&mut LoadMemo) -> T) -> Result<T> {
        let mut caches = VISITS_CACHE
            .lock()
            .map_err(|_| Error::internal("visits cache lock poisoned"))?;
        Ok(f(caches.entry(self.path.clone()).or_default()))
    }

    /// Load all real visits.
    ///
    /// Creates the file with just the header when it does not exist. Rows
    /// without a restaurant name or without any rating are skipped (they stay
    /// in the file). The result is sorted by visit date (newest first, undated
    /// last), then country, then restaurant.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, read or parsed.
    pub fn load(&mut self) -> Result<Vec<Visit>> {
        if !self.path.exists() {
            info!("Creating visits file at {}", self.path.display());
            Table::with_headers(self.schema.columns().to_vec()).write_atomic(&self.path)?;
        }

        let (stamp, bytes) = FileStamp::read(&self.path)?;
        let key = (stamp, self.schema.clone(), self.options.clone());
        if let Some(visits) = self.with_cache(|memo| memo.get(&key))? {
            debug!("Serving {} visits from cache", visits.len());
            return Ok(visits.as_ref().clone());
        }

        let table = Table::parse(&bytes)?;
        let legacy = migrations::has_legacy_rating(&table);
        if legacy {
            warn!(
                "Visits file carries a legacy {} column; using it for group ratings",
                schema::LEGACY_RATING
            );
        }

        let mut visits: Vec<Visit> = table
            .rows
            .iter()
            .enumerate()
            .map(|(position, row)| self.visit_from_row(&table, row, position, legacy))
            .filter(Visit::is_real_visit)
            .collect();
        sort_visits(&mut visits);

        info!(
            loaded = visits.len(),
            skipped = table.len() - visits.len(),
            "Loaded visits from {}",
            self.path.display()
        );
        let shared = Arc::new(visits.clone());
        self.with_cache(|memo| memo.put(key, shared))?;
        Ok(visits)
    }

    /// The normalized record at a row position, whether or not it counts as
    /// a real visit.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the position does not exist.
    pub fn get(&self, position: usize) -> Result<Visit> {
        let table = Table::read(&self.path)?;
        let row = table.rows.get(position).ok_or(Error::RowOutOfRange {
            position,
            rows: table.len(),
        })?;
        let legacy = migrations::has_legacy_rating(&table);
        Ok(self.visit_from_row(&table, row, position, legacy))
    }

    /// Current row position of the visit with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or no row has that identifier.
    pub fn position_of(&self, id: &str) -> Result<usize> {
        let table = Table::read(&self.path)?;
        let id = id.trim();
        table
            .rows
            .iter()
            .position(|row| table.field(row, schema::VISIT_ID).trim() == id)
            .ok_or_else(|| Error::VisitNotFound { id: id.to_string() })
    }

    /// Normalize a draft the way it will be written.
    ///
    /// Scores are clamped to the rating range (unparseable ones become
    /// blank), the group rating is the rounded mean of present scores, and the
    /// date is reformatted to the configured format when it parses.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the restaurant name is blank.
    pub fn normalize(&self, draft: &VisitDraft) -> Result<NormalizedVisit> {
        let restaurant = draft.restaurant.trim();
        if restaurant.is_empty() {
            return Err(Error::validation("Restaurant name is required."));
        }

        for rater in draft.scores.keys() {
            if !self.schema.is_rater(rater) {
                warn!(rater = %rater, "Ignoring score for unknown rater");
            }
        }

        let scores: Vec<Option<f64>> = self
            .schema
            .raters()
            .iter()
            .map(|rater| draft.scores.get(rater).and_then(|raw| coerce_score(raw)))
            .collect();

        let group_rating = match group_mean(scores.iter().copied()) {
            Some(mean) => Some(mean),
            None if self.options.keep_supplied_group_rating => draft
                .group_rating
                .as_deref()
                .and_then(coerce_score)
                .map(round2),
            None => None,
        };

        let visit_date = match draft.visit_date.as_deref().map(str::trim) {
            None | Some("") => String::new(),
            Some(raw) => match parse_visit_date(raw, &self.options.date_format) {
                Some(date) => format_visit_date(date, &self.options.date_format),
                None => {
                    warn!(date = raw, "Keeping unrecognized visit date as entered");
                    raw.to_string()
                }
            },
        };

        Ok(NormalizedVisit {
            country: draft.country.trim().to_string(),
            iso_a3: draft.iso_a3.trim().to_uppercase(),
            restaurant: restaurant.to_string(),
            scores,
            group_rating,
            visit_date,
            notes: draft.notes.trim().to_string(),
            dishes: draft.dishes.trim().to_string(),
        })
    }

    /// Append a visit. Returns the identifier assigned to it.
    ///
    /// A file that is missing or empty gets the header first. When the
    /// existing header differs from the declared layout the whole file is
    /// rewritten in the current layout instead of appending a misaligned row.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank restaurant name (nothing is
    /// written), or an error if the file cannot be read or written.
    pub fn append(&mut self, draft: &VisitDraft) -> Result<String> {
        let visit = self.normalize(draft)?;
        let id = migrations::new_visit_id();

        match table::read_headers(&self.path)? {
            Some(headers) if !self.schema.matches_header(&headers) => {
                let mut table = Table::read(&self.path)?;
                migrations::upgrade(&mut table, &self.schema);
                let mut row = vec![String::new(); table.headers.len()];
                visit.apply(&self.schema, &table.headers, &mut row);
                if let Some(idx) = table.column(schema::VISIT_ID) {
                    row[idx].clone_from(&id);
                }
                table.rows.push(row);
                table.write_atomic(&self.path)?;
            }
            _ => {
                table::append_rows(
                    &self.path,
                    self.schema.columns(),
                    &[visit.to_row(&self.schema, &id)],
                )?;
            }
        }

        self.invalidate()?;
        info!(
            id = %id,
            restaurant = %visit.restaurant,
            iso = %visit.iso_a3,
            "Appended visit"
        );
        Ok(id)
    }

    /// Overwrite the declared columns of the row at `position`.
    ///
    /// The draft is normalized as for [`append`](Self::append); columns the
    /// store does not declare are preserved. The whole file is rewritten.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank restaurant name, an error if the
    /// position does not exist, or an error if the file cannot be rewritten.
    pub fn update(&mut self, position: usize, draft: &VisitDraft) -> Result<()> {
        let visit = self.normalize(draft)?;
        let mut table = Table::read(&self.path)?;
        if position >= table.len() {
            return Err(Error::RowOutOfRange {
                position,
                rows: table.len(),
            });
        }

        migrations::upgrade(&mut table, &self.schema);
        visit.apply(&self.schema, &table.headers, &mut table.rows[position]);
        table.write_atomic(&self.path)?;

        self.invalidate()?;
        info!(position, restaurant = %visit.restaurant, "Updated visit");
        Ok(())
    }

    /// Remove the row at `position`. Later rows move up by one.
    ///
    /// # Errors
    ///
    /// Returns an error if the position does not exist or the file cannot be
    /// rewritten.
    pub fn delete(&mut self, position: usize) -> Result<()> {
        let mut table = Table::read(&self.path)?;
        if position >= table.len() {
            return Err(Error::RowOutOfRange {
                position,
                rows: table.len(),
            });
        }

        let removed = table.rows.remove(position);
        let restaurant = table.field(&removed, schema::RESTAURANT).to_string();
        migrations::upgrade(&mut table, &self.schema);
        table.write_atomic(&self.path)?;

        self.invalidate()?;
        info!(
            position,
            remaining = table.len(),
            restaurant = %restaurant,
            "Deleted visit"
        );
        Ok(())
    }

    /// Write every loaded visit as CSV. Returns the number of visits written.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or writing fails.
    pub fn export<W: Write>(&mut self, writer: W) -> Result<usize> {
        let visits = self.load()?;
        write_visits_csv(&visits, &self.schema, &self.options.date_format, writer)?;
        Ok(visits.len())
    }

    fn visit_from_row(
        &self,
        table: &Table,
        row: &[String],
        position: usize,
        legacy: bool,
    ) -> Visit {
        let scores: Vec<RaterScore> = self
            .schema
            .raters()
            .iter()
            .map(|rater| RaterScore {
                rater: rater.clone(),
                score: coerce_score(table.field(row, rater)),
            })
            .collect();

        let supplied = if legacy {
            migrations::legacy_group_rating(table.field(row, schema::LEGACY_RATING))
        } else {
            parse_score(table.field(row, schema::GROUP_RATING))
        };
        let group_rating = group_mean(scores.iter().map(|s| s.score))
            .or(supplied)
            .map(clamp_score);

        let id = table.field(row, schema::VISIT_ID).trim();

        Visit {
            position,
            id: (!id.is_empty()).then(|| id.to_string()),
            country: table.field(row, schema::COUNTRY).trim().to_string(),
            iso_a3: table.field(row, schema::ISO_A3).trim().to_uppercase(),
            restaurant: table.field(row, schema::RESTAURANT).trim().to_string(),
            scores,
            group_rating,
            visit_date: parse_visit_date(
                table.field(row, schema::VISIT_DATE),
                &self.options.date_format,
            ),
            notes: table.field(row, schema::NOTES).to_string(),
            dishes: table.field(row, schema::DISHES).to_string(),
        }
    }
}

/// Sort newest first (undated last), then by country, then by restaurant.
pub fn sort_visits(visits: &mut [Visit]) {
    visits.sort_by(|a, b| {
        let by_date = match (a.visit_date, b.visit_date) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date
            .then_with(|| a.country.cmp(&b.country))
            .then_with(|| a.restaurant.cmp(&b.restaurant))
    });
}

/// Serialize visits as CSV in the declared column order.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_visits_csv<W: Write>(
    visits: &[Visit],
    schema: &Schema,
    date_format: &str,
    writer: W,
) -> Result<()> {
    let mut out = Table::with_headers(schema.columns().to_vec());
    for visit in visits {
        let mut row = vec![
            visit.country.clone(),
            visit.iso_a3.clone(),
            visit.restaurant.clone(),
        ];
        row.extend(
            schema
                .raters()
                .iter()
                .map(|rater| format_optional_score(visit.score(rater))),
        );
        row.push(format_optional_score(visit.group_rating));
        row.push(
            visit
                .visit_date
                .map(|d| format_visit_date(d, date_format))
                .unwrap_or_default(),
        );
        row.push(visit.notes.clone());
        row.push(visit.dishes.clone());
        row.push(visit.id.clone().unwrap_or_default());
        out.rows.push(row);
    }
    out.write_to(writer)
}
