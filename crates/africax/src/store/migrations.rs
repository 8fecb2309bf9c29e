//! Upgrades applied to the visits table before every full rewrite.
//!
//! Older files may lack declared columns, carry the single `Rating` column
//! from the 1-5 scale era, or have rows without a stable identifier. Load
//! tolerates all of these; a rewrite brings the file up to the current layout.

use tracing::{info, warn};
use uuid::Uuid;

use super::schema::{self, Schema};
use super::table::Table;
use crate::visit::{clamp_score, format_score, parse_score, round2};

/// What an upgrade changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Upgrade {
    /// Declared columns that had to be added.
    pub columns_added: usize,
    /// Whether the legacy rating column was folded into the group rating.
    pub legacy_rating_folded: bool,
    /// Rows that received a new identifier.
    pub ids_assigned: usize,
}

impl Upgrade {
    /// Whether anything changed.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Whether the table carries a legacy rating column with at least one number.
#[must_use]
pub fn has_legacy_rating(table: &Table) -> bool {
    table.column(schema::LEGACY_RATING).is_some_and(|idx| {
        table
            .rows
            .iter()
            .any(|row| row.get(idx).and_then(|v| parse_score(v)).is_some())
    })
}

/// Group rating implied by a legacy 1-5 rating.
#[must_use]
pub fn legacy_group_rating(raw: &str) -> Option<f64> {
    parse_score(raw).map(|v| v * 2.0)
}

/// Bring `table` up to the declared layout of `schema`.
///
/// Declared columns are appended when missing, a populated legacy rating
/// column replaces the group rating (doubled) and is dropped, and every row
/// without an identifier gets one.
pub fn upgrade(table: &mut Table, schema: &Schema) -> Upgrade {
    let mut report = Upgrade::default();

    for column in schema.columns() {
        if table.column(column).is_none() {
            table.ensure_column(column);
            report.columns_added += 1;
        }
    }

    if has_legacy_rating(table) {
        fold_legacy_rating(table);
        report.legacy_rating_folded = true;
    } else if table.remove_column(schema::LEGACY_RATING) {
        info!("Dropped empty legacy {} column", schema::LEGACY_RATING);
    }

    report.ids_assigned = assign_ids(table);

    if !report.is_noop() {
        info!(
            columns_added = report.columns_added,
            legacy_rating_folded = report.legacy_rating_folded,
            ids_assigned = report.ids_assigned,
            "Upgraded visits table"
        );
    }
    report
}

fn fold_legacy_rating(table: &mut Table) {
    let (Some(legacy), Some(group)) = (
        table.column(schema::LEGACY_RATING),
        table.column(schema::GROUP_RATING),
    ) else {
        return;
    };

    warn!(
        "Converting legacy {} column (1-5) into {}",
        schema::LEGACY_RATING,
        schema::GROUP_RATING
    );
    for row in &mut table.rows {
        row[group] = legacy_group_rating(&row[legacy])
            .map(|v| format_score(round2(clamp_score(v))))
            .unwrap_or_default();
    }
    table.remove_column(schema::LEGACY_RATING);
}

fn assign_ids(table: &mut Table) -> usize {
    let Some(idx) = table.column(schema::VISIT_ID) else {
        return 0;
    };
    let mut assigned = 0;
    for row in &mut table.rows {
        if row[idx].trim().is_empty() {
            row[idx] = new_visit_id();
            assigned += 1;
        }
    }
    assigned
}

/// Generate a fresh visit identifier.
#[must_use]
pub fn new_visit_id() -> String {
    Uuid::new_v4().to_string()
}
