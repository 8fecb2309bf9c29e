//! Column layout of the visits file.
//!
//! The header is fixed apart from the rater columns, which follow the
//! configured rater list.

/// Country display name column.
pub const COUNTRY: &str = "Country";

/// ISO-3 code column.
pub const ISO_A3: &str = "ISO_A3";

/// Restaurant name column.
pub const RESTAURANT: &str = "Restaurant";

/// Group rating column.
pub const GROUP_RATING: &str = "Group_Rating";

/// Visit date column.
pub const VISIT_DATE: &str = "Visit Date";

/// Notes column.
pub const NOTES: &str = "Notes";

/// Dish list column.
pub const DISHES: &str = "Dishes";

/// Stable identifier column.
pub const VISIT_ID: &str = "Visit_ID";

/// Column of older files holding a single 1-5 rating.
pub const LEGACY_RATING: &str = "Rating";

/// Column names that rater names must not collide with.
pub const FIXED_COLUMNS: &[&str] = &[
    COUNTRY,
    ISO_A3,
    RESTAURANT,
    GROUP_RATING,
    VISIT_DATE,
    NOTES,
    DISHES,
    VISIT_ID,
    LEGACY_RATING,
];

/// Declared column layout for a given rater list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    raters: Vec<String>,
    columns: Vec<String>,
}

impl Schema {
    /// Build the layout: leading fixed columns, one column per rater, then
    /// the trailing fixed columns.
    #[must_use]
    pub fn new(raters: Vec<String>) -> Self {
        let mut columns: Vec<String> = [COUNTRY, ISO_A3, RESTAURANT]
            .iter()
            .map(|c| (*c).to_string())
            .collect();
        columns.extend(raters.iter().cloned());
        columns.extend(
            [GROUP_RATING, VISIT_DATE, NOTES, DISHES, VISIT_ID]
                .iter()
                .map(|c| (*c).to_string()),
        );
        Self { raters, columns }
    }

    /// Rater names in column order.
    #[must_use]
    pub fn raters(&self) -> &[String] {
        &self.raters
    }

    /// All declared columns in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether `name` is one of the declared columns.
    #[must_use]
    pub fn is_declared(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Whether `name` is a rater column.
    #[must_use]
    pub fn is_rater(&self, name: &str) -> bool {
        self.raters.iter().any(|r| r == name)
    }

    /// Whether a header matches the declared layout exactly.
    #[must_use]
    pub fn matches_header(&self, header: &[String]) -> bool {
        header == self.columns.as_slice()
    }
}
