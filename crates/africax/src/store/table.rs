//! Raw text view of the visits file.
//!
//! Every cell is kept as text so that rewriting the file preserves columns
//! the store does not know about.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Header plus data rows, all as text. Rows are padded to the header width.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Column names.
    pub headers: Vec<String>,
    /// Data rows.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create an empty table with the given header.
    #[must_use]
    pub fn with_headers(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Parse CSV bytes. The first record is the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not valid CSV.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            if row.len() > headers.len() {
                warn!(
                    line = record.position().map(csv::Position::line),
                    dropped = row.len() - headers.len(),
                    "Dropping cells beyond the header"
                );
            }
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    /// Read a table from disk. A missing file reads as an empty table.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self> {
        match fs::read(path) {
            Ok(bytes) => Self::parse(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Index of a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell text, or empty if the column is missing.
    #[must_use]
    pub fn field<'a>(&self, row: &'a [String], name: &str) -> &'a str {
        self.column(name)
            .and_then(|idx| row.get(idx))
            .map_or("", String::as_str)
    }

    /// Ensure a column exists, appending it (with empty cells) if needed.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    /// Remove a column. Returns whether it existed.
    pub fn remove_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.column(name) else {
            return false;
        };
        self.headers.remove(idx);
        for row in &mut self.rows {
            if idx < row.len() {
                row.remove(idx);
            }
        }
        true
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Serialize the table as CSV.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = WriterBuilder::new().flexible(true).from_writer(writer);
        csv.write_record(&self.headers)?;
        for row in &self.rows {
            csv.write_record(row)?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Replace the file at `path` with this table.
    ///
    /// The table is written to a temporary file in the same directory, which
    /// is then renamed over the target.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be written or renamed.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let dir = parent_dir(path);
        ensure_dir(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        self.write_to(&mut tmp)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|err| Error::Persist {
            path: path.to_path_buf(),
            source: err.error,
        })?;

        debug!("Rewrote {} ({} rows)", path.display(), self.rows.len());
        Ok(())
    }
}

/// Append rows without a header to an existing file, or create the file with
/// `headers` first when it is missing or empty.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or written.
pub fn append_rows(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    ensure_dir(parent_dir(path))?;

    let needs_header = fs::metadata(path).map_or(true, |m| m.len() == 0);
    let file: File = OpenOptions::new().create(true).append(true).open(path)?;

    let mut csv = WriterBuilder::new().flexible(true).from_writer(file);
    if needs_header {
        csv.write_record(headers)?;
    }
    for row in rows {
        csv.write_record(row)?;
    }
    csv.flush()?;
    Ok(())
}

/// Read just the header of a CSV file, if it has one.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_headers(path: &Path) -> Result<Option<Vec<String>>> {
    match fs::metadata(path) {
        Ok(m) if m.len() > 0 => {}
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim_matches('\u{feff}').to_string())
        .collect();
    Ok(Some(headers))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Create a directory (and parents) if it does not exist.
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
