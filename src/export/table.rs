//! In-memory tabular result of a study export

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tempfile::NamedTempFile;

use crate::error::ExportResult;

/// A header row plus data rows, all as strings.
///
/// Every row has exactly as many fields as the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Table {
    /// Create an empty table with the given column names
    pub fn new(headers: StringRecord) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Parse CSV text whose first record is the header.
    ///
    /// Rows with a field count different from the header are rejected, and
    /// blank lines are ignored.
    pub fn parse(text: &str) -> Result<Self, csv::Error> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Value at `row` in the named column
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    /// Append the rows of another table, keeping their order
    pub fn extend(&mut self, other: Table) {
        self.rows.extend(other.rows);
    }

    /// Write header and rows as CSV.
    ///
    /// With `include_index` an unnamed leading column holds the 0-based row
    /// number, matching what dataframe tools write by default.
    pub fn write_csv<W: Write>(&self, writer: W, include_index: bool) -> Result<(), csv::Error> {
        let mut writer = WriterBuilder::new().from_writer(writer);

        if include_index {
            writer.write_record(std::iter::once("").chain(self.headers.iter()))?;
            for (index, row) in self.rows.iter().enumerate() {
                let index = index.to_string();
                writer.write_record(std::iter::once(index.as_str()).chain(row.iter()))?;
            }
        } else {
            writer.write_record(&self.headers)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
        }

        writer.flush()?;
        Ok(())
    }

    /// Write the table to `path`, replacing any existing file only once the
    /// whole table has been written.
    pub fn save_csv(&self, path: &Path, include_index: bool) -> ExportResult<PathBuf> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let temp_file = NamedTempFile::new_in(parent)?;
        let mut buf_writer = BufWriter::new(temp_file);
        self.write_csv(&mut buf_writer, include_index)?;

        let temp_file = buf_writer
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        temp_file.persist(path).map_err(|e| e.error)?;

        Ok(path.to_path_buf())
    }
}
