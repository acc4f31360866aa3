//! Incremental assembly of a table from a streamed CSV line sequence
//!
//! The export stream can be far larger than is comfortable to hold as a single
//! string, so lines are gathered into batches. Every batch buffer starts with
//! its own copy of the header line, which makes each one a self-contained CSV
//! document that is parsed and appended to the result before the next batch
//! is started.

use std::io;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::table::Table;
use crate::progress::ProgressReporter;

/// Default number of data lines per parsed batch
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Failure while assembling a stream; the caller adds the study context
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("stream contained no header line")]
    EmptyStream,

    #[error("failed to read line: {0}")]
    Read(#[from] io::Error),

    #[error("invalid CSV in batch {batch} starting at data row {first_row}: {source}")]
    Parse {
        batch: usize,
        first_row: u64,
        #[source]
        source: csv::Error,
    },
}

/// Statistics from an assembly run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyStats {
    /// Data lines received (blank lines excluded)
    pub rows_received: u64,
    /// Batches parsed, including the final flush
    pub batches_parsed: usize,
    /// Blank lines skipped
    pub blank_lines_skipped: u64,
    /// Row count announced by the server, if any
    pub expected_rows: Option<u64>,
    /// Time spent consuming the stream
    #[serde(skip)]
    pub duration: Duration,
}

impl AssemblyStats {
    /// Rows per second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.rows_received as f64 / secs
        }
    }

    /// Format duration as human-readable string
    pub fn duration_string(&self) -> String {
        let secs = self.duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }

    /// True when the server announced a count and a different number of rows
    /// arrived
    pub fn count_mismatch(&self) -> bool {
        self.expected_rows
            .is_some_and(|expected| expected != self.rows_received)
    }
}

/// The assembled table and how it was produced
#[derive(Debug, Clone)]
pub struct Assembly {
    pub table: Table,
    pub stats: AssemblyStats,
}

/// Accumulates header plus data lines for one batch
#[derive(Debug)]
struct BatchBuffer {
    text: String,
    rows: u64,
}

impl BatchBuffer {
    fn new(header: &str) -> Self {
        let mut text = String::with_capacity(header.len() + 1);
        text.push_str(header);
        text.push('\n');
        Self { text, rows: 0 }
    }

    fn push(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
        self.rows += 1;
    }

    /// Escaped quotes come in pairs, so an odd count means a quoted field
    /// runs past the end of the batch
    fn has_open_quote(&self) -> bool {
        self.text.bytes().filter(|&b| b == b'"').count() % 2 == 1
    }
}

/// Builds a [`Table`] from a line stream in fixed-size batches
pub struct TableAssembler<'a> {
    batch_size: usize,
    progress: &'a dyn ProgressReporter,
}

impl<'a> TableAssembler<'a> {
    /// Create an assembler; a batch size of zero is treated as one
    pub fn new(batch_size: usize, progress: &'a dyn ProgressReporter) -> Self {
        Self {
            batch_size: batch_size.max(1),
            progress,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Consume `lines` and return the assembled table.
    ///
    /// The first non-blank line is the header. Blank lines are skipped
    /// everywhere and never count toward a batch. A batch is parsed each time
    /// the running data-line count reaches a multiple of the batch size, and
    /// whatever remains is parsed once the stream ends, even if that is the
    /// header alone.
    pub fn assemble<I>(
        &self,
        lines: I,
        expected_rows: Option<u64>,
    ) -> Result<Assembly, AssembleError>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        let start = Instant::now();
        let mut stats = AssemblyStats {
            expected_rows,
            ..Default::default()
        };

        let mut lines = lines.into_iter();
        let header = loop {
            match lines.next() {
                None => return Err(AssembleError::EmptyStream),
                Some(line) => {
                    let line = line?;
                    if line.is_empty() {
                        stats.blank_lines_skipped += 1;
                    } else {
                        break line;
                    }
                }
            }
        };

        let mut table = Table::parse(&header).map_err(|source| AssembleError::Parse {
            batch: 1,
            first_row: 1,
            source,
        })?;

        self.progress.start(expected_rows);
        let consumed = self.consume(lines, &header, &mut table, &mut stats);
        self.progress.finish();
        consumed?;

        stats.duration = start.elapsed();
        Ok(Assembly { table, stats })
    }

    fn consume<I>(
        &self,
        lines: I,
        header: &str,
        table: &mut Table,
        stats: &mut AssemblyStats,
    ) -> Result<(), AssembleError>
    where
        I: Iterator<Item = io::Result<String>>,
    {
        let mut buffer = BatchBuffer::new(header);
        let batch_size = self.batch_size as u64;

        for line in lines {
            let line = line?;
            if line.is_empty() {
                stats.blank_lines_skipped += 1;
                continue;
            }

            buffer.push(&line);
            stats.rows_received += 1;
            self.progress.advance(1);

            if stats.rows_received % batch_size == 0 {
                let full = std::mem::replace(&mut buffer, BatchBuffer::new(header));
                self.flush(full, table, stats)?;
            }
        }

        self.flush(buffer, table, stats)
    }

    fn flush(
        &self,
        buffer: BatchBuffer,
        table: &mut Table,
        stats: &mut AssemblyStats,
    ) -> Result<(), AssembleError> {
        let batch = stats.batches_parsed + 1;
        let first_row = stats.rows_received - buffer.rows + 1;

        if buffer.has_open_quote() {
            return Err(AssembleError::Parse {
                batch,
                first_row,
                source: csv::Error::from(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "unterminated quoted field",
                )),
            });
        }

        let parsed = Table::parse(&buffer.text).map_err(|source| AssembleError::Parse {
            batch,
            first_row,
            source,
        })?;

        debug!(
            "Parsed batch {} with {} rows (total {})",
            batch,
            parsed.len(),
            stats.rows_received
        );

        table.extend(parsed);
        stats.batches_parsed = batch;
        Ok(())
    }
}
