use crate::error::{ProcessingError, Result};
use crate::models::{RawReading, Reading};
use crate::utils::constants::{DEFAULT_BUFFER_SIZE, REQUIRED_READING_COLUMNS};
use chrono::Datelike;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Readings of one calendar year, in file order.
#[derive(Debug, Clone, Default)]
pub struct YearTable {
    pub year: i32,
    pub readings: Vec<Reading>,
    /// Rows dropped because a value was empty, non-finite or unparsable
    pub skipped_rows: usize,
    /// Rows whose timestamp belongs to another year
    pub foreign_rows: usize,
}

impl YearTable {
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

pub struct ReadingReader {
    use_mmap: bool,
}

impl ReadingReader {
    pub fn new() -> Self {
        Self { use_mmap: false }
    }

    pub fn with_mmap(use_mmap: bool) -> Self {
        Self { use_mmap }
    }

    /// Read the reading table for `year`. A missing file or a missing
    /// required column is fatal; bad rows are skipped.
    pub fn read_year(&self, path: &Path, year: i32) -> Result<YearTable> {
        if !path.is_file() {
            return Err(ProcessingError::malformed(
                path,
                format!("reading table for {} not found", year),
            ));
        }

        let file = File::open(path)?;
        let table = if self.use_mmap {
            let mmap = unsafe { Mmap::map(&file)? };
            self.read_from(&mmap[..], path, year)?
        } else {
            let reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file);
            self.read_from(reader, path, year)?
        };

        if table.skipped_rows > 0 {
            warn!(
                year,
                skipped = table.skipped_rows,
                "Skipped malformed reading rows"
            );
        }
        if table.is_empty() {
            warn!(year, path = %path.display(), "Reading table has no usable rows");
        }

        info!(
            year,
            rows = table.len(),
            skipped = table.skipped_rows,
            foreign = table.foreign_rows,
            "Loaded reading table"
        );
        Ok(table)
    }

    /// Check that the table exists and carries every required column,
    /// without reading the data rows.
    pub fn check_header(&self, path: &Path) -> Result<Vec<String>> {
        if !path.is_file() {
            return Err(ProcessingError::malformed(path, "reading table not found"));
        }

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        check_required_columns(&headers, path)?;

        Ok(headers.iter().map(String::from).collect())
    }

    fn read_from<R: Read>(&self, source: R, path: &Path, year: i32) -> Result<YearTable> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);

        let headers = reader.headers()?.clone();
        check_required_columns(&headers, path)?;

        let mut table = YearTable {
            year,
            ..Default::default()
        };

        for (row, result) in reader.deserialize::<RawReading>().enumerate() {
            let raw = match result {
                Ok(raw) => raw,
                Err(e) => match e.kind() {
                    csv::ErrorKind::Deserialize { .. }
                    | csv::ErrorKind::UnequalLengths { .. }
                    | csv::ErrorKind::Utf8 { .. } => {
                        debug!(row = row + 1, error = %e, "Skipping reading row");
                        table.skipped_rows += 1;
                        continue;
                    }
                    _ => return Err(e.into()),
                },
            };

            match Reading::try_from(raw) {
                Ok(reading) if reading.valid_time.year() == year => table.readings.push(reading),
                Ok(_) => table.foreign_rows += 1,
                Err(e) => {
                    debug!(row = row + 1, error = %e, "Skipping reading row");
                    table.skipped_rows += 1;
                }
            }
        }

        Ok(table)
    }
}

impl Default for ReadingReader {
    fn default() -> Self {
        Self::new()
    }
}

fn check_required_columns(headers: &csv::StringRecord, path: &Path) -> Result<()> {
    let missing: Vec<&str> = REQUIRED_READING_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h.trim() == *column))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ProcessingError::malformed(
            path,
            format!("missing required columns: {}", missing.join(", ")),
        ))
    }
}
