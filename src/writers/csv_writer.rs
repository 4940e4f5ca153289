use crate::error::{ProcessingError, Result};
use crate::models::{RegionWeights, SummaryRecord};
use crate::utils::constants::{SUMMARY_COLUMNS, WEIGHT_COLUMNS};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(File::create(path)?)
}

/// Append-only sink for summary rows. The header is written on creation and
/// every appended row is flushed before `append` returns.
pub struct SummaryWriter<W: Write> {
    writer: csv::Writer<W>,
    rows_written: usize,
}

impl SummaryWriter<File> {
    /// Create (or truncate) the summary file at `path`
    pub fn create(path: &Path) -> Result<Self> {
        Self::new(create_file(path)?)
    }
}

impl<W: Write> SummaryWriter<W> {
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(SUMMARY_COLUMNS)?;
        writer.flush()?;

        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    pub fn append(&mut self, record: &SummaryRecord) -> Result<()> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| ProcessingError::Io(e.into_error()))
    }
}

#[derive(Serialize)]
struct WeightRow<'a> {
    region_id: &'a str,
    latitude: f64,
    longitude: f64,
    intersection_area: f64,
    region_area: f64,
    weight: f64,
}

/// Writes a weight index as one row per (region, cell) pair.
pub struct WeightWriter;

impl WeightWriter {
    pub fn write_path<'a>(
        path: &Path,
        entries: impl IntoIterator<Item = &'a RegionWeights>,
    ) -> Result<usize> {
        Self::write(create_file(path)?, entries)
    }

    pub fn write<'a, W: Write>(
        inner: W,
        entries: impl IntoIterator<Item = &'a RegionWeights>,
    ) -> Result<usize> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(WEIGHT_COLUMNS)?;

        let mut rows = 0;
        for weights in entries {
            for cell in &weights.cells {
                writer.serialize(WeightRow {
                    region_id: &weights.region_id,
                    latitude: cell.lat(),
                    longitude: cell.lon(),
                    intersection_area: cell.area,
                    region_area: weights.region_area,
                    weight: weights.weight(cell),
                })?;
                rows += 1;
            }
        }

        writer.flush()?;
        Ok(rows)
    }
}
