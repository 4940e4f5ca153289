use crate::config::{Settings, WeightNormalization};
use crate::error::{ProcessingError, Result};
use crate::models::{GridSpec, Region, SummaryRecord};
use crate::processors::{DailyReadingStore, RegionDayAggregator, RegionWeightIndex};
use crate::readers::{ReadingReader, RegionReader};
use crate::utils::dates::days_of_year;
use crate::utils::filename::year_table_path;
use crate::utils::progress::ProgressReporter;
use crate::writers::SummaryWriter;
use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearStatistics {
    pub year: i32,
    pub readings: usize,
    pub skipped_rows: usize,
    pub days: usize,
    pub rows_written: usize,
    /// Region-days where no cell had a matching reading
    pub empty_region_days: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatistics {
    pub regions_total: usize,
    pub regions_indexed: usize,
    pub regions_dropped: usize,
    pub indexed_cells: usize,
    pub years: Vec<YearStatistics>,
}

impl RunStatistics {
    pub fn rows_written(&self) -> usize {
        self.years.iter().map(|y| y.rows_written).sum()
    }

    pub fn empty_region_days(&self) -> usize {
        self.years.iter().map(|y| y.empty_region_days).sum()
    }

    pub fn skipped_rows(&self) -> usize {
        self.years.iter().map(|y| y.skipped_rows).sum()
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Run Summary:\n  Regions: {} ({} indexed, {} without grid overlap)\n  Indexed cells: {}\n",
            self.regions_total, self.regions_indexed, self.regions_dropped, self.indexed_cells
        );

        for year in &self.years {
            summary.push_str(&format!(
                "  {}: {} readings ({} skipped), {} days, {} rows, {} region-days without data\n",
                year.year,
                year.readings,
                year.skipped_rows,
                year.days,
                year.rows_written,
                year.empty_region_days
            ));
        }

        summary.push_str(&format!("  Total rows written: {}", self.rows_written()));
        summary
    }
}

/// What `validate` found for one year table.
#[derive(Debug, Clone, PartialEq)]
pub struct YearCheck {
    pub year: i32,
    pub path: PathBuf,
    pub problem: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub regions_total: usize,
    pub regions_indexed: usize,
    pub dropped_regions: Vec<String>,
    pub years: Vec<YearCheck>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.regions_indexed > 0 && self.years.iter().all(|y| y.problem.is_none())
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Validation Summary:\n  Regions: {} ({} overlap the grid)\n",
            self.regions_total, self.regions_indexed
        );

        if !self.dropped_regions.is_empty() {
            summary.push_str(&format!(
                "  Excluded regions: {}\n",
                self.dropped_regions.join(", ")
            ));
        }

        for check in &self.years {
            match &check.problem {
                None => summary.push_str(&format!("  {}: ok ({})\n", check.year, check.path.display())),
                Some(problem) => summary.push_str(&format!("  {}: {}\n", check.year, problem)),
            }
        }

        summary.trim_end().to_string()
    }
}

/// Drives a run: weight index once, then every day of every year with the
/// regions of a day aggregated in parallel and written in index order.
#[derive(Debug, Clone)]
pub struct ParallelProcessor {
    max_workers: usize,
    normalization: WeightNormalization,
    use_mmap: bool,
    silent: bool,
}

impl ParallelProcessor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            normalization: WeightNormalization::default(),
            use_mmap: false,
            silent: true,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.max_workers)
            .with_normalization(settings.normalization)
            .with_mmap(settings.use_mmap)
    }

    pub fn with_normalization(mut self, normalization: WeightNormalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.silent = !show_progress;
        self
    }

    fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))
    }

    /// Load regions and build the weight index.
    pub fn build_index(&self, settings: &Settings) -> Result<(usize, RegionWeightIndex)> {
        let regions = RegionReader::with_id_field(&settings.region_id_field)
            .read_regions(&settings.paths.regions)?;
        let pool = self.thread_pool()?;
        let index = self.index_regions(&pool, &regions, &settings.grid);
        Ok((regions.len(), index))
    }

    fn index_regions(
        &self,
        pool: &rayon::ThreadPool,
        regions: &[Region],
        grid: &GridSpec,
    ) -> RegionWeightIndex {
        let progress = ProgressReporter::new(
            regions.len() as u64,
            "Computing grid cell weights...",
            self.silent,
        );
        let index =
            pool.install(|| RegionWeightIndex::build_with_progress(regions, grid, Some(&progress)));
        progress.finish_with_message(&format!("Indexed {} regions", index.len()));
        index
    }

    /// Summarize every configured year into the output file.
    pub async fn run(&self, settings: &Settings) -> Result<RunStatistics> {
        let processor = self.clone();
        let settings = settings.clone();
        tokio::task::spawn_blocking(move || processor.run_blocking(&settings)).await?
    }

    /// Synchronous body of [`run`](Self::run).
    pub fn run_blocking(&self, settings: &Settings) -> Result<RunStatistics> {
        let pool = self.thread_pool()?;

        let regions = RegionReader::with_id_field(&settings.region_id_field)
            .read_regions(&settings.paths.regions)?;
        let index = self.index_regions(&pool, &regions, &settings.grid);
        drop(regions);

        let mut stats = RunStatistics {
            regions_total: index.len() + index.dropped().len(),
            regions_indexed: index.len(),
            regions_dropped: index.dropped().len(),
            indexed_cells: index.total_cells(),
            years: Vec::with_capacity(settings.years.len()),
        };

        let mut writer = SummaryWriter::create(&settings.paths.output)?;
        info!(output = %settings.paths.output.display(), "Writing summaries");

        let reader = ReadingReader::with_mmap(self.use_mmap);
        for &year in &settings.years {
            let path = year_table_path(
                &settings.paths.readings_dir,
                &settings.paths.readings_pattern,
                year,
            );
            info!(year, path = %path.display(), "Importing reading table");

            let table = reader.read_year(&path, year)?;
            let mut year_stats = YearStatistics {
                year,
                readings: table.len(),
                skipped_rows: table.skipped_rows,
                ..Default::default()
            };

            let store = DailyReadingStore::from_table(&settings.grid, table);
            self.process_year(&pool, &index, &store, year, &mut writer, &mut year_stats)?;

            info!(
                year,
                rows = year_stats.rows_written,
                empty = year_stats.empty_region_days,
                "Finished year"
            );
            stats.years.push(year_stats);
        }

        Ok(stats)
    }

    fn process_year<W: Write>(
        &self,
        pool: &rayon::ThreadPool,
        index: &RegionWeightIndex,
        store: &DailyReadingStore,
        year: i32,
        writer: &mut SummaryWriter<W>,
        stats: &mut YearStatistics,
    ) -> Result<()> {
        let days = days_of_year(year)?;
        let progress = ProgressReporter::new(
            days.len() as u64,
            &format!("Aggregating {}...", year),
            self.silent,
        );

        for (i, &day) in days.iter().enumerate() {
            if day.day() == 1 {
                info!("working on {}...", day);
            }

            let records = pool.install(|| self.summarize_day(index, store, day));
            stats.empty_region_days += index.len() - records.len();

            for record in &records {
                writer.append(record)?;
            }
            stats.rows_written += records.len();
            stats.days += 1;

            debug!(%day, rows = records.len(), "Aggregated day");
            progress.update(i as u64 + 1);
        }

        progress.finish_with_message(&format!("Aggregated {}", year));
        Ok(())
    }

    /// Records of every indexed region with data on `day`, in index order.
    pub fn summarize_day(
        &self,
        index: &RegionWeightIndex,
        store: &DailyReadingStore,
        day: NaiveDate,
    ) -> Vec<SummaryRecord> {
        let aggregator = RegionDayAggregator::with_normalization(self.normalization);

        index
            .entries()
            .par_iter()
            .filter_map(|weights| aggregator.aggregate(weights, day, store))
            .collect()
    }

    /// Check regions and the presence and header of every year table
    /// without aggregating anything.
    pub fn validate_inputs(&self, settings: &Settings) -> Result<ValidationReport> {
        let (regions_total, index) = self.build_index(settings)?;
        let reader = ReadingReader::new();

        let years = settings
            .years
            .iter()
            .map(|&year| {
                let path = year_table_path(
                    &settings.paths.readings_dir,
                    &settings.paths.readings_pattern,
                    year,
                );
                let problem = reader.check_header(&path).err().map(|e| e.to_string());
                YearCheck {
                    year,
                    path,
                    problem,
                }
            })
            .collect();

        Ok(ValidationReport {
            regions_total,
            regions_indexed: index.len(),
            dropped_regions: index.dropped().to_vec(),
            years,
        })
    }
}

impl Default for ParallelProcessor {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reading::parse_valid_time;
    use crate::models::Reading;
    use geo::{polygon, MultiPolygon};

    fn rect_region(id: &str, min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Region {
        let poly = polygon![
            (x: min_lon, y: min_lat),
            (x: max_lon, y: min_lat),
            (x: max_lon, y: max_lat),
            (x: min_lon, y: max_lat),
        ];
        Region::new(id.to_string(), MultiPolygon::new(vec![poly]))
    }

    fn reading(time: &str, lat: f64, lon: f64, t2m: f64) -> Reading {
        Reading {
            latitude: lat,
            longitude: lon,
            valid_time: parse_valid_time(time).unwrap(),
            t2m,
            d2m: 290.0,
            u10: 3.0,
            v10: 4.0,
            swvl1: 0.3,
            tp: 0.001,
            evavt: 0.0001,
        }
    }

    #[test]
    fn test_summarize_day_keeps_index_order_and_skips_empty_regions() {
        let grid = GridSpec::default();
        let regions = vec![
            rect_region("B", 33.96, -10.04, 34.04, -9.96),
            rect_region("A", 34.96, -12.04, 35.04, -11.96),
            rect_region("C", 33.46, -15.04, 33.54, -14.96),
        ];
        let index = RegionWeightIndex::build(&regions, &grid);
        let store = DailyReadingStore::from_readings(
            &grid,
            vec![
                reading("2021-06-01 00:00:00", -12.0, 35.0, 295.0),
                reading("2021-06-01 00:00:00", -10.0, 34.0, 300.0),
            ],
        );

        let processor = ParallelProcessor::new(2);
        let day = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let pool = processor.thread_pool().unwrap();
        let records = pool.install(|| processor.summarize_day(&index, &store, day));

        let ids: Vec<&str> = records.iter().map(|r| r.region_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
        assert!((records[0].average_temperature - 26.85).abs() < 1e-6);

        let next_day = NaiveDate::from_ymd_opt(2021, 6, 2).unwrap();
        assert!(processor.summarize_day(&index, &store, next_day).is_empty());
    }

    #[test]
    fn test_process_year_counts_rows() {
        let grid = GridSpec::default();
        let regions = vec![rect_region("B", 33.96, -10.04, 34.04, -9.96)];
        let index = RegionWeightIndex::build(&regions, &grid);
        let store = DailyReadingStore::from_readings(
            &grid,
            vec![
                reading("2021-01-01 00:00:00", -10.0, 34.0, 300.0),
                reading("2021-03-15 12:00:00", -10.0, 34.0, 301.0),
            ],
        );

        let processor = ParallelProcessor::new(1);
        let pool = processor.thread_pool().unwrap();
        let mut writer = SummaryWriter::new(Vec::new()).unwrap();
        let mut stats = YearStatistics {
            year: 2021,
            ..Default::default()
        };

        processor
            .process_year(&pool, &index, &store, 2021, &mut writer, &mut stats)
            .unwrap();

        assert_eq!(stats.days, 365);
        assert_eq!(stats.rows_written, 2);
        assert_eq!(stats.empty_region_days, 363);

        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("B,2021-01-01,"));
        assert!(lines[2].starts_with("B,2021-03-15,"));
    }

    #[test]
    fn test_run_statistics_summary() {
        let stats = RunStatistics {
            regions_total: 3,
            regions_indexed: 2,
            regions_dropped: 1,
            indexed_cells: 10,
            years: vec![YearStatistics {
                year: 2021,
                readings: 100,
                skipped_rows: 4,
                days: 365,
                rows_written: 700,
                empty_region_days: 30,
            }],
        };

        let summary = stats.summary();
        assert!(summary.contains("2 indexed, 1 without grid overlap"));
        assert!(summary.contains("2021: 100 readings (4 skipped)"));
        assert!(summary.ends_with("Total rows written: 700"));
    }
}
