use crate::models::{CellWeight, GridSpec, Region, RegionWeights};
use crate::utils::constants::MIN_OVERLAP_FRACTION;
use crate::utils::progress::ProgressReporter;
use geo::{Area, BooleanOps, Rect};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Per-region lists of intersecting grid cells and their overlap areas.
///
/// Regions without any positive-area overlap are not part of the index.
#[derive(Debug, Clone)]
pub struct RegionWeightIndex {
    entries: Vec<RegionWeights>,
    positions: HashMap<String, usize>,
    dropped: Vec<String>,
}

impl RegionWeightIndex {
    /// Build the index on the current rayon pool
    pub fn build(regions: &[Region], grid: &GridSpec) -> Self {
        Self::build_with_progress(regions, grid, None)
    }

    /// Build the index on the current rayon pool, ticking `progress` once
    /// per finished region
    pub fn build_with_progress(
        regions: &[Region],
        grid: &GridSpec,
        progress: Option<&ProgressReporter>,
    ) -> Self {
        let processed = AtomicUsize::new(0);

        let results: Vec<RegionWeights> = regions
            .par_iter()
            .map(|region| {
                let weights = Self::region_weights(region, grid);

                let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(p) = progress {
                    p.update(count as u64);
                }

                weights
            })
            .collect();

        Self::from_results(results)
    }

    /// Intersect one region with every cell of the grid. A region without
    /// area gets no cells.
    pub fn region_weights(region: &Region, grid: &GridSpec) -> RegionWeights {
        let mut cells = Vec::new();
        let min_area = grid.cell_area() * MIN_OVERLAP_FRACTION;

        let bounds = region.bounding_rect().filter(|_| !region.is_empty());
        if let Some(bounds) = bounds {
            for cell in grid.cells() {
                let square = grid.cell_square(&cell);
                if !overlaps(&square, &bounds) {
                    continue;
                }

                let area = region
                    .geometry
                    .intersection(&grid.cell_geometry(&cell))
                    .unsigned_area();

                if area > min_area {
                    cells.push(CellWeight::new(cell, area));
                }
            }
        }

        debug!(
            region_id = %region.region_id,
            cells = cells.len(),
            "Computed region weights"
        );
        RegionWeights::new(region.region_id.clone(), region.region_area, cells)
    }

    fn from_results(results: Vec<RegionWeights>) -> Self {
        let mut entries = Vec::with_capacity(results.len());
        let mut dropped = Vec::new();

        for weights in results {
            if weights.is_empty() {
                dropped.push(weights.region_id);
            } else {
                entries.push(weights);
            }
        }

        let positions = entries
            .iter()
            .enumerate()
            .map(|(i, w)| (w.region_id.clone(), i))
            .collect();

        info!(
            regions = entries.len(),
            dropped = dropped.len(),
            cells = entries.iter().map(RegionWeights::len).sum::<usize>(),
            "Built region weight index"
        );

        Self {
            entries,
            positions,
            dropped,
        }
    }

    pub fn get(&self, region_id: &str) -> Option<&RegionWeights> {
        self.positions.get(region_id).map(|&i| &self.entries[i])
    }

    /// Indexed regions, in input order
    pub fn entries(&self) -> &[RegionWeights] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionWeights> {
        self.entries.iter()
    }

    /// Ids of regions excluded for having no intersecting cell
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_cells(&self) -> usize {
        self.entries.iter().map(RegionWeights::len).sum()
    }
}

/// True when the two rectangles share interior area.
fn overlaps(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x < b.max().x && b.min().x < a.max().x && a.min().y < b.max().y && b.min().y < a.max().y
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};
    use std::collections::HashSet;

    fn rect_region(id: &str, min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Region {
        let poly = polygon![
            (x: min_lon, y: min_lat),
            (x: max_lon, y: min_lat),
            (x: max_lon, y: max_lat),
            (x: min_lon, y: max_lat),
        ];
        Region::new(id.to_string(), MultiPolygon::new(vec![poly]))
    }

    #[test]
    fn test_single_cell_region() {
        let grid = GridSpec::default();
        let region = rect_region("MW10101", 33.96, -10.04, 34.04, -9.96);

        let weights = RegionWeightIndex::region_weights(&region, &grid);

        assert_eq!(weights.len(), 1);
        assert_eq!(weights.cells[0].lat(), -10.0);
        assert_eq!(weights.cells[0].lon(), 34.0);
        assert!((weights.cells[0].area - 0.0064).abs() < 1e-12);
        assert!((weights.cells[0].area - weights.region_area).abs() < 1e-12);
    }

    #[test]
    fn test_partial_overlaps() {
        let grid = GridSpec::default();
        let region = rect_region("MW10102", 33.97, -10.03, 34.07, -9.98);

        let weights = RegionWeightIndex::region_weights(&region, &grid);

        assert_eq!(weights.len(), 2);
        assert_eq!((weights.cells[0].lat(), weights.cells[0].lon()), (-10.0, 34.0));
        assert_eq!((weights.cells[1].lat(), weights.cells[1].lon()), (-10.0, 34.1));
        assert!((weights.cells[0].area - 0.004).abs() < 1e-12);
        assert!((weights.cells[1].area - 0.001).abs() < 1e-12);
        assert!((weights.covered_area() - region.region_area).abs() < 1e-12);
    }

    #[test]
    fn test_areas_positive_and_cells_unique() {
        let grid = GridSpec::default();
        let regions = vec![
            rect_region("A", 33.0, -12.0, 33.43, -11.61),
            rect_region("B", 34.52, -15.27, 35.01, -14.9),
        ];

        let index = RegionWeightIndex::build(&regions, &grid);
        assert_eq!(index.len(), 2);

        for weights in index.iter() {
            let mut seen = HashSet::new();
            for cell in &weights.cells {
                assert!(cell.area > 0.0);
                assert!(seen.insert((cell.lat().to_bits(), cell.lon().to_bits())));
            }
            assert!((weights.coverage_ratio() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_touching_cells_contribute_nothing() {
        let grid = GridSpec::default();
        // Every edge lies on a cell boundary of the 0.1 degree grid
        let region = rect_region("EXACT", 33.95, -10.05, 34.15, -9.85);

        let weights = RegionWeightIndex::region_weights(&region, &grid);

        let mut cells: Vec<(f64, f64)> =
            weights.cells.iter().map(|c| (c.lat(), c.lon())).collect();
        cells.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(
            cells,
            vec![(-10.0, 34.0), (-10.0, 34.1), (-9.9, 34.0), (-9.9, 34.1)]
        );
        for cell in &weights.cells {
            assert!((cell.area - 0.01).abs() < 1e-12);
        }
    }

    #[test]
    fn test_touching_cells_do_not_skew_extremes() {
        use crate::models::reading::parse_valid_time;
        use crate::models::Reading;
        use crate::processors::{DailyReadingStore, RegionDayAggregator};

        let grid = GridSpec::default();
        let region = rect_region("EXACT", 33.95, -10.05, 34.15, -9.85);
        let index = RegionWeightIndex::build(&[region], &grid);

        let reading = |lat: f64, lon: f64, t2m: f64| Reading {
            latitude: lat,
            longitude: lon,
            valid_time: parse_valid_time("2021-01-01 00:00:00").unwrap(),
            t2m,
            d2m: 290.0,
            u10: 1.0,
            v10: 1.0,
            swvl1: 0.3,
            tp: 0.0,
            evavt: 0.0,
        };
        let store = DailyReadingStore::from_readings(
            &grid,
            vec![
                reading(-10.0, 34.0, 300.0),
                reading(-10.0, 34.1, 300.0),
                reading(-9.9, 34.0, 300.0),
                reading(-9.9, 34.1, 300.0),
                // Neighbour sharing the eastern edge
                reading(-10.0, 34.2, 250.0),
                reading(-9.8, 34.0, 250.0),
            ],
        );

        let day = chrono::NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let record = RegionDayAggregator::new()
            .aggregate(&index.entries()[0], day, &store)
            .unwrap();

        assert!((record.low_temperature - 26.85).abs() < 1e-9);
        assert!((record.high_temperature - 26.85).abs() < 1e-9);
        assert!((record.average_temperature - 26.85).abs() < 1e-9);
    }

    #[test]
    fn test_zero_area_region_is_dropped() {
        let grid = GridSpec::default();
        // Self-cancelling bowtie ring
        let bowtie = polygon![
            (x: 33.9, y: -10.1),
            (x: 34.3, y: -9.9),
            (x: 34.3, y: -10.1),
            (x: 33.9, y: -9.9),
        ];
        let mut region = Region::new("BOWTIE".to_string(), MultiPolygon::new(vec![bowtie]));
        region.region_area = 0.0;

        let weights = RegionWeightIndex::region_weights(&region, &grid);
        assert!(weights.is_empty());

        let index = RegionWeightIndex::build(&[region], &grid);
        assert!(index.is_empty());
        assert_eq!(index.dropped(), &["BOWTIE".to_string()]);
    }

    #[test]
    fn test_regions_outside_grid_are_dropped() {
        let grid = GridSpec::default();
        let regions = vec![
            rect_region("INSIDE", 33.96, -10.04, 34.04, -9.96),
            rect_region("OUTSIDE", 10.0, 40.0, 10.5, 40.5),
            Region::new("EMPTY".to_string(), MultiPolygon::new(vec![])),
        ];

        let index = RegionWeightIndex::build_with_progress(&regions, &grid, None);

        assert_eq!(index.len(), 1);
        assert!(index.get("INSIDE").is_some());
        assert!(index.get("OUTSIDE").is_none());
        assert_eq!(index.dropped(), &["OUTSIDE".to_string(), "EMPTY".to_string()]);
        assert_eq!(index.total_cells(), 1);
    }

    #[test]
    fn test_region_straddling_grid_edge_is_under_covered() {
        let grid = GridSpec::default();
        // Grid's eastern edge is at 36.05
        let region = rect_region("EDGE", 35.96, -10.04, 36.14, -9.96);

        let weights = RegionWeightIndex::region_weights(&region, &grid);

        assert_eq!(weights.len(), 1);
        assert!(weights.coverage_ratio() < 1.0);
        assert!((weights.covered_area() - 0.09 * 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_build_is_deterministic() {
        let grid = GridSpec::default();
        let regions = vec![
            rect_region("A", 33.0, -12.0, 33.43, -11.61),
            rect_region("B", 34.52, -15.27, 35.01, -14.9),
        ];

        let first = RegionWeightIndex::build(&regions, &grid);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap();
        let second = pool.install(|| RegionWeightIndex::build(&regions, &grid));

        assert_eq!(first.entries(), second.entries());
    }
}
