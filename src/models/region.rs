use geo::{Area, BoundingRect, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

use crate::models::GridCell;

/// Administrative polygon that grid data is aggregated onto.
#[derive(Debug, Clone)]
pub struct Region {
    pub region_id: String,
    pub geometry: MultiPolygon<f64>,
    /// Planar area in square degrees
    pub region_area: f64,
}

impl Region {
    pub fn new(region_id: String, geometry: MultiPolygon<f64>) -> Self {
        let region_area = geometry.unsigned_area();
        Self {
            region_id,
            geometry,
            region_area,
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.0.is_empty() || self.region_area <= 0.0
    }
}

/// Overlap of one grid cell with one region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellWeight {
    pub cell: GridCell,
    /// Intersection area in square degrees, always > 0
    pub area: f64,
}

impl CellWeight {
    pub fn new(cell: GridCell, area: f64) -> Self {
        Self { cell, area }
    }

    pub fn lat(&self) -> f64 {
        self.cell.lat
    }

    pub fn lon(&self) -> f64 {
        self.cell.lon
    }
}

/// Immutable list of intersecting cells for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionWeights {
    pub region_id: String,
    pub region_area: f64,
    pub cells: Vec<CellWeight>,
}

impl RegionWeights {
    pub fn new(region_id: String, region_area: f64, cells: Vec<CellWeight>) -> Self {
        Self {
            region_id,
            region_area,
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Sum of intersection areas. Less than `region_area` when the grid
    /// does not cover the whole polygon.
    pub fn covered_area(&self) -> f64 {
        self.cells.iter().map(|c| c.area).sum()
    }

    /// Fraction of the region's area covered by the grid.
    pub fn coverage_ratio(&self) -> f64 {
        if self.region_area > 0.0 {
            self.covered_area() / self.region_area
        } else {
            0.0
        }
    }

    /// Weight of a cell relative to the region's full area.
    pub fn weight(&self, cell: &CellWeight) -> f64 {
        cell.area / self.region_area
    }
}
