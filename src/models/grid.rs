use geo::{coord, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ProcessingError, Result};
use crate::utils::constants::{
    DEFAULT_CELL_HALF_WIDTH, DEFAULT_GRID_RESOLUTION, DEFAULT_LAT_MAX, DEFAULT_LAT_MIN,
    DEFAULT_LON_MAX, DEFAULT_LON_MIN, DEFAULT_MATCH_TOLERANCE,
};

/// Geometry of the regular lat/lon reanalysis grid.
///
/// Bounds are cell centers and are inclusive. Centers are produced from
/// integer indices divided by `steps_per_degree`, never by repeated addition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GridSpec {
    #[validate(range(exclusive_min = 0.0, max = 10.0))]
    pub resolution: f64,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat_min: f64,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat_max: f64,

    #[validate(range(min = -180.0, max = 360.0))]
    pub lon_min: f64,

    #[validate(range(min = -180.0, max = 360.0))]
    pub lon_max: f64,

    #[validate(range(exclusive_min = 0.0, max = 5.0))]
    pub half_width: f64,

    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub tolerance: f64,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_GRID_RESOLUTION,
            lat_min: DEFAULT_LAT_MIN,
            lat_max: DEFAULT_LAT_MAX,
            lon_min: DEFAULT_LON_MIN,
            lon_max: DEFAULT_LON_MAX,
            half_width: DEFAULT_CELL_HALF_WIDTH,
            tolerance: DEFAULT_MATCH_TOLERANCE,
        }
    }
}

impl GridSpec {
    /// Range and cross-field checks.
    pub fn check(&self) -> Result<()> {
        self.validate()?;

        if self.lat_min > self.lat_max {
            return Err(ProcessingError::Config(format!(
                "grid.lat_min ({}) is greater than grid.lat_max ({})",
                self.lat_min, self.lat_max
            )));
        }

        if self.lon_min > self.lon_max {
            return Err(ProcessingError::Config(format!(
                "grid.lon_min ({}) is greater than grid.lon_max ({})",
                self.lon_min, self.lon_max
            )));
        }

        let steps = 1.0 / self.resolution;
        if (steps - steps.round()).abs() > 1e-9 {
            return Err(ProcessingError::Config(format!(
                "grid.resolution ({}) must divide one degree evenly",
                self.resolution
            )));
        }

        Ok(())
    }

    pub fn steps_per_degree(&self) -> f64 {
        (1.0 / self.resolution).round()
    }

    /// Grid index of the center nearest to `coordinate`.
    pub fn index_of(&self, coordinate: f64) -> i64 {
        (coordinate * self.steps_per_degree()).round() as i64
    }

    pub fn coordinate_of(&self, index: i64) -> f64 {
        index as f64 / self.steps_per_degree()
    }

    pub fn lat_indices(&self) -> std::ops::RangeInclusive<i64> {
        self.index_of(self.lat_min)..=self.index_of(self.lat_max)
    }

    pub fn lon_indices(&self) -> std::ops::RangeInclusive<i64> {
        self.index_of(self.lon_min)..=self.index_of(self.lon_max)
    }

    pub fn cell_count(&self) -> usize {
        let lats = self.lat_indices().count();
        let lons = self.lon_indices().count();
        lats * lons
    }

    /// All cell centers, latitude-major.
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        self.lat_indices().flat_map(move |lat_index| {
            self.lon_indices()
                .map(move |lon_index| GridCell::from_indices(self, lat_index, lon_index))
        })
    }

    /// Lower and upper edge of the cell around `center`.
    ///
    /// When the half width is a whole number of half steps the edges are
    /// `(2 * index ± width_steps) / (2 * steps_per_degree)`, so neighbouring
    /// cells share bit-identical edges with each other and with polygon
    /// vertices placed on the same decimal.
    fn cell_edges(&self, center: f64) -> (f64, f64) {
        let steps = self.steps_per_degree();
        let width_steps = 2.0 * self.half_width * steps;

        if (width_steps - width_steps.round()).abs() < 1e-9 {
            let doubled = 2 * self.index_of(center);
            let width_steps = width_steps.round() as i64;
            let denominator = 2.0 * steps;
            (
                (doubled - width_steps) as f64 / denominator,
                (doubled + width_steps) as f64 / denominator,
            )
        } else {
            (center - self.half_width, center + self.half_width)
        }
    }

    /// Axis-aligned square of `cell` (x = lon, y = lat).
    pub fn cell_square(&self, cell: &GridCell) -> Rect<f64> {
        let (min_lon, max_lon) = self.cell_edges(cell.lon);
        let (min_lat, max_lat) = self.cell_edges(cell.lat);
        Rect::new(
            coord! { x: min_lon, y: min_lat },
            coord! { x: max_lon, y: max_lat },
        )
    }

    pub fn cell_geometry(&self, cell: &GridCell) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![self.cell_square(cell).to_polygon()])
    }

    /// Area of one full cell square
    pub fn cell_area(&self) -> f64 {
        let width = 2.0 * self.half_width;
        width * width
    }
}

/// Center of one square grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub lat: f64,
    pub lon: f64,
}

impl GridCell {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn from_indices(grid: &GridSpec, lat_index: i64, lon_index: i64) -> Self {
        Self {
            lat: grid.coordinate_of(lat_index),
            lon: grid.coordinate_of(lon_index),
        }
    }

}
