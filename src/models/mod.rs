pub mod grid;
pub mod reading;
pub mod region;
pub mod summary;

pub use grid::{GridCell, GridSpec};
pub use reading::{RawReading, Reading};
pub use region::{CellWeight, Region, RegionWeights};
pub use summary::SummaryRecord;
