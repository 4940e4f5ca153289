pub mod reading_reader;
pub mod region_reader;

pub use reading_reader::{ReadingReader, YearTable};
pub use region_reader::RegionReader;
