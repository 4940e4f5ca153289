pub mod aggregator;
pub mod parallel_processor;
pub mod reading_store;
pub mod weight_index;

pub use aggregator::{DayAccumulator, RegionDayAggregator, RunningStat, RunningTotal};
pub use parallel_processor::{
    ParallelProcessor, RunStatistics, ValidationReport, YearCheck, YearStatistics,
};
pub use reading_store::{DailyReadingStore, ReadingLookup};
pub use weight_index::RegionWeightIndex;
