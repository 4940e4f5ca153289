pub mod constants;
pub mod dates;
pub mod filename;
pub mod progress;

pub use constants::*;
pub use dates::{date_range, days_of_year};
pub use filename::{default_weights_filename, year_table_path};
pub use progress::ProgressReporter;
