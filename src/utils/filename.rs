use crate::utils::constants::YEAR_PLACEHOLDER;
use std::path::{Path, PathBuf};

/// Path of the reading table for `year`, e.g.
/// `data/era5_export/multivariable_export_2021.csv`
pub fn year_table_path(dir: &Path, pattern: &str, year: i32) -> PathBuf {
    dir.join(pattern.replace(YEAR_PLACEHOLDER, &year.to_string()))
}

/// Default inspection file written next to the summary: `{stem}_weights.csv`
pub fn default_weights_filename(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "regions".to_string());

    output.with_file_name(format!("{}_weights.csv", stem))
}
