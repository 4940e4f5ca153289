//! Run settings: built-in defaults, an optional settings file, then
//! `ERA5__`-prefixed environment variables, each layer overriding the last.

use crate::error::{ProcessingError, Result};
use crate::models::GridSpec;
use crate::utils::constants::{
    DEFAULT_OUTPUT_FILE, DEFAULT_READINGS_DIR, DEFAULT_READINGS_PATTERN, DEFAULT_REGIONS_FILE,
    DEFAULT_REGION_ID_FIELD, DEFAULT_YEARS, ENV_PREFIX, ENV_SEPARATOR, YEAR_PLACEHOLDER,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Denominator used when turning intersection areas into weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightNormalization {
    /// Divide by the full polygon area of the region. Under-covered regions
    /// are biased toward zero.
    #[default]
    RegionArea,
    /// Divide by the summed weight of the cells that matched on that day.
    Coverage,
}

impl WeightNormalization {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "region_area" | "area" => Some(WeightNormalization::RegionArea),
            "coverage" => Some(WeightNormalization::Coverage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeightNormalization::RegionArea => "region_area",
            WeightNormalization::Coverage => "coverage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// GeoJSON feature collection of region polygons
    pub regions: PathBuf,
    /// Directory holding one reading table per year
    pub readings_dir: PathBuf,
    /// File name of a year table, `{year}` is substituted
    pub readings_pattern: String,
    /// Summary CSV to create
    pub output: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            regions: PathBuf::from(DEFAULT_REGIONS_FILE),
            readings_dir: PathBuf::from(DEFAULT_READINGS_DIR),
            readings_pattern: DEFAULT_READINGS_PATTERN.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub grid: GridSpec,

    pub paths: PathSettings,

    #[validate(length(min = 1))]
    pub years: Vec<i32>,

    #[validate(length(min = 1))]
    pub region_id_field: String,

    pub normalization: WeightNormalization,

    #[validate(range(min = 1))]
    pub max_workers: usize,

    pub use_mmap: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grid: GridSpec::default(),
            paths: PathSettings::default(),
            years: DEFAULT_YEARS.to_vec(),
            region_id_field: DEFAULT_REGION_ID_FIELD.to_string(),
            normalization: WeightNormalization::default(),
            max_workers: num_cpus::get(),
            use_mmap: false,
        }
    }
}

impl Settings {
    /// Load settings, layering `path` (TOML, JSON or YAML) and the
    /// environment over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Settings::default())?);

        if let Some(path) = path {
            if !path.exists() {
                return Err(ProcessingError::malformed(path, "settings file not found"));
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("years"),
            )
            .build()?
            .try_deserialize()?;

        settings.check()?;
        Ok(settings)
    }

    /// Range and cross-field checks.
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        self.grid.check()?;

        if !self.paths.readings_pattern.contains(YEAR_PLACEHOLDER) {
            return Err(ProcessingError::Config(format!(
                "paths.readings_pattern '{}' must contain {}",
                self.paths.readings_pattern, YEAR_PLACEHOLDER
            )));
        }

        Ok(())
    }
}
