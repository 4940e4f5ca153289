/// Offset between Kelvin and degrees Celsius
pub const KELVIN_OFFSET: f64 = 273.15;

/// Grid defaults (ERA5-Land 0.1° grid over Malawi)
pub const DEFAULT_GRID_RESOLUTION: f64 = 0.1;
pub const DEFAULT_CELL_HALF_WIDTH: f64 = 0.05;
pub const DEFAULT_MATCH_TOLERANCE: f64 = 0.01;
/// Overlaps smaller than this fraction of a full cell are treated as touching
pub const MIN_OVERLAP_FRACTION: f64 = 1e-9;
pub const DEFAULT_LAT_MIN: f64 = -18.1;
pub const DEFAULT_LAT_MAX: f64 = -9.0;
pub const DEFAULT_LON_MIN: f64 = 31.9;
pub const DEFAULT_LON_MAX: f64 = 36.0;

/// Run defaults
pub const DEFAULT_YEARS: [i32; 6] = [2020, 2021, 2022, 2023, 2024, 2025];
pub const DEFAULT_REGION_ID_FIELD: &str = "ADM3_PCODE";
pub const YEAR_PLACEHOLDER: &str = "{year}";

/// File names
pub const DEFAULT_REGIONS_FILE: &str = "data/shapefiles/mwi_adm3.geojson";
pub const DEFAULT_READINGS_DIR: &str = "data/era5_export";
pub const DEFAULT_READINGS_PATTERN: &str = "multivariable_export_{year}.csv";
pub const DEFAULT_OUTPUT_FILE: &str = "data/adm3_summary/adm3_multivariable.csv";

/// Environment variable prefix for settings overrides (e.g. ERA5__GRID__TOLERANCE)
pub const ENV_PREFIX: &str = "ERA5";
pub const ENV_SEPARATOR: &str = "__";

/// Processing defaults
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB

/// Reading table columns
pub const COL_LATITUDE: &str = "latitude";
pub const COL_LONGITUDE: &str = "longitude";
pub const COL_VALID_TIME: &str = "valid_time";
pub const COL_T2M: &str = "t2m";
pub const COL_D2M: &str = "d2m";
pub const COL_U10: &str = "u10";
pub const COL_V10: &str = "v10";
pub const COL_SWVL1: &str = "swvl1";
pub const COL_TP: &str = "tp";
pub const COL_EVAVT: &str = "evavt";

pub const REQUIRED_READING_COLUMNS: [&str; 10] = [
    COL_LATITUDE,
    COL_LONGITUDE,
    COL_VALID_TIME,
    COL_T2M,
    COL_D2M,
    COL_U10,
    COL_V10,
    COL_SWVL1,
    COL_TP,
    COL_EVAVT,
];

/// Output table columns, in file order
pub const SUMMARY_COLUMNS: [&str; 16] = [
    "adm3 id",
    "date",
    "high_temperature",
    "low_temperature",
    "average_temperature",
    "high_dewpoint_temperature",
    "low_dewpoint_temperature",
    "average_dewpoint_temperature",
    "max_windspeed",
    "min_windspeed",
    "average_windspeed",
    "max_soil_water",
    "min_soil_water",
    "average_soil_water",
    "total_precipitation",
    "total_evaporation_transpiration",
];

/// Weight index inspection columns
pub const WEIGHT_COLUMNS: [&str; 6] = [
    "region_id",
    "latitude",
    "longitude",
    "intersection_area",
    "region_area",
    "weight",
];
