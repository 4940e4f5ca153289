use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily area-weighted statistics for one region.
///
/// Field order is the output column order. Temperatures are in °C.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    #[serde(rename = "adm3 id")]
    pub region_id: String,
    pub date: NaiveDate,

    pub high_temperature: f64,
    pub low_temperature: f64,
    pub average_temperature: f64,

    pub high_dewpoint_temperature: f64,
    pub low_dewpoint_temperature: f64,
    pub average_dewpoint_temperature: f64,

    pub max_windspeed: f64,
    pub min_windspeed: f64,
    pub average_windspeed: f64,

    pub max_soil_water: f64,
    pub min_soil_water: f64,
    pub average_soil_water: f64,

    pub total_precipitation: f64,
    pub total_evaporation_transpiration: f64,
}
