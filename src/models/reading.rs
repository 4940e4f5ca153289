use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, Result};

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// One row of the per-year reading table as it appears on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReading {
    pub latitude: f64,
    pub longitude: f64,
    pub valid_time: String,
    pub t2m: f64,
    pub d2m: f64,
    pub u10: f64,
    pub v10: f64,
    pub swvl1: f64,
    pub tp: f64,
    pub evavt: f64,
}

/// Hourly grid reading. Temperatures in Kelvin, wind in m/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub latitude: f64,
    pub longitude: f64,
    pub valid_time: NaiveDateTime,
    pub t2m: f64,
    pub d2m: f64,
    pub u10: f64,
    pub v10: f64,
    pub swvl1: f64,
    pub tp: f64,
    pub evavt: f64,
}

impl Reading {
    pub fn date(&self) -> NaiveDate {
        self.valid_time.date()
    }

    /// Magnitude of the 10 m wind vector.
    pub fn wind_speed(&self) -> f64 {
        self.u10.hypot(self.v10)
    }

    fn values(&self) -> [f64; 9] {
        [
            self.latitude,
            self.longitude,
            self.t2m,
            self.d2m,
            self.u10,
            self.v10,
            self.swvl1,
            self.tp,
            self.evavt,
        ]
    }
}

impl TryFrom<RawReading> for Reading {
    type Error = ProcessingError;

    fn try_from(raw: RawReading) -> Result<Self> {
        let reading = Reading {
            latitude: raw.latitude,
            longitude: raw.longitude,
            valid_time: parse_valid_time(&raw.valid_time)?,
            t2m: raw.t2m,
            d2m: raw.d2m,
            u10: raw.u10,
            v10: raw.v10,
            swvl1: raw.swvl1,
            tp: raw.tp,
            evavt: raw.evavt,
        };

        if reading.values().iter().any(|v| !v.is_finite()) {
            return Err(ProcessingError::MissingData(format!(
                "non-finite value in reading at ({}, {}) {}",
                raw.latitude, raw.longitude, raw.valid_time
            )));
        }

        Ok(reading)
    }
}

/// Parse a `valid_time` cell. Date-only values are taken as midnight.
pub fn parse_valid_time(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        .map_err(|_| ProcessingError::InvalidFormat(format!("Invalid valid_time: '{}'", s)))
}
