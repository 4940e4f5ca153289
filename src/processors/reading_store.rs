use crate::models::{GridSpec, Reading};
use crate::readers::YearTable;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Source of the raw readings that fall on one grid cell on one day.
pub trait ReadingLookup {
    /// Readings on `day` whose position lies strictly within the tolerance
    /// window around `(lat, lon)` in both axes, in file order.
    fn readings_near(&self, day: NaiveDate, lat: f64, lon: f64) -> Vec<&Reading>;
}

type CellKey = (i64, i64);

/// Readings of one year bucketed by day and nearest grid index. Each
/// reading keeps its insertion sequence number.
#[derive(Debug, Clone)]
pub struct DailyReadingStore {
    steps_per_degree: f64,
    tolerance: f64,
    days: HashMap<NaiveDate, HashMap<CellKey, Vec<(usize, Reading)>>>,
    len: usize,
}

impl DailyReadingStore {
    pub fn new(grid: &GridSpec) -> Self {
        Self {
            steps_per_degree: grid.steps_per_degree(),
            tolerance: grid.tolerance,
            days: HashMap::new(),
            len: 0,
        }
    }

    pub fn from_readings(grid: &GridSpec, readings: impl IntoIterator<Item = Reading>) -> Self {
        let mut store = Self::new(grid);
        for reading in readings {
            store.insert(reading);
        }
        store
    }

    pub fn from_table(grid: &GridSpec, table: YearTable) -> Self {
        Self::from_readings(grid, table.readings)
    }

    pub fn insert(&mut self, reading: Reading) {
        let key = (self.key_of(reading.latitude), self.key_of(reading.longitude));
        self.days
            .entry(reading.date())
            .or_default()
            .entry(key)
            .or_default()
            .push((self.len, reading));
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn key_of(&self, coordinate: f64) -> i64 {
        (coordinate * self.steps_per_degree).round() as i64
    }

    /// Keys of every bucket that can hold a coordinate inside the window
    fn key_span(&self, center: f64) -> std::ops::RangeInclusive<i64> {
        self.key_of(center - self.tolerance)..=self.key_of(center + self.tolerance)
    }

    fn within(&self, value: f64, center: f64) -> bool {
        value < center + self.tolerance && value > center - self.tolerance
    }
}

impl ReadingLookup for DailyReadingStore {
    fn readings_near(&self, day: NaiveDate, lat: f64, lon: f64) -> Vec<&Reading> {
        let Some(cells) = self.days.get(&day) else {
            return Vec::new();
        };

        let mut matches: Vec<&(usize, Reading)> = Vec::new();
        let mut buckets = 0;
        for lat_key in self.key_span(lat) {
            for lon_key in self.key_span(lon) {
                if let Some(bucket) = cells.get(&(lat_key, lon_key)) {
                    buckets += 1;
                    matches.extend(bucket.iter().filter(|(_, r)| {
                        self.within(r.latitude, lat) && self.within(r.longitude, lon)
                    }));
                }
            }
        }

        if buckets > 1 {
            matches.sort_by_key(|(seq, _)| *seq);
        }
        matches.into_iter().map(|(_, r)| r).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reading::parse_valid_time;

    fn reading(valid_time: &str, lat: f64, lon: f64, t2m: f64) -> Reading {
        Reading {
            latitude: lat,
            longitude: lon,
            valid_time: parse_valid_time(valid_time).unwrap(),
            t2m,
            d2m: 290.0,
            u10: 1.0,
            v10: 1.0,
            swvl1: 0.3,
            tp: 0.0,
            evavt: 0.0,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
    }

    #[test]
    fn test_lookup_by_day_and_cell() {
        let grid = GridSpec::default();
        let store = DailyReadingStore::from_readings(
            &grid,
            vec![
                reading("2021-01-01 00:00:00", -10.0, 34.0, 300.0),
                reading("2021-01-01 03:00:00", -10.0, 34.0, 301.0),
                reading("2021-01-01 00:00:00", -10.1, 34.0, 302.0),
                reading("2021-01-02 00:00:00", -10.0, 34.0, 303.0),
            ],
        );

        assert_eq!(store.len(), 4);

        let matches = store.readings_near(day(1), -10.0, 34.0);
        let temps: Vec<f64> = matches.iter().map(|r| r.t2m).collect();
        assert_eq!(temps, vec![300.0, 301.0]);

        assert_eq!(store.readings_near(day(2), -10.0, 34.0).len(), 1);
        assert!(store.readings_near(day(3), -10.0, 34.0).is_empty());
        assert!(store.readings_near(day(1), -10.2, 34.0).is_empty());
    }

    #[test]
    fn test_tolerance_window_absorbs_float_noise() {
        let grid = GridSpec::default();
        let store = DailyReadingStore::from_readings(
            &grid,
            vec![
                // -10.0 as produced by accumulating 0.1 steps
                reading("2021-01-01", -9.999999999999996, 34.00000000000001, 300.0),
                reading("2021-01-01", -10.005, 33.995, 301.0),
                // Same bucket, outside the window
                reading("2021-01-01", -10.04, 34.0, 302.0),
            ],
        );

        let temps: Vec<f64> = store
            .readings_near(day(1), -10.0, 34.0)
            .iter()
            .map(|r| r.t2m)
            .collect();
        assert_eq!(temps, vec![300.0, 301.0]);
    }

    #[test]
    fn test_wide_tolerance_spans_neighbouring_buckets() {
        let mut grid = GridSpec::default();
        grid.tolerance = 0.06;

        let store = DailyReadingStore::from_readings(
            &grid,
            vec![
                reading("2021-01-01", -10.0, 34.0, 300.0),
                reading("2021-01-01", -10.0, 34.055, 301.0),
                reading("2021-01-01", -10.0, 34.1, 302.0),
            ],
        );

        assert_eq!(store.readings_near(day(1), -10.0, 34.0).len(), 2);
    }

    #[test]
    fn test_matches_across_buckets_keep_file_order() {
        let mut grid = GridSpec::default();
        grid.tolerance = 0.06;

        let store = DailyReadingStore::from_readings(
            &grid,
            vec![
                reading("2021-01-01 00:00:00", -10.0, 34.055, 300.0),
                reading("2021-01-01 00:00:00", -10.0, 34.0, 301.0),
                reading("2021-01-01 03:00:00", -10.0, 33.96, 302.0),
                reading("2021-01-01 03:00:00", -10.0, 34.0, 303.0),
            ],
        );

        let temps: Vec<f64> = store
            .readings_near(day(1), -10.0, 34.0)
            .iter()
            .map(|r| r.t2m)
            .collect();
        assert_eq!(temps, vec![300.0, 301.0, 302.0, 303.0]);
    }
}
