use crate::config::WeightNormalization;
use crate::models::{Reading, RegionWeights, SummaryRecord};
use crate::processors::reading_store::ReadingLookup;
use crate::utils::constants::KELVIN_OFFSET;
use chrono::NaiveDate;

/// Max, min and mean of one variable over the readings of one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CellStat {
    max: f64,
    min: f64,
    mean: f64,
}

impl CellStat {
    /// `None` for an empty slice.
    fn from_values(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;

        for value in values {
            count += 1;
            sum += value;
            max = max.max(value);
            min = min.min(value);
        }

        (count > 0).then(|| CellStat {
            max,
            min,
            mean: sum / count as f64,
        })
    }
}

/// Running high/low/weighted mean of an instantaneous variable.
///
/// High and low stay `None` until the first cell is observed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStat {
    max: Option<f64>,
    min: Option<f64>,
    weighted_sum: f64,
    weight_sum: f64,
}

impl RunningStat {
    fn observe(&mut self, cell: CellStat, weight: f64) {
        self.max = Some(self.max.map_or(cell.max, |m| m.max(cell.max)));
        self.min = Some(self.min.map_or(cell.min, |m| m.min(cell.min)));
        self.weighted_sum += cell.mean * weight;
        self.weight_sum += weight;
    }

    pub fn is_empty(&self) -> bool {
        self.max.is_none()
    }

    /// `(high, low, mean)` with `offset` subtracted from each.
    fn realize(&self, normalization: WeightNormalization, offset: f64) -> Option<(f64, f64, f64)> {
        let (Some(max), Some(min)) = (self.max, self.min) else {
            return None;
        };

        let mean = match normalization {
            WeightNormalization::RegionArea => self.weighted_sum - offset * self.weight_sum,
            WeightNormalization::Coverage => self.weighted_sum / self.weight_sum - offset,
        };

        Some((max - offset, min - offset, mean))
    }
}

/// Running weighted total of a cumulative variable, fed with the peak
/// reading of each cell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningTotal {
    weighted_sum: f64,
    weight_sum: f64,
}

impl RunningTotal {
    fn observe(&mut self, cell: CellStat, weight: f64) {
        self.weighted_sum += cell.max * weight;
        self.weight_sum += weight;
    }

    fn realize(&self, normalization: WeightNormalization) -> f64 {
        match normalization {
            WeightNormalization::RegionArea => self.weighted_sum,
            WeightNormalization::Coverage if self.weight_sum > 0.0 => {
                self.weighted_sum / self.weight_sum
            }
            WeightNormalization::Coverage => 0.0,
        }
    }
}

/// Accumulators for one region on one day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayAccumulator {
    pub temperature: RunningStat,
    pub dewpoint: RunningStat,
    pub wind_speed: RunningStat,
    pub soil_water: RunningStat,
    pub precipitation: RunningTotal,
    pub evapotranspiration: RunningTotal,
    pub matched_cells: usize,
}

impl DayAccumulator {
    /// Fold the matched readings of one cell into the running values.
    /// An empty match set leaves the accumulator untouched.
    pub fn add_cell(&mut self, readings: &[&Reading], weight: f64) {
        let stat = |f: fn(&Reading) -> f64| CellStat::from_values(readings.iter().map(|r| f(r)));

        let (
            Some(temperature),
            Some(dewpoint),
            Some(wind_speed),
            Some(soil_water),
            Some(precipitation),
            Some(evapotranspiration),
        ) = (
            stat(|r| r.t2m),
            stat(|r| r.d2m),
            stat(Reading::wind_speed),
            stat(|r| r.swvl1),
            stat(|r| r.tp),
            stat(|r| r.evavt),
        )
        else {
            return;
        };

        self.temperature.observe(temperature, weight);
        self.dewpoint.observe(dewpoint, weight);
        self.wind_speed.observe(wind_speed, weight);
        self.soil_water.observe(soil_water, weight);
        self.precipitation.observe(precipitation, weight);
        self.evapotranspiration.observe(evapotranspiration, weight);
        self.matched_cells += 1;
    }

    /// Final record, or `None` when no cell matched.
    pub fn finish(
        &self,
        region_id: &str,
        date: NaiveDate,
        normalization: WeightNormalization,
    ) -> Option<SummaryRecord> {
        if self.matched_cells == 0 {
            return None;
        }

        let (high_temperature, low_temperature, average_temperature) =
            self.temperature.realize(normalization, KELVIN_OFFSET)?;
        let (high_dewpoint_temperature, low_dewpoint_temperature, average_dewpoint_temperature) =
            self.dewpoint.realize(normalization, KELVIN_OFFSET)?;
        let (max_windspeed, min_windspeed, average_windspeed) =
            self.wind_speed.realize(normalization, 0.0)?;
        let (max_soil_water, min_soil_water, average_soil_water) =
            self.soil_water.realize(normalization, 0.0)?;

        Some(SummaryRecord {
            region_id: region_id.to_string(),
            date,
            high_temperature,
            low_temperature,
            average_temperature,
            high_dewpoint_temperature,
            low_dewpoint_temperature,
            average_dewpoint_temperature,
            max_windspeed,
            min_windspeed,
            average_windspeed,
            max_soil_water,
            min_soil_water,
            average_soil_water,
            total_precipitation: self.precipitation.realize(normalization),
            total_evaporation_transpiration: self.evapotranspiration.realize(normalization),
        })
    }
}

/// Reduces one region's cell readings for one day into a summary record.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionDayAggregator {
    normalization: WeightNormalization,
}

impl RegionDayAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_normalization(normalization: WeightNormalization) -> Self {
        Self { normalization }
    }

    /// Aggregate `day` for the region described by `weights`. Cells without
    /// a matching reading are skipped; `None` means no cell matched at all.
    pub fn aggregate<L: ReadingLookup + ?Sized>(
        &self,
        weights: &RegionWeights,
        day: NaiveDate,
        lookup: &L,
    ) -> Option<SummaryRecord> {
        let mut acc = DayAccumulator::default();

        for cell in &weights.cells {
            let readings = lookup.readings_near(day, cell.lat(), cell.lon());
            if readings.is_empty() {
                continue;
            }
            acc.add_cell(&readings, weights.weight(cell));
        }

        acc.finish(&weights.region_id, day, self.normalization)
    }
}
