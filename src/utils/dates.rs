use crate::error::{ProcessingError, Result};
use chrono::NaiveDate;

/// Every date from `start` to `end`, both inclusive.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// Every date of a calendar year.
pub fn days_of_year(year: i32) -> Result<Vec<NaiveDate>> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| ProcessingError::Config(format!("Invalid year: {}", year)))?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| ProcessingError::Config(format!("Invalid year: {}", year)))?;

    Ok(date_range(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_of_year() {
        assert_eq!(days_of_year(2021).unwrap().len(), 365);
        assert_eq!(days_of_year(2020).unwrap().len(), 366);

        let days = days_of_year(2024).unwrap();
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(days[59], NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(days[365], NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }

    #[test]
    fn test_date_range_inclusive() {
        let start = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 8, 2).unwrap();
        assert_eq!(date_range(start, end), vec![start, end]);
        assert!(date_range(end, start).is_empty());
    }
}
