pub mod csv_io;
pub mod market_io;
#[cfg(feature = "generator")]
pub mod generator;

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

use crate::types::SectorRecord;

/// Records whose period falls within `[start, end]`.
pub fn filter_range(records: &[SectorRecord], start: NaiveDate, end: NaiveDate) -> Vec<&SectorRecord> {
    records
        .iter()
        .filter(|r| r.date >= start && r.date <= end)
        .collect()
}

/// Group records by period, periods in ascending order.
pub fn group_by_period<'a, I>(records: I) -> BTreeMap<NaiveDate, Vec<&'a SectorRecord>>
where
    I: IntoIterator<Item = &'a SectorRecord>,
{
    let mut periods: BTreeMap<NaiveDate, Vec<&'a SectorRecord>> = BTreeMap::new();
    for r in records {
        periods.entry(r.date).or_default().push(r);
    }
    periods
}

/// First and last period present, if any.
pub fn date_bounds(records: &[SectorRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let first = records.iter().map(|r| r.date).min()?;
    let last = records.iter().map(|r| r.date).max()?;
    Some((first, last))
}

/// Last calendar day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .map(|first_of_next| first_of_next - Duration::days(1))
        .unwrap_or(date)
}

/// Month-end dates from `start`'s month through `end`'s month.
pub fn month_ends(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = month_end(start);
    let last = month_end(end);
    while current <= last {
        dates.push(current);
        current = month_end(current + Duration::days(1));
    }
    dates
}
