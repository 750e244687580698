//! Cycle period arithmetic
//!
//! Periods are half-open `[start, end)` calendar ranges evaluated in UTC.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};

use super::error::CommissionError;
use super::types::CycleType;

/// Period of `cycle_type` containing `day`
///
/// WEEKLY: Monday through the following Monday.
/// MONTHLY: first of the month through the first of the next month.
pub fn period_bounds(
    cycle_type: CycleType,
    day: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), CommissionError> {
    let bounds = match cycle_type {
        CycleType::Weekly => {
            let offset = u64::from(day.weekday().num_days_from_monday());
            day.checked_sub_days(Days::new(offset))
                .and_then(|start| Some((start, start.checked_add_days(Days::new(7))?)))
        }
        CycleType::Monthly => day
            .with_day(1)
            .and_then(|start| Some((start, start.checked_add_months(Months::new(1))?))),
    };
    bounds.ok_or_else(|| CommissionError::InvalidPeriod(format!("{} around {}", cycle_type, day)))
}

/// Timestamp window for a date range
pub fn window(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        start.and_time(NaiveTime::MIN).and_utc(),
        end.and_time(NaiveTime::MIN).and_utc(),
    )
}
