//! Dated scalar series (benchmark index levels, portfolio values).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl Series {
    /// Build from unordered points. Sorted by date; for duplicate dates the
    /// last point wins. Non-finite values are dropped.
    pub fn from_points(mut points: Vec<(NaiveDate, f64)>) -> Self {
        points.retain(|(_, v)| v.is_finite());
        points.sort_by_key(|(d, _)| *d);
        let mut dates: Vec<NaiveDate> = Vec::with_capacity(points.len());
        let mut values: Vec<f64> = Vec::with_capacity(points.len());
        for (date, value) in points {
            if dates.last() == Some(&date) {
                if let Some(last) = values.last_mut() {
                    *last = value;
                }
                continue;
            }
            dates.push(date);
            values.push(value);
        }
        Self { dates, values }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Latest value dated on or before each target date (NaN if none).
    pub fn align_asof(&self, dates: &[NaiveDate]) -> Vec<f64> {
        dates
            .iter()
            .map(|d| {
                self.dates
                    .partition_point(|x| x <= d)
                    .checked_sub(1)
                    .map_or(f64::NAN, |i| self.values[i])
            })
            .collect()
    }
}
