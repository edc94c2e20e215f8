//! Time Bucketer
//!
//! Maps each record's date to the first day of its period. Periods with no
//! records simply produce no rows.

use crate::error::EngineError;
use crate::fields::{Dimension, KeyValue, Row};
use crate::record::SalesRecord;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Month,
    Quarter,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Day => write!(f, "Daily"),
            Granularity::Month => write!(f, "Monthly"),
            Granularity::Quarter => write!(f, "Quarterly"),
        }
    }
}

impl FromStr for Granularity {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" | "d" => Ok(Granularity::Day),
            "month" | "monthly" | "m" => Ok(Granularity::Month),
            "quarter" | "quarterly" | "q" => Ok(Granularity::Quarter),
            other => Err(EngineError::InvalidParameter(format!("unknown granularity '{}'", other))),
        }
    }
}

/// First day of the period containing `date`.
pub fn period_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    let month = match granularity {
        Granularity::Day => return date,
        Granularity::Month => date.month(),
        Granularity::Quarter => (date.month0() / 3) * 3 + 1,
    };
    // Day 1 of a month taken from a valid date always exists.
    NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
}

/// A record paired with its period key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketedRow<'a> {
    pub record: &'a SalesRecord,
    pub period: NaiveDate,
}

impl Row for BucketedRow<'_> {
    fn record(&self) -> &SalesRecord {
        self.record
    }

    fn dimension(&self, dim: &Dimension) -> Option<KeyValue> {
        match dim {
            Dimension::Period => Some(KeyValue::Date(self.period)),
            other => self.record.dimension(other),
        }
    }
}

/// Attach a period key to every row, preserving input order.
pub fn bucket<'a, R: Row>(rows: &'a [R], granularity: Granularity) -> Vec<BucketedRow<'a>> {
    let bucketed: Vec<BucketedRow<'a>> = rows
        .iter()
        .map(|row| {
            let record = row.record();
            BucketedRow {
                record,
                period: period_start(record.date, granularity),
            }
        })
        .collect();
    debug!(rows = bucketed.len(), %granularity, "Bucketed rows");
    bucketed
}
