//! Cumulative Transformer
//!
//! Turns a periodic aggregate into running totals per group.

use crate::aggregate::AggregationResult;
use crate::error::{EngineError, Result};
use crate::fields::{Dimension, KeyValue, Measure};
use chrono::Datelike;
use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativePoint {
    pub group: KeyValue,
    pub period: KeyValue,
    /// Periodic value as it came out of the aggregation
    pub value: f64,
    /// Running total of `value` within `group` up to and including `period`
    pub cumulative: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativeTable {
    pub group_dimension: Dimension,
    pub period_dimension: Dimension,
    pub measure: Measure,
    /// Sorted by period ascending; rows sharing a period keep input order
    pub points: Vec<CumulativePoint>,
}

impl CumulativeTable {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points of one group, in period order.
    pub fn series<'a>(&'a self, group: &'a KeyValue) -> impl Iterator<Item = &'a CumulativePoint> + 'a {
        self.points.iter().filter(move |p| &p.group == group)
    }

    /// Last running total of a group, i.e. its overall sum.
    pub fn final_value(&self, group: &KeyValue) -> Option<f64> {
        self.series(group).last().map(|p| p.cumulative)
    }
}

const ROW_COLUMN: &str = "row";
const GROUP_COLUMN: &str = "group";
const PERIOD_COLUMN: &str = "period";
const VALUE_COLUMN: &str = "value";
const CUMULATIVE_COLUMN: &str = "cumulative";

/// Period keys as a sortable column: day numbers for dates, text otherwise.
fn period_series(periods: &[&KeyValue]) -> Series {
    let days: Option<Vec<i32>> = periods
        .iter()
        .map(|p| p.as_date().map(|d| d.num_days_from_ce()))
        .collect();
    match days {
        Some(days) => Series::new(PERIOD_COLUMN, days),
        None => Series::new(
            PERIOD_COLUMN,
            periods.iter().map(|p| p.to_string()).collect::<Vec<String>>(),
        ),
    }
}

/// Running sum of `result`'s values per `group_dim`, ordered by `period_dim`.
///
/// Cumulation never crosses group boundaries. Two rows with the same group
/// and period should not exist after bucketing and grouping; if they do, they
/// keep their input order and a warning is logged.
pub fn cumulative(
    result: &AggregationResult,
    group_dim: &Dimension,
    period_dim: &Dimension,
) -> Result<CumulativeTable> {
    let group_idx = result.dimension_index(group_dim)?;
    let period_idx = result.dimension_index(period_dim)?;

    let rows: Vec<(&KeyValue, &KeyValue, f64)> = result
        .rows
        .iter()
        .filter_map(|r| Some((r.key_at(group_idx)?, r.key_at(period_idx)?, r.value)))
        .collect();

    let mut table = CumulativeTable {
        group_dimension: group_dim.clone(),
        period_dimension: period_dim.clone(),
        measure: result.measure.clone(),
        points: Vec::with_capacity(rows.len()),
    };
    if rows.is_empty() {
        return Ok(table);
    }

    let periods: Vec<&KeyValue> = rows.iter().map(|r| r.1).collect();
    let frame = DataFrame::new(vec![
        Series::new(ROW_COLUMN, (0..rows.len() as u32).collect::<Vec<u32>>()),
        Series::new(
            GROUP_COLUMN,
            rows.iter().map(|r| r.0.to_string()).collect::<Vec<String>>(),
        ),
        period_series(&periods),
        Series::new(VALUE_COLUMN, rows.iter().map(|r| r.2).collect::<Vec<f64>>()),
    ])?;

    let distinct = frame
        .clone()
        .lazy()
        .group_by([col(GROUP_COLUMN), col(PERIOD_COLUMN)])
        .agg([col(VALUE_COLUMN).count()])
        .collect()?
        .height();
    if distinct < frame.height() {
        warn!(
            duplicates = frame.height() - distinct,
            "Duplicate period within group; keeping input order"
        );
    }

    let running = frame
        .lazy()
        .sort([PERIOD_COLUMN], SortMultipleOptions::default().with_maintain_order(true))
        .with_columns([col(VALUE_COLUMN)
            .cum_sum(false)
            .over([col(GROUP_COLUMN)])
            .alias(CUMULATIVE_COLUMN)])
        .select([col(ROW_COLUMN), col(CUMULATIVE_COLUMN)])
        .collect()
        .map_err(|e| EngineError::Execution(format!("Cumulative sum failed: {}", e)))?;

    let order = running.column(ROW_COLUMN)?.u32()?;
    let totals = running.column(CUMULATIVE_COLUMN)?.f64()?;
    for (idx, total) in order.into_iter().zip(totals.into_iter()) {
        let Some(&(group, period, value)) = idx.and_then(|i| rows.get(i as usize)) else {
            continue;
        };
        table.points.push(CumulativePoint {
            group: group.clone(),
            period: period.clone(),
            value,
            cumulative: total.unwrap_or(0.0),
        });
    }

    debug!(points = table.points.len(), "Cumulative totals computed");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Accumulator, AggregatedRow, Reducer, RowOrder};
    use chrono::NaiveDate;

    fn point(group: &str, month: u32, value: f64) -> AggregatedRow {
        AggregatedRow {
            key: vec![
                KeyValue::from(group),
                KeyValue::from(NaiveDate::from_ymd_opt(2024, month, 1).unwrap()),
            ],
            acc: Accumulator { sum: value, count: 1 },
            value,
        }
    }

    fn periodic(rows: Vec<AggregatedRow>) -> AggregationResult {
        AggregationResult {
            dimensions: vec![Dimension::Category, Dimension::Period],
            measure: Measure::TotalSales,
            reducer: Reducer::Sum,
            order: RowOrder::FirstSeen,
            rows,
        }
    }

    #[test]
    fn test_running_totals_stay_within_groups() {
        let result = periodic(vec![
            point("Office Supplies", 3, 5.0),
            point("Furniture", 1, 10.0),
            point("Office Supplies", 1, 1.0),
            point("Furniture", 2, 20.0),
        ]);
        let table = cumulative(&result, &Dimension::Category, &Dimension::Period).unwrap();

        let furniture: Vec<f64> = table
            .series(&KeyValue::from("Furniture"))
            .map(|p| p.cumulative)
            .collect();
        assert_eq!(furniture, vec![10.0, 30.0]);
        assert_eq!(table.final_value(&KeyValue::from("Office Supplies")), Some(6.0));

        let periods: Vec<String> = table.points.iter().map(|p| p.period.to_string()).collect();
        assert_eq!(periods, vec!["2024-01-01", "2024-01-01", "2024-02-01", "2024-03-01"]);
        // same period keeps input order
        assert_eq!(table.points[0].group, KeyValue::from("Furniture"));
    }

    #[test]
    fn test_missing_dimension_is_an_error() {
        let result = periodic(vec![point("Furniture", 1, 10.0)]);
        assert!(matches!(
            cumulative(&result, &Dimension::State, &Dimension::Period),
            Err(EngineError::UnknownDimension(_))
        ));
    }
}
