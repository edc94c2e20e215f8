//! Aggregator
//!
//! Grouping and reduction over any `Row`. Groups keep first-seen order and every
//! group carries a `(sum, count)` accumulator, so partial results can be merged
//! and means are only divided when read.

use crate::error::{EngineError, Result};
use crate::fields::{Dimension, KeyValue, Measure, Row};
use itertools::Itertools;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Sum,
    Mean,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Ordering contract of an `AggregationResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOrder {
    /// Groups in the order their first row was seen
    FirstSeen,
    /// Lexicographic by key tuple (dates chronologically)
    KeyAscending,
    /// By one key component; ties keep their previous relative order
    DimensionAscending,
    ValueAscending,
    ValueDescending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Accumulator {
    pub sum: f64,
    pub count: u64,
}

impl Accumulator {
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Reduced value. The mean of nothing is 0, matching the dashboard display.
    pub fn value(&self, reducer: Reducer) -> f64 {
        match reducer {
            Reducer::Sum => self.sum,
            Reducer::Count => self.count as f64,
            Reducer::Mean if self.count == 0 => 0.0,
            Reducer::Mean => self.sum / self.count as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRow {
    pub key: Vec<KeyValue>,
    pub acc: Accumulator,
    pub value: f64,
}

impl AggregatedRow {
    /// Key component at `idx`, if any.
    pub fn key_at(&self, idx: usize) -> Option<&KeyValue> {
        self.key.get(idx)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    pub dimensions: Vec<Dimension>,
    pub measure: Measure,
    pub reducer: Reducer,
    pub order: RowOrder,
    pub rows: Vec<AggregatedRow>,
}

impl AggregationResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `dim` in the key tuple.
    pub fn dimension_index(&self, dim: &Dimension) -> Result<usize> {
        self.dimensions
            .iter()
            .position(|d| d == dim)
            .ok_or_else(|| EngineError::UnknownDimension(dim.name().to_string()))
    }

    /// Reduced value for an exact key, if the group exists.
    pub fn get(&self, key: &[KeyValue]) -> Option<f64> {
        self.rows.iter().find(|r| r.key == key).map(|r| r.value)
    }

    /// Value column in row order.
    pub fn values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.value).collect()
    }

    /// Stable sort by key tuple.
    pub fn sorted_by_key(mut self) -> Self {
        self.rows.sort_by(|a, b| a.key.cmp(&b.key));
        self.order = RowOrder::KeyAscending;
        self
    }

    /// Stable sort by a single key component.
    pub fn sorted_by_dimension(mut self, dim: &Dimension) -> Result<Self> {
        let idx = self.dimension_index(dim)?;
        self.rows.sort_by(|a, b| a.key_at(idx).cmp(&b.key_at(idx)));
        self.order = RowOrder::DimensionAscending;
        Ok(self)
    }

    /// Stable sort by reduced value; ties keep their current relative order.
    pub fn sorted_by_value(mut self, direction: SortDirection) -> Self {
        match direction {
            SortDirection::Ascending => {
                self.rows.sort_by(|a, b| a.value.total_cmp(&b.value));
                self.order = RowOrder::ValueAscending;
            }
            SortDirection::Descending => {
                self.rows.sort_by(|a, b| b.value.total_cmp(&a.value));
                self.order = RowOrder::ValueDescending;
            }
        }
        self
    }
}

const ROW_COLUMN: &str = "row";
const SUM_COLUMN: &str = "sum";
const COUNT_COLUMN: &str = "count";

fn key_column(idx: usize) -> String {
    format!("key_{}", idx)
}

/// Reduce partial `(sum, count)` accumulators sharing a key into one per key.
///
/// Keys are grouped on their display form, which is unique per dimension since
/// every component of one dimension has the same variant. Groups keep the order
/// their first partial appears in. With `width == 0` there is always exactly one
/// group keyed `[]`, even when there are no partials.
fn reduce_partials(
    keys: &[Vec<KeyValue>],
    partials: &[Accumulator],
    width: usize,
) -> Result<Vec<(Vec<KeyValue>, Accumulator)>> {
    if keys.is_empty() && width > 0 {
        return Ok(Vec::new());
    }

    let mut columns: Vec<Series> = Vec::with_capacity(width + 3);
    columns.push(Series::new(ROW_COLUMN, (0..keys.len() as u32).collect::<Vec<u32>>()));
    for idx in 0..width {
        let values: Vec<String> = keys
            .iter()
            .map(|k| k.get(idx).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        columns.push(Series::new(&key_column(idx), values));
    }
    columns.push(Series::new(SUM_COLUMN, partials.iter().map(|a| a.sum).collect::<Vec<f64>>()));
    columns.push(Series::new(COUNT_COLUMN, partials.iter().map(|a| a.count).collect::<Vec<u64>>()));
    let frame = DataFrame::new(columns)?;

    let aggs = [
        col(ROW_COLUMN).first().alias(ROW_COLUMN),
        col(SUM_COLUMN).sum().alias(SUM_COLUMN),
        col(COUNT_COLUMN).sum().alias(COUNT_COLUMN),
    ];
    let lazy = frame.lazy();
    let grouped = if width == 0 {
        lazy.select(aggs)
    } else {
        let by: Vec<Expr> = (0..width).map(|idx| col(&key_column(idx))).collect();
        lazy.group_by_stable(by).agg(aggs)
    }
    .collect()
    .map_err(|e| EngineError::Execution(format!("Group failed: {}", e)))?;

    let firsts = grouped.column(ROW_COLUMN)?.u32()?;
    let sums = grouped.column(SUM_COLUMN)?.f64()?;
    let counts = grouped.column(COUNT_COLUMN)?.u64()?;

    Ok(firsts
        .into_iter()
        .zip(sums.into_iter())
        .zip(counts.into_iter())
        .map(|((first, sum), count)| {
            let key = first
                .and_then(|row| keys.get(row as usize))
                .cloned()
                .unwrap_or_default();
            let acc = Accumulator {
                sum: sum.unwrap_or(0.0),
                count: count.unwrap_or(0),
            };
            (key, acc)
        })
        .collect())
}

/// Group `rows` by the tuple of `group_by` values and reduce `measure`.
///
/// An empty `group_by` always yields a single group keyed `[]`, so sum, count
/// and mean over an empty table are all 0. With grouping dimensions an empty
/// input yields no groups.
pub fn group_and_reduce<R: Row>(
    rows: &[R],
    group_by: &[Dimension],
    measure: &Measure,
    reducer: Reducer,
) -> Result<AggregationResult> {
    let mut keys: Vec<Vec<KeyValue>> = Vec::with_capacity(rows.len());
    let mut partials: Vec<Accumulator> = Vec::with_capacity(rows.len());

    for row in rows {
        let key = group_by
            .iter()
            .map(|dim| {
                row.dimension(dim)
                    .ok_or_else(|| EngineError::UnknownDimension(dim.name().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut acc = Accumulator::default();
        acc.push(row.measure(measure)?);
        keys.push(key);
        partials.push(acc);
    }

    let out: Vec<AggregatedRow> = reduce_partials(&keys, &partials, group_by.len())?
        .into_iter()
        .map(|(key, acc)| AggregatedRow {
            key,
            value: acc.value(reducer),
            acc,
        })
        .collect();

    debug!(
        group_by = ?group_by.iter().map(Dimension::name).collect::<Vec<_>>(),
        measure = measure.name(),
        ?reducer,
        rows = rows.len(),
        groups = out.len(),
        "Grouped and reduced"
    );

    Ok(AggregationResult {
        dimensions: group_by.to_vec(),
        measure: measure.clone(),
        reducer,
        order: RowOrder::FirstSeen,
        rows: out,
    })
}

/// The `n` groups with the largest values, presented in `direction` order.
///
/// Selection is by descending value with ties broken by current row order, so
/// the ascending form is the same top-n, reversed for bar-chart consumption.
pub fn top_n(result: &AggregationResult, n: usize, direction: SortDirection) -> AggregationResult {
    let mut ranked = result.clone().sorted_by_value(SortDirection::Descending);
    ranked.rows.truncate(n);
    match direction {
        SortDirection::Descending => ranked,
        SortDirection::Ascending => ranked.sorted_by_value(SortDirection::Ascending),
    }
}

/// Combine results computed over disjoint partitions of the same rows.
///
/// Accumulators are added, so sum, count and mean all stay exact. Groups only
/// present in `b` are appended after those of `a`.
pub fn merge(a: &AggregationResult, b: &AggregationResult) -> Result<AggregationResult> {
    if a.dimensions != b.dimensions || a.measure != b.measure || a.reducer != b.reducer {
        return Err(EngineError::IncompatibleResults(format!(
            "{:?}/{}/{:?} vs {:?}/{}/{:?}",
            a.dimensions, a.measure, a.reducer, b.dimensions, b.measure, b.reducer
        )));
    }

    let (keys, partials): (Vec<Vec<KeyValue>>, Vec<Accumulator>) = a
        .rows
        .iter()
        .chain(&b.rows)
        .map(|r| (r.key.clone(), r.acc))
        .unzip();

    let rows = reduce_partials(&keys, &partials, a.dimensions.len())?
        .into_iter()
        .map(|(key, acc)| AggregatedRow {
            key,
            value: acc.value(a.reducer),
            acc,
        })
        .collect();

    Ok(AggregationResult {
        dimensions: a.dimensions.clone(),
        measure: a.measure.clone(),
        reducer: a.reducer,
        order: RowOrder::FirstSeen,
        rows,
    })
}

/// Reduce `measure` over all rows to a scalar. Empty input gives 0.
pub fn total<R: Row>(rows: &[R], measure: &Measure, reducer: Reducer) -> Result<f64> {
    let grand = group_and_reduce(rows, &[], measure, reducer)?;
    Ok(grand.rows.first().map_or(0.0, |r| r.value))
}

/// The `n` individual rows with the largest `measure`, presented in
/// `direction` order. Ties keep input order.
pub fn rank_rows<'a, R: Row>(
    rows: &'a [R],
    measure: &Measure,
    n: usize,
    direction: SortDirection,
) -> Result<Vec<&'a R>> {
    let scored = rows
        .iter()
        .map(|row| row.measure(measure).map(|value| (value, row)))
        .collect::<Result<Vec<_>>>()?;

    let top = scored
        .into_iter()
        .sorted_by(|a, b| b.0.total_cmp(&a.0))
        .take(n);

    let ranked: Vec<&R> = match direction {
        SortDirection::Descending => top.map(|(_, row)| row).collect(),
        SortDirection::Ascending => top
            .collect::<Vec<_>>()
            .into_iter()
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, row)| row)
            .collect(),
    };
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{validate, RawSalesRow, SalesRecord};

    fn row(key: &str, sum: f64, count: u64) -> AggregatedRow {
        let acc = Accumulator { sum, count };
        AggregatedRow {
            key: vec![KeyValue::from(key)],
            acc,
            value: acc.value(Reducer::Sum),
        }
    }

    fn result(rows: Vec<AggregatedRow>) -> AggregationResult {
        AggregationResult {
            dimensions: vec![Dimension::Category],
            measure: Measure::TotalSales,
            reducer: Reducer::Sum,
            order: RowOrder::FirstSeen,
            rows,
        }
    }

    #[test]
    fn test_mean_of_empty_accumulator_is_zero() {
        assert_eq!(Accumulator::default().value(Reducer::Mean), 0.0);
        assert_eq!(Accumulator::default().value(Reducer::Sum), 0.0);
    }

    #[test]
    fn test_top_n_ties_keep_first_seen_order() {
        let res = result(vec![row("a", 5.0, 1), row("b", 9.0, 1), row("c", 5.0, 1), row("d", 1.0, 1)]);
        let top = top_n(&res, 3, SortDirection::Descending);
        let keys: Vec<String> = top.rows.iter().map(|r| r.key[0].to_string()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);

        let asc = top_n(&res, 3, SortDirection::Ascending);
        let keys: Vec<String> = asc.rows.iter().map(|r| r.key[0].to_string()).collect();
        assert_eq!(keys, vec!["a", "c", "b"]);
        assert_eq!(asc.order, RowOrder::ValueAscending);
    }

    fn sale(category: &str, price: &str) -> SalesRecord {
        validate(&RawSalesRow {
            row: 1,
            date: "2024-06-01".to_string(),
            order_id: "ORD-1".to_string(),
            customer_name: "Dana Cole".to_string(),
            customer_segment: "Consumer".to_string(),
            city: "Austin".to_string(),
            state: "TX".to_string(),
            product_category: category.to_string(),
            product_sub_category: "Misc".to_string(),
            units_sold: "1".to_string(),
            unit_cost: "1.00".to_string(),
            unit_price: price.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_grand_total_of_empty_table_is_zero() {
        let rows: Vec<SalesRecord> = Vec::new();
        for reducer in [Reducer::Sum, Reducer::Count, Reducer::Mean] {
            let result = group_and_reduce(&rows, &[], &Measure::TotalSales, reducer).unwrap();
            assert_eq!(result.values(), vec![0.0]);
            assert!(result.rows[0].key.is_empty());
            assert_eq!(total(&rows, &Measure::TotalSales, reducer).unwrap(), 0.0);
        }

        let grouped = group_and_reduce(&rows, &[Dimension::Category], &Measure::TotalSales, Reducer::Sum).unwrap();
        assert!(grouped.is_empty());
    }

    #[test]
    fn test_groups_keep_first_seen_order() {
        let rows = vec![
            sale("Office Supplies", "4.00"),
            sale("Furniture", "10.00"),
            sale("Office Supplies", "6.00"),
            sale("Electronics", "100.00"),
        ];
        let result = group_and_reduce(&rows, &[Dimension::Category], &Measure::TotalSales, Reducer::Mean).unwrap();
        let keys: Vec<String> = result.rows.iter().map(|r| r.key[0].to_string()).collect();
        assert_eq!(keys, vec!["Office Supplies", "Furniture", "Electronics"]);
        assert_eq!(result.rows[0].acc, Accumulator { sum: 10.0, count: 2 });
        assert_eq!(result.rows[0].value, 5.0);
        assert_eq!(total(&rows, &Measure::TotalSales, Reducer::Sum).unwrap(), 120.0);
    }

    #[test]
    fn test_merge_appends_new_groups() {
        let a = result(vec![row("a", 1.0, 1), row("b", 2.0, 2)]);
        let b = result(vec![row("c", 4.0, 1), row("a", 3.0, 3)]);
        let merged = merge(&a, &b).unwrap();
        let keys: Vec<String> = merged.rows.iter().map(|r| r.key[0].to_string()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(merged.rows[0].acc, Accumulator { sum: 4.0, count: 4 });
    }

    #[test]
    fn test_merge_rejects_mismatched_results() {
        let a = result(vec![row("a", 1.0, 1)]);
        let mut b = a.clone();
        b.reducer = Reducer::Mean;
        assert!(matches!(merge(&a, &b), Err(EngineError::IncompatibleResults(_))));
    }
}
