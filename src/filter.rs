//! Filter Predicate
//!
//! A `FilterSpec` is an explicit value built per view from user input. Empty
//! sets match nothing; "no filter" is expressed by `FilterSpec::full`.

use crate::dataset::DomainCatalog;
use crate::error::{EngineError, Result};
use crate::fields::{Dimension, KeyValue, Row};
use crate::record::SalesRecord;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub date_range: DateRange,
    pub categories: BTreeSet<String>,
    pub segments: BTreeSet<String>,
    pub states: BTreeSet<String>,
    /// Additional `dimension == value` constraints, e.g. one side of a comparison
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<(Dimension, String)>,
}

impl FilterSpec {
    pub fn new(
        date_range: DateRange,
        categories: impl IntoIterator<Item = impl Into<String>>,
        segments: impl IntoIterator<Item = impl Into<String>>,
        states: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            date_range,
            categories: categories.into_iter().map(Into::into).collect(),
            segments: segments.into_iter().map(Into::into).collect(),
            states: states.into_iter().map(Into::into).collect(),
            constraints: Vec::new(),
        }
    }

    /// Spec matching every row of the catalog's dataset.
    ///
    /// An empty catalog has no date bounds; the resulting range is
    /// `NaiveDate::MIN..=NaiveDate::MAX`.
    pub fn full(catalog: &DomainCatalog) -> Self {
        Self {
            date_range: DateRange::new(
                catalog.min_date.unwrap_or(NaiveDate::MIN),
                catalog.max_date.unwrap_or(NaiveDate::MAX),
            ),
            categories: catalog.categories.clone(),
            segments: catalog.segments.clone(),
            states: catalog.states.clone(),
            constraints: Vec::new(),
        }
    }

    pub fn with_date_range(mut self, date_range: DateRange) -> Self {
        self.date_range = date_range;
        self
    }

    pub fn with_categories<I: IntoIterator<Item = S>, S: Into<String>>(mut self, values: I) -> Self {
        self.categories = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_segments<I: IntoIterator<Item = S>, S: Into<String>>(mut self, values: I) -> Self {
        self.segments = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_states<I: IntoIterator<Item = S>, S: Into<String>>(mut self, values: I) -> Self {
        self.states = values.into_iter().map(Into::into).collect();
        self
    }

    /// Copy of this spec additionally constrained to `dimension == value`.
    pub fn narrowed(&self, dimension: Dimension, value: impl Into<String>) -> Self {
        let mut spec = self.clone();
        spec.constraints.push((dimension, value.into()));
        spec
    }

    pub fn matches<R: Row + ?Sized>(&self, row: &R) -> bool {
        let record = row.record();
        self.date_range.contains(record.date)
            && self.categories.contains(&record.product_category)
            && self.segments.contains(&record.customer_segment)
            && self.states.contains(&record.state)
            && self.constraints.iter().all(|(dim, value)| {
                match row.dimension(dim) {
                    Some(KeyValue::Text(v)) => &v == value,
                    Some(KeyValue::Date(d)) => d.format("%Y-%m-%d").to_string() == *value,
                    None => false,
                }
            })
    }
}

const ROW_COLUMN: &str = "row";
const DATE_COLUMN: &str = "date";
const CATEGORY_COLUMN: &str = "category";
const SEGMENT_COLUMN: &str = "segment";
const STATE_COLUMN: &str = "state";

fn constraint_column(idx: usize) -> String {
    format!("constraint_{}", idx)
}

/// `column` equals one of `values`; an empty set is `false`.
fn any_of(column: &str, values: &BTreeSet<String>) -> Expr {
    values
        .iter()
        .fold(lit(false), |acc, value| acc.or(col(column).eq(lit(value.clone()))))
}

impl FilterSpec {
    /// The predicate as a polars expression over the frame built by `apply`.
    fn predicate(&self) -> Expr {
        let start = self.date_range.start.num_days_from_ce();
        let end = self.date_range.end.num_days_from_ce();
        let mut expr = col(DATE_COLUMN)
            .gt_eq(lit(start))
            .and(col(DATE_COLUMN).lt_eq(lit(end)))
            .and(any_of(CATEGORY_COLUMN, &self.categories))
            .and(any_of(SEGMENT_COLUMN, &self.segments))
            .and(any_of(STATE_COLUMN, &self.states));
        for (idx, (_, value)) in self.constraints.iter().enumerate() {
            expr = expr.and(col(&constraint_column(idx)).eq(lit(value.clone())));
        }
        expr
    }

    fn frame<R: Row>(&self, rows: &[R]) -> Result<DataFrame> {
        let records: Vec<&SalesRecord> = rows.iter().map(|r| r.record()).collect();
        let text = |name: &str, f: fn(&SalesRecord) -> &str| {
            Series::new(name, records.iter().map(|r| f(r)).collect::<Vec<&str>>())
        };

        let mut columns = vec![
            Series::new(ROW_COLUMN, (0..rows.len() as u32).collect::<Vec<u32>>()),
            Series::new(
                DATE_COLUMN,
                records.iter().map(|r| r.date.num_days_from_ce()).collect::<Vec<i32>>(),
            ),
            text(CATEGORY_COLUMN, |r| &r.product_category),
            text(SEGMENT_COLUMN, |r| &r.customer_segment),
            text(STATE_COLUMN, |r| &r.state),
        ];
        // Rows without the constrained dimension get null and never match.
        for (idx, (dim, _)) in self.constraints.iter().enumerate() {
            let values: Vec<Option<String>> = rows
                .iter()
                .map(|row| row.dimension(dim).map(|v| v.to_string()))
                .collect();
            columns.push(Series::new(&constraint_column(idx), values));
        }

        Ok(DataFrame::new(columns)?)
    }
}

/// Rows of `rows` that satisfy `spec`, in their original order.
pub fn apply<'a, R: Row>(rows: &'a [R], spec: &FilterSpec) -> Result<Vec<&'a R>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let kept = spec
        .frame(rows)?
        .lazy()
        .filter(spec.predicate())
        .select([col(ROW_COLUMN)])
        .collect()
        .map_err(|e| EngineError::Execution(format!("Filter failed: {}", e)))?;

    let matched: Vec<&R> = kept
        .column(ROW_COLUMN)?
        .u32()?
        .into_iter()
        .flatten()
        .filter_map(|idx| rows.get(idx as usize))
        .collect();
    debug!(input = rows.len(), matched = matched.len(), "Filter applied");
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{validate, RawSalesRow};

    fn record(date: &str, category: &str, state: &str) -> SalesRecord {
        validate(&RawSalesRow {
            row: 1,
            date: date.to_string(),
            order_id: "ORD-1".to_string(),
            customer_name: "Eric Hall".to_string(),
            customer_segment: "Consumer".to_string(),
            city: "Somewhere".to_string(),
            state: state.to_string(),
            product_category: category.to_string(),
            product_sub_category: "Misc".to_string(),
            units_sold: "1".to_string(),
            unit_cost: "1.00".to_string(),
            unit_price: "2.00".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let rows = vec![
            record("2024-01-01", "Furniture", "CA"),
            record("2024-01-31", "Furniture", "CA"),
            record("2024-02-01", "Furniture", "CA"),
        ];
        let spec = FilterSpec::new(
            DateRange::new(day(2024, 1, 1), day(2024, 1, 31)),
            ["Furniture"],
            ["Consumer"],
            ["CA"],
        );
        assert_eq!(apply(&rows, &spec).unwrap().len(), 2);
    }

    #[test]
    fn test_constraint_narrows() {
        let rows = vec![
            record("2024-01-01", "Furniture", "CA"),
            record("2024-01-02", "Furniture", "TX"),
        ];
        let spec = FilterSpec::full(&DomainCatalog::from_records(&rows));
        let narrowed = spec.narrowed(Dimension::State, "TX");
        let matched = apply(&rows, &narrowed).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].state, "TX");
    }

    #[test]
    fn test_apply_agrees_with_matches() {
        let mut rows = vec![
            record("2024-01-01", "Furniture", "CA"),
            record("2024-01-02", "Furniture", "TX"),
            record("2024-01-02", "Electronics", "CA"),
            record("2024-03-09", "Furniture", "CA"),
        ];
        rows[0].extra.insert("Region".to_string(), "West".to_string());
        rows[3].extra.insert("Region".to_string(), "West".to_string());

        let full = FilterSpec::full(&DomainCatalog::from_records(&rows));
        let specs = vec![
            full.clone(),
            full.clone().with_categories(["Furniture"]),
            full.clone().with_date_range(DateRange::new(day(2024, 1, 2), day(2024, 1, 2))),
            full.narrowed(Dimension::Date, "2024-01-02"),
            full.narrowed(Dimension::Extra("Region".to_string()), "West"),
            full.clone().with_states(Vec::<String>::new()),
        ];

        for spec in &specs {
            let expected: Vec<&SalesRecord> = rows.iter().filter(|r| spec.matches(*r)).collect();
            assert_eq!(apply(&rows, spec).unwrap(), expected);
        }
        assert_eq!(apply(&rows, &specs[4]).unwrap().len(), 2);
        assert_eq!(apply(&rows, &specs[3]).unwrap().len(), 2);
    }

    #[test]
    fn test_full_spec_on_empty_catalog_matches_nothing() {
        let rows: Vec<SalesRecord> = Vec::new();
        let spec = FilterSpec::full(&DomainCatalog::default());
        assert!(spec.categories.is_empty());
        assert!(apply(&rows, &spec).unwrap().is_empty());
    }
}
