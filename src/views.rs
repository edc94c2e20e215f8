//! Dashboard Views
//!
//! One builder per dashboard page. Each takes the full record slice and a
//! `FilterSpec`, and reports an empty selection as `EngineError::EmptyResult`
//! so callers render a "no data" state instead of zero-filled charts.

use crate::aggregate::{group_and_reduce, rank_rows, top_n, AggregationResult, Reducer, SortDirection};
use crate::bucket::{bucket, Granularity};
use crate::cumulative::{cumulative, CumulativeTable};
use crate::error::{EngineError, Result};
use crate::fields::{Dimension, Measure, Row};
use crate::filter::{apply, FilterSpec};
use crate::metrics::Headline;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

fn filtered<'a, R: Row>(rows: &'a [R], spec: &FilterSpec) -> Result<Vec<&'a R>> {
    let matched = apply(rows, spec)?;
    if matched.is_empty() {
        return Err(EngineError::EmptyResult);
    }
    Ok(matched)
}

fn sales_by<R: Row>(rows: &[R], dim: Dimension) -> Result<AggregationResult> {
    group_and_reduce(rows, &[dim], &Measure::TotalSales, Reducer::Sum)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub headline: Headline,
    pub sales_over_time: AggregationResult,
    pub sales_by_category: AggregationResult,
    pub sales_by_state: AggregationResult,
    pub sales_by_segment: AggregationResult,
}

pub fn overview<R: Row>(rows: &[R], spec: &FilterSpec) -> Result<Overview> {
    let rows = filtered(rows, spec)?;
    info!(rows = rows.len(), "Building overview");
    Ok(Overview {
        headline: Headline::compute(&rows)?,
        sales_over_time: sales_by(&rows, Dimension::Date)?.sorted_by_key(),
        sales_by_category: sales_by(&rows, Dimension::Category)?
            .sorted_by_value(SortDirection::Descending),
        sales_by_state: sales_by(&rows, Dimension::State)?.sorted_by_key(),
        sales_by_segment: sales_by(&rows, Dimension::Segment)?.sorted_by_key(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopPerformers {
    /// Sub-categories by total sales, largest first
    pub top_products: AggregationResult,
    pub top_segments: AggregationResult,
}

pub fn top_performers<R: Row>(rows: &[R], spec: &FilterSpec, n: usize) -> Result<TopPerformers> {
    let rows = filtered(rows, spec)?;
    Ok(TopPerformers {
        top_products: top_n(&sales_by(&rows, Dimension::SubCategory)?, n, SortDirection::Descending),
        top_segments: top_n(&sales_by(&rows, Dimension::Segment)?, n, SortDirection::Descending),
    })
}

/// One order in a top-customers ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerOrder {
    pub customer_name: String,
    pub order_id: String,
    pub total_sales: f64,
    pub margin: f64,
}

impl CustomerOrder {
    fn from_row<R: Row>(row: &R) -> Self {
        let record = row.record();
        Self {
            customer_name: record.customer_name.clone(),
            order_id: record.order_id.clone(),
            total_sales: record.total_sales,
            margin: record.margin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopCustomers {
    /// Largest single orders by total sales, smallest of them first
    pub by_sales: Vec<CustomerOrder>,
    /// Largest single orders by margin, smallest of them first
    pub by_margin: Vec<CustomerOrder>,
}

/// Ranks individual orders, not customer totals.
pub fn top_customers<R: Row>(rows: &[R], spec: &FilterSpec, n: usize) -> Result<TopCustomers> {
    let rows = filtered(rows, spec)?;
    let ranked = |measure: Measure| -> Result<Vec<CustomerOrder>> {
        Ok(rank_rows(&rows, &measure, n, SortDirection::Ascending)?
            .into_iter()
            .map(CustomerOrder::from_row)
            .collect())
    };
    Ok(TopCustomers {
        by_sales: ranked(Measure::TotalSales)?,
        by_margin: ranked(Measure::Margin)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendMode {
    Periodic,
    Cumulative,
}

impl FromStr for TrendMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "periodic" | "trend" => Ok(TrendMode::Periodic),
            "cumulative" => Ok(TrendMode::Cumulative),
            other => Err(EngineError::InvalidParameter(format!("unknown trend mode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTrend {
    pub granularity: Granularity,
    pub mode: TrendMode,
    /// Total sales by (category, period), ordered by period
    pub periodic: AggregationResult,
    /// Present in cumulative mode only
    pub cumulative: Option<CumulativeTable>,
}

pub fn category_trend<R: Row>(
    rows: &[R],
    spec: &FilterSpec,
    granularity: Granularity,
    mode: TrendMode,
) -> Result<CategoryTrend> {
    let rows = filtered(rows, spec)?;
    let bucketed = bucket(&rows, granularity);
    let periodic = group_and_reduce(
        &bucketed,
        &[Dimension::Category, Dimension::Period],
        &Measure::TotalSales,
        Reducer::Sum,
    )?
    .sorted_by_key()
    .sorted_by_dimension(&Dimension::Period)?;

    let running = match mode {
        TrendMode::Periodic => None,
        TrendMode::Cumulative => Some(cumulative(&periodic, &Dimension::Category, &Dimension::Period)?),
    };

    Ok(CategoryTrend {
        granularity,
        mode,
        periodic,
        cumulative: running,
    })
}

/// Total sales per state, for the choropleth page.
pub fn state_map<R: Row>(rows: &[R], spec: &FilterSpec) -> Result<AggregationResult> {
    let rows = filtered(rows, spec)?;
    Ok(sales_by(&rows, Dimension::State)?.sorted_by_key())
}
