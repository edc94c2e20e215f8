//! Comparison View Builder
//!
//! Runs one pipeline on two narrowed copies of the same filter and returns the
//! results side by side.

use crate::aggregate::{group_and_reduce, AggregationResult, Reducer, SortDirection};
use crate::error::{ComparisonSide, EngineError, Result};
use crate::fields::{Dimension, Measure, Row};
use crate::filter::{apply, FilterSpec};
use crate::metrics::Headline;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison<T> {
    pub dimension: Dimension,
    pub value_a: String,
    pub value_b: String,
    pub a: T,
    pub b: T,
}

/// Run `pipeline` once for `dimension == value_a` and once for
/// `dimension == value_b`, each on top of `spec`.
///
/// Comparing a value with itself is allowed. If either side has no rows the
/// pipeline is not run and `EngineError::EmptyComparison` names the side.
pub fn compare<R, T, F>(
    rows: &[R],
    spec: &FilterSpec,
    dimension: &Dimension,
    value_a: &str,
    value_b: &str,
    pipeline: F,
) -> Result<Comparison<T>>
where
    R: Row,
    F: Fn(&[&R]) -> Result<T>,
{
    if *dimension == Dimension::Period {
        return Err(EngineError::UnknownDimension(dimension.name().to_string()));
    }

    let spec_a = spec.narrowed(dimension.clone(), value_a);
    let spec_b = spec.narrowed(dimension.clone(), value_b);
    let side_a = apply(rows, &spec_a)?;
    let side_b = apply(rows, &spec_b)?;

    debug!(
        dimension = dimension.name(),
        value_a,
        value_b,
        rows_a = side_a.len(),
        rows_b = side_b.len(),
        "Comparison sides filtered"
    );

    let empty_side = match (side_a.is_empty(), side_b.is_empty()) {
        (true, true) => Some(ComparisonSide::Both),
        (true, false) => Some(ComparisonSide::A),
        (false, true) => Some(ComparisonSide::B),
        (false, false) => None,
    };
    if let Some(side) = empty_side {
        info!(dimension = dimension.name(), value_a, value_b, %side, "Comparison has an empty side");
        return Err(EngineError::EmptyComparison {
            dimension: dimension.name().to_string(),
            side,
        });
    }

    Ok(Comparison {
        dimension: dimension.clone(),
        value_a: value_a.to_string(),
        value_b: value_b.to_string(),
        a: pipeline(&side_a)?,
        b: pipeline(&side_b)?,
    })
}

/// Everything the state comparison page shows for one state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub headline: Headline,
    /// Daily total sales, oldest first
    pub sales_over_time: AggregationResult,
    /// Total sales per category, largest first
    pub sales_by_category: AggregationResult,
}

impl StateSnapshot {
    pub fn build<R: Row>(rows: &[R]) -> Result<Self> {
        Ok(Self {
            headline: Headline::compute(rows)?,
            sales_over_time: group_and_reduce(rows, &[Dimension::Date], &Measure::TotalSales, Reducer::Sum)?
                .sorted_by_key(),
            sales_by_category: group_and_reduce(
                rows,
                &[Dimension::Category],
                &Measure::TotalSales,
                Reducer::Sum,
            )?
            .sorted_by_value(SortDirection::Descending),
        })
    }
}

/// Side-by-side snapshot of two states under the same filter.
pub fn compare_states<R: Row>(
    rows: &[R],
    spec: &FilterSpec,
    state_a: &str,
    state_b: &str,
) -> Result<Comparison<StateSnapshot>> {
    compare(rows, spec, &Dimension::State, state_a, state_b, |side| {
        StateSnapshot::build(side)
    })
}
