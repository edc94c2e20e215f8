//! Headline figures shown above every overview and comparison.

use crate::aggregate::{total, Reducer};
use crate::error::Result;
use crate::fields::{Measure, Row};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Headline {
    pub total_sales: f64,
    pub total_margin: f64,
    /// Mean of per-row margin percent; 0 when there are no rows
    pub avg_margin_percent: f64,
    pub row_count: usize,
}

impl Headline {
    pub fn compute<R: Row>(rows: &[R]) -> Result<Self> {
        Ok(Self {
            total_sales: total(rows, &Measure::TotalSales, Reducer::Sum)?,
            total_margin: total(rows, &Measure::Margin, Reducer::Sum)?,
            avg_margin_percent: total(rows, &Measure::MarginPercent, Reducer::Mean)?,
            row_count: rows.len(),
        })
    }
}
