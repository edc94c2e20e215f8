//! Sales Record Model
//!
//! Typed representation of one sales transaction, plus validation of the raw
//! string rows handed over by a loader.

use crate::error::ValidationError;
use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const COL_DATE: &str = "Date";
pub const COL_ORDER_ID: &str = "Order ID";
pub const COL_CUSTOMER_NAME: &str = "Customer Name";
pub const COL_CUSTOMER_SEGMENT: &str = "Customer Segment";
pub const COL_CITY: &str = "City";
pub const COL_STATE: &str = "State";
pub const COL_PRODUCT_CATEGORY: &str = "Product Category";
pub const COL_PRODUCT_SUB_CATEGORY: &str = "Product Sub-Category";
pub const COL_UNITS_SOLD: &str = "Units Sold";
pub const COL_UNIT_COST: &str = "Unit Cost";
pub const COL_UNIT_PRICE: &str = "Unit Price";
pub const COL_TOTAL_COST: &str = "Total Cost";
pub const COL_TOTAL_SALES: &str = "Total Sales";
pub const COL_MARGIN: &str = "Margin";
pub const COL_MARGIN_PERCENT: &str = "Margin %";

/// Columns every source must provide.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    COL_DATE,
    COL_ORDER_ID,
    COL_CUSTOMER_NAME,
    COL_CUSTOMER_SEGMENT,
    COL_CITY,
    COL_STATE,
    COL_PRODUCT_CATEGORY,
    COL_PRODUCT_SUB_CATEGORY,
    COL_UNITS_SOLD,
    COL_UNIT_COST,
    COL_UNIT_PRICE,
];

/// Precomputed columns that are cross-checked when present.
pub const DERIVED_COLUMNS: [&str; 4] = [
    COL_TOTAL_COST,
    COL_TOTAL_SALES,
    COL_MARGIN,
    COL_MARGIN_PERCENT,
];

const MONEY_TOLERANCE: f64 = 0.01 + 1e-6;

lazy_static! {
    static ref DECIMAL: Regex = Regex::new(r"^-?\d+(\.\d*)?([Ee][+-]?\d+)?$").expect("valid decimal regex");
    static ref INTEGER: Regex = Regex::new(r"^-?\d+(\.0+)?$").expect("valid integer regex");
}

/// One row as read from a delimited source, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSalesRow {
    /// 1-based data row number, used in error messages
    pub row: usize,
    pub date: String,
    pub order_id: String,
    pub customer_name: String,
    pub customer_segment: String,
    pub city: String,
    pub state: String,
    pub product_category: String,
    pub product_sub_category: String,
    pub units_sold: String,
    pub unit_cost: String,
    pub unit_price: String,
    pub total_cost: Option<String>,
    pub total_sales: Option<String>,
    pub margin: Option<String>,
    pub margin_percent: Option<String>,
    /// Columns outside the fixed schema, passed through untouched
    pub extra: BTreeMap<String, String>,
}

/// A validated sales transaction with its derived money fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub order_id: String,
    pub customer_name: String,
    pub customer_segment: String,
    pub city: String,
    pub state: String,
    pub product_category: String,
    pub product_sub_category: String,
    pub units_sold: u64,
    pub unit_cost: f64,
    pub unit_price: f64,
    pub total_cost: f64,
    pub total_sales: f64,
    pub margin: f64,
    pub margin_percent: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// The four derived fields, always computed with the same formulas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derived {
    pub total_cost: f64,
    pub total_sales: f64,
    pub margin: f64,
    pub margin_percent: f64,
}

impl Derived {
    pub fn compute(units_sold: u64, unit_cost: f64, unit_price: f64) -> Self {
        let units = units_sold as f64;
        let cost = units * unit_cost;
        let sales = units * unit_price;
        let margin = sales - cost;
        let margin_percent = if sales == 0.0 {
            0.0
        } else {
            margin / sales * 100.0
        };

        Self {
            total_cost: round2(cost),
            total_sales: round2(sales),
            margin: round2(margin),
            margin_percent: round2(margin_percent),
        }
    }
}

impl SalesRecord {
    /// True when the unit price is below the unit cost.
    ///
    /// Such rows are accepted as legitimate loss-leader sales; the loader only
    /// reports them as a data-quality signal.
    pub fn is_loss_leader(&self) -> bool {
        self.unit_price < self.unit_cost
    }
}

/// Validate a raw row into a `SalesRecord`.
///
/// Derived fields are always recomputed from units, cost and price. When the
/// row also carries precomputed values they must agree within a cent.
pub fn validate(raw: &RawSalesRow) -> Result<SalesRecord, ValidationError> {
    let row = raw.row;

    let date = parse_date(row, &raw.date)?;
    let order_id = required(row, COL_ORDER_ID, &raw.order_id)?;
    let customer_name = required(row, COL_CUSTOMER_NAME, &raw.customer_name)?;
    let customer_segment = required(row, COL_CUSTOMER_SEGMENT, &raw.customer_segment)?;
    let city = required(row, COL_CITY, &raw.city)?;
    let state = required(row, COL_STATE, &raw.state)?;
    let product_category = required(row, COL_PRODUCT_CATEGORY, &raw.product_category)?;
    let product_sub_category =
        required(row, COL_PRODUCT_SUB_CATEGORY, &raw.product_sub_category)?;

    let units_sold = parse_units(row, &raw.units_sold)?;
    let unit_cost = parse_money(row, COL_UNIT_COST, &raw.unit_cost)?;
    let unit_price = parse_money(row, COL_UNIT_PRICE, &raw.unit_price)?;

    let derived = Derived::compute(units_sold, unit_cost, unit_price);

    cross_check(row, COL_TOTAL_COST, raw.total_cost.as_deref(), derived.total_cost)?;
    cross_check(row, COL_TOTAL_SALES, raw.total_sales.as_deref(), derived.total_sales)?;
    cross_check(row, COL_MARGIN, raw.margin.as_deref(), derived.margin)?;
    cross_check(
        row,
        COL_MARGIN_PERCENT,
        raw.margin_percent.as_deref(),
        derived.margin_percent,
    )?;

    Ok(SalesRecord {
        date,
        order_id,
        customer_name,
        customer_segment,
        city,
        state,
        product_category,
        product_sub_category,
        units_sold,
        unit_cost,
        unit_price,
        total_cost: derived.total_cost,
        total_sales: derived.total_sales,
        margin: derived.margin,
        margin_percent: derived.margin_percent,
        extra: raw.extra.clone(),
    })
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse a calendar date. Accepts ISO dates, US-style dates and ISO
/// timestamps at midnight (as written by spreadsheet round trips).
pub fn parse_date(row: usize, value: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%m/%d/%Y"))
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .map_err(|_| ValidationError::InvalidDate {
            row,
            value: value.to_string(),
        })
}

/// Strip a trailing percent sign and thousands separators.
pub fn clean_numeric(value: &str) -> String {
    value
        .trim()
        .trim_end_matches('%')
        .trim()
        .replace(',', "")
}

fn required(row: usize, column: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField { row, column });
    }
    Ok(trimmed.to_string())
}

fn parse_decimal(row: usize, column: &'static str, value: &str) -> Result<f64, ValidationError> {
    let cleaned = clean_numeric(value);
    if !DECIMAL.is_match(&cleaned) {
        return Err(ValidationError::NotNumeric {
            row,
            column,
            value: value.to_string(),
        });
    }
    cleaned.parse::<f64>().map_err(|_| ValidationError::NotNumeric {
        row,
        column,
        value: value.to_string(),
    })
}

fn parse_money(row: usize, column: &'static str, value: &str) -> Result<f64, ValidationError> {
    let parsed = parse_decimal(row, column, value)?;
    if parsed < 0.0 {
        return Err(ValidationError::Negative {
            row,
            column,
            value: parsed,
        });
    }
    Ok(parsed)
}

fn parse_units(row: usize, value: &str) -> Result<u64, ValidationError> {
    let cleaned = clean_numeric(value);
    if !INTEGER.is_match(&cleaned) {
        return Err(ValidationError::NotNumeric {
            row,
            column: COL_UNITS_SOLD,
            value: value.to_string(),
        });
    }
    let whole = cleaned.split('.').next().unwrap_or_default();
    if whole.starts_with('-') {
        let parsed = whole.parse::<f64>().unwrap_or_default();
        if parsed != 0.0 {
            return Err(ValidationError::Negative {
                row,
                column: COL_UNITS_SOLD,
                value: parsed,
            });
        }
        return Ok(0);
    }
    whole.parse::<u64>().map_err(|_| ValidationError::NotNumeric {
        row,
        column: COL_UNITS_SOLD,
        value: value.to_string(),
    })
}

fn cross_check(
    row: usize,
    column: &'static str,
    supplied: Option<&str>,
    expected: f64,
) -> Result<(), ValidationError> {
    let Some(raw) = supplied else {
        return Ok(());
    };
    if raw.trim().is_empty() {
        return Ok(());
    }
    let supplied = parse_decimal(row, column, raw)?;
    if (supplied - expected).abs() > MONEY_TOLERANCE {
        return Err(ValidationError::DerivedMismatch {
            row,
            column,
            supplied,
            expected,
        });
    }
    Ok(())
}
