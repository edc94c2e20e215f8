//! Dimensions, measures and the row abstraction the query stages work on.

use crate::error::{EngineError, Result};
use crate::record::{self, SalesRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A categorical (or date-like) field used for grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Date,
    OrderId,
    CustomerName,
    Segment,
    City,
    State,
    Category,
    SubCategory,
    /// Period key assigned by the time bucketer
    Period,
    /// Pass-through column outside the fixed schema
    Extra(String),
}

impl Dimension {
    pub fn name(&self) -> &str {
        match self {
            Dimension::Date => record::COL_DATE,
            Dimension::OrderId => record::COL_ORDER_ID,
            Dimension::CustomerName => record::COL_CUSTOMER_NAME,
            Dimension::Segment => record::COL_CUSTOMER_SEGMENT,
            Dimension::City => record::COL_CITY,
            Dimension::State => record::COL_STATE,
            Dimension::Category => record::COL_PRODUCT_CATEGORY,
            Dimension::SubCategory => record::COL_PRODUCT_SUB_CATEGORY,
            Dimension::Period => "Period",
            Dimension::Extra(name) => name,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = EngineError;

    /// Accepts the column header or a snake_case alias. Anything else is
    /// treated as a pass-through column.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        let dim = match normalized.as_str() {
            "date" => Dimension::Date,
            "order_id" => Dimension::OrderId,
            "customer_name" | "customer" => Dimension::CustomerName,
            "customer_segment" | "segment" => Dimension::Segment,
            "city" => Dimension::City,
            "state" => Dimension::State,
            "product_category" | "category" => Dimension::Category,
            "product_sub_category" | "sub_category" | "product" => Dimension::SubCategory,
            "period" => Dimension::Period,
            "" => return Err(EngineError::UnknownDimension(s.to_string())),
            _ => Dimension::Extra(s.trim().to_string()),
        };
        Ok(dim)
    }
}

/// A numeric field being reduced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Measure {
    UnitsSold,
    UnitCost,
    UnitPrice,
    TotalCost,
    TotalSales,
    Margin,
    MarginPercent,
    Extra(String),
}

impl Measure {
    pub fn name(&self) -> &str {
        match self {
            Measure::UnitsSold => record::COL_UNITS_SOLD,
            Measure::UnitCost => record::COL_UNIT_COST,
            Measure::UnitPrice => record::COL_UNIT_PRICE,
            Measure::TotalCost => record::COL_TOTAL_COST,
            Measure::TotalSales => record::COL_TOTAL_SALES,
            Measure::Margin => record::COL_MARGIN,
            Measure::MarginPercent => record::COL_MARGIN_PERCENT,
            Measure::Extra(name) => name,
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Measure {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s
            .trim()
            .to_lowercase()
            .replace('%', "percent")
            .replace(['-', ' '], "_");
        let measure = match normalized.trim_matches('_') {
            "units_sold" | "units" => Measure::UnitsSold,
            "unit_cost" => Measure::UnitCost,
            "unit_price" => Measure::UnitPrice,
            "total_cost" | "cost" => Measure::TotalCost,
            "total_sales" | "sales" => Measure::TotalSales,
            "margin" => Measure::Margin,
            "margin_percent" => Measure::MarginPercent,
            "" => return Err(EngineError::UnknownMeasure(s.to_string())),
            _ => Measure::Extra(s.trim().to_string()),
        };
        Ok(measure)
    }
}

/// One component of a grouping key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum KeyValue {
    Date(NaiveDate),
    Text(String),
}

impl KeyValue {
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            KeyValue::Date(d) => Some(*d),
            KeyValue::Text(_) => None,
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            KeyValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        KeyValue::Text(s.to_string())
    }
}

impl From<NaiveDate> for KeyValue {
    fn from(d: NaiveDate) -> Self {
        KeyValue::Date(d)
    }
}

/// A row the filter, aggregation and comparison stages can read from.
pub trait Row {
    fn record(&self) -> &SalesRecord;

    /// Value of `dim`, or `None` when this kind of row does not carry it.
    fn dimension(&self, dim: &Dimension) -> Option<KeyValue> {
        record_dimension(self.record(), dim)
    }

    fn measure(&self, measure: &Measure) -> Result<f64> {
        record_measure(self.record(), measure)
    }
}

impl Row for SalesRecord {
    fn record(&self) -> &SalesRecord {
        self
    }
}

impl<T: Row + ?Sized> Row for &T {
    fn record(&self) -> &SalesRecord {
        (**self).record()
    }

    fn dimension(&self, dim: &Dimension) -> Option<KeyValue> {
        (**self).dimension(dim)
    }

    fn measure(&self, measure: &Measure) -> Result<f64> {
        (**self).measure(measure)
    }
}

fn record_dimension(record: &SalesRecord, dim: &Dimension) -> Option<KeyValue> {
    let text = |s: &str| Some(KeyValue::Text(s.to_string()));
    match dim {
        Dimension::Date => Some(KeyValue::Date(record.date)),
        Dimension::OrderId => text(&record.order_id),
        Dimension::CustomerName => text(&record.customer_name),
        Dimension::Segment => text(&record.customer_segment),
        Dimension::City => text(&record.city),
        Dimension::State => text(&record.state),
        Dimension::Category => text(&record.product_category),
        Dimension::SubCategory => text(&record.product_sub_category),
        Dimension::Period => None,
        Dimension::Extra(name) => record.extra.get(name).map(|v| KeyValue::Text(v.clone())),
    }
}

fn record_measure(record: &SalesRecord, measure: &Measure) -> Result<f64> {
    let value = match measure {
        Measure::UnitsSold => record.units_sold as f64,
        Measure::UnitCost => record.unit_cost,
        Measure::UnitPrice => record.unit_price,
        Measure::TotalCost => record.total_cost,
        Measure::TotalSales => record.total_sales,
        Measure::Margin => record.margin,
        Measure::MarginPercent => record.margin_percent,
        Measure::Extra(name) => {
            let raw = record
                .extra
                .get(name)
                .ok_or_else(|| EngineError::UnknownMeasure(name.clone()))?;
            record::clean_numeric(raw)
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| EngineError::NonNumericMeasure {
                    measure: name.clone(),
                    order_id: record.order_id.clone(),
                    value: raw.clone(),
                })?
        }
    };
    Ok(value)
}
