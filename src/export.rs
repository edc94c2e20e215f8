//! Export of result tables for a rendering layer.
//!
//! Results become polars `DataFrame`s (one `String` column per dimension, then
//! the reduced value and the group row count), and data frames become JSON rows.

use crate::aggregate::AggregationResult;
use crate::cumulative::CumulativeTable;
use crate::error::Result;
use polars::prelude::*;

pub const COUNT_COLUMN: &str = "count";
pub const CUMULATIVE_COLUMN: &str = "Cumulative";

pub fn to_dataframe(result: &AggregationResult) -> Result<DataFrame> {
    let mut columns: Vec<Series> = Vec::with_capacity(result.dimensions.len() + 2);

    for (idx, dim) in result.dimensions.iter().enumerate() {
        let values: Vec<String> = result
            .rows
            .iter()
            .map(|r| r.key_at(idx).map(|k| k.to_string()).unwrap_or_default())
            .collect();
        columns.push(Series::new(dim.name(), values));
    }

    let values: Vec<f64> = result.values();
    let counts: Vec<u64> = result.rows.iter().map(|r| r.acc.count).collect();
    columns.push(Series::new(result.measure.name(), values));
    columns.push(Series::new(COUNT_COLUMN, counts));

    Ok(DataFrame::new(columns)?)
}

pub fn cumulative_to_dataframe(table: &CumulativeTable) -> Result<DataFrame> {
    let groups: Vec<String> = table.points.iter().map(|p| p.group.to_string()).collect();
    let periods: Vec<String> = table.points.iter().map(|p| p.period.to_string()).collect();
    let values: Vec<f64> = table.points.iter().map(|p| p.value).collect();
    let running: Vec<f64> = table.points.iter().map(|p| p.cumulative).collect();

    Ok(DataFrame::new(vec![
        Series::new(table.group_dimension.name(), groups),
        Series::new(table.period_dimension.name(), periods),
        Series::new(table.measure.name(), values),
        Series::new(CUMULATIVE_COLUMN, running),
    ])?)
}

/// Convert a DataFrame to `{ "columns": [...], "rows": [{...}, ...] }`.
pub fn dataframe_to_json(df: &DataFrame) -> Result<serde_json::Value> {
    let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let mut rows = Vec::with_capacity(df.height());

    for row_idx in 0..df.height() {
        let mut row = serde_json::Map::new();
        for series in df.get_columns() {
            row.insert(series.name().to_string(), series_to_json_value(series, row_idx)?);
        }
        rows.push(serde_json::Value::Object(row));
    }

    Ok(serde_json::json!({
        "rows": rows,
        "columns": columns
    }))
}

fn series_to_json_value(series: &Series, row_idx: usize) -> Result<serde_json::Value> {
    let float = |f: f64| {
        serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    };

    let value = match series.get(row_idx)? {
        AnyValue::Null => serde_json::Value::Null,
        AnyValue::Boolean(b) => serde_json::Value::Bool(b),
        AnyValue::String(s) => serde_json::Value::String(s.to_string()),
        AnyValue::Int32(i) => serde_json::Value::Number(i.into()),
        AnyValue::Int64(i) => serde_json::Value::Number(i.into()),
        AnyValue::UInt32(u) => serde_json::Value::Number(u.into()),
        AnyValue::UInt64(u) => serde_json::Value::Number(u.into()),
        AnyValue::Float32(f) => float(f as f64),
        AnyValue::Float64(f) => float(f),
        other => serde_json::Value::String(other.to_string()),
    };
    Ok(value)
}
