//! Dashboard View Tests
//!
//! Loads a small CSV through the public loader and drives every page builder
//! against it.

use chrono::NaiveDate;
use sales_slice::aggregate::{group_and_reduce, Reducer};
use sales_slice::bucket::Granularity;
use sales_slice::export::{dataframe_to_json, to_dataframe};
use sales_slice::fields::{Dimension, KeyValue, Measure};
use sales_slice::loader::{load, CsvSource, LoadPolicy};
use sales_slice::views::{self, TrendMode};
use sales_slice::{compare_states, Dataset, EngineError, FilterSpec, LoadError};

const SALES_CSV: &str = "\
Date,Order ID,Customer Name,Customer Segment,City,State,Product Category,Product Sub-Category,Units Sold,Unit Cost,Unit Price,Total Cost,Total Sales,Margin,Margin %,Region,Discount
2024-01-03,ORD-1001,Laura Watson,Consumer,Los Angeles,CA,Furniture,Chairs,2,40.00,75.00,80.00,150.00,70.00,46.67%,West,5
2024-01-17,ORD-1002,Brian Lee,Corporate,Houston,TX,Electronics,Phones,1,300.00,450.00,300.00,450.00,150.00,33.33%,South,0
2024-02-09,ORD-1003,Maria Garcia,Consumer,San Diego,CA,Electronics,Laptops,1,700.00,900.00,700.00,900.00,200.00,22.22%,West,10
2024-02-21,ORD-1004,Ken Adams,Home Office,Austin,TX,Office Supplies,Paper,10,3.00,5.00,30.00,50.00,20.00,40.00%,South,2.5
2024-04-02,ORD-1005,Laura Watson,Consumer,Los Angeles,CA,Office Supplies,Binders,4,6.00,5.00,24.00,20.00,-4.00,-20.00%,West,0
not-a-date,ORD-1006,Sam Hill,Consumer,Fresno,CA,Furniture,Tables,1,100.00,150.00,100.00,150.00,50.00,33.33%,West,0
";

fn load_sample() -> Dataset {
    let mut source = CsvSource::from_text("sample", SALES_CSV);
    let (dataset, report) = load(&mut source, LoadPolicy::Skip).unwrap();
    assert_eq!(report.rows_read, 6);
    assert_eq!(report.rows_loaded, 5);
    assert_eq!(report.rows_rejected(), 1);
    assert_eq!(report.loss_leaders, 1);
    dataset
}

#[test]
fn test_load_builds_catalog() {
    let dataset = load_sample();
    let catalog = dataset.catalog();

    assert_eq!(dataset.len(), 5);
    assert_eq!(catalog.states.iter().map(String::as_str).collect::<Vec<_>>(), vec!["CA", "TX"]);
    assert_eq!(catalog.categories.len(), 3);
    assert_eq!(catalog.min_date, NaiveDate::from_ymd_opt(2024, 1, 3));
    assert_eq!(catalog.max_date, NaiveDate::from_ymd_opt(2024, 4, 2));
    assert_eq!(dataset.records()[0].extra.get("Region").map(String::as_str), Some("West"));
    assert_eq!(dataset.records()[3].extra.get("Discount").map(String::as_str), Some("2.5"));
}

#[test]
fn test_abort_policy_stops_on_bad_row() {
    let mut source = CsvSource::from_text("sample", SALES_CSV);
    let err = load(&mut source, LoadPolicy::Abort).unwrap_err();
    assert!(matches!(err, LoadError::Validation(ref e) if e.row() == 6));
}

#[test]
fn test_overview_headline_and_ordering() {
    let dataset = load_sample();
    let spec = FilterSpec::full(dataset.catalog());
    let view = views::overview(dataset.records(), &spec).unwrap();

    assert_eq!(view.headline.row_count, 5);
    assert!((view.headline.total_sales - 1570.0).abs() < 1e-9);
    assert!((view.headline.total_margin - 436.0).abs() < 1e-9);
    // mean of the per-row percentages, not margin / sales
    assert!((view.headline.avg_margin_percent - 122.22 / 5.0).abs() < 1e-9);

    // categories largest first
    let first = &view.sales_by_category.rows[0];
    assert_eq!(first.key, vec![KeyValue::from("Electronics")]);
    assert!((first.value - 1350.0).abs() < 1e-9);

    let dates: Vec<&KeyValue> = view.sales_over_time.rows.iter().map(|r| &r.key[0]).collect();
    assert!(dates.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_views_report_empty_selection() {
    let dataset = load_sample();
    let spec = FilterSpec::full(dataset.catalog()).with_states(["NY"]);

    assert_eq!(views::overview(dataset.records(), &spec).unwrap_err(), EngineError::EmptyResult);
    assert_eq!(views::state_map(dataset.records(), &spec).unwrap_err(), EngineError::EmptyResult);
    assert_eq!(
        views::category_trend(dataset.records(), &spec, Granularity::Month, TrendMode::Cumulative).unwrap_err(),
        EngineError::EmptyResult
    );
}

#[test]
fn test_top_customers_rank_orders() {
    let dataset = load_sample();
    let spec = FilterSpec::full(dataset.catalog());
    let view = views::top_customers(dataset.records(), &spec, 2).unwrap();

    let ids: Vec<&str> = view.by_sales.iter().map(|o| o.order_id.as_str()).collect();
    assert_eq!(ids, vec!["ORD-1002", "ORD-1003"]);
    let ids: Vec<&str> = view.by_margin.iter().map(|o| o.order_id.as_str()).collect();
    assert_eq!(ids, vec!["ORD-1002", "ORD-1003"]);
}

#[test]
fn test_top_performers() {
    let dataset = load_sample();
    let spec = FilterSpec::full(dataset.catalog());
    let view = views::top_performers(dataset.records(), &spec, 2).unwrap();

    assert_eq!(
        view.top_products.rows.iter().map(|r| r.key[0].to_string()).collect::<Vec<_>>(),
        vec!["Laptops", "Phones"]
    );
    assert_eq!(view.top_products.values(), vec![900.0, 450.0]);
    assert_eq!(
        view.top_segments.rows.iter().map(|r| r.key[0].to_string()).collect::<Vec<_>>(),
        vec!["Consumer", "Corporate"]
    );
    assert!((view.top_segments.rows[0].value - 1070.0).abs() < 1e-9);
}

#[test]
fn test_periodic_monthly_trend_is_ordered_by_period() {
    let dataset = load_sample();
    let spec = FilterSpec::full(dataset.catalog());
    let view = views::category_trend(dataset.records(), &spec, Granularity::Month, TrendMode::Periodic).unwrap();

    assert!(view.cumulative.is_none());
    assert_eq!(view.periodic.len(), 5);
    let periods: Vec<&KeyValue> = view.periodic.rows.iter().map(|r| &r.key[1]).collect();
    assert!(periods.windows(2).all(|w| w[0] <= w[1]));

    let jan = KeyValue::from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(view.periodic.rows[0].key, vec![KeyValue::from("Electronics"), jan.clone()]);
    assert_eq!(view.periodic.rows[1].key, vec![KeyValue::from("Furniture"), jan]);
    assert_eq!(view.periodic.rows[2].value, 900.0);
}

#[test]
fn test_extra_columns_as_dimension_and_measure() {
    let dataset = load_sample();
    let region = Dimension::Extra("Region".to_string());
    let discount = Measure::Extra("Discount".to_string());

    let result = group_and_reduce(dataset.records(), &[region.clone()], &discount, Reducer::Sum).unwrap();
    assert_eq!(result.get(&[KeyValue::from("West")]), Some(15.0));
    assert_eq!(result.get(&[KeyValue::from("South")]), Some(2.5));

    let err = group_and_reduce(dataset.records(), &[], &Measure::Extra("Region".to_string()), Reducer::Sum)
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::NonNumericMeasure {
            measure: "Region".to_string(),
            order_id: "ORD-1001".to_string(),
            value: "West".to_string(),
        }
    );

    let err = group_and_reduce(dataset.records(), &[], &Measure::Extra("Rebate".to_string()), Reducer::Sum)
        .unwrap_err();
    assert_eq!(err, EngineError::UnknownMeasure("Rebate".to_string()));
}

#[test]
fn test_quarterly_cumulative_trend() {
    let dataset = load_sample();
    let spec = FilterSpec::full(dataset.catalog());
    let view = views::category_trend(dataset.records(), &spec, Granularity::Quarter, TrendMode::Cumulative).unwrap();

    let table = view.cumulative.unwrap();
    assert_eq!(table.final_value(&KeyValue::from("Office Supplies")), Some(70.0));
    let office_key = KeyValue::from("Office Supplies");
    let office: Vec<_> = table.series(&office_key).collect();
    assert_eq!(office.len(), 2);
    assert_eq!(office[0].period, KeyValue::from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
    assert_eq!(office[1].period, KeyValue::from(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()));
    assert_eq!(office[0].cumulative, 50.0);
}

#[test]
fn test_compare_states_side_by_side() {
    let dataset = load_sample();
    let spec = FilterSpec::full(dataset.catalog());
    let cmp = compare_states(dataset.records(), &spec, "CA", "TX").unwrap();

    assert_eq!(cmp.a.headline.row_count, 3);
    assert_eq!(cmp.b.headline.row_count, 2);
    assert!((cmp.a.headline.total_sales - 1070.0).abs() < 1e-9);

    let err = compare_states(dataset.records(), &spec, "CA", "NY").unwrap_err();
    assert!(matches!(err, EngineError::EmptyComparison { .. }));
}

#[test]
fn test_state_map_export() {
    let dataset = load_sample();
    let spec = FilterSpec::full(dataset.catalog());
    let result = views::state_map(dataset.records(), &spec).unwrap();
    let json = dataframe_to_json(&to_dataframe(&result).unwrap()).unwrap();

    assert_eq!(json["rows"][0]["State"], "CA");
    assert_eq!(json["rows"][1]["State"], "TX");
    assert_eq!(json["rows"][1]["Total Sales"], 500.0);
    assert_eq!(json["rows"][0]["count"], 3);
}
