pub mod aggregate;
pub mod bucket;
pub mod compare;
pub mod config;
pub mod cumulative;
pub mod dataset;
pub mod error;
pub mod export;
pub mod fields;
pub mod filter;
pub mod loader;
pub mod metrics;
pub mod record;
pub mod views;

pub use aggregate::{group_and_reduce, merge, top_n, AggregationResult, Reducer, SortDirection};
pub use bucket::{bucket, period_start, Granularity};
pub use compare::{compare, compare_states, Comparison};
pub use cumulative::{cumulative, CumulativeTable};
pub use dataset::{Dataset, DomainCatalog};
pub use error::{EngineError, LoadError, Result, ValidationError};
pub use fields::{Dimension, KeyValue, Measure, Row};
pub use filter::{apply, DateRange, FilterSpec};
pub use record::{validate, RawSalesRow, SalesRecord};
