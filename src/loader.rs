//! Dataset Loader
//!
//! The engine only needs a validated, in-memory `Dataset`. Anything that can
//! produce raw rows implements `DatasetSource`; `load` validates those rows and
//! applies the skip/abort policy.

use crate::dataset::Dataset;
use crate::error::{LoadError, ValidationError};
use crate::record::{self, RawSalesRow, REQUIRED_COLUMNS};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// What to do with a row that fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPolicy {
    /// Drop the row, count it and keep going
    #[default]
    Skip,
    /// Fail the whole load on the first invalid row
    Abort,
}

impl FromStr for LoadPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(LoadPolicy::Skip),
            "abort" => Ok(LoadPolicy::Abort),
            other => Err(format!("expected 'skip' or 'abort', got '{}'", other)),
        }
    }
}

/// Summary of a load.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub source_id: String,
    pub rows_read: usize,
    pub rows_loaded: usize,
    #[serde(skip)]
    pub rejected: Vec<ValidationError>,
    /// Rows whose unit price is below unit cost
    pub loss_leaders: usize,
}

impl LoadReport {
    pub fn rows_rejected(&self) -> usize {
        self.rejected.len()
    }
}

/// Anything that can hand over raw sales rows.
pub trait DatasetSource {
    /// Identifier used in logs and reports
    fn source_id(&self) -> &str;

    /// Read every raw row. Structural problems (missing columns, unreadable
    /// input) are errors here; row-level problems are left to validation.
    fn read_rows(&mut self) -> Result<Vec<RawSalesRow>, LoadError>;
}

/// Delimited text source with the dashboard's fixed column schema.
pub struct CsvSource {
    source_id: String,
    input: CsvInput,
    delimiter: u8,
}

enum CsvInput {
    Path(PathBuf),
    Text(String),
}

impl CsvSource {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            source_id: path.display().to_string(),
            input: CsvInput::Path(path),
            delimiter: b',',
        }
    }

    pub fn from_text(source_id: impl Into<String>, csv_text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            input: CsvInput::Text(csv_text.into()),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn parse<R: Read>(&self, reader: R) -> Result<Vec<RawSalesRow>, LoadError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let index: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, h)| (h.as_str(), idx))
            .collect();

        for column in REQUIRED_COLUMNS {
            if !index.contains_key(column) {
                return Err(LoadError::MissingColumn(column.to_string()));
            }
        }

        let mut rows = Vec::new();
        for (offset, result) in rdr.records().enumerate() {
            let csv_row = result?;
            let cell = |name: &str| -> String {
                index
                    .get(name)
                    .and_then(|&idx| csv_row.get(idx))
                    .unwrap_or("")
                    .to_string()
            };
            let optional = |name: &str| -> Option<String> {
                index.get(name).and_then(|&idx| csv_row.get(idx)).map(str::to_string)
            };

            let extra: BTreeMap<String, String> = headers
                .iter()
                .enumerate()
                .filter(|(_, h)| !is_schema_column(h))
                .map(|(idx, h)| (h.clone(), csv_row.get(idx).unwrap_or("").to_string()))
                .collect();

            rows.push(RawSalesRow {
                row: offset + 1,
                date: cell(record::COL_DATE),
                order_id: cell(record::COL_ORDER_ID),
                customer_name: cell(record::COL_CUSTOMER_NAME),
                customer_segment: cell(record::COL_CUSTOMER_SEGMENT),
                city: cell(record::COL_CITY),
                state: cell(record::COL_STATE),
                product_category: cell(record::COL_PRODUCT_CATEGORY),
                product_sub_category: cell(record::COL_PRODUCT_SUB_CATEGORY),
                units_sold: cell(record::COL_UNITS_SOLD),
                unit_cost: cell(record::COL_UNIT_COST),
                unit_price: cell(record::COL_UNIT_PRICE),
                total_cost: optional(record::COL_TOTAL_COST),
                total_sales: optional(record::COL_TOTAL_SALES),
                margin: optional(record::COL_MARGIN),
                margin_percent: optional(record::COL_MARGIN_PERCENT),
                extra,
            });
        }

        Ok(rows)
    }
}

impl DatasetSource for CsvSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn read_rows(&mut self) -> Result<Vec<RawSalesRow>, LoadError> {
        match &self.input {
            CsvInput::Path(path) => {
                let file = std::fs::File::open(path)?;
                self.parse(file)
            }
            CsvInput::Text(text) => self.parse(text.as_bytes()),
        }
    }
}

fn is_schema_column(header: &str) -> bool {
    REQUIRED_COLUMNS.contains(&header) || record::DERIVED_COLUMNS.contains(&header)
}

/// Read and validate every row of `source` into a `Dataset`.
pub fn load<S: DatasetSource + ?Sized>(
    source: &mut S,
    policy: LoadPolicy,
) -> Result<(Dataset, LoadReport), LoadError> {
    let raw_rows = source.read_rows()?;
    let mut report = LoadReport {
        source_id: source.source_id().to_string(),
        rows_read: raw_rows.len(),
        ..Default::default()
    };

    let mut records = Vec::with_capacity(raw_rows.len());
    for raw in &raw_rows {
        match record::validate(raw) {
            Ok(rec) => {
                if rec.is_loss_leader() {
                    report.loss_leaders += 1;
                }
                records.push(rec);
            }
            Err(e) => match policy {
                LoadPolicy::Abort => return Err(LoadError::Validation(e)),
                LoadPolicy::Skip => {
                    warn!(source = %report.source_id, error = %e, "Skipping invalid row");
                    report.rejected.push(e);
                }
            },
        }
    }

    if report.loss_leaders > 0 {
        warn!(
            source = %report.source_id,
            rows = report.loss_leaders,
            "Rows with unit price below unit cost"
        );
    }

    report.rows_loaded = records.len();
    let dataset = Dataset::new(records);
    debug!(catalog = ?dataset.catalog(), "Domain catalog built");
    info!(
        source = %report.source_id,
        read = report.rows_read,
        loaded = report.rows_loaded,
        rejected = report.rows_rejected(),
        "Dataset loaded"
    );

    Ok((dataset, report))
}

/// Convenience wrapper for the common case of a CSV file on disk.
pub fn load_csv(path: impl AsRef<Path>, policy: LoadPolicy) -> Result<(Dataset, LoadReport), LoadError> {
    let mut source = CsvSource::from_path(path);
    load(&mut source, policy)
}
