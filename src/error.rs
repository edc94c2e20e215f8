use thiserror::Error;

/// A raw row that could not be turned into a `SalesRecord`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("row {row}: column '{column}' is empty")]
    EmptyField { row: usize, column: &'static str },

    #[error("row {row}: unparseable date '{value}'")]
    InvalidDate { row: usize, value: String },

    #[error("row {row}: column '{column}' is not numeric: '{value}'")]
    NotNumeric {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: column '{column}' is negative: {value}")]
    Negative {
        row: usize,
        column: &'static str,
        value: f64,
    },

    #[error("row {row}: column '{column}' is {supplied} but recomputes to {expected}")]
    DerivedMismatch {
        row: usize,
        column: &'static str,
        supplied: f64,
        expected: f64,
    },
}

impl ValidationError {
    pub fn row(&self) -> usize {
        match self {
            ValidationError::EmptyField { row, .. }
            | ValidationError::InvalidDate { row, .. }
            | ValidationError::NotNumeric { row, .. }
            | ValidationError::Negative { row, .. }
            | ValidationError::DerivedMismatch { row, .. } => *row,
        }
    }
}

/// Failures raised while reading a source into a `Dataset`.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which side of a two-way comparison came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ComparisonSide {
    A,
    B,
    Both,
}

impl std::fmt::Display for ComparisonSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComparisonSide::A => write!(f, "first"),
            ComparisonSide::B => write!(f, "second"),
            ComparisonSide::Both => write!(f, "both"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("No rows match the selected filters")]
    EmptyResult,

    #[error("No data for the {side} side of the comparison ({dimension})")]
    EmptyComparison {
        dimension: String,
        side: ComparisonSide,
    },

    #[error("Dimension '{0}' is not available on these rows")]
    UnknownDimension(String),

    #[error("Measure '{0}' is not available on these rows")]
    UnknownMeasure(String),

    #[error("Measure '{measure}' is not numeric in order {order_id}: '{value}'")]
    NonNumericMeasure {
        measure: String,
        order_id: String,
        value: String,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Results cannot be merged: {0}")]
    IncompatibleResults(String),

    #[error("Execution error: {0}")]
    Execution(String),
}

impl From<polars::error::PolarsError> for EngineError {
    fn from(e: polars::error::PolarsError) -> Self {
        EngineError::Execution(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
