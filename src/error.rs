// src/error.rs

use thiserror::Error;

/// Which side of a [`Dataset`](crate::Dataset) a lookup or size check refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataAxis {
    Variables,
    Objects,
}

impl std::fmt::Display for DataAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataAxis::Variables => write!(f, "variable"),
            DataAxis::Objects => write!(f, "object"),
        }
    }
}

/// Errors raised by dataset manipulation, preprocessing and model fitting.
///
/// Numerical degeneracies (zero variance, singular normal equations, constant
/// reference values) are not represented here: they surface as NaN or infinite
/// values in the results.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Row {row} has {found} values, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Dimension mismatch in {context}: expected {expected} {axis}s, got {found}")]
    DimensionMismatch {
        context: &'static str,
        axis: DataAxis,
        expected: usize,
        found: usize,
    },

    #[error("No {axis} named '{name}'")]
    NotFound { axis: DataAxis, name: String },

    #[error("{axis} index {index} is out of range (size {len})")]
    IndexOutOfRange {
        axis: DataAxis,
        index: usize,
        len: usize,
    },

    #[error("Unknown cross-validation method '{0}'")]
    InvalidMethod(String),

    #[error("Unknown autoscale mode '{0}'")]
    InvalidAutoscale(String),

    #[error("Reference values are required for {0}")]
    MissingReference(&'static str),

    #[error("Response must have exactly one variable, got {0}")]
    InvalidResponse(usize),

    #[error("At least {required} objects are needed, got {found}")]
    InsufficientObjects { required: usize, found: usize },

    #[error("Model is not calibrated")]
    NotCalibrated,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model persistence error: {0}")]
    Persistence(String),
}

/// Result type for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;
