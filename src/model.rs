// src/model.rs

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::dataset::Dataset;
use crate::error::{AnalysisError, AnalysisResult};
use crate::mlr::RegressionResult;
use crate::pca::PcaResult;

/// Common interface of the decomposition and regression models.
///
/// `y` carries reference values: the response for regression, and the optional
/// stratification variable of venetian blinds for decomposition.
pub trait Model {
    /// Fits the model on `x`. On error the previous fit (if any) is kept.
    fn calibrate(&mut self, x: &Dataset, y: Option<&Dataset>) -> AnalysisResult<()>;

    /// Applies the calibrated model to new data.
    fn predict(&self, x: &Dataset, y: Option<&Dataset>) -> AnalysisResult<ModelOutput>;

    /// Runs the configured cross-validation against `x`, returning `None` when it is disabled.
    fn crossvalidate(&self, x: &Dataset, y: Option<&Dataset>) -> AnalysisResult<Option<ModelOutput>>;

    fn is_calibrated(&self) -> bool;
}

/// Result of [`Model::predict`] or [`Model::crossvalidate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ModelOutput {
    Decomposition(PcaResult),
    Regression(RegressionResult),
}

impl ModelOutput {
    pub fn as_decomposition(&self) -> Option<&PcaResult> {
        match self {
            ModelOutput::Decomposition(res) => Some(res),
            ModelOutput::Regression(_) => None,
        }
    }

    pub fn as_regression(&self) -> Option<&RegressionResult> {
        match self {
            ModelOutput::Regression(res) => Some(res),
            ModelOutput::Decomposition(_) => None,
        }
    }

    pub fn into_decomposition(self) -> Option<PcaResult> {
        match self {
            ModelOutput::Decomposition(res) => Some(res),
            ModelOutput::Regression(_) => None,
        }
    }

    pub fn into_regression(self) -> Option<RegressionResult> {
        match self {
            ModelOutput::Regression(res) => Some(res),
            ModelOutput::Decomposition(_) => None,
        }
    }

    pub fn info(&self) -> &str {
        match self {
            ModelOutput::Decomposition(res) => &res.info,
            ModelOutput::Regression(res) => &res.info,
        }
    }
}

/// Writes `value` to `path` with bincode's standard configuration.
pub(crate) fn save_bincode<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> AnalysisResult<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    bincode::serde::encode_into_std_write(value, &mut writer, bincode::config::standard())
        .map_err(|e| AnalysisError::Persistence(format!("Failed to serialize model: {}", e)))?;
    writer.flush()?;
    Ok(())
}

pub(crate) fn load_bincode<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> AnalysisResult<T> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::new(file);
    bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
        .map_err(|e| AnalysisError::Persistence(format!("Failed to deserialize model: {}", e)))
}
