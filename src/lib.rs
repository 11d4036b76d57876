// Multivariate analysis: PCA (NIPALS) and MLR with cross-validation

#![doc = include_str!("../README.md")]

pub mod crossval;
pub mod dataset;
pub mod error;
pub mod linalg;
pub mod mlr;
pub mod model;
pub mod pca;
pub mod prep;
pub mod stats;

pub use crossval::{CrossValidation, CvMethod, CvPlan, Segment};
pub use dataset::{Dataset, Selector};
pub use error::{AnalysisError, AnalysisResult, DataAxis};
pub use mlr::{MlrConfig, MlrModel, RegressionResult};
pub use model::{Model, ModelOutput};
pub use pca::{ComponentFit, PcaConfig, PcaModel, PcaResult};
pub use prep::{autoscale, row_mean, row_sd, Autoscale, PrepVector, Preprocessing};
pub use stats::{explained_variance, regression_stats, round_to, RegressionStats};

#[cfg(test)]
mod mlr_tests;
