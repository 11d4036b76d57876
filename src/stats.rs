// src/stats.rs

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::dataset::{component_names, default_axis, row_sd, Dataset};
use crate::error::{AnalysisError, AnalysisResult, DataAxis};

/// Decimal places kept when reporting explained variance.
pub const VARIANCE_DECIMALS: i32 = 2;

/// Prediction performance, one entry per component count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionStats {
    /// Mean of `y - yp`.
    pub bias: Array1<f64>,
    /// `1 - SS_res / SS_tot`, with `SS_tot` taken from the reference values.
    pub r2: Array1<f64>,
    /// `sqrt(SS_res / n_obj)`.
    pub rmse: Array1<f64>,
}

impl RegressionStats {
    /// Packs the statistics as a 3-variable dataset (`Bias`, `R2`, `RMSE`) with one
    /// object per component count.
    pub fn to_dataset(&self) -> Dataset {
        let ncomp = self.bias.len();
        let mut values = Array2::zeros((3, ncomp));
        values.row_mut(0).assign(&self.bias);
        values.row_mut(1).assign(&self.r2);
        values.row_mut(2).assign(&self.rmse);
        Dataset::new(values)
            .with_var_names(["Bias", "R2", "RMSE"])
            .with_obj_names(component_names(ncomp))
            .with_name("Performance statistics")
    }
}

/// Computes bias, R² and RMSE of predictions `yp` (shape `(ncomp, n_obj)`) against a
/// single reference vector `y`.
///
/// A constant reference gives a zero total variance and the resulting NaN or
/// infinite R² is returned as is.
pub fn regression_stats(yp: ArrayView2<f64>, y: ArrayView1<f64>) -> AnalysisResult<RegressionStats> {
    let n_obj = y.len();
    if yp.ncols() != n_obj {
        return Err(AnalysisError::DimensionMismatch {
            context: "regression_stats",
            axis: DataAxis::Objects,
            expected: n_obj,
            found: yp.ncols(),
        });
    }

    let sd = row_sd(y.insert_axis(Axis(0)))[0];
    let full_var = sd * sd * (n_obj as f64 - 1.0);

    let y_err = &y.insert_axis(Axis(0)) - &yp;
    let res_var = y_err.mapv(|e| e * e).sum_axis(Axis(1));

    Ok(RegressionStats {
        bias: y_err.sum_axis(Axis(1)) / n_obj as f64,
        r2: res_var.mapv(|r| 1.0 - r / full_var),
        rmse: res_var.mapv(|r| (r / n_obj as f64).sqrt()),
    })
}

/// Rounds `x` to `decimals` decimal places.
pub fn round_to(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round() / factor
}

/// Splits cumulative explained variance (percent, per component count) into
/// individual contributions. Both vectors are rounded for reporting; the
/// individual values are differenced before rounding.
pub fn explained_variance(cumulative: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let individual = cumulative
        .iter()
        .scan(0.0, |prev, &c| {
            let diff = c - *prev;
            *prev = c;
            Some(round_to(diff, VARIANCE_DECIMALS))
        })
        .collect();
    let cumulative = cumulative
        .iter()
        .map(|&c| round_to(c, VARIANCE_DECIMALS))
        .collect();
    (individual, cumulative)
}

/// Two-variable dataset (`Individual`, `Cumulative`) indexed by component.
pub(crate) fn variance_dataset(individual: Vec<f64>, cumulative: Vec<f64>) -> Dataset {
    let ncomp = individual.len();
    let values = Array2::from_shape_vec((2, ncomp), individual.into_iter().chain(cumulative).collect())
        .unwrap_or_else(|_| Array2::zeros((2, 0)));
    Dataset::new(values)
        .with_var_names(["Individual", "Cumulative"])
        .with_obj_names(component_names(ncomp))
        .with_name("Explained variance")
        .with_obj_axis("Components", Some(default_axis(ncomp)))
}
