// src/prep.rs

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use crate::dataset::{row_mean, row_sd};
use crate::error::{AnalysisError, AnalysisResult, DataAxis};

/// Which preprocessing steps a model applies before fitting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Autoscale {
    None,
    CenterOnly,
    ScaleOnly,
    #[default]
    CenterAndScale,
}

impl Autoscale {
    pub fn centers(self) -> bool {
        matches!(self, Autoscale::CenterOnly | Autoscale::CenterAndScale)
    }

    pub fn scales(self) -> bool {
        matches!(self, Autoscale::ScaleOnly | Autoscale::CenterAndScale)
    }
}

impl FromStr for Autoscale {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Autoscale::None),
            "center" | "center only" => Ok(Autoscale::CenterOnly),
            "scale" | "scale only" => Ok(Autoscale::ScaleOnly),
            "center+scale" | "center + scale" => Ok(Autoscale::CenterAndScale),
            other => Err(AnalysisError::InvalidAutoscale(other.to_string())),
        }
    }
}

/// Centering or scaling argument for [`autoscale`].
#[derive(Clone, Debug)]
pub enum PrepVector<'a> {
    /// Leave the values untouched.
    Off,
    /// Compute the row mean (centering) or row sample standard deviation (scaling)
    /// from the values being transformed.
    FromData,
    /// Use one value per variable, typically frozen at calibration time.
    Values(ArrayView1<'a, f64>),
}

/// Returns `(values - center) / scale` with the per-variable vectors broadcast
/// across objects.
///
/// A zero scale value yields NaN or infinite entries for that variable; they are
/// propagated, not replaced.
///
/// # Errors
/// `DimensionMismatch` if an explicit vector does not have one entry per variable.
pub fn autoscale(
    values: ArrayView2<f64>,
    center: PrepVector,
    scale: PrepVector,
) -> AnalysisResult<Array2<f64>> {
    let center = resolve_vector(values, center, row_mean)?;
    let scale = resolve_vector(values, scale, row_sd)?;
    Ok(apply_vectors(values, center.as_ref(), scale.as_ref()))
}

fn resolve_vector(
    values: ArrayView2<f64>,
    arg: PrepVector,
    compute: fn(ArrayView2<f64>) -> Array1<f64>,
) -> AnalysisResult<Option<Array1<f64>>> {
    match arg {
        PrepVector::Off => Ok(None),
        PrepVector::FromData => Ok(Some(compute(values))),
        PrepVector::Values(v) => {
            check_len(v.len(), values.nrows())?;
            Ok(Some(v.to_owned()))
        }
    }
}

fn check_len(found: usize, expected: usize) -> AnalysisResult<()> {
    if found != expected {
        return Err(AnalysisError::DimensionMismatch {
            context: "autoscale",
            axis: DataAxis::Variables,
            expected,
            found,
        });
    }
    Ok(())
}

fn apply_vectors(
    values: ArrayView2<f64>,
    center: Option<&Array1<f64>>,
    scale: Option<&Array1<f64>>,
) -> Array2<f64> {
    let mut out = values.to_owned();
    if let Some(c) = center {
        out -= &c.view().insert_axis(Axis(1));
    }
    if let Some(s) = scale {
        out /= &s.view().insert_axis(Axis(1));
    }
    out
}

/// Centering and scaling vectors derived once from a calibration set.
///
/// Later data (validation folds, new samples) is always transformed with these
/// stored vectors; they are never re-estimated from the data being predicted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Preprocessing {
    center: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl Preprocessing {
    /// Estimates the vectors requested by `mode` from `values` (shape `(n_var, n_obj)`).
    pub fn fit(values: ArrayView2<f64>, mode: Autoscale) -> Self {
        Self {
            center: mode.centers().then(|| row_mean(values)),
            scale: mode.scales().then(|| row_sd(values)),
        }
    }

    pub fn center(&self) -> Option<&Array1<f64>> {
        self.center.as_ref()
    }

    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.scale.as_ref()
    }

    /// Number of variables the vectors were fitted on, or `None` for the identity.
    pub fn n_var(&self) -> Option<usize> {
        self.center
            .as_ref()
            .or(self.scale.as_ref())
            .map(|v| v.len())
    }

    /// Centers and scales `values` with the stored vectors.
    pub fn apply(&self, values: ArrayView2<f64>) -> AnalysisResult<Array2<f64>> {
        if let Some(n) = self.n_var() {
            check_len(values.nrows(), n)?;
        }
        Ok(apply_vectors(values, self.center.as_ref(), self.scale.as_ref()))
    }

    /// Inverse of [`apply`](Self::apply): multiplies by the scale and adds the center back.
    pub fn restore(&self, values: ArrayView2<f64>) -> AnalysisResult<Array2<f64>> {
        if let Some(n) = self.n_var() {
            check_len(values.nrows(), n)?;
        }
        let mut out = values.to_owned();
        if let Some(s) = &self.scale {
            out *= &s.view().insert_axis(Axis(1));
        }
        if let Some(c) = &self.center {
            out += &c.view().insert_axis(Axis(1));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_autoscale_gives_zero_mean_unit_sd() {
        let x = array![[1.0, 4.0, 2.0, 8.0, 5.0], [100.0, 80.0, 95.0, 70.0, 60.0]];
        let scaled = autoscale(x.view(), PrepVector::FromData, PrepVector::FromData).unwrap();
        for (m, s) in row_mean(scaled.view()).iter().zip(row_sd(scaled.view()).iter()) {
            assert_abs_diff_eq!(*m, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(*s, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_explicit_vectors_are_used_verbatim() {
        let x = array![[1.0, 2.0], [3.0, 5.0]];
        let c = array![1.0, 1.0];
        let s = array![2.0, 4.0];
        let out = autoscale(x.view(), PrepVector::Values(c.view()), PrepVector::Values(s.view())).unwrap();
        assert_eq!(out, array![[0.0, 0.5], [0.5, 1.0]]);
    }

    #[test]
    fn test_constant_variable_propagates_nan() {
        let x = array![[2.0, 2.0, 2.0], [1.0, 2.0, 3.0]];
        let out = autoscale(x.view(), PrepVector::FromData, PrepVector::FromData).unwrap();
        assert!(out.row(0).iter().all(|v| v.is_nan()));
        assert!(out.row(1).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_vector_length_mismatch() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let c = array![1.0, 2.0, 3.0];
        let err = autoscale(x.view(), PrepVector::Values(c.view()), PrepVector::Off).unwrap_err();
        assert!(matches!(err, AnalysisError::DimensionMismatch { expected: 2, found: 3, .. }));
    }

    #[test]
    fn test_frozen_vectors_are_not_refitted() {
        let cal = array![[1.0, 2.0, 3.0], [10.0, 20.0, 30.0]];
        let prep = Preprocessing::fit(cal.view(), Autoscale::CenterAndScale);
        let new = array![[2.0], [20.0]];
        let out = prep.apply(new.view()).unwrap();
        assert_abs_diff_eq!(out[[0, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[[1, 0]], 0.0, epsilon = 1e-12);

        let back = prep.restore(out.view()).unwrap();
        for (b, n) in back.iter().zip(new.iter()) {
            assert_abs_diff_eq!(*b, *n, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_modes() {
        let x = array![[1.0, 3.0]];
        let none = Preprocessing::fit(x.view(), Autoscale::None);
        assert_eq!(none.n_var(), None);
        assert_eq!(none.apply(x.view()).unwrap(), x);

        let center = Preprocessing::fit(x.view(), Autoscale::CenterOnly);
        assert!(center.scale().is_none());
        assert_eq!(center.apply(x.view()).unwrap(), array![[-1.0, 1.0]]);

        let scale = Preprocessing::fit(x.view(), Autoscale::ScaleOnly);
        assert!(scale.center().is_none());
        assert_abs_diff_eq!(scale.scale().unwrap()[0], 2.0f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_parse_autoscale() {
        assert_eq!("center + scale".parse::<Autoscale>().unwrap(), Autoscale::CenterAndScale);
        assert_eq!("none".parse::<Autoscale>().unwrap(), Autoscale::None);
        let err = "whiten".parse::<Autoscale>().unwrap_err();
        assert!(matches!(&err, AnalysisError::InvalidAutoscale(mode) if mode == "whiten"));
        assert_eq!(err.to_string(), "Unknown autoscale mode 'whiten'");
    }
}
