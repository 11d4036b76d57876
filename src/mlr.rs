// src/mlr.rs

use log::{debug, info, warn};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::crossval::{CrossValidation, CvPlan, OutOfFold, Segment};
use crate::dataset::{component_names, default_axis, Dataset, Selector};
use crate::error::{AnalysisError, AnalysisResult, DataAxis};
use crate::linalg::{BackendInverse, NdarrayLinAlgBackend};
use crate::model::{load_bincode, save_bincode, Model, ModelOutput};
use crate::prep::{Autoscale, Preprocessing};
use crate::stats::{regression_stats, RegressionStats};

/// Settings of an [`MlrModel`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MlrConfig {
    /// Applied to both predictors and response.
    pub autoscale: Autoscale,
    pub cv: CrossValidation,
}

impl Default for MlrConfig {
    fn default() -> Self {
        Self {
            autoscale: Autoscale::CenterOnly,
            cv: CrossValidation::none(),
        }
    }
}

impl MlrConfig {
    pub fn with_autoscale(mut self, autoscale: Autoscale) -> Self {
        self.autoscale = autoscale;
        self
    }

    pub fn with_cv(mut self, cv: CrossValidation) -> Self {
        self.cv = cv;
        self
    }
}

/// Predicted response values, with statistics when reference values were given.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionResult {
    /// `(ncomp, n_obj)` predictions, named after the response.
    pub yp: Dataset,
    /// Reference values, one variable.
    pub y: Option<Dataset>,
    pub stats: Option<RegressionStats>,
    pub info: String,
}

impl RegressionResult {
    /// # Errors
    /// `InvalidResponse` if `y` has more than one variable, `DimensionMismatch` if it
    /// does not have one value per predicted object.
    pub fn new(yp: Dataset, y: Option<&Dataset>, info: impl Into<String>) -> AnalysisResult<Self> {
        let stats = match y {
            Some(y) => {
                check_response(y, yp.n_obj())?;
                Some(regression_stats(yp.values().view(), y.values().row(0))?)
            }
            None => None,
        };
        Ok(Self {
            yp,
            y: y.cloned(),
            stats,
            info: info.into(),
        })
    }

    pub fn ncomp(&self) -> usize {
        self.yp.n_var()
    }

    /// `Bias`/`R2`/`RMSE` as a dataset, when reference values are known.
    pub fn stat(&self) -> Option<Dataset> {
        self.stats.as_ref().map(RegressionStats::to_dataset)
    }

    /// `y - yp` for every component count.
    pub fn residuals(&self) -> Option<Array2<f64>> {
        self.y
            .as_ref()
            .map(|y| &y.values().row(0).insert_axis(Axis(0)) - self.yp.values())
    }
}

fn check_response(y: &Dataset, n_obj: usize) -> AnalysisResult<()> {
    if y.n_var() != 1 {
        return Err(AnalysisError::InvalidResponse(y.n_var()));
    }
    if y.n_obj() != n_obj {
        return Err(AnalysisError::DimensionMismatch {
            context: "response",
            axis: DataAxis::Objects,
            expected: n_obj,
            found: y.n_obj(),
        });
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct MlrFit {
    /// One row (`Coefficients`), one object per predictor.
    coeffs: Dataset,
    x_prep: Preprocessing,
    y_prep: Preprocessing,
    response: String,
}

impl MlrFit {
    fn estimate(x: &Dataset, y: &Dataset, autoscale: Autoscale) -> AnalysisResult<Self> {
        let x_prep = Preprocessing::fit(x.values().view(), autoscale);
        let y_prep = Preprocessing::fit(y.values().view(), autoscale);
        let xs = x_prep.apply(x.values().view())?;
        let ys = y_prep.apply(y.values().view())?;

        let xxt = xs.dot(&xs.t());
        let values = match NdarrayLinAlgBackend.inverse(&xxt) {
            Ok(inv) => ys.dot(&xs.t()).dot(&inv),
            Err(e) => {
                warn!("Normal equations are singular ({}); coefficients set to NaN.", e);
                Array2::from_elem((1, x.n_var()), f64::NAN)
            }
        };

        let coeffs = Dataset::new(values)
            .with_var_names(["Coefficients"])
            .with_obj_names(x.var_names().to_vec())
            .with_name("Regression coefficients")
            .with_var_axis("Components", None)
            .with_obj_axis(x.var_axis_name(), Some(x.var_axis_values().to_vec()));

        Ok(Self {
            coeffs,
            x_prep,
            y_prep,
            response: y.var_names()[0].clone(),
        })
    }

    fn n_var(&self) -> usize {
        self.coeffs.n_obj()
    }

    /// Predictions in the original response units, shape `(1, n_obj)`.
    fn predict_values(&self, x: &Dataset) -> AnalysisResult<Array2<f64>> {
        if x.n_var() != self.n_var() {
            return Err(AnalysisError::DimensionMismatch {
                context: "MLR prediction",
                axis: DataAxis::Variables,
                expected: self.n_var(),
                found: x.n_var(),
            });
        }
        let xs = self.x_prep.apply(x.values().view())?;
        let yp = self.coeffs.values().dot(&xs);
        self.y_prep.restore(yp.view())
    }

    fn result(&self, x: &Dataset, y: Option<&Dataset>, info: &str) -> AnalysisResult<RegressionResult> {
        let yp = self.predict_values(x)?;
        let objects = y.unwrap_or(x);
        RegressionResult::new(prediction_dataset(yp, objects, &self.response), y, info)
    }

    fn validate(&self) -> AnalysisResult<()> {
        if self.coeffs.n_var() != 1 {
            return Err(AnalysisError::Persistence(format!(
                "Loaded MLR model has {} coefficient rows, expected 1.",
                self.coeffs.n_var()
            )));
        }
        if let Some(n) = self.x_prep.n_var() {
            if n != self.n_var() {
                return Err(AnalysisError::Persistence(format!(
                    "Loaded MLR model has {} preprocessing entries for {} predictors.",
                    n,
                    self.n_var()
                )));
            }
        }
        if let Some(n) = self.y_prep.n_var() {
            if n != 1 {
                return Err(AnalysisError::Persistence(format!(
                    "Loaded MLR model has {} response preprocessing entries, expected 1.",
                    n
                )));
            }
        }
        Ok(())
    }
}

fn prediction_dataset(values: Array2<f64>, objects: &Dataset, response: &str) -> Dataset {
    let ncomp = values.nrows();
    Dataset::new(values)
        .with_var_names(component_names(ncomp))
        .with_obj_names(objects.obj_names().to_vec())
        .with_name(response)
        .with_var_axis("Components", Some(default_axis(ncomp)))
        .with_obj_axis(objects.obj_axis_name(), Some(objects.obj_axis_values().to_vec()))
}

fn fold_fit(config: &MlrConfig, x: &Dataset, y: &Dataset, segment: &Segment) -> AnalysisResult<MlrFit> {
    let xc = x.subset(Selector::All, segment.cal.as_slice())?;
    let yc = y.subset(Selector::All, segment.cal.as_slice())?;
    MlrFit::estimate(&xc, &yc, config.autoscale)
}

fn cross_validate(config: &MlrConfig, x: &Dataset, y: &Dataset) -> AnalysisResult<Option<RegressionResult>> {
    let n_obj = y.n_obj();
    let plan = CvPlan::build(&config.cv, n_obj, Some(y.values().row(0)))?;
    if plan.is_empty() {
        return Ok(None);
    }

    let mut yp = OutOfFold::new(1, n_obj);
    for (r, segments) in plan.indices().iter().enumerate() {
        for (s, segment) in segments.iter().enumerate() {
            if segment.val.is_empty() {
                continue;
            }
            debug!(
                "MLR cross-validation: repetition {}, segment {} ({} held out).",
                r + 1,
                s + 1,
                segment.val.len()
            );
            let xt = x.subset(Selector::All, segment.val.as_slice())?;
            let fold = fold_fit(config, x, y, segment)?.predict_values(&xt)?;
            yp.scatter(&segment.val, fold.view());
        }
        yp.finish_repetition();
    }

    let yp = prediction_dataset(yp.mean(), y, &y.var_names()[0]);
    RegressionResult::new(yp, Some(y), "Cross-validation results").map(Some)
}

/// Multiple linear regression of one response on all predictors, solved through
/// the normal equations.
///
/// A singular `XXᵗ` is not an error: the coefficients become NaN and so do all
/// predictions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MlrModel {
    config: MlrConfig,
    fit: Option<MlrFit>,
    calres: Option<RegressionResult>,
    cvres: Option<RegressionResult>,
}

impl MlrModel {
    pub fn new(config: MlrConfig) -> Self {
        Self {
            config,
            fit: None,
            calres: None,
            cvres: None,
        }
    }

    pub fn config(&self) -> &MlrConfig {
        &self.config
    }

    /// MLR always has a single component.
    pub fn ncomp(&self) -> usize {
        1
    }

    pub fn coefficients(&self) -> Option<&Dataset> {
        self.fit.as_ref().map(|f| &f.coeffs)
    }

    pub fn x_preprocessing(&self) -> Option<&Preprocessing> {
        self.fit.as_ref().map(|f| &f.x_prep)
    }

    pub fn y_preprocessing(&self) -> Option<&Preprocessing> {
        self.fit.as_ref().map(|f| &f.y_prep)
    }

    pub fn calres(&self) -> Option<&RegressionResult> {
        self.calres.as_ref()
    }

    pub fn cvres(&self) -> Option<&RegressionResult> {
        self.cvres.as_ref()
    }

    fn fitted(&self) -> AnalysisResult<&MlrFit> {
        self.fit.as_ref().ok_or(AnalysisError::NotCalibrated)
    }

    /// Predicts `x` with the calibrated model, scoring against `y` when given.
    pub fn estimate(&self, x: &Dataset, y: Option<&Dataset>) -> AnalysisResult<RegressionResult> {
        self.fitted()?.result(x, y, "Test results")
    }

    /// Fits a fresh model on the `cal` objects of `segment` and predicts its `val`
    /// objects, scored against their reference values.
    pub fn predict_fold(&self, x: &Dataset, y: &Dataset, segment: &Segment) -> AnalysisResult<RegressionResult> {
        check_response(y, x.n_obj())?;
        let xt = x.subset(Selector::All, segment.val.as_slice())?;
        let yt = y.subset(Selector::All, segment.val.as_slice())?;
        fold_fit(&self.config, x, y, segment)?.result(&xt, Some(&yt), "Cross-validation fold")
    }

    /// Calibration statistics, with cross-validation statistics appended when
    /// available. Objects are named `Cal` and `CV`.
    pub fn summary(&self) -> AnalysisResult<Dataset> {
        let cal = self
            .calres
            .as_ref()
            .and_then(RegressionResult::stat)
            .ok_or(AnalysisError::NotCalibrated)?;
        match self.cvres.as_ref().and_then(RegressionResult::stat) {
            Some(cv) => Ok(cal.rbind(&cv)?.with_obj_names(["Cal", "CV"])),
            None => Ok(cal.with_obj_names(["Cal"])),
        }
    }

    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> AnalysisResult<()> {
        self.fitted()?;
        save_bincode(self, path)
    }

    pub fn load_model<P: AsRef<Path>>(path: P) -> AnalysisResult<Self> {
        let model: MlrModel = load_bincode(path)?;
        model
            .fit
            .as_ref()
            .ok_or_else(|| AnalysisError::Persistence("Loaded MLR model is not calibrated.".into()))?
            .validate()?;
        Ok(model)
    }
}

impl Model for MlrModel {
    /// Fits the coefficients of `y` (exactly one variable) on `x`.
    fn calibrate(&mut self, x: &Dataset, y: Option<&Dataset>) -> AnalysisResult<()> {
        let y = y.ok_or(AnalysisError::MissingReference("regression"))?;
        check_response(y, x.n_obj())?;
        if x.n_obj() == 0 {
            return Err(AnalysisError::InsufficientObjects {
                required: 1,
                found: 0,
            });
        }
        if x.n_var() == 0 {
            return Err(AnalysisError::DimensionMismatch {
                context: "MLR calibration",
                axis: DataAxis::Variables,
                expected: 1,
                found: 0,
            });
        }

        let fit = MlrFit::estimate(x, y, self.config.autoscale)?;
        let calres = fit.result(x, Some(y), "Calibration results")?;
        let cvres = cross_validate(&self.config, x, y)?;

        if let Some(stats) = &calres.stats {
            info!(
                "Calibrated MLR model: {} predictors, {} objects, R2 = {:.4}, RMSE = {:.4}.",
                x.n_var(),
                x.n_obj(),
                stats.r2[0],
                stats.rmse[0]
            );
        }

        self.fit = Some(fit);
        self.calres = Some(calres);
        self.cvres = cvres;
        Ok(())
    }

    fn predict(&self, x: &Dataset, y: Option<&Dataset>) -> AnalysisResult<ModelOutput> {
        self.estimate(x, y).map(ModelOutput::Regression)
    }

    fn crossvalidate(&self, x: &Dataset, y: Option<&Dataset>) -> AnalysisResult<Option<ModelOutput>> {
        let y = y.ok_or(AnalysisError::MissingReference("regression"))?;
        check_response(y, x.n_obj())?;
        Ok(cross_validate(&self.config, x, y)?.map(ModelOutput::Regression))
    }

    fn is_calibrated(&self) -> bool {
        self.fit.is_some()
    }
}
