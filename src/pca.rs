// src/pca.rs

use log::{debug, info, warn};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::crossval::{reference_values, CrossValidation, CvPlan, OutOfFold, Segment};
use crate::dataset::{component_names, default_axis, row_sd, Dataset, Selector};
use crate::error::{AnalysisError, AnalysisResult, DataAxis};
use crate::model::{load_bincode, save_bincode, Model, ModelOutput};
use crate::prep::{Autoscale, Preprocessing};
use crate::stats::{explained_variance, variance_dataset};

/// Hard cap on the number of components a model extracts.
pub const MAX_COMPONENTS: usize = 20;
/// NIPALS stops once `t·t` changes by less than this between iterations.
pub const NIPALS_TOLERANCE: f64 = 1e-5;
pub const NIPALS_MAX_ITERATIONS: usize = 100;

/// Settings of a [`PcaModel`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PcaConfig {
    /// Requested number of components. Clamped at calibration to
    /// `min(n_obj - 1, n_var, 20, ncomp)`.
    pub ncomp: usize,
    pub autoscale: Autoscale,
    pub cv: CrossValidation,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            ncomp: 1,
            autoscale: Autoscale::CenterAndScale,
            cv: CrossValidation::none(),
        }
    }
}

impl PcaConfig {
    pub fn new(ncomp: usize) -> Self {
        Self {
            ncomp,
            ..Self::default()
        }
    }

    pub fn with_autoscale(mut self, autoscale: Autoscale) -> Self {
        self.autoscale = autoscale;
        self
    }

    pub fn with_cv(mut self, cv: CrossValidation) -> Self {
        self.cv = cv;
        self
    }
}

/// Convergence record of one NIPALS component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentFit {
    pub iterations: usize,
    pub converged: bool,
}

/// Extracts `ncomp` loading vectors from preprocessed `values` (shape `(n_var, n_obj)`)
/// with NIPALS, deflating the residual matrix after every component.
///
/// Returns the loadings as a `(ncomp, n_var)` matrix with unit-norm rows, and the
/// convergence record of each component. A component that reaches
/// [`NIPALS_MAX_ITERATIONS`] is kept as is.
pub fn nipals(values: ArrayView2<f64>, ncomp: usize) -> (Array2<f64>, Vec<ComponentFit>) {
    let n_var = values.nrows();
    let mut residuals = values.to_owned();
    let mut loadings = Array2::zeros((ncomp, n_var));
    let mut fits = Vec::with_capacity(ncomp);

    for k in 0..ncomp {
        let seed = max_index(row_sd(residuals.view()).view());
        let mut t: Array1<f64> = residuals.row(seed).to_owned();
        let mut p: Array1<f64> = Array1::zeros(n_var);
        let mut tau = f64::INFINITY;
        let mut fit = ComponentFit {
            iterations: 0,
            converged: false,
        };

        while fit.iterations < NIPALS_MAX_ITERATIONS {
            p = residuals.dot(&t) / t.dot(&t);
            p /= p.dot(&p).sqrt();
            t = p.dot(&residuals) / p.dot(&p);

            let tau_new = t.dot(&t);
            let delta = (tau_new - tau).abs();
            tau = tau_new;
            fit.iterations += 1;

            if delta < NIPALS_TOLERANCE {
                fit.converged = true;
                break;
            }
            if delta.is_nan() {
                break;
            }
        }

        if fit.converged {
            debug!("Component {} converged after {} iterations.", k + 1, fit.iterations);
        } else {
            warn!(
                "Component {} did not converge after {} iterations; keeping the last estimate.",
                k + 1,
                fit.iterations
            );
        }

        residuals -= &p
            .view()
            .insert_axis(Axis(1))
            .dot(&t.view().insert_axis(Axis(0)));
        loadings.row_mut(k).assign(&p);
        fits.push(fit);
    }

    (loadings, fits)
}

/// First index of the largest value; NaN entries never win.
/// Negates every row of `p` whose dot product with the same row of `reference`
/// is negative. Rows beyond `reference` are left as they are.
fn align_signs(p: &mut Array2<f64>, reference: ArrayView2<f64>) {
    for (mut row, ref_row) in p.rows_mut().into_iter().zip(reference.rows()) {
        if row.dot(&ref_row) < 0.0 {
            row.mapv_inplace(|v| -v);
        }
    }
}

fn max_index(values: ArrayView1<f64>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, max), (i, &v)| {
            if v > max {
                (i, v)
            } else {
                (best, max)
            }
        })
        .0
}

/// Clamps a requested component count to what the data supports.
pub fn clamp_components(requested: usize, n_var: usize, n_obj: usize) -> usize {
    requested
        .max(1)
        .min(n_obj.saturating_sub(1))
        .min(n_var)
        .min(MAX_COMPONENTS)
}

/// Scores, distances and explained variance of a dataset projected on a PCA model.
///
/// `scores`, `t2` and `q` are `(ncomp, n_obj)`; row `i` of `t2` and `q` holds the
/// distance obtained with the first `i + 1` components.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PcaResult {
    pub scores: Dataset,
    pub t2: Dataset,
    pub q: Dataset,
    /// Two variables, `Individual` and `Cumulative`, in percent.
    pub variance: Dataset,
    pub info: String,
}

impl PcaResult {
    pub fn ncomp(&self) -> usize {
        self.scores.n_var()
    }

    pub fn individual_variance(&self) -> ArrayView1<'_, f64> {
        self.variance.values().row(0)
    }

    pub fn cumulative_variance(&self) -> ArrayView1<'_, f64> {
        self.variance.values().row(1)
    }

    fn assemble(
        data: &Dataset,
        scores: Array2<f64>,
        t2: Array2<f64>,
        q: Array2<f64>,
        cumulative: &[f64],
        info: &str,
    ) -> Self {
        let ncomp = scores.nrows();
        let obj_axis_values = Some(data.obj_axis_values().to_vec());
        let distance = |values: Array2<f64>, name: &str| {
            Dataset::new(values)
                .with_var_names(component_names(ncomp))
                .with_obj_names(data.obj_names().to_vec())
                .with_name(name)
                .with_var_axis("Components", Some(default_axis(ncomp)))
                .with_obj_axis(data.obj_axis_name(), obj_axis_values.clone())
        };

        let (individual, cumulative) = explained_variance(cumulative);
        Self {
            scores: distance(scores, "Scores"),
            t2: distance(t2, "Hotelling T2 distance"),
            q: distance(q, "Squared orthogonal distance"),
            variance: variance_dataset(individual, cumulative),
            info: info.to_string(),
        }
    }
}

/// Raw projection of one dataset, before it is wrapped into datasets.
struct Projection {
    scores: Array2<f64>,
    t2: Array2<f64>,
    q: Array2<f64>,
    cumulative: Vec<f64>,
    total_ss: f64,
}

/// Everything a calibration produces and prediction needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct PcaFit {
    /// `(ncomp, n_var)`; variable names `Comp i`, object names are the data's variable names.
    loadings: Dataset,
    prep: Preprocessing,
    /// Standard deviation of the calibration scores per component, frozen for T2.
    tnorm: Array1<f64>,
    components: Vec<ComponentFit>,
}

impl PcaFit {
    /// Fits loadings on `x`. With `reference` loadings, each component's sign is
    /// flipped to agree with the matching reference component.
    fn estimate(
        x: &Dataset,
        ncomp: usize,
        autoscale: Autoscale,
        reference: Option<ArrayView2<f64>>,
    ) -> AnalysisResult<Self> {
        let prep = Preprocessing::fit(x.values().view(), autoscale);
        let scaled = prep.apply(x.values().view())?;
        let (mut p, components) = nipals(scaled.view(), ncomp);
        if let Some(reference) = reference {
            align_signs(&mut p, reference);
        }

        let scores = p.dot(&scaled);
        let dof = (x.n_obj() as f64 - 1.0).max(1.0);
        let tnorm = scores.map_axis(Axis(1), |row| (row.dot(&row) / dof).sqrt());

        let loadings = Dataset::new(p)
            .with_var_names(component_names(ncomp))
            .with_obj_names(x.var_names().to_vec())
            .with_name("Loadings")
            .with_var_axis("Components", Some(default_axis(ncomp)))
            .with_obj_axis(x.var_axis_name(), Some(x.var_axis_values().to_vec()));

        Ok(Self {
            loadings,
            prep,
            tnorm,
            components,
        })
    }

    fn ncomp(&self) -> usize {
        self.loadings.n_var()
    }

    fn n_var(&self) -> usize {
        self.loadings.n_obj()
    }

    fn project(&self, data: &Dataset) -> AnalysisResult<Projection> {
        if data.n_var() != self.n_var() {
            return Err(AnalysisError::DimensionMismatch {
                context: "PCA projection",
                axis: DataAxis::Variables,
                expected: self.n_var(),
                found: data.n_var(),
            });
        }

        let scaled = self.prep.apply(data.values().view())?;
        let p = self.loadings.values();
        let scores = p.dot(&scaled);
        let normalized = &scores / &self.tnorm.view().insert_axis(Axis(1));
        let total_ss = scaled.iter().map(|v| v * v).sum::<f64>();

        let ncomp = self.ncomp();
        let n_obj = data.n_obj();
        let mut t2 = Array2::zeros((ncomp, n_obj));
        let mut q = Array2::zeros((ncomp, n_obj));
        let mut cumulative = Vec::with_capacity(ncomp);

        for i in 1..=ncomp {
            let tpt = p.slice(s![..i, ..]).t().dot(&scores.slice(s![..i, ..]));
            let residuals = &scaled - &tpt;
            q.row_mut(i - 1)
                .assign(&residuals.mapv(|e| e * e).sum_axis(Axis(0)));
            t2.row_mut(i - 1)
                .assign(&normalized.slice(s![..i, ..]).mapv(|v| v * v).sum_axis(Axis(0)));
            cumulative.push(tpt.iter().map(|v| v * v).sum::<f64>() / total_ss * 100.0);
        }

        Ok(Projection {
            scores,
            t2,
            q,
            cumulative,
            total_ss,
        })
    }

    fn result(&self, data: &Dataset, info: &str) -> AnalysisResult<PcaResult> {
        let proj = self.project(data)?;
        Ok(PcaResult::assemble(
            data,
            proj.scores,
            proj.t2,
            proj.q,
            &proj.cumulative,
            info,
        ))
    }

    fn validate(&self) -> AnalysisResult<()> {
        let invalid = |msg: String| Err(AnalysisError::Persistence(msg));
        if let Some(n) = self.prep.n_var() {
            if n != self.n_var() {
                return invalid(format!(
                    "Loaded PCA model has {} preprocessing entries for {} variables.",
                    n,
                    self.n_var()
                ));
            }
        }
        if self.tnorm.len() != self.ncomp() {
            return invalid(format!(
                "Loaded PCA model has {} score norms for {} components.",
                self.tnorm.len(),
                self.ncomp()
            ));
        }
        if self.components.len() != self.ncomp() {
            return invalid(format!(
                "Loaded PCA model has {} convergence records for {} components.",
                self.components.len(),
                self.ncomp()
            ));
        }
        Ok(())
    }
}

/// Principal component analysis fitted with NIPALS.
///
/// Calibration freezes the preprocessing vectors and the score norms used for T2;
/// later predictions always reuse them.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PcaModel {
    config: PcaConfig,
    fit: Option<PcaFit>,
    calres: Option<PcaResult>,
    cvres: Option<PcaResult>,
}

impl PcaModel {
    pub fn new(config: PcaConfig) -> Self {
        Self {
            config,
            fit: None,
            calres: None,
            cvres: None,
        }
    }

    pub fn config(&self) -> &PcaConfig {
        &self.config
    }

    /// Number of components of the calibrated model, 0 before calibration.
    pub fn ncomp(&self) -> usize {
        self.fit.as_ref().map_or(0, PcaFit::ncomp)
    }

    pub fn loadings(&self) -> Option<&Dataset> {
        self.fit.as_ref().map(|f| &f.loadings)
    }

    pub fn preprocessing(&self) -> Option<&Preprocessing> {
        self.fit.as_ref().map(|f| &f.prep)
    }

    pub fn tnorm(&self) -> Option<&Array1<f64>> {
        self.fit.as_ref().map(|f| &f.tnorm)
    }

    pub fn components(&self) -> &[ComponentFit] {
        self.fit
            .as_ref()
            .map(|f| f.components.as_slice())
            .unwrap_or_default()
    }

    pub fn calres(&self) -> Option<&PcaResult> {
        self.calres.as_ref()
    }

    pub fn cvres(&self) -> Option<&PcaResult> {
        self.cvres.as_ref()
    }

    fn fitted(&self) -> AnalysisResult<&PcaFit> {
        self.fit.as_ref().ok_or(AnalysisError::NotCalibrated)
    }

    /// Projects `x` on the calibrated model.
    pub fn project(&self, x: &Dataset) -> AnalysisResult<PcaResult> {
        self.fitted()?.result(x, "Test results")
    }

    /// Fits a fresh model on the `cal` objects of `segment` and projects its `val`
    /// objects. Uses this model's settings with its calibrated component count.
    pub fn project_fold(&self, x: &Dataset, segment: &Segment) -> AnalysisResult<PcaResult> {
        let val = x.subset(Selector::All, segment.val.as_slice())?;
        let fit = fold_fit(&self.config, self.fitted()?, x, segment)?;
        fit.result(&val, "Cross-validation fold")
    }

    /// Saves the model (configuration, fit and results) with bincode.
    ///
    /// # Errors
    /// `NotCalibrated` for an uncalibrated model, `Io` or `Persistence` on write failure.
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> AnalysisResult<()> {
        self.fitted()?;
        save_bincode(self, path)
    }

    /// Loads a model written by [`save_model`](Self::save_model) and checks that its
    /// parts agree on the number of variables and components.
    pub fn load_model<P: AsRef<Path>>(path: P) -> AnalysisResult<Self> {
        let model: PcaModel = load_bincode(path)?;
        model
            .fit
            .as_ref()
            .ok_or_else(|| AnalysisError::Persistence("Loaded PCA model is not calibrated.".into()))?
            .validate()?;
        Ok(model)
    }
}

/// Fits a fresh model on the calibration part of `segment`, with component signs
/// aligned to the full calibration model.
fn fold_fit(config: &PcaConfig, full: &PcaFit, x: &Dataset, segment: &Segment) -> AnalysisResult<PcaFit> {
    if x.n_var() != full.n_var() {
        return Err(AnalysisError::DimensionMismatch {
            context: "PCA cross-validation",
            axis: DataAxis::Variables,
            expected: full.n_var(),
            found: x.n_var(),
        });
    }
    let cal = x.subset(Selector::All, segment.cal.as_slice())?;
    if cal.n_obj() < 2 {
        return Err(AnalysisError::InsufficientObjects {
            required: 2,
            found: cal.n_obj(),
        });
    }
    let fold_ncomp = clamp_components(full.ncomp(), cal.n_var(), cal.n_obj());
    PcaFit::estimate(
        &cal,
        fold_ncomp,
        config.autoscale,
        Some(full.loadings.values().view()),
    )
}

fn cross_validate(
    config: &PcaConfig,
    full: &PcaFit,
    x: &Dataset,
    y: Option<&Dataset>,
) -> AnalysisResult<Option<PcaResult>> {
    let (ncomp, n_obj) = (full.ncomp(), x.n_obj());
    let plan = CvPlan::build(&config.cv, n_obj, reference_values(y))?;
    if plan.is_empty() {
        return Ok(None);
    }

    let mut scores = OutOfFold::new(ncomp, n_obj);
    let mut t2 = OutOfFold::new(ncomp, n_obj);
    let mut q = OutOfFold::new(ncomp, n_obj);
    let mut total_ss = 0.0;
    let mut residual_ss = vec![0.0; ncomp];

    for (r, segments) in plan.indices().iter().enumerate() {
        for (s, segment) in segments.iter().enumerate() {
            if segment.val.is_empty() {
                continue;
            }
            debug!(
                "PCA cross-validation: repetition {}, segment {} ({} held out).",
                r + 1,
                s + 1,
                segment.val.len()
            );
            let val = x.subset(Selector::All, segment.val.as_slice())?;
            let proj = fold_fit(config, full, x, segment)?.project(&val)?;

            scores.scatter(&segment.val, proj.scores.view());
            t2.scatter(&segment.val, proj.t2.view());
            q.scatter(&segment.val, proj.q.view());

            total_ss += proj.total_ss;
            for (i, acc) in residual_ss.iter_mut().enumerate() {
                *acc += if i < proj.q.nrows() {
                    proj.q.row(i).sum()
                } else {
                    f64::NAN
                };
            }
        }
        scores.finish_repetition();
        t2.finish_repetition();
        q.finish_repetition();
    }

    let cumulative: Vec<f64> = residual_ss
        .iter()
        .map(|rss| (1.0 - rss / total_ss) * 100.0)
        .collect();

    Ok(Some(PcaResult::assemble(
        x,
        scores.mean(),
        t2.mean(),
        q.mean(),
        &cumulative,
        "Cross-validation results",
    )))
}

impl Model for PcaModel {
    /// Fits the model on `x`. `y`, when given, stratifies venetian-blinds
    /// cross-validation.
    fn calibrate(&mut self, x: &Dataset, y: Option<&Dataset>) -> AnalysisResult<()> {
        let (n_var, n_obj) = (x.n_var(), x.n_obj());
        if n_obj < 2 {
            return Err(AnalysisError::InsufficientObjects {
                required: 2,
                found: n_obj,
            });
        }
        if n_var == 0 {
            return Err(AnalysisError::DimensionMismatch {
                context: "PCA calibration",
                axis: DataAxis::Variables,
                expected: 1,
                found: 0,
            });
        }

        let ncomp = clamp_components(self.config.ncomp, n_var, n_obj);
        if ncomp != self.config.ncomp {
            debug!("Requested {} components, using {}.", self.config.ncomp, ncomp);
        }

        let fit = PcaFit::estimate(x, ncomp, self.config.autoscale, None)?;
        let calres = fit.result(x, "Calibration results")?;
        let cvres = cross_validate(&self.config, &fit, x, y)?;

        info!(
            "Calibrated PCA model: {} components, {} variables, {} objects, {:.2}% explained variance.",
            ncomp,
            n_var,
            n_obj,
            calres.cumulative_variance()[ncomp - 1]
        );

        self.fit = Some(fit);
        self.calres = Some(calres);
        self.cvres = cvres;
        Ok(())
    }

    fn predict(&self, x: &Dataset, _y: Option<&Dataset>) -> AnalysisResult<ModelOutput> {
        self.project(x).map(ModelOutput::Decomposition)
    }

    fn crossvalidate(&self, x: &Dataset, y: Option<&Dataset>) -> AnalysisResult<Option<ModelOutput>> {
        Ok(cross_validate(&self.config, self.fitted()?, x, y)?.map(ModelOutput::Decomposition))
    }

    fn is_calibrated(&self) -> bool {
        self.fit.is_some()
    }
}
