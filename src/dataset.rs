// src/dataset.rs

use ndarray::{concatenate, Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{AnalysisError, AnalysisResult, DataAxis};

/// Selects variables or objects of a [`Dataset`] by position or by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    All,
    Index(usize),
    Name(String),
    Indices(Vec<usize>),
    Names(Vec<String>),
}

impl From<usize> for Selector {
    fn from(index: usize) -> Self {
        Selector::Index(index)
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::Name(name.to_string())
    }
}

impl From<String> for Selector {
    fn from(name: String) -> Self {
        Selector::Name(name)
    }
}

impl From<Vec<usize>> for Selector {
    fn from(indices: Vec<usize>) -> Self {
        Selector::Indices(indices)
    }
}

impl From<&[usize]> for Selector {
    fn from(indices: &[usize]) -> Self {
        Selector::Indices(indices.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Selector {
    fn from(indices: [usize; N]) -> Self {
        Selector::Indices(indices.to_vec())
    }
}

impl From<Vec<String>> for Selector {
    fn from(names: Vec<String>) -> Self {
        Selector::Names(names)
    }
}

impl From<Vec<&str>> for Selector {
    fn from(names: Vec<&str>) -> Self {
        Selector::Names(names.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Selector {
    fn from(names: [&str; N]) -> Self {
        Selector::Names(names.iter().map(|n| n.to_string()).collect())
    }
}

/// A dense numeric matrix with named variables and objects.
///
/// Values are stored variable-major: shape `(n_var, n_obj)`, so `values[[v, o]]` is
/// the value of variable `v` for object `o`. Axis names and axis values are only
/// descriptive, but every transform carries them through so that downstream
/// consumers can label results without extra bookkeeping.
///
/// All transforms return a new dataset; `sort` is the only in-place operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    values: Array2<f64>,
    var_names: Vec<String>,
    obj_names: Vec<String>,
    name: String,
    info: String,
    var_axis_name: String,
    var_axis_values: Vec<f64>,
    obj_axis_name: String,
    obj_axis_values: Vec<f64>,
}

impl Dataset {
    /// Wraps a `(n_var, n_obj)` matrix, generating default names (`X1..`, `O1..`)
    /// and axis values (`1..n`).
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use mvanalysis::Dataset;
    ///
    /// let data = Dataset::new(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    /// assert_eq!(data.n_var(), 2);
    /// assert_eq!(data.n_obj(), 3);
    /// assert_eq!(data.var_names(), &["X1", "X2"]);
    /// ```
    pub fn new(values: Array2<f64>) -> Self {
        let (n_var, n_obj) = values.dim();
        Self {
            values,
            var_names: default_names("X", n_var),
            obj_names: default_names("O", n_obj),
            name: String::new(),
            info: String::new(),
            var_axis_name: "Variables".to_string(),
            var_axis_values: default_axis(n_var),
            obj_axis_name: "Objects".to_string(),
            obj_axis_values: default_axis(n_obj),
        }
    }

    /// Builds a dataset from one vector per variable.
    ///
    /// # Errors
    /// Returns `RaggedRows` if the rows do not all have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> AnalysisResult<Self> {
        let n_var = rows.len();
        let n_obj = rows.first().map_or(0, Vec::len);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != n_obj {
                return Err(AnalysisError::RaggedRows {
                    row,
                    expected: n_obj,
                    found: values.len(),
                });
            }
        }
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let values = Array2::from_shape_vec((n_var, n_obj), flat).map_err(|_| {
            AnalysisError::DimensionMismatch {
                context: "from_rows",
                axis: DataAxis::Objects,
                expected: n_obj,
                found: 0,
            }
        })?;
        Ok(Self::new(values))
    }

    /// A single variable measured on `values.len()` objects.
    pub fn from_vector(values: Vec<f64>) -> Self {
        let n_obj = values.len();
        Self::new(Array2::from_shape_vec((1, n_obj), values).unwrap_or_else(|_| Array2::zeros((1, 0))))
    }

    /// Replaces variable names. A list of the wrong length keeps the defaults.
    pub fn with_var_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        self.var_names = if names.len() == self.n_var() {
            names
        } else {
            default_names("X", self.n_var())
        };
        self
    }

    /// Replaces object names. A list of the wrong length keeps the defaults.
    pub fn with_obj_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        self.obj_names = if names.len() == self.n_obj() {
            names
        } else {
            default_names("O", self.n_obj())
        };
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    /// Sets the variable axis. Axis values of the wrong length fall back to `1..n_var`.
    pub fn with_var_axis(mut self, name: impl Into<String>, values: Option<Vec<f64>>) -> Self {
        self.var_axis_name = name.into();
        self.var_axis_values = match values {
            Some(v) if v.len() == self.n_var() => v,
            _ => default_axis(self.n_var()),
        };
        self
    }

    /// Sets the object axis. Axis values of the wrong length fall back to `1..n_obj`.
    pub fn with_obj_axis(mut self, name: impl Into<String>, values: Option<Vec<f64>>) -> Self {
        self.obj_axis_name = name.into();
        self.obj_axis_values = match values {
            Some(v) if v.len() == self.n_obj() => v,
            _ => default_axis(self.n_obj()),
        };
        self
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    pub fn n_var(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_obj(&self) -> usize {
        self.values.ncols()
    }

    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    pub fn obj_names(&self) -> &[String] {
        &self.obj_names
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn var_axis_name(&self) -> &str {
        &self.var_axis_name
    }

    pub fn var_axis_values(&self) -> &[f64] {
        &self.var_axis_values
    }

    pub fn obj_axis_name(&self) -> &str {
        &self.obj_axis_name
    }

    pub fn obj_axis_values(&self) -> &[f64] {
        &self.obj_axis_values
    }

    /// Values of the variable called `name`.
    pub fn variable(&self, name: &str) -> AnalysisResult<ArrayView1<'_, f64>> {
        let index = lookup(&self.var_names, name, DataAxis::Variables)?;
        Ok(self.values.row(index))
    }

    /// Returns the selected variables and objects, in selection order, with their
    /// names and axis values.
    ///
    /// # Errors
    /// `NotFound` for an unknown name, `IndexOutOfRange` for an index past the end.
    pub fn subset(
        &self,
        vars: impl Into<Selector>,
        objs: impl Into<Selector>,
    ) -> AnalysisResult<Dataset> {
        let var_idx = resolve(vars.into(), &self.var_names, DataAxis::Variables)?;
        let obj_idx = resolve(objs.into(), &self.obj_names, DataAxis::Objects)?;

        let values = self.values.select(Axis(0), &var_idx).select(Axis(1), &obj_idx);
        Ok(Dataset {
            values,
            var_names: var_idx.iter().map(|&i| self.var_names[i].clone()).collect(),
            obj_names: obj_idx.iter().map(|&i| self.obj_names[i].clone()).collect(),
            name: self.name.clone(),
            info: self.info.clone(),
            var_axis_name: self.var_axis_name.clone(),
            var_axis_values: var_idx.iter().map(|&i| self.var_axis_values[i]).collect(),
            obj_axis_name: self.obj_axis_name.clone(),
            obj_axis_values: obj_idx.iter().map(|&i| self.obj_axis_values[i]).collect(),
        })
    }

    /// Appends the objects of `other` after the objects of `self`.
    ///
    /// # Errors
    /// `DimensionMismatch` if the two datasets have a different number of variables.
    pub fn rbind(&self, other: &Dataset) -> AnalysisResult<Dataset> {
        let mismatch = || AnalysisError::DimensionMismatch {
            context: "rbind",
            axis: DataAxis::Variables,
            expected: self.n_var(),
            found: other.n_var(),
        };
        if other.n_var() != self.n_var() {
            return Err(mismatch());
        }
        let values = concatenate(Axis(1), &[self.values.view(), other.values.view()])
            .map_err(|_| mismatch())?;

        let mut out = self.clone();
        out.values = values;
        out.obj_names.extend(other.obj_names.iter().cloned());
        out.obj_axis_values.extend(other.obj_axis_values.iter().copied());
        Ok(out)
    }

    /// Appends the variables of `other` after the variables of `self`.
    ///
    /// # Errors
    /// `DimensionMismatch` if the two datasets have a different number of objects.
    pub fn cbind(&self, other: &Dataset) -> AnalysisResult<Dataset> {
        let mismatch = || AnalysisError::DimensionMismatch {
            context: "cbind",
            axis: DataAxis::Objects,
            expected: self.n_obj(),
            found: other.n_obj(),
        };
        if other.n_obj() != self.n_obj() {
            return Err(mismatch());
        }
        let values = concatenate(Axis(0), &[self.values.view(), other.values.view()])
            .map_err(|_| mismatch())?;

        let mut out = self.clone();
        out.values = values;
        out.var_names.extend(other.var_names.iter().cloned());
        out.var_axis_values.extend(other.var_axis_values.iter().copied());
        Ok(out)
    }

    /// Swaps the roles of variables and objects, including names and axes.
    pub fn transpose(&self) -> Dataset {
        Dataset {
            values: self.values.t().as_standard_layout().into_owned(),
            var_names: self.obj_names.clone(),
            obj_names: self.var_names.clone(),
            name: self.name.clone(),
            info: self.info.clone(),
            var_axis_name: self.obj_axis_name.clone(),
            var_axis_values: self.obj_axis_values.clone(),
            obj_axis_name: self.var_axis_name.clone(),
            obj_axis_values: self.var_axis_values.clone(),
        }
    }

    /// Mean of every variable, as a single object named `Mean`.
    pub fn mean(&self) -> Dataset {
        let means = row_mean(self.values.view()).insert_axis(Axis(1));
        Dataset::new(means)
            .with_var_names(self.var_names.iter().cloned())
            .with_obj_names(["Mean"])
            .with_name(self.name.clone())
            .with_info(self.info.clone())
            .with_var_axis(self.var_axis_name.clone(), Some(self.var_axis_values.clone()))
    }

    /// Reorders objects in place so that `var` is ascending. Ties keep their
    /// current order.
    ///
    /// # Errors
    /// Fails if `var` does not resolve to exactly one existing variable.
    pub fn sort(&mut self, var: impl Into<Selector>) -> AnalysisResult<()> {
        let var_idx = resolve(var.into(), &self.var_names, DataAxis::Variables)?;
        if var_idx.len() != 1 {
            return Err(AnalysisError::DimensionMismatch {
                context: "sort",
                axis: DataAxis::Variables,
                expected: 1,
                found: var_idx.len(),
            });
        }
        let order = argsort(self.values.row(var_idx[0]));
        let sorted = self.subset(Selector::All, Selector::Indices(order))?;
        self.values = sorted.values;
        self.obj_names = sorted.obj_names;
        self.obj_axis_values = sorted.obj_axis_values;
        Ok(())
    }
}

/// Indices that put `values` in ascending order. Stable: equal values keep their
/// original relative order. NaN values go last.
pub fn argsort(values: ArrayView1<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        let (x, y) = (values[a], values[b]);
        match (x.is_nan(), y.is_nan()) {
            (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (x_nan, y_nan) => x_nan.cmp(&y_nan),
        }
    });
    order
}

/// Mean of each row (variable).
pub fn row_mean(values: ArrayView2<f64>) -> Array1<f64> {
    values.map_axis(Axis(1), |row| row.sum() / row.len() as f64)
}

/// Sample standard deviation (ddof = 1) of each row (variable).
pub fn row_sd(values: ArrayView2<f64>) -> Array1<f64> {
    values.map_axis(Axis(1), |row| {
        let n = row.len() as f64;
        let mean = row.sum() / n;
        let ss = row.fold(0.0, |acc, &v| acc + (v - mean) * (v - mean));
        (ss / (n - 1.0)).sqrt()
    })
}

/// Labels `Comp 1..Comp n` used for component-indexed results.
pub(crate) fn component_names(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("Comp {}", i)).collect()
}

pub(crate) fn default_axis(n: usize) -> Vec<f64> {
    (1..=n).map(|i| i as f64).collect()
}

fn default_names(prefix: &str, n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
}

fn lookup(names: &[String], name: &str, axis: DataAxis) -> AnalysisResult<usize> {
    names
        .iter()
        .position(|n| n == name)
        .ok_or_else(|| AnalysisError::NotFound {
            axis,
            name: name.to_string(),
        })
}

fn resolve(selector: Selector, names: &[String], axis: DataAxis) -> AnalysisResult<Vec<usize>> {
    let len = names.len();
    let check = |index: usize| {
        if index < len {
            Ok(index)
        } else {
            Err(AnalysisError::IndexOutOfRange { axis, index, len })
        }
    };
    match selector {
        Selector::All => Ok((0..len).collect()),
        Selector::Index(i) => Ok(vec![check(i)?]),
        Selector::Indices(indices) => indices.into_iter().map(check).collect(),
        Selector::Name(name) => Ok(vec![lookup(names, &name, axis)?]),
        Selector::Names(list) => list.iter().map(|n| lookup(names, n, axis)).collect(),
    }
}
