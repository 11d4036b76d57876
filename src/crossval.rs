// src/crossval.rs

use log::debug;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::dataset::{argsort, Dataset};
use crate::error::{AnalysisError, AnalysisResult, DataAxis};

/// Upper bound on repetitions of random cross-validation.
pub const MAX_REPETITIONS: usize = 20;

/// How objects are split into calibration and validation segments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CvMethod {
    /// No cross-validation.
    #[default]
    None,
    /// Leave-one-out: every object is its own segment.
    Full,
    /// Shuffled contiguous blocks, optionally repeated.
    Random,
    /// Venetian blinds: interleaved strata of the sorted reference values.
    Venetian,
}

impl CvMethod {
    pub fn name(self) -> &'static str {
        match self {
            CvMethod::None => "none",
            CvMethod::Full => "full",
            CvMethod::Random => "random",
            CvMethod::Venetian => "venetian",
        }
    }
}

impl FromStr for CvMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(CvMethod::None),
            "full" | "loo" => Ok(CvMethod::Full),
            "random" | "rand" => Ok(CvMethod::Random),
            "venetian" | "ven" => Ok(CvMethod::Venetian),
            other => Err(AnalysisError::InvalidMethod(other.to_string())),
        }
    }
}

/// Cross-validation settings attached to a model configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossValidation {
    pub method: CvMethod,
    /// Number of segments. Ignored for leave-one-out.
    pub nseg: usize,
    /// Number of repetitions. Only random splits are repeated.
    pub nrep: usize,
    /// Seed for the shuffle of random splits. Drawn at plan time when `None`.
    pub seed: Option<u64>,
}

impl Default for CrossValidation {
    fn default() -> Self {
        Self {
            method: CvMethod::None,
            nseg: 10,
            nrep: 1,
            seed: None,
        }
    }
}

impl CrossValidation {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self {
            method: CvMethod::Full,
            ..Self::default()
        }
    }

    pub fn random(nseg: usize, nrep: usize) -> Self {
        Self {
            method: CvMethod::Random,
            nseg,
            nrep,
            seed: None,
        }
    }

    pub fn venetian(nseg: usize) -> Self {
        Self {
            method: CvMethod::Venetian,
            nseg,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.method != CvMethod::None
    }
}

/// One fold: objects used to fit the model and objects it is validated on.
/// `cal` and `val` are disjoint and together cover every object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub cal: Vec<usize>,
    pub val: Vec<usize>,
}

/// Calibration/validation partitions for every repetition and segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvPlan {
    method: CvMethod,
    nseg: usize,
    nrep: usize,
    seed: Option<u64>,
    indices: Vec<Vec<Segment>>,
}

impl CvPlan {
    /// Builds the partitions for `n_obj` objects.
    ///
    /// Random shuffles come from a `ChaCha8Rng` seeded with `cv.seed`, or with a
    /// freshly drawn seed that is recorded in the plan so the split can be
    /// reproduced.
    ///
    /// # Errors
    /// `MissingReference` for venetian blinds without `reference`,
    /// `InsufficientObjects` for fewer than two objects.
    pub fn build(
        cv: &CrossValidation,
        n_obj: usize,
        reference: Option<ArrayView1<f64>>,
    ) -> AnalysisResult<Self> {
        if cv.method != CvMethod::Random {
            return Self::build_with_rng(cv, n_obj, reference, &mut rand::thread_rng());
        }
        let seed = cv.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut plan = Self::build_with_rng(cv, n_obj, reference, &mut rng)?;
        plan.seed = Some(seed);
        Ok(plan)
    }

    /// Same as [`build`](Self::build) with a caller-supplied random source.
    pub fn build_with_rng<R: Rng + ?Sized>(
        cv: &CrossValidation,
        n_obj: usize,
        reference: Option<ArrayView1<f64>>,
        rng: &mut R,
    ) -> AnalysisResult<Self> {
        if cv.is_enabled() && n_obj < 2 {
            return Err(AnalysisError::InsufficientObjects {
                required: 2,
                found: n_obj,
            });
        }

        let (nseg, nrep, indices) = match cv.method {
            CvMethod::None => (0, 0, Vec::new()),
            CvMethod::Full => {
                let order: Vec<usize> = (0..n_obj).collect();
                (n_obj, 1, vec![contiguous_blocks(&order, n_obj)])
            }
            CvMethod::Random => {
                let nseg = clamp_segments(cv.nseg, n_obj);
                let nrep = if (1..=MAX_REPETITIONS).contains(&cv.nrep) {
                    cv.nrep
                } else {
                    debug!("Repetitions {} out of range, using 1.", cv.nrep);
                    1
                };
                let reps = (0..nrep)
                    .map(|_| {
                        let mut order: Vec<usize> = (0..n_obj).collect();
                        order.shuffle(&mut *rng);
                        contiguous_blocks(&order, nseg)
                    })
                    .collect();
                (nseg, nrep, reps)
            }
            CvMethod::Venetian => {
                let reference = reference.ok_or(AnalysisError::MissingReference("venetian blinds"))?;
                if reference.len() != n_obj {
                    return Err(AnalysisError::DimensionMismatch {
                        context: "venetian blinds",
                        axis: DataAxis::Objects,
                        expected: n_obj,
                        found: reference.len(),
                    });
                }
                let nseg = clamp_segments(cv.nseg, n_obj);
                (nseg, 1, vec![venetian_blinds(&argsort(reference), nseg)])
            }
        };

        Ok(Self {
            method: cv.method,
            nseg,
            nrep,
            seed: None,
            indices,
        })
    }

    pub fn method(&self) -> CvMethod {
        self.method
    }

    pub fn nseg(&self) -> usize {
        self.nseg
    }

    pub fn nrep(&self) -> usize {
        self.nrep
    }

    /// Seed used for the shuffle, for random splits built with [`build`](Self::build).
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Segments indexed as `indices()[rep][seg]`.
    pub fn indices(&self) -> &[Vec<Segment>] {
        &self.indices
    }

    pub fn segment(&self, rep: usize, seg: usize) -> Option<&Segment> {
        self.indices.get(rep).and_then(|r| r.get(seg))
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterates over `(rep, seg, segment)` in fitting order.
    pub fn segments(&self) -> impl Iterator<Item = (usize, usize, &Segment)> {
        self.indices
            .iter()
            .enumerate()
            .flat_map(|(r, segs)| segs.iter().enumerate().map(move |(s, seg)| (r, s, seg)))
    }
}

/// Collects out-of-fold values (`rows x n_obj`) and averages them over repetitions.
///
/// Rows a fold does not produce (a fold fitted with fewer components) stay NaN for
/// the objects of that fold.
pub(crate) struct OutOfFold {
    total: Array2<f64>,
    current: Array2<f64>,
    reps: usize,
}

impl OutOfFold {
    pub(crate) fn new(rows: usize, n_obj: usize) -> Self {
        Self {
            total: Array2::zeros((rows, n_obj)),
            current: Array2::from_elem((rows, n_obj), f64::NAN),
            reps: 0,
        }
    }

    /// Writes the columns of `values` to the object positions in `val`.
    pub(crate) fn scatter(&mut self, val: &[usize], values: ArrayView2<f64>) {
        let rows = values.nrows().min(self.current.nrows());
        for (col, &obj) in val.iter().enumerate() {
            for row in 0..rows {
                self.current[[row, obj]] = values[[row, col]];
            }
        }
    }

    pub(crate) fn finish_repetition(&mut self) {
        self.total += &self.current;
        self.current.fill(f64::NAN);
        self.reps += 1;
    }

    pub(crate) fn mean(self) -> Array2<f64> {
        let reps = self.reps.max(1) as f64;
        self.total / reps
    }
}

/// Single reference variable used to stratify venetian blinds.
pub(crate) fn reference_values(y: Option<&Dataset>) -> Option<ArrayView1<'_, f64>> {
    y.filter(|d| d.n_var() > 0).map(|d| d.values().index_axis(Axis(0), 0))
}

fn clamp_segments(nseg: usize, n_obj: usize) -> usize {
    let clamped = nseg.clamp(2, n_obj);
    if clamped != nseg {
        debug!("Segments {} out of range for {} objects, using {}.", nseg, n_obj, clamped);
    }
    clamped
}

/// Splits `order` into `nseg` blocks of `round(n / nseg)` objects; the last block
/// takes whatever remains.
fn contiguous_blocks(order: &[usize], nseg: usize) -> Vec<Segment> {
    let n = order.len();
    let size = (n as f64 / nseg as f64).round() as usize;
    (0..nseg)
        .map(|j| {
            let start = (j * size).min(n);
            let end = if j + 1 == nseg { n } else { ((j + 1) * size).min(n) };
            Segment {
                cal: order[..start].iter().chain(&order[end..]).copied().collect(),
                val: order[start..end].to_vec(),
            }
        })
        .collect()
}

/// Segment `k` holds every `nseg`-th object of `sorted`, starting at position `k`.
fn venetian_blinds(sorted: &[usize], nseg: usize) -> Vec<Segment> {
    (0..nseg)
        .map(|k| {
            let (val, cal): (Vec<(usize, usize)>, Vec<(usize, usize)>) = sorted
                .iter()
                .copied()
                .enumerate()
                .partition(|(pos, _)| pos % nseg == k);
            Segment {
                cal: cal.into_iter().map(|(_, i)| i).collect(),
                val: val.into_iter().map(|(_, i)| i).collect(),
            }
        })
        .collect()
}
