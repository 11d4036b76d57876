// src/linalg.rs

use ndarray::Array2;
use ndarray_linalg::Inverse as NdLinalgInverse;
use std::error::Error;

/// Trait for the matrix inverse used by the normal equations.
pub trait BackendInverse<F: 'static + Copy + Send + Sync> {
    fn inverse(&self, matrix: &Array2<F>) -> Result<Array2<F>, Box<dyn Error + Send + Sync>>;
}

/// Dense inverse through ndarray-linalg (LAPACK `getrf`/`getri`). The LAPACK
/// implementation is chosen by the `backend_*` cargo features.
#[derive(Debug, Default, Copy, Clone)]
pub struct NdarrayLinAlgBackend;

// Helper to convert ndarray-linalg's error to Box<dyn Error + Send + Sync>
fn to_dyn_error<E: Error + Send + Sync + 'static>(e: E) -> Box<dyn Error + Send + Sync> {
    Box::new(e)
}

impl BackendInverse<f64> for NdarrayLinAlgBackend {
    fn inverse(&self, matrix: &Array2<f64>) -> Result<Array2<f64>, Box<dyn Error + Send + Sync>> {
        matrix.inv().map_err(to_dyn_error)
    }
}
