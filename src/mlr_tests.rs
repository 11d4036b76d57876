use crate::error::AnalysisError;
use crate::mlr::{MlrConfig, MlrModel};
use crate::model::Model;
use crate::prep::Autoscale;
use crate::{CrossValidation, CvPlan, Dataset};

use approx::assert_abs_diff_eq;
use ndarray::{array, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// `y = 1.5 x1 - 0.5 x2 + 3 + noise`
fn noisy_linear(n_obj: usize, noise: f64, seed: u64) -> (Dataset, Dataset) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let x = Array2::from_shape_fn((2, n_obj), |_| rng.gen_range(0.0..10.0));
    let y = Array2::from_shape_fn((1, n_obj), |(_, j)| {
        1.5 * x[[0, j]] - 0.5 * x[[1, j]] + 3.0 + noise * rng.gen_range(-1.0..1.0)
    });
    (
        Dataset::new(x).with_var_names(["X1", "X2"]),
        Dataset::new(y).with_var_names(["Y"]),
    )
}

fn calibrated(x: &Dataset, y: &Dataset, config: MlrConfig) -> MlrModel {
    let mut model = MlrModel::new(config);
    model.calibrate(x, Some(y)).unwrap();
    model
}

#[cfg(test)]
mod fit_tests {
    use super::*;

    #[test]
    fn test_noiseless_single_predictor() {
        let x = Dataset::new(array![[1.0, 2.0, 3.0, 4.0]]);
        let y = Dataset::new(array![[2.0, 4.0, 6.0, 8.0]]);

        for autoscale in [Autoscale::CenterOnly, Autoscale::None, Autoscale::CenterAndScale] {
            let model = calibrated(&x, &y, MlrConfig::default().with_autoscale(autoscale));
            let stats = model.calres().unwrap().stats.as_ref().unwrap();
            assert_abs_diff_eq!(stats.bias[0], 0.0, epsilon = 1e-10);
            assert_abs_diff_eq!(stats.r2[0], 1.0, epsilon = 1e-10);
            assert_abs_diff_eq!(stats.rmse[0], 0.0, epsilon = 1e-10);
        }

        let model = calibrated(&x, &y, MlrConfig::default().with_autoscale(Autoscale::None));
        assert_abs_diff_eq!(model.coefficients().unwrap().values()[[0, 0]], 2.0, epsilon = 1e-10);

        let model = calibrated(&x, &y, MlrConfig::default());
        assert_abs_diff_eq!(model.coefficients().unwrap().values()[[0, 0]], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_recovers_coefficients_with_centering() {
        let (x, y) = noisy_linear(30, 0.0, 5);
        let model = calibrated(&x, &y, MlrConfig::default());
        let b = model.coefficients().unwrap().values();
        assert_abs_diff_eq!(b[[0, 0]], 1.5, epsilon = 1e-8);
        assert_abs_diff_eq!(b[[0, 1]], -0.5, epsilon = 1e-8);
        assert_eq!(model.coefficients().unwrap().obj_names(), &["X1", "X2"]);
        assert_eq!(model.calres().unwrap().yp.name(), "Y");
    }

    #[test]
    fn test_calibration_r2_is_non_negative() {
        for seed in 0..5 {
            let (x, y) = noisy_linear(20, 8.0, seed);
            let model = calibrated(&x, &y, MlrConfig::default());
            let r2 = model.calres().unwrap().stats.as_ref().unwrap().r2[0];
            assert!(r2 >= 0.0 && r2 <= 1.0, "seed {}: R2 = {}", seed, r2);
        }
    }

    #[test]
    fn test_singular_normal_equations_give_nan() {
        // identical predictors make XX' exactly singular
        let x = Dataset::new(array![[1.0, 2.0, 3.0], [1.0, 2.0, 3.0]]);
        let y = Dataset::new(array![[1.0, 2.0, 4.0]]);
        let model = calibrated(&x, &y, MlrConfig::default());
        assert!(model.coefficients().unwrap().values().iter().all(|v| v.is_nan()));
        assert!(model.calres().unwrap().yp.values().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_response_validation() {
        let (x, _) = noisy_linear(6, 0.0, 1);
        let mut model = MlrModel::default();

        assert!(matches!(
            model.calibrate(&x, None),
            Err(AnalysisError::MissingReference(_))
        ));
        let two = Dataset::new(Array2::zeros((2, 6)));
        assert!(matches!(
            model.calibrate(&x, Some(&two)),
            Err(AnalysisError::InvalidResponse(2))
        ));
        let short = Dataset::new(Array2::zeros((1, 5)));
        assert!(matches!(
            model.calibrate(&x, Some(&short)),
            Err(AnalysisError::DimensionMismatch { .. })
        ));
        assert!(!model.is_calibrated());
    }
}

#[cfg(test)]
mod prediction_tests {
    use super::*;

    #[test]
    fn test_prediction_uses_frozen_preprocessing() {
        let x = Dataset::new(array![[1.0, 2.0, 3.0, 4.0]]);
        let y = Dataset::new(array![[2.0, 4.0, 6.0, 8.0]]);
        let model = calibrated(&x, &y, MlrConfig::default().with_autoscale(Autoscale::CenterAndScale));

        // a single far-away object would be centered to zero if statistics were refitted
        let new = Dataset::new(array![[10.0]]);
        let res = model.estimate(&new, None).unwrap();
        assert_abs_diff_eq!(res.yp.values()[[0, 0]], 20.0, epsilon = 1e-10);
        assert!(res.stats.is_none());
        assert!(res.residuals().is_none());
    }

    #[test]
    fn test_prediction_with_reference() {
        let (x, y) = noisy_linear(20, 0.5, 3);
        let model = calibrated(&x, &y, MlrConfig::default());
        let (xt, yt) = noisy_linear(10, 0.5, 4);

        let out = model.predict(&xt, Some(&yt)).unwrap();
        let res = out.as_regression().unwrap();
        assert_eq!(res.info, "Test results");
        assert_eq!(res.yp.obj_names(), yt.obj_names());

        let residuals = res.residuals().unwrap();
        let bias = residuals.row(0).sum() / 10.0;
        assert_abs_diff_eq!(res.stats.as_ref().unwrap().bias[0], bias, epsilon = 1e-12);
    }

    #[test]
    fn test_predict_before_calibration() {
        let model = MlrModel::default();
        let (x, _) = noisy_linear(3, 0.0, 0);
        assert!(matches!(model.predict(&x, None), Err(AnalysisError::NotCalibrated)));
    }
}

#[cfg(test)]
mod crossval_tests {
    use super::*;

    #[test]
    fn test_leave_one_out_matches_manual_folds() {
        let (x, y) = noisy_linear(8, 1.0, 10);
        let model = calibrated(&x, &y, MlrConfig::default().with_cv(CrossValidation::full()));
        let cv = model.cvres().unwrap();

        let plan = CvPlan::build(&CrossValidation::full(), 8, None).unwrap();
        for (_, _, segment) in plan.segments() {
            let fold = model.predict_fold(&x, &y, segment).unwrap();
            let obj = segment.val[0];
            assert_abs_diff_eq!(cv.yp.values()[[0, obj]], fold.yp.values()[[0, 0]], epsilon = 1e-10);
        }
        assert_eq!(cv.info, "Cross-validation results");
    }

    #[test]
    fn test_leave_one_out_error_exceeds_calibration_error() {
        let (x, y) = noisy_linear(24, 2.0, 6);
        let model = calibrated(&x, &y, MlrConfig::default().with_cv(CrossValidation::full()));
        let cal = model.calres().unwrap().stats.as_ref().unwrap().rmse[0];
        let cv = model.cvres().unwrap().stats.as_ref().unwrap().rmse[0];
        assert!(cv >= cal, "cv {} < cal {}", cv, cal);
    }

    #[test]
    fn test_venetian_blinds_predict_every_object() {
        let (x, y) = noisy_linear(24, 2.0, 6);
        let model = calibrated(&x, &y, MlrConfig::default().with_cv(CrossValidation::venetian(4)));
        let cv = model.cvres().unwrap();
        assert_eq!(cv.yp.n_obj(), 24);
        assert!(cv.yp.values().iter().all(|v| v.is_finite()));
        assert_eq!(cv.y.as_ref().unwrap(), &y);
    }

    #[test]
    fn test_repeated_random_splits_are_averaged() {
        let (x, y) = noisy_linear(12, 1.0, 2);
        let cv = CrossValidation::random(3, 4).with_seed(99);
        let model = calibrated(&x, &y, MlrConfig::default().with_cv(cv.clone()));
        let averaged = model.cvres().unwrap().yp.values().clone();

        let plan = CvPlan::build(&cv, 12, None).unwrap();
        let mut expected = Array2::<f64>::zeros((1, 12));
        for (_, _, segment) in plan.segments() {
            let fold = model.predict_fold(&x, &y, segment).unwrap();
            for (col, &obj) in segment.val.iter().enumerate() {
                expected[[0, obj]] += fold.yp.values()[[0, col]] / 4.0;
            }
        }
        for (a, e) in averaged.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *e, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_summary_rows() {
        let (x, y) = noisy_linear(10, 1.0, 8);
        let without = calibrated(&x, &y, MlrConfig::default());
        let summary = without.summary().unwrap();
        assert_eq!(summary.obj_names(), &["Cal"]);
        assert_eq!(summary.var_names(), &["Bias", "R2", "RMSE"]);

        let with = calibrated(&x, &y, MlrConfig::default().with_cv(CrossValidation::full()));
        let summary = with.summary().unwrap();
        assert_eq!(summary.obj_names(), &["Cal", "CV"]);
        assert_eq!(summary.n_obj(), 2);

        assert!(matches!(MlrModel::default().summary(), Err(AnalysisError::NotCalibrated)));
    }
}

#[cfg(test)]
mod model_persistence_tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_save_and_load_roundtrip() {
        let (x, y) = noisy_linear(15, 0.3, 12);
        let model = calibrated(&x, &y, MlrConfig::default().with_autoscale(Autoscale::CenterAndScale));

        let file = NamedTempFile::new().unwrap();
        model.save_model(file.path()).unwrap();
        let loaded = MlrModel::load_model(file.path()).unwrap();

        assert_eq!(loaded.coefficients(), model.coefficients());
        assert_eq!(loaded.calres(), model.calres());
        let (xt, _) = noisy_linear(5, 0.3, 13);
        assert_eq!(loaded.estimate(&xt, None).unwrap(), model.estimate(&xt, None).unwrap());
    }
}
