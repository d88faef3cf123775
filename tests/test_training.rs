//! Integration test: every catalog estimator on shared regression data

use model_trainer::selection::default_catalog;
use model_trainer::training::{
    cross_val_score, r2_score, Estimator, KFold, ParamValue, Regressor,
};
use model_trainer::TrainerError;
use ndarray::{Array1, Array2};

fn regression_data() -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((60, 2), |(i, j)| match j {
        0 => i as f64,
        _ => ((i * 7) % 11) as f64,
    });
    let y = x.rows().into_iter().map(|r| 2.0 * r[0] + r[1]).collect();
    (x, y)
}

fn fresh_estimators() -> Vec<(String, Estimator)> {
    default_catalog()
        .iter()
        .map(|(name, e)| (name.to_string(), e.clone_unfitted()))
        .collect()
}

#[test]
fn test_every_estimator_fits_and_predicts() {
    let (x, y) = regression_data();
    for (name, mut model) in fresh_estimators() {
        let result = model.fit(&x, &y);
        assert!(result.is_ok(), "{} training should succeed: {:?}", name, result.err());

        let preds = model.predict(&x).unwrap();
        assert_eq!(preds.len(), x.nrows());
        let score = r2_score(&y, &preds).unwrap();
        assert!(score > 0.8, "{} train R² too low: {}", name, score);
    }
}

#[test]
fn test_predict_before_fit_fails() {
    let (x, _) = regression_data();
    for (name, model) in fresh_estimators() {
        assert!(
            matches!(model.predict(&x), Err(TrainerError::ModelNotFitted)),
            "{} should refuse to predict unfitted",
            name
        );
    }
}

#[test]
fn test_wrong_feature_count_rejected() {
    let (x, y) = regression_data();
    let wide = Array2::zeros((3, 5));
    for (name, mut model) in fresh_estimators() {
        model.fit(&x, &y).unwrap();
        assert!(model.predict(&wide).is_err(), "{} accepted 5 features", name);
    }
}

#[test]
fn test_unknown_param_rejected() {
    for (name, mut model) in fresh_estimators() {
        let err = model
            .set_param("no_such_param", &ParamValue::Int(1))
            .unwrap_err();
        assert!(
            matches!(err, TrainerError::InvalidParameter { .. }),
            "{} accepted an unknown parameter",
            name
        );
    }
}

#[test]
fn test_params_roundtrip_through_set_params() {
    for (name, model) in fresh_estimators() {
        let params = model.params();
        let mut copy = model.clone_unfitted();
        copy.set_params(&params).unwrap();
        assert_eq!(copy.params(), params, "{} params changed", name);
    }
}

#[test]
fn test_cross_validation_on_linear_model() {
    let (x, y) = regression_data();
    let (_, linear) = fresh_estimators()
        .into_iter()
        .find(|(n, _)| n == "Linear Regression")
        .unwrap();

    let results = cross_val_score(&linear, &x, &y, &KFold::new(5)).unwrap();
    assert_eq!(results.scores.len(), 5);
    assert!(results.mean_score > 0.999);
    assert!(!linear.is_fitted());
}

#[test]
fn test_estimator_json_roundtrip_keeps_predictions() {
    let (x, y) = regression_data();
    for (name, mut model) in fresh_estimators() {
        model.fit(&x, &y).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let restored: Estimator = serde_json::from_str(&json).unwrap();
        assert_eq!(
            restored.predict(&x).unwrap(),
            model.predict(&x).unwrap(),
            "{} predictions changed after reload",
            name
        );
    }
}
