//! Integration test: Classifiers and cross-validation on a DataFrame fixture

use alzheimer_ml::config::ModelsConfig;
use alzheimer_ml::preprocessing::{FeatureMatrix, StandardScaler};
use alzheimer_ml::training::{
    cross_val_score, accuracy_score, CVStrategy, Classifier, CrossValidator,
    GradientBoostingClassifier, GradientBoostingConfig, ModelKind, ModelSpec,
    RandomForestClassifier, RandomForestConfig, SVMConfig,
};
use polars::prelude::*;

fn classification_df() -> DataFrame {
    df!(
        "f1" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0,
                   1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5, 8.5, 9.5, 10.5],
        "f2" => &[10.0, 9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0,
                   9.5, 8.5, 7.5, 6.5, 5.5, 4.5, 3.5, 2.5, 1.5, 0.5],
        "f3" => &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0,
                   0.15, 0.25, 0.35, 0.45, 0.55, 0.65, 0.75, 0.85, 0.95, 1.05],
        "target" => &[0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0,
                      0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]
    )
    .unwrap()
}

fn scaled_features() -> FeatureMatrix {
    let mut fm = FeatureMatrix::from_frame(&classification_df(), "target").unwrap();
    fm.x = StandardScaler::new().fit_transform(&fm.x).unwrap();
    fm
}

fn stratified(n_splits: usize) -> CrossValidator {
    CrossValidator::new(CVStrategy::StratifiedKFold {
        n_splits,
        shuffle: false,
    })
}

#[test]
fn test_every_catalogue_model_fits_and_predicts() {
    let fm = scaled_features();
    for spec in ModelSpec::catalogue(&ModelsConfig::default(), 42) {
        let mut model = spec.build();
        let result = model.fit(&fm.x, &fm.y);
        assert!(result.is_ok(), "{} training should succeed: {:?}", spec.kind(), result.err());

        let pred = model.predict(&fm.x).unwrap();
        assert_eq!(pred.len(), 20);
        assert!(pred.iter().all(|&p| p == 0.0 || p == 1.0));
        assert!(accuracy_score(&fm.y, &pred) >= 0.9, "{} underfits", spec.kind());

        let proba = model.predict_proba(&fm.x).unwrap().expect("probabilities enabled by default");
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));

        assert_eq!(
            model.feature_importances().is_some(),
            spec.kind().has_feature_importances()
        );
    }
}

#[test]
fn test_feature_importances_sum_to_one() {
    let fm = scaled_features();
    let mut gb = GradientBoostingClassifier::new(GradientBoostingConfig {
        n_estimators: 20,
        random_state: Some(3),
        ..Default::default()
    });
    gb.fit(&fm.x, &fm.y).unwrap();
    let total: f64 = gb.feature_importances().unwrap().sum();
    assert!((total - 1.0).abs() < 1e-9);

    let mut rf = RandomForestClassifier::new(RandomForestConfig {
        n_estimators: 20,
        random_state: Some(3),
        ..Default::default()
    });
    rf.fit(&fm.x, &fm.y).unwrap();
    let total: f64 = rf.feature_importances().unwrap().sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn test_cross_validation_mean_matches_scores() {
    let fm = scaled_features();
    let spec = ModelSpec::RandomForest(RandomForestConfig {
        n_estimators: 15,
        random_state: Some(11),
        ..Default::default()
    });
    let results = cross_val_score(|| Ok(spec.build()), &fm.x, &fm.y, &stratified(5)).unwrap();

    assert_eq!(results.scores.len(), 5);
    let mean = results.scores.iter().sum::<f64>() / 5.0;
    assert!((results.mean_score - mean).abs() < 1e-12);
    assert!(results.std_score >= 0.0);
    assert!(results.scores.iter().all(|s| (0.0..=1.0).contains(s)));
}

#[test]
fn test_svm_without_calibration_reports_no_probabilities() {
    let fm = scaled_features();
    let spec = ModelSpec::SVM(SVMConfig::default()).for_cross_validation();
    assert_eq!(spec.kind(), ModelKind::SVM);

    let mut model = spec.build();
    model.fit(&fm.x, &fm.y).unwrap();
    assert!(model.predict_proba(&fm.x).unwrap().is_none());
}

#[test]
fn test_seeded_forest_is_reproducible() {
    let fm = scaled_features();
    let config = RandomForestConfig {
        n_estimators: 25,
        random_state: Some(42),
        ..Default::default()
    };
    let mut a = RandomForestClassifier::new(config.clone());
    let mut b = RandomForestClassifier::new(config);
    a.fit(&fm.x, &fm.y).unwrap();
    b.fit(&fm.x, &fm.y).unwrap();

    assert_eq!(a.predict_proba(&fm.x).unwrap(), b.predict_proba(&fm.x).unwrap());
    assert_eq!(a.feature_importances(), b.feature_importances());
}

#[test]
fn test_unfitted_models_error() {
    let fm = scaled_features();
    for spec in ModelSpec::catalogue(&ModelsConfig::default(), 1) {
        let model = spec.build();
        assert!(model.predict(&fm.x).is_err(), "{} predicted before fit", spec.kind());
    }
}
