//! Integration test: Preprocessing stages end-to-end

use alzheimer_ml::preprocessing::{
    derive_ratio_features, drop_identifier_columns, stratified_split, FeatureMatrix,
    StandardScaler,
};
use alzheimer_ml::synthetic::{class_counts, Sampler, SMOTE};
use alzheimer_ml::PipelineError;
use polars::prelude::*;

fn sample_df() -> DataFrame {
    df!(
        "PatientID" => &[1i64, 2, 3, 4, 5, 6, 7, 8, 9, 10],
        "Age" => &[65.0, 70.0, 75.0, 80.0, 85.0, 66.0, 71.0, 76.0, 81.0, 86.0],
        "SystolicBP" => &[120.0, 130.0, 140.0, 150.0, 160.0, 125.0, 135.0, 145.0, 155.0, 165.0],
        "DiastolicBP" => &[80.0, 85.0, 90.0, 95.0, 100.0, 80.0, 85.0, 90.0, 95.0, 100.0],
        "CholesterolLDL" => &[100.0, 110.0, 120.0, 130.0, 140.0, 150.0, 160.0, 170.0, 180.0, 190.0],
        "CholesterolHDL" => &[50.0, 55.0, 60.0, 65.0, 70.0, 40.0, 45.0, 50.0, 55.0, 60.0],
        "Diagnosis" => &[0i64, 0, 0, 0, 0, 0, 0, 1, 1, 1],
        "DoctorInCharge" => &["XXXConfid"; 10],
    )
    .unwrap()
}

fn id_columns() -> Vec<String> {
    vec!["PatientID".to_string(), "DoctorInCharge".to_string()]
}

#[test]
fn test_identifier_columns_dropped_when_present() {
    let df = sample_df().drop("DoctorInCharge").unwrap();
    let (out, dropped) = drop_identifier_columns(&df, &id_columns()).unwrap();

    assert_eq!(dropped, vec!["PatientID"]);
    assert!(out.column("PatientID").is_err());
    assert_eq!(out.height(), 10);
}

#[test]
fn test_ratio_features_values() {
    let (df, _) = drop_identifier_columns(&sample_df(), &id_columns()).unwrap();
    let (out, derived) = derive_ratio_features(&df).unwrap();

    assert_eq!(derived, vec!["BP_Ratio", "Chol_Ratio"]);
    let bp = out.column("BP_Ratio").unwrap().as_materialized_series().f64().unwrap().get(0).unwrap();
    assert!((bp - 1.5).abs() < 1e-12);
    let chol = out.column("Chol_Ratio").unwrap().as_materialized_series().f64().unwrap().get(5).unwrap();
    assert!((chol - 3.75).abs() < 1e-12);
}

#[test]
fn test_missing_cholesterol_skips_only_that_ratio() {
    let df = sample_df().drop("CholesterolHDL").unwrap();
    let (out, derived) = derive_ratio_features(&df).unwrap();

    assert_eq!(derived, vec!["BP_Ratio"]);
    assert!(out.column("Chol_Ratio").is_err());
}

#[test]
fn test_zero_denominator_rejected() {
    let mut df = sample_df();
    df.replace("DiastolicBP", Series::new("DiastolicBP".into(), vec![0.0; 10]))
        .unwrap();
    assert!(matches!(
        derive_ratio_features(&df),
        Err(PipelineError::PreprocessingError(_))
    ));
}

#[test]
fn test_string_feature_column_rejected() {
    // DoctorInCharge left in place is not numeric
    let df = sample_df().drop("PatientID").unwrap();
    assert!(FeatureMatrix::from_frame(&df, "Diagnosis").is_err());
}

#[test]
fn test_split_scale_resample() {
    let (df, _) = drop_identifier_columns(&sample_df(), &id_columns()).unwrap();
    let (df, _) = derive_ratio_features(&df).unwrap();
    let fm = FeatureMatrix::from_frame(&df, "Diagnosis").unwrap();
    assert_eq!(fm.n_features(), 7);

    let split = stratified_split(&fm.x, &fm.y, 0.3, 42).unwrap();
    assert_eq!(split.y_test.len(), 3);
    assert_eq!(class_counts(&split.y_test).get(&1), Some(&1));

    let again = stratified_split(&fm.x, &fm.y, 0.3, 42).unwrap();
    assert_eq!(split.test_indices, again.test_indices);

    let mut scaler = StandardScaler::new();
    let x_train = scaler.fit_transform(&split.x_train).unwrap();
    for col in x_train.columns() {
        assert!(col.mean().unwrap().abs() < 1e-9);
    }

    let balanced = SMOTE::new()
        .with_k_neighbors(5)
        .with_seed(42)
        .fit_resample(&x_train, &split.y_train)
        .unwrap();
    let counts = class_counts(&balanced.y);
    assert_eq!(counts.get(&0), counts.get(&1));
    assert_eq!(balanced.x.nrows(), balanced.y.len());
}
