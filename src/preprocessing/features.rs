//! Column cleanup, derived ratio features and DataFrame → ndarray conversion

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::{debug, info};

/// A derived feature computed as `numerator / denominator`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatioFeature {
    pub name: &'static str,
    pub numerator: &'static str,
    pub denominator: &'static str,
}

/// Ratio features derived from the clinical measurements
pub const RATIO_FEATURES: [RatioFeature; 2] = [
    RatioFeature {
        name: "BP_Ratio",
        numerator: "SystolicBP",
        denominator: "DiastolicBP",
    },
    RatioFeature {
        name: "Chol_Ratio",
        numerator: "CholesterolLDL",
        denominator: "CholesterolHDL",
    },
];

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Drop the given columns where present. Returns the names actually dropped.
pub fn drop_identifier_columns(df: &DataFrame, names: &[String]) -> Result<(DataFrame, Vec<String>)> {
    let mut out = df.clone();
    let mut dropped = Vec::new();

    for name in names {
        if has_column(&out, name) {
            out = out.drop(name)?;
            dropped.push(name.clone());
        }
    }

    debug!(?dropped, "Dropped identifier columns");
    Ok((out, dropped))
}

/// Append every ratio in [`RATIO_FEATURES`] whose two source columns exist.
///
/// Returns the names of the appended columns. A zero denominator yields a
/// non-finite ratio, which is rejected with `PreprocessingError`.
pub fn derive_ratio_features(df: &DataFrame) -> Result<(DataFrame, Vec<String>)> {
    let mut out = df.clone();
    let mut derived = Vec::new();

    for ratio in RATIO_FEATURES.iter() {
        if !(has_column(df, ratio.numerator) && has_column(df, ratio.denominator)) {
            debug!(feature = ratio.name, "Source columns absent, skipping ratio");
            continue;
        }

        let num = column_f64(df, ratio.numerator)?;
        let den = column_f64(df, ratio.denominator)?;

        let values: Vec<Option<f64>> = num
            .iter()
            .zip(den.iter())
            .map(|(n, d)| match (n, d) {
                (Some(n), Some(d)) => Some(n / d),
                _ => None,
            })
            .collect();

        let non_finite = values
            .iter()
            .flatten()
            .filter(|v| !v.is_finite())
            .count();
        if non_finite > 0 {
            return Err(PipelineError::PreprocessingError(format!(
                "{} = {} / {} is not finite in {} row(s) (zero denominator)",
                ratio.name, ratio.numerator, ratio.denominator, non_finite
            )));
        }

        let series = Series::new(ratio.name.into(), values);
        out.with_column(series)?;
        derived.push(ratio.name.to_string());
    }

    info!(?derived, "Derived ratio features");
    Ok((out, derived))
}

fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::FeatureNotFound(name.to_string()))?;
    let series = column
        .as_materialized_series()
        .strict_cast(&DataType::Float64)
        .map_err(|e| PipelineError::DataError(format!("column {name} is not numeric: {e}")))?;
    Ok(series.f64()?.into_iter().collect())
}

/// Numeric features and binary labels extracted from a DataFrame
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Row-major feature values
    pub x: Array2<f64>,
    /// Labels, 0.0 or 1.0
    pub y: Array1<f64>,
    /// Feature names in column order
    pub feature_names: Vec<String>,
}

impl FeatureMatrix {
    /// Split `df` into features (all columns except `target`) and labels.
    ///
    /// Every feature must be numeric without nulls, and labels must be 0 or 1.
    pub fn from_frame(df: &DataFrame, target: &str) -> Result<Self> {
        let feature_names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != target)
            .map(|s| s.to_string())
            .collect();

        if feature_names.is_empty() {
            return Err(PipelineError::DataError("no feature columns left".to_string()));
        }

        let labels = column_f64(df, target)?;
        let y = labels
            .into_iter()
            .enumerate()
            .map(|(i, v)| match v {
                Some(v) if v == 0.0 || v == 1.0 => Ok(v),
                Some(v) => Err(PipelineError::ValidationError(format!(
                    "label {target} must be 0 or 1, row {i} has {v}"
                ))),
                None => Err(PipelineError::ValidationError(format!(
                    "label {target} is missing in row {i}"
                ))),
            })
            .collect::<Result<Array1<f64>>>()?;

        let col_data: Vec<Vec<f64>> = feature_names
            .iter()
            .map(|name| {
                column_f64(df, name)?
                    .into_iter()
                    .map(|v| {
                        v.ok_or_else(|| {
                            PipelineError::DataError(format!("column {name} contains nulls"))
                        })
                    })
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let x = Array2::from_shape_fn((df.height(), feature_names.len()), |(r, c)| col_data[c][r]);

        Ok(Self {
            x,
            y,
            feature_names,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }
}
