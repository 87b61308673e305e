//! Data preprocessing module
//!
//! Turns the raw clinical table into model-ready arrays:
//! - Identifier removal and derived ratio features
//! - DataFrame to ndarray conversion with label validation
//! - Stratified train/test split
//! - Standard scaling fitted on the training partition

mod features;
mod scaler;
mod split;

pub use features::{
    derive_ratio_features, drop_identifier_columns, FeatureMatrix, RatioFeature, RATIO_FEATURES,
};
pub use scaler::StandardScaler;
pub use split::{stratified_split, TrainTestSplit};

pub(crate) use split::indices_by_class;
