//! Utility functions and types

pub mod data_loader;

pub use data_loader::{label_counts, DataLoader, DatasetSummary};
