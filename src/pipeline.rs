//! End-to-end run: load, preprocess, balance, train, evaluate, report
//!
//! Stages run one after another on the calling thread.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::evaluation::{EvaluationData, Evaluator, ModelEvaluation};
use crate::preprocessing::{
    derive_ratio_features, drop_identifier_columns, stratified_split, FeatureMatrix, StandardScaler,
};
use crate::report::{console, plots, ComparisonTable};
use crate::synthetic::{class_counts, Sampler, SMOTE};
use crate::training::{CVStrategy, CrossValidator, ModelSpec};
use crate::utils::{DataLoader, DatasetSummary};
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Everything produced by a run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub summary: DatasetSummary,
    /// Identifier columns that were present and removed
    pub dropped_columns: Vec<String>,
    /// Ratio features appended to the table
    pub derived_features: Vec<String>,
    pub feature_names: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
    /// Training class counts after oversampling
    pub balanced_counts: BTreeMap<i64, usize>,
    pub n_synthetic: usize,
    pub scaler: StandardScaler,
    /// In comparison order
    pub evaluations: Vec<ModelEvaluation>,
    pub table: ComparisonTable,
    pub chart_paths: Vec<PathBuf>,
}

/// Configured pipeline
pub struct Pipeline {
    config: PipelineConfig,
    console: bool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            console: true,
        }
    }

    /// Toggle printing of the console report
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the configured CSV and run every stage
    pub fn run(&self) -> Result<PipelineOutcome> {
        self.config.validate()?;
        let df = DataLoader::new().load_csv(&self.config.data_path)?;
        self.run_on_frame(&df)
    }

    /// Run every stage on an already loaded table
    pub fn run_on_frame(&self, df: &DataFrame) -> Result<PipelineOutcome> {
        self.config.validate()?;
        let cfg = &self.config;
        let start = Instant::now();

        let summary = DatasetSummary::from_frame(df, &cfg.target_column, cfg.head_rows)?;
        if self.console {
            console::print_dataset_summary(&summary);
            console::section("Preprocessing");
        }

        let (df, dropped_columns) = drop_identifier_columns(df, &cfg.id_columns)?;
        let (df, derived_features) = derive_ratio_features(&df)?;
        let features = FeatureMatrix::from_frame(&df, &cfg.target_column)?;
        info!(
            n_samples = features.n_samples(),
            n_features = features.n_features(),
            ?derived_features,
            "Feature matrix ready"
        );

        let split = stratified_split(&features.x, &features.y, cfg.test_size, cfg.random_seed)?;
        let mut scaler = StandardScaler::new();
        let x_train = scaler.fit_transform(&split.x_train)?;
        let x_test = scaler.transform(&split.x_test)?;

        let balanced = SMOTE::new()
            .with_k_neighbors(cfg.smote_k_neighbors)
            .with_seed(cfg.random_seed)
            .fit_resample(&x_train, &split.y_train)?;
        let balanced_counts = class_counts(&balanced.y);

        if self.console {
            if !dropped_columns.is_empty() {
                console::step_ok(&format!("Dropped {}", dropped_columns.join(", ")));
            }
            if !derived_features.is_empty() {
                console::step_ok(&format!("Derived {}", derived_features.join(", ")));
            }
            console::step_ok(&format!(
                "Split {} train / {} test rows",
                split.y_train.len(),
                split.y_test.len()
            ));
            console::step_ok(&format!(
                "SMOTE added {} rows, class counts {:?}",
                balanced.total_synthetic(),
                balanced_counts
            ));
        }

        let cv = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: cfg.cv_folds,
            shuffle: false,
        });
        let evaluator = Evaluator::new(cv);
        let data = EvaluationData {
            x_train: &balanced.x,
            y_train: &balanced.y,
            x_test: &x_test,
            y_test: &split.y_test,
            feature_names: &features.feature_names,
        };

        let mut evaluations = Vec::new();
        for spec in ModelSpec::catalogue(&cfg.models, cfg.random_seed) {
            if self.console {
                console::step(&format!("Training {}", spec.kind()));
            }
            let eval = evaluator.evaluate(&spec, &data)?;
            if self.console {
                console::print_model_evaluation(&eval);
            }
            evaluations.push(eval);
        }

        let table = ComparisonTable::from_evaluations(&evaluations);
        if self.console {
            console::print_comparison_table(&table);
            for eval in &evaluations {
                if let Some(ranked) = &eval.importances {
                    console::print_importances(eval.kind.name(), ranked, cfg.top_features);
                }
            }
        }

        let chart_paths = if cfg.plots {
            plots::write_charts(&evaluations, &table, &cfg.output_dir, cfg.top_features)?
        } else {
            Vec::new()
        };
        if self.console {
            console::print_chart_paths(&chart_paths);
        }

        info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            n_models = evaluations.len(),
            "Pipeline finished"
        );

        Ok(PipelineOutcome {
            summary,
            dropped_columns,
            derived_features,
            feature_names: features.feature_names,
            n_train: split.y_train.len(),
            n_test: split.y_test.len(),
            balanced_counts,
            n_synthetic: balanced.total_synthetic(),
            scaler,
            evaluations,
            table,
            chart_paths,
        })
    }
}
