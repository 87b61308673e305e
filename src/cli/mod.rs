//! Command-line interface
//!
//! `run` (the default) executes the full comparison, `info` prints the
//! dataset summary and `config` prints the effective configuration.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

use crate::config::PipelineConfig;
use crate::pipeline::Pipeline;
use crate::report::console;
use crate::utils::{DataLoader, DatasetSummary};

#[derive(Parser)]
#[command(name = "alzheimer-ml")]
#[command(author, version, about = "Compare classifiers on the Alzheimer's disease dataset")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Options for the default `run` command
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train and compare all models (default)
    Run(RunArgs),

    /// Print the dataset summary only
    Info {
        /// Input CSV file
        #[arg(short, long, default_value = "alzheimers_disease_data.csv")]
        data: PathBuf,

        /// Label column
        #[arg(short, long, default_value = "Diagnosis")]
        target: String,

        /// Rows shown in the preview
        #[arg(long, default_value = "5")]
        head: usize,
    },

    /// Print the effective configuration as JSON
    Config(RunArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Input CSV file
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Label column
    #[arg(short, long)]
    pub target: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for chart files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Fraction of rows held out for testing
    #[arg(long)]
    pub test_size: Option<f64>,

    /// Cross-validation folds
    #[arg(long)]
    pub cv_folds: Option<usize>,

    /// Skip chart rendering
    #[arg(long)]
    pub no_plots: bool,

    /// Show only the N most important features
    #[arg(long)]
    pub top_features: Option<usize>,
}

impl RunArgs {
    /// Defaults, then the JSON file, then flags
    pub fn to_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(data) = &self.data {
            config.data_path = data.clone();
        }
        if let Some(target) = &self.target {
            config.target_column = target.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(seed) = self.seed {
            config.random_seed = seed;
        }
        if let Some(test_size) = self.test_size {
            config.test_size = test_size;
        }
        if let Some(folds) = self.cv_folds {
            config.cv_folds = folds;
        }
        if self.no_plots {
            config.plots = false;
        }
        if self.top_features.is_some() {
            config.top_features = self.top_features;
        }

        config.validate()?;
        Ok(config)
    }
}

fn banner() {
    println!();
    println!(
        "  {} {}",
        "Alzheimer's Diagnosis Model Comparison".white().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).truecolor(100, 100, 100)
    );
}

pub fn cmd_run(args: &RunArgs) -> anyhow::Result<()> {
    let config = args.to_config()?;
    banner();
    println!("  {:<12} {}", "Data".truecolor(140, 140, 140), config.data_path.display());
    println!("  {:<12} {}", "Target".truecolor(140, 140, 140), config.target_column);
    println!("  {:<12} {}", "Seed".truecolor(140, 140, 140), config.random_seed);

    Pipeline::new(config).run()?;

    println!();
    console::step_ok("Done");
    Ok(())
}

pub fn cmd_info(data: &PathBuf, target: &str, head: usize) -> anyhow::Result<()> {
    let df = DataLoader::new().load_csv(data)?;
    let summary = DatasetSummary::from_frame(&df, target, head)?;
    console::print_dataset_summary(&summary);
    println!();
    Ok(())
}

pub fn cmd_config(args: &RunArgs) -> anyhow::Result<()> {
    let config = args.to_config()?;
    println!("{}", config.to_json()?);
    Ok(())
}
