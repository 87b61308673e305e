//! Console rendering of the run

use colored::*;
use std::path::PathBuf;

use super::{ComparisonTable, METRIC_COLUMNS};
use crate::evaluation::{FeatureImportance, ModelEvaluation};
use crate::utils::DatasetSummary;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString { s.truecolor(100, 210, 120) }

fn fmt_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.4}", v),
        None => "n/a".to_string(),
    }
}

pub fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

pub fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

pub fn step(msg: &str) {
    println!("  {} {}", accent("›"), msg);
}

/// Shape, head rows, null counts and class distribution
pub fn print_dataset_summary(summary: &DatasetSummary) {
    section("Dataset");
    println!("  {:<14} {}", muted("Rows"), summary.n_rows);
    println!("  {:<14} {}", muted("Columns"), summary.n_cols);
    println!();
    println!("{}", summary.head);

    println!();
    println!("  {:<24} {:>6}", muted("Column"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(31)));
    for (name, nulls) in &summary.null_counts {
        let count = if *nulls > 0 {
            nulls.to_string().yellow()
        } else {
            nulls.to_string().normal()
        };
        println!("  {:<24} {:>6}", name, count);
    }
    println!("  {:<24} {:>6}", muted("Total"), summary.total_nulls());

    println!();
    println!("  {:<14} {:>8}", muted("Class"), muted("Rows"));
    for (label, count) in &summary.class_distribution {
        let share = *count as f64 / summary.n_rows.max(1) as f64 * 100.0;
        println!("  {:<14} {:>8} {}", label, count, dim(&format!("({:.1}%)", share)));
    }
}

/// Test metrics, CV scores, confusion matrix and classification report for one model
pub fn print_model_evaluation(eval: &ModelEvaluation) {
    section(eval.kind.name());

    let m = &eval.metrics;
    println!("  {:<16} {}", muted("Accuracy"), format!("{:.4}", m.accuracy).white().bold());
    println!("  {:<16} {:.4}", muted("Precision"), m.precision);
    println!("  {:<16} {:.4}", muted("Recall"), m.recall);
    println!("  {:<16} {:.4}", muted("F1 Score"), m.f1_score);
    println!("  {:<16} {}", muted("ROC-AUC"), fmt_metric(m.roc_auc));
    println!("  {:<16} {:.3}s", muted("Fit time"), eval.fit_time_secs);

    println!();
    let folds: Vec<String> = eval.cv.scores.iter().map(|s| format!("{:.4}", s)).collect();
    println!("  {:<16} [{}]", muted("CV scores"), folds.join(", "));
    println!(
        "  {:<16} {:.4} {}",
        muted("CV accuracy"),
        eval.cv.mean_score,
        dim(&format!("± {:.4}", eval.cv.std_score))
    );

    println!();
    println!("  {}", muted("Confusion matrix"));
    for line in eval.confusion.to_string().lines() {
        println!("  {}", line);
    }

    println!();
    println!("  {}", muted("Classification report"));
    for line in eval.report.to_string().lines() {
        println!("  {}", line);
    }
}

/// One row per model, one column per metric
pub fn print_comparison_table(table: &ComparisonTable) {
    section("Model Comparison");

    let header: String = METRIC_COLUMNS
        .iter()
        .map(|c| format!("{:>10}", c))
        .collect::<Vec<_>>()
        .join(" ");
    println!("  {:<20} {}", "", muted(&header));
    println!("  {}", dim(&"─".repeat(20 + 11 * METRIC_COLUMNS.len())));

    for row in &table.rows {
        let cells: String = row
            .values
            .iter()
            .map(|v| format!("{:>10}", fmt_metric(*v)))
            .collect::<Vec<_>>()
            .join(" ");
        println!("  {:<20} {}", row.model.white().bold(), cells);
    }
}

/// Importance ranking, limited to `top` entries when given
pub fn print_importances(model: &str, ranked: &[FeatureImportance], top: Option<usize>) {
    section(&format!("Feature Importances: {}", model));
    let shown = top.unwrap_or(ranked.len()).min(ranked.len());

    for (rank, fi) in ranked.iter().take(shown).enumerate() {
        let bar = "█".repeat((fi.importance * 40.0).round() as usize);
        println!(
            "  {:>3} {:<28} {:>8.4} {}",
            dim(&format!("{}.", rank + 1)),
            fi.feature,
            fi.importance,
            accent(&bar)
        );
    }
    if shown < ranked.len() {
        println!("  {}", dim(&format!("... {} more", ranked.len() - shown)));
    }
}

pub fn print_chart_paths(paths: &[PathBuf]) {
    if paths.is_empty() {
        return;
    }
    section("Charts");
    for path in paths {
        step_ok(&path.display().to_string());
    }
}
