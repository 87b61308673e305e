//! Plotly charts written as standalone HTML documents

use plotly::common::{DashType, Line, Mode, Orientation};
use plotly::layout::{Axis, BarMode};
use plotly::{Bar, HeatMap, Layout, Plot, Scatter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::ComparisonTable;
use crate::error::{PipelineError, Result};
use crate::evaluation::{
    ConfusionMatrix, FeatureImportance, ModelEvaluation, PrecisionRecallCurve, RocCurve,
};

/// Columns shown in the grouped metric chart
const COMPARED_METRICS: [&str; 4] = ["Accuracy", "Precision", "Recall", "F1"];

pub fn plot_confusion_matrix(cm: &ConfusionMatrix, model: &str) -> Plot {
    let rows = cm.as_rows();
    // plotly draws the first y category at the bottom
    let z = vec![rows[1].to_vec(), rows[0].to_vec()];
    let trace = HeatMap::new(
        vec!["Predicted 0", "Predicted 1"],
        vec!["Actual 1", "Actual 0"],
        z,
    );

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(
        Layout::new()
            .title(format!("Confusion Matrix: {}", model).as_str())
            .x_axis(Axis::new().title("Predicted label"))
            .y_axis(Axis::new().title("True label")),
    );
    plot
}

pub fn plot_roc_curve(roc: &RocCurve, model: &str) -> Plot {
    let curve = Scatter::new(roc.fpr.clone(), roc.tpr.clone())
        .mode(Mode::Lines)
        .name(format!("{} (AUC = {:.3})", model, roc.auc).as_str());
    let chance = Scatter::new(vec![0.0, 1.0], vec![0.0, 1.0])
        .mode(Mode::Lines)
        .name("Chance")
        .line(Line::new().color("gray").dash(DashType::Dash));

    let mut plot = Plot::new();
    plot.add_trace(curve);
    plot.add_trace(chance);
    plot.set_layout(
        Layout::new()
            .title(format!("ROC Curve: {}", model).as_str())
            .x_axis(Axis::new().title("False Positive Rate").range(vec![0.0, 1.0]))
            .y_axis(Axis::new().title("True Positive Rate").range(vec![0.0, 1.05])),
    );
    plot
}

pub fn plot_precision_recall_curve(pr: &PrecisionRecallCurve, model: &str) -> Plot {
    let curve = Scatter::new(pr.recall.clone(), pr.precision.clone())
        .mode(Mode::Lines)
        .name(format!("{} (AP = {:.3})", model, pr.average_precision).as_str());

    let mut plot = Plot::new();
    plot.add_trace(curve);
    plot.set_layout(
        Layout::new()
            .title(format!("Precision-Recall Curve: {}", model).as_str())
            .x_axis(Axis::new().title("Recall").range(vec![0.0, 1.0]))
            .y_axis(Axis::new().title("Precision").range(vec![0.0, 1.05])),
    );
    plot
}

/// Horizontal bars, most important feature on top
pub fn plot_feature_importances(ranked: &[FeatureImportance], model: &str, top: Option<usize>) -> Plot {
    let shown = top.unwrap_or(ranked.len()).min(ranked.len());
    let (names, values): (Vec<String>, Vec<f64>) = ranked[..shown]
        .iter()
        .rev()
        .map(|fi| (fi.feature.clone(), fi.importance))
        .unzip();

    let trace = Bar::new(values, names)
        .orientation(Orientation::Horizontal)
        .name(model);

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(
        Layout::new()
            .title(format!("Feature Importances: {}", model).as_str())
            .x_axis(Axis::new().title("Importance"))
            .height(200 + 20 * shown),
    );
    plot
}

/// Grouped bars of accuracy, precision, recall and F1 per model
pub fn plot_metric_comparison(table: &ComparisonTable) -> Plot {
    let mut plot = Plot::new();
    for row in &table.rows {
        let values: Vec<f64> = COMPARED_METRICS
            .iter()
            .filter_map(|m| super::METRIC_COLUMNS.iter().position(|c| c == m))
            .map(|idx| row.values[idx].unwrap_or(0.0))
            .collect();
        plot.add_trace(Bar::new(COMPARED_METRICS.to_vec(), values).name(&row.model));
    }
    plot.set_layout(
        Layout::new()
            .title("Model Comparison")
            .bar_mode(BarMode::Group)
            .y_axis(Axis::new().title("Score").range(vec![0.0, 1.0])),
    );
    plot
}

/// ROC-AUC per model; `None` unless every model has one
pub fn plot_roc_auc_comparison(table: &ComparisonTable) -> Option<Plot> {
    let aucs: Option<Vec<f64>> = table.column("ROC-AUC")?.into_iter().collect();
    let aucs = aucs?;
    let models: Vec<String> = table.rows.iter().map(|r| r.model.clone()).collect();

    let mut plot = Plot::new();
    plot.add_trace(Bar::new(models, aucs).name("ROC-AUC"));
    plot.set_layout(
        Layout::new()
            .title("ROC-AUC Comparison")
            .y_axis(Axis::new().title("ROC-AUC").range(vec![0.0, 1.0])),
    );
    Some(plot)
}

fn write_plot(plot: &Plot, dir: &Path, file_name: &str) -> Result<PathBuf> {
    let path = dir.join(file_name);
    fs::write(&path, plot.to_html()).map_err(|e| {
        PipelineError::PlotError(format!("Failed to write {}: {}", path.display(), e))
    })?;
    debug!(path = %path.display(), "Chart written");
    Ok(path)
}

/// Render every chart for the run into `dir`, returning the written paths
pub fn write_charts(
    evaluations: &[ModelEvaluation],
    table: &ComparisonTable,
    dir: &Path,
    top_features: Option<usize>,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    for eval in evaluations {
        let name = eval.kind.name();
        let slug = eval.kind.slug();

        written.push(write_plot(
            &plot_confusion_matrix(&eval.confusion, name),
            dir,
            &format!("{}_confusion_matrix.html", slug),
        )?);
        if let Some(roc) = &eval.roc {
            written.push(write_plot(&plot_roc_curve(roc, name), dir, &format!("{}_roc_curve.html", slug))?);
        }
        if let Some(pr) = &eval.pr {
            written.push(write_plot(
                &plot_precision_recall_curve(pr, name),
                dir,
                &format!("{}_precision_recall.html", slug),
            )?);
        }
        if let Some(ranked) = &eval.importances {
            written.push(write_plot(
                &plot_feature_importances(ranked, name, top_features),
                dir,
                &format!("{}_feature_importance.html", slug),
            )?);
        }
    }

    written.push(write_plot(&plot_metric_comparison(table), dir, "model_comparison.html")?);
    if let Some(plot) = plot_roc_auc_comparison(table) {
        written.push(write_plot(&plot, dir, "roc_auc_comparison.html")?);
    }

    info!(n_charts = written.len(), dir = %dir.display(), "Charts rendered");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ComparisonRow;

    fn table(roc: [Option<f64>; 2]) -> ComparisonTable {
        ComparisonTable {
            rows: vec![
                ComparisonRow {
                    model: "Gradient Boosting".to_string(),
                    values: [Some(0.9), Some(0.8), Some(0.7), Some(0.75), roc[0], Some(0.85), Some(0.01)],
                },
                ComparisonRow {
                    model: "SVM".to_string(),
                    values: [Some(0.8), Some(0.7), Some(0.6), Some(0.65), roc[1], Some(0.8), Some(0.02)],
                },
            ],
        }
    }

    #[test]
    fn test_roc_auc_chart_requires_every_model() {
        assert!(plot_roc_auc_comparison(&table([Some(0.9), Some(0.8)])).is_some());
        assert!(plot_roc_auc_comparison(&table([Some(0.9), None])).is_none());
    }

    #[test]
    fn test_metric_comparison_has_trace_per_model() {
        let html = plot_metric_comparison(&table([None, None])).to_html();
        assert!(html.contains("Gradient Boosting"));
        assert!(html.contains("SVM"));
    }

    #[test]
    fn test_write_chart_file() {
        let dir = tempfile::tempdir().unwrap();
        let cm = ConfusionMatrix {
            tn: 5,
            fp: 1,
            fn_: 2,
            tp: 4,
        };
        let path = write_plot(&plot_confusion_matrix(&cm, "SVM"), dir.path(), "cm.html").unwrap();
        let html = fs::read_to_string(path).unwrap();
        assert!(html.contains("Confusion Matrix: SVM"));
    }

    #[test]
    fn test_feature_importance_top_limit() {
        let ranked = vec![
            FeatureImportance { feature: "MMSE".to_string(), importance: 0.5 },
            FeatureImportance { feature: "ADL".to_string(), importance: 0.3 },
            FeatureImportance { feature: "Age".to_string(), importance: 0.2 },
        ];
        let html = plot_feature_importances(&ranked, "Random Forest", Some(2)).to_html();
        assert!(html.contains("MMSE"));
        assert!(!html.contains("\"Age\""));
    }
}
