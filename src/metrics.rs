//! Evaluation metrics for binary classifiers and the persisted metrics record.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{EvaluateConfig, MissingKey, require};
use crate::dataset::{Dataset, DatasetError};

#[derive(Debug, Error)]
pub enum EvaluateError {
    #[error(transparent)]
    MissingKey(#[from] MissingKey),
    #[error(transparent)]
    MissingColumn(#[from] DatasetError),
    #[error("Scores have {scores} rows but ground truth has {truth}")]
    LengthMismatch { scores: usize, truth: usize },
    #[error("Column `{column}` holds {value} at row {row}, expected 0 or 1")]
    InvalidLabel {
        column: String,
        row: usize,
        value: f64,
    },
    #[error("AUC is undefined when the ground truth holds a single class")]
    SingleClass,
}

/// Confusion matrix for a binary classifier, indexed `[truth][predicted]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub counts: [[u32; 2]; 2],
}

impl ConfusionMatrix {
    pub fn from_labels(truth: &[u8], predicted: &[u8]) -> Self {
        let mut cm = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            cm.add(t, p);
        }
        cm
    }

    pub fn add(&mut self, truth: u8, predicted: u8) {
        if truth > 1 || predicted > 1 {
            return;
        }
        let cell = &mut self.counts[truth as usize][predicted as usize];
        *cell = cell.saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth][predicted]
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().flatten().sum()
    }
}

/// Precision/recall statistics for a single class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f64,
    /// `TP / (TP + FN)`.
    pub recall: f64,
    pub f1: f64,
    /// Total number of true examples for the class.
    pub support: u32,
}

/// Compute per-class precision, recall and F1 from a confusion matrix.
pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> [PerClassStats; 2] {
    [0, 1].map(|class_idx| {
        let other = 1 - class_idx;
        let tp = f64::from(cm.get(class_idx, class_idx));
        let fn_ = f64::from(cm.get(class_idx, other));
        let fp = f64::from(cm.get(other, class_idx));
        let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
        let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        PerClassStats {
            precision,
            recall,
            f1,
            support: cm.get(class_idx, class_idx) + cm.get(class_idx, other),
        }
    })
}

/// Compute overall accuracy from a confusion matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
    let total = cm.total();
    if total == 0 {
        0.0
    } else {
        f64::from(cm.get(0, 0) + cm.get(1, 1)) / f64::from(total)
    }
}

/// Area under the ROC curve from the Mann-Whitney rank statistic.
///
/// Tied scores share their average rank.
pub fn roc_auc(truth: &[u8], scores: &[f64]) -> Result<f64, EvaluateError> {
    let n_pos = truth.iter().filter(|&&t| t == 1).count();
    let n_neg = truth.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(EvaluateError::SingleClass);
    }
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // 1-based ranks start..end share their mean.
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    let positive_rank_sum: f64 = truth
        .iter()
        .zip(&ranks)
        .filter(|(t, _)| **t == 1)
        .map(|(_, rank)| rank)
        .sum();
    let (n_pos, n_neg) = (n_pos as f64, n_neg as f64);
    Ok((positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

const REPORT_WIDTH: usize = 12;

/// Text report with per-class precision, recall, F1 and support, followed by
/// accuracy, macro average and support-weighted average lines.
pub fn classification_report(cm: &ConfusionMatrix) -> String {
    let stats = precision_recall_by_class(cm);
    let total = cm.total();
    let mut out = format!(
        "{:>w$} {}\n\n",
        "",
        ["precision", "recall", "f1-score", "support"]
            .map(|head| format!(" {head:>9}"))
            .concat(),
        w = REPORT_WIDTH
    );
    for (class_idx, s) in stats.iter().enumerate() {
        out.push_str(&report_row(
            &class_idx.to_string(),
            s.precision,
            s.recall,
            s.f1,
            s.support,
        ));
    }
    out.push('\n');
    out.push_str(&format!(
        "{:>w$}  {:>9} {:>9} {:>9.2} {:>9}\n",
        "accuracy",
        "",
        "",
        accuracy(cm),
        total,
        w = REPORT_WIDTH
    ));
    let mean = |f: fn(&PerClassStats) -> f64| stats.iter().map(f).sum::<f64>() / 2.0;
    out.push_str(&report_row(
        "macro avg",
        mean(|s| s.precision),
        mean(|s| s.recall),
        mean(|s| s.f1),
        total,
    ));
    let weighted = |f: fn(&PerClassStats) -> f64| {
        if total == 0 {
            return 0.0;
        }
        stats
            .iter()
            .map(|s| f(s) * f64::from(s.support))
            .sum::<f64>()
            / f64::from(total)
    };
    out.push_str(&report_row(
        "weighted avg",
        weighted(|s| s.precision),
        weighted(|s| s.recall),
        weighted(|s| s.f1),
        total,
    ));
    out
}

fn report_row(label: &str, precision: f64, recall: f64, f1: f64, support: u32) -> String {
    format!(
        "{label:>w$}  {precision:>9.2} {recall:>9.2} {f1:>9.2} {support:>9}\n",
        w = REPORT_WIDTH
    )
}

/// Fixed-shape evaluation output persisted once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    #[serde(rename = "AUC")]
    pub auc: f64,
    #[serde(rename = "Accuracy")]
    pub accuracy: f64,
    #[serde(rename = "Confusion Matrix")]
    pub confusion_matrix: [[u32; 2]; 2],
    #[serde(rename = "Classification Report")]
    pub classification_report: String,
}

/// Compare the score table against the ground-truth table.
///
/// AUC uses the probability column; the remaining metrics use the binary one.
pub fn evaluate(
    scores: &Dataset,
    ground_truth: &Dataset,
    config: &EvaluateConfig,
) -> Result<MetricsRecord, EvaluateError> {
    let target = require(&config.target, "evaluate_performance.target")?;
    let prob_col = require(&config.prob_col, "evaluate_performance.prob_col")?;
    let bin_col = require(&config.bin_col, "evaluate_performance.bin_col")?;

    if scores.n_rows() != ground_truth.n_rows() {
        return Err(EvaluateError::LengthMismatch {
            scores: scores.n_rows(),
            truth: ground_truth.n_rows(),
        });
    }
    let truth = binary_labels(ground_truth, target)?;
    let predicted = binary_labels(scores, bin_col)?;
    let probabilities = scores.column(prob_col)?.to_vec();

    let cm = ConfusionMatrix::from_labels(&truth, &predicted);
    let record = MetricsRecord {
        auc: roc_auc(&truth, &probabilities)?,
        accuracy: accuracy(&cm),
        confusion_matrix: cm.counts,
        classification_report: classification_report(&cm),
    };
    tracing::info!(
        "Model evaluated: AUC {:.4}, accuracy {:.4}",
        record.auc,
        record.accuracy
    );
    Ok(record)
}

fn binary_labels(dataset: &Dataset, column: &str) -> Result<Vec<u8>, EvaluateError> {
    dataset
        .column(column)?
        .iter()
        .enumerate()
        .map(|(row, &value)| match value {
            v if v == 0.0 => Ok(0),
            v if v == 1.0 => Ok(1),
            value => Err(EvaluateError::InvalidLabel {
                column: column.to_string(),
                row,
                value,
            }),
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum MetricsIoError {
    #[error("Failed to write metrics {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read metrics {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize metrics for {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("Invalid metrics document {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl MetricsIoError {
    pub fn is_file_access(&self) -> bool {
        matches!(self, Self::Write { .. } | Self::Read { .. })
    }
}

/// Persist the metrics record as a TOML document.
pub fn save_metrics(record: &MetricsRecord, path: &Path) -> Result<(), MetricsIoError> {
    let text = toml::to_string(record).map_err(|source| MetricsIoError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(|source| MetricsIoError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Metrics saved to {}", path.display());
    Ok(())
}

pub fn load_metrics(path: &Path) -> Result<MetricsRecord, MetricsIoError> {
    let text = std::fs::read_to_string(path).map_err(|source| MetricsIoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| MetricsIoError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_cm() -> ConfusionMatrix {
        ConfusionMatrix::from_labels(&[0, 0, 1, 1], &[0, 1, 1, 1])
    }

    #[test]
    fn confusion_matrix_rows_are_truth() {
        let cm = sample_cm();
        assert_eq!(cm.counts, [[1, 1], [0, 2]]);
        assert_eq!(accuracy(&cm), 0.75);
    }

    #[test]
    fn per_class_stats_match_hand_computation() {
        let [zero, one] = precision_recall_by_class(&sample_cm());
        assert_eq!((zero.precision, zero.recall, zero.support), (1.0, 0.5, 2));
        assert!((zero.f1 - 2.0 / 3.0).abs() < 1e-12);
        assert!((one.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(one.recall, 1.0);
        assert!((one.f1 - 0.8).abs() < 1e-12);
    }

    #[test]
    fn auc_handles_perfect_inverted_and_tied_scores() {
        let truth = [0, 0, 1, 1];
        assert_eq!(roc_auc(&truth, &[0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_eq!(roc_auc(&truth, &[0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
        assert_eq!(roc_auc(&truth, &[0.5, 0.5, 0.5, 0.5]).unwrap(), 0.5);
        // One positive ties with one negative: 3 of 4 pairs ranked right plus a half.
        assert_eq!(roc_auc(&truth, &[0.1, 0.6, 0.6, 0.9]).unwrap(), 0.875);
    }

    #[test]
    fn auc_needs_both_classes() {
        assert!(matches!(
            roc_auc(&[1, 1], &[0.2, 0.3]),
            Err(EvaluateError::SingleClass)
        ));
    }

    #[test]
    fn report_is_column_aligned() {
        let report = classification_report(&sample_cm());
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], format!("{}precision    recall  f1-score   support", " ".repeat(14)));
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "           0       1.00      0.50      0.67         2");
        assert_eq!(lines[3], "           1       0.67      1.00      0.80         2");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], format!("    accuracy{}0.75{}4", " ".repeat(27), " ".repeat(9)));
        assert_eq!(lines[6], "   macro avg       0.83      0.75      0.73         4");
        assert_eq!(lines[7], "weighted avg       0.83      0.75      0.73         4");
    }

    fn evaluate_config() -> EvaluateConfig {
        EvaluateConfig {
            target: Some("class".into()),
            prob_col: Some("predicted_probability".into()),
            bin_col: Some("predicted_binary".into()),
        }
    }

    #[test]
    fn evaluate_builds_record() {
        let scores = Dataset::from_columns([
            ("predicted_probability", vec![0.2, 0.7, 0.6, 0.9]),
            ("predicted_binary", vec![0.0, 1.0, 1.0, 1.0]),
        ])
        .unwrap();
        let truth =
            Dataset::from_columns([("x", vec![0.0; 4]), ("class", vec![0.0, 0.0, 1.0, 1.0])])
                .unwrap();
        let record = evaluate(&scores, &truth, &evaluate_config()).unwrap();
        assert_eq!(record.confusion_matrix, [[1, 1], [0, 2]]);
        assert_eq!(record.accuracy, 0.75);
        assert_eq!(record.auc, 0.75);
        assert!(record.classification_report.contains("weighted avg"));
    }

    #[test]
    fn evaluate_reports_missing_keys_and_bad_labels() {
        let scores = Dataset::from_columns([
            ("predicted_probability", vec![0.2, 0.7]),
            ("predicted_binary", vec![0.0, 0.5]),
        ])
        .unwrap();
        let truth = Dataset::from_columns([("class", vec![0.0, 1.0])]).unwrap();
        let mut config = evaluate_config();
        config.bin_col = None;
        assert!(matches!(
            evaluate(&scores, &truth, &config),
            Err(EvaluateError::MissingKey(MissingKey("evaluate_performance.bin_col")))
        ));
        assert!(matches!(
            evaluate(&scores, &truth, &evaluate_config()),
            Err(EvaluateError::InvalidLabel { row: 1, .. })
        ));
    }

    #[test]
    fn metrics_document_uses_report_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics.toml");
        let cm = sample_cm();
        let record = MetricsRecord {
            auc: 0.9,
            accuracy: accuracy(&cm),
            confusion_matrix: cm.counts,
            classification_report: classification_report(&cm),
        };
        save_metrics(&record, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("AUC = 0.9"));
        assert!(text.contains("\"Confusion Matrix\""));
        assert_eq!(load_metrics(&path).unwrap(), record);
    }
}
