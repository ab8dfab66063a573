//! Metric library
//!
//! Pure functions over label, prediction and probability slices. Metric names
//! are part of the output contract: downstream dashboards key on them.
//!
//! ```rust
//! use trueno_eval::metrics::regressor_metrics;
//!
//! let m = regressor_metrics(&[1.1, 2.1, -3.5], &[1.5, 2.0, -3.0]);
//! assert!((m["max_error"] - 0.5).abs() < 1e-9);
//! ```

mod curves;

use std::collections::BTreeMap;

use ndarray::Array2;

pub use curves::{
    auc, binary_clf_curve, classifier_curve, cumulative_gain_curve, lift_curve,
    precision_recall_curve, roc_curve, BinaryClfCurve, Curve, CurveArea, CurveType,
    PrecisionRecallCurve, RocCurve,
};

use crate::dataset::Label;

/// Flat metric mapping, ordered by name.
pub type Metrics = BTreeMap<String, f64>;

/// Probabilities are clipped to `[EPS, 1 - EPS]` before taking logs.
const LOG_LOSS_EPS: f64 = 1e-15;

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Regression metrics of `y_pred` against `y_true`.
///
/// Produces `example_count`, `mean_absolute_error`, `mean_squared_error`,
/// `root_mean_squared_error`, `sum_on_label`, `mean_on_label`, `r2_score`,
/// `max_error` and `mean_absolute_percentage_error`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn regressor_metrics(y_true: &[f64], y_pred: &[f64]) -> Metrics {
    let errors = || y_true.iter().zip(y_pred).map(|(t, p)| t - p);
    let n = y_true.len();
    let mae = mean(&errors().map(f64::abs).collect::<Vec<_>>());
    let mse = mean(&errors().map(|e| e * e).collect::<Vec<_>>());
    let sum_on_label: f64 = y_true.iter().sum();
    let mean_on_label = sum_on_label / n as f64;
    let ss_res: f64 = errors().map(|e| e * e).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean_on_label).powi(2)).sum();
    let r2 = if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    };
    let max_error = errors().map(f64::abs).fold(0.0, f64::max);
    let percentage_errors: Vec<f64> = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs() / t.abs().max(f64::EPSILON))
        .collect();
    let mape = mean(&percentage_errors);

    Metrics::from([
        ("example_count".to_string(), n as f64),
        ("mean_absolute_error".to_string(), mae),
        ("mean_squared_error".to_string(), mse),
        ("root_mean_squared_error".to_string(), mse.sqrt()),
        ("sum_on_label".to_string(), sum_on_label),
        ("mean_on_label".to_string(), mean_on_label),
        ("r2_score".to_string(), r2),
        ("max_error".to_string(), max_error),
        ("mean_absolute_percentage_error".to_string(), mape),
    ])
}

/// Confusion counts of a binarised problem: `(tn, fp, fn, tp)`.
fn binary_confusion(y_true: &[bool], y_pred: &[bool]) -> (u64, u64, u64, u64) {
    y_true
        .iter()
        .zip(y_pred)
        .fold((0, 0, 0, 0), |(tn, fp, fneg, tp), (&t, &p)| match (t, p) {
            (false, false) => (tn + 1, fp, fneg, tp),
            (false, true) => (tn, fp + 1, fneg, tp),
            (true, false) => (tn, fp, fneg + 1, tp),
            (true, true) => (tn, fp, fneg, tp + 1),
        })
}

fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Per-class metrics for a binarised label.
///
/// Produces `true_negatives`, `false_positives`, `false_negatives`,
/// `true_positives`, `recall`, `precision` and `f1_score`. Ratios whose
/// denominator is zero are reported as 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn classifier_per_class_metrics(y_true: &[bool], y_pred: &[bool]) -> Metrics {
    let (tn, fp, fneg, tp) = binary_confusion(y_true, y_pred);
    let (tn, fp, fneg, tp) = (tn as f64, fp as f64, fneg as f64, tp as f64);
    let recall = ratio_or_zero(tp, tp + fneg);
    let precision = ratio_or_zero(tp, tp + fp);
    let f1 = ratio_or_zero(2.0 * precision * recall, precision + recall);

    Metrics::from([
        ("true_negatives".to_string(), tn),
        ("false_positives".to_string(), fp),
        ("false_negatives".to_string(), fneg),
        ("true_positives".to_string(), tp),
        ("recall".to_string(), recall),
        ("precision".to_string(), precision),
        ("f1_score".to_string(), f1),
    ])
}

/// Multinomial log loss. `y_probs` columns follow the order of `labels`.
///
/// Probabilities are clipped and each row renormalised.
#[must_use]
pub fn log_loss(y_true: &[Label], y_probs: &[Vec<f64>], labels: &[Label]) -> f64 {
    let losses: Vec<f64> = y_true
        .iter()
        .zip(y_probs)
        .map(|(label, row)| {
            let clipped: Vec<f64> = row
                .iter()
                .map(|p| p.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS))
                .collect();
            let total: f64 = clipped.iter().sum();
            let p = labels
                .iter()
                .position(|l| l == label)
                .and_then(|i| clipped.get(i))
                .map_or(LOG_LOSS_EPS, |p| p / total);
            -p.ln()
        })
        .collect();
    mean(&losses)
}

/// Global classifier metrics.
///
/// Always produces `accuracy` and `example_count`, adds `log_loss` when
/// probabilities are given, and for multiclass problems adds
/// `f1_score_micro` and `f1_score_macro` (unweighted mean of per-class f1
/// over `labels`).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn classifier_global_metrics(
    is_binary: bool,
    y_true: &[Label],
    y_pred: &[Label],
    y_probs: Option<&[Vec<f64>]>,
    labels: &[Label],
) -> Metrics {
    let n = y_true.len();
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    let accuracy = ratio_or_zero(correct as f64, n as f64);

    let mut metrics = Metrics::from([
        ("accuracy".to_string(), accuracy),
        ("example_count".to_string(), n as f64),
    ]);

    if !is_binary {
        // single-label multiclass: micro precision == micro recall == accuracy
        metrics.insert("f1_score_micro".to_string(), accuracy);
        let per_class_f1: Vec<f64> = labels
            .iter()
            .map(|label| {
                let t: Vec<bool> = y_true.iter().map(|y| y == label).collect();
                let p: Vec<bool> = y_pred.iter().map(|y| y == label).collect();
                classifier_per_class_metrics(&t, &p)["f1_score"]
            })
            .collect();
        let f1_macro = mean(&per_class_f1);
        metrics.insert("f1_score_macro".to_string(), f1_macro);
    }

    if let Some(probs) = y_probs {
        metrics.insert("log_loss".to_string(), log_loss(y_true, probs, labels));
    }
    metrics
}

/// One-vs-rest view of a multiclass problem.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryView {
    /// `y_true == class_label`
    pub y_true: Vec<bool>,
    /// `y_pred == class_label`
    pub y_pred: Vec<bool>,
    /// Probability column of `class_label`, when probabilities exist.
    pub y_prob: Option<Vec<f64>>,
}

/// Binarise labels and predictions against `class_label` and pick the
/// probability column at `class_index`.
#[must_use]
pub fn binary_sum_up_label_pred_prob(
    class_index: usize,
    class_label: &Label,
    y_true: &[Label],
    y_pred: &[Label],
    y_probs: Option<&[Vec<f64>]>,
) -> BinaryView {
    BinaryView {
        y_true: y_true.iter().map(|y| y == class_label).collect(),
        y_pred: y_pred.iter().map(|y| y == class_label).collect(),
        y_prob: y_probs.map(|probs| {
            probs
                .iter()
                .map(|row| row.get(class_index).copied().unwrap_or(f64::NAN))
                .collect()
        }),
    }
}

/// Confusion matrix with rows indexed by true label and columns by predicted
/// label, both in `labels` order.
#[must_use]
pub fn confusion_matrix(y_true: &[Label], y_pred: &[Label], labels: &[Label]) -> Array2<u64> {
    let mut matrix = Array2::zeros((labels.len(), labels.len()));
    for (t, p) in y_true.iter().zip(y_pred) {
        let row = labels.iter().position(|l| l == t);
        let col = labels.iter().position(|l| l == p);
        if let (Some(row), Some(col)) = (row, col) {
            matrix[[row, col]] += 1;
        }
    }
    matrix
}
