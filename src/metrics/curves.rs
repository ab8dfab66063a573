//! Threshold-sweep curves: ROC, precision-recall, cumulative gain and lift.
//!
//! Points are emitted in decreasing-threshold order so that a `steps-post`
//! line renders the curve correctly.

use crate::dataset::Label;
use crate::plot::{DataSeries, LinePlot, LineStyle};

/// Which curve [`classifier_curve`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveType {
    /// Precision-recall curve
    Pr,
    /// Receiver operating characteristic curve
    Roc,
}

/// Area under the produced curve(s).
#[derive(Debug, Clone, PartialEq)]
pub enum CurveArea {
    /// Binary problem: one area
    Single(f64),
    /// Multiclass problem: one area per label, in label order
    PerLabel(Vec<f64>),
}

/// Plot description plus area of a classifier curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    /// Line plot with one series per curve
    pub plot: LinePlot,
    /// Area under the curve(s)
    pub area: CurveArea,
}

/// Cumulative false/true positive counts per distinct score threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryClfCurve {
    /// False positives at or above each threshold
    pub fps: Vec<f64>,
    /// True positives at or above each threshold
    pub tps: Vec<f64>,
    /// Distinct thresholds, decreasing
    pub thresholds: Vec<f64>,
}

/// ROC curve points.
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    /// False positive rate
    pub fpr: Vec<f64>,
    /// True positive rate
    pub tpr: Vec<f64>,
    /// Thresholds, starting at `+inf`
    pub thresholds: Vec<f64>,
}

/// Precision-recall curve points, recall decreasing.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecisionRecallCurve {
    /// Precision per point (last point is 1)
    pub precision: Vec<f64>,
    /// Recall per point (last point is 0)
    pub recall: Vec<f64>,
    /// Thresholds of all but the last point
    pub thresholds: Vec<f64>,
}

/// Indices ordering `scores` descending. Equal scores keep reverse index
/// order (a stable ascending sort, reversed). NaN ranks above every number.
fn descending_order(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    order.reverse();
    order
}

/// Count positives and negatives above each distinct score threshold.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn binary_clf_curve(y_true: &[bool], y_score: &[f64]) -> BinaryClfCurve {
    let order = descending_order(y_score);
    let scores: Vec<f64> = order.iter().map(|&i| y_score[i]).collect();
    let truth: Vec<bool> = order.iter().map(|&i| y_true[i]).collect();

    let mut threshold_idxs: Vec<usize> = scores
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[1] != w[0])
        .map(|(i, _)| i)
        .collect();
    if !scores.is_empty() {
        threshold_idxs.push(scores.len() - 1);
    }

    let mut cumulative = Vec::with_capacity(truth.len());
    let mut running = 0.0;
    for &t in &truth {
        running += f64::from(u8::from(t));
        cumulative.push(running);
    }

    let tps: Vec<f64> = threshold_idxs.iter().map(|&i| cumulative[i]).collect();
    let fps = threshold_idxs
        .iter()
        .zip(&tps)
        .map(|(&i, tp)| 1.0 + i as f64 - tp)
        .collect();
    BinaryClfCurve {
        fps,
        tps,
        thresholds: threshold_idxs.iter().map(|&i| scores[i]).collect(),
    }
}

fn second_difference_nonzero(values: &[f64], i: usize) -> bool {
    values[i] - 2.0 * values[i + 1] + values[i + 2] != 0.0
}

fn normalize_by_last(values: &[f64]) -> Vec<f64> {
    let last = values.last().copied().unwrap_or(0.0);
    values
        .iter()
        .map(|v| if last > 0.0 { v / last } else { f64::NAN })
        .collect()
}

/// ROC curve with collinear intermediate points dropped and the origin
/// prepended.
#[must_use]
pub fn roc_curve(y_true: &[bool], y_score: &[f64]) -> RocCurve {
    let curve = binary_clf_curve(y_true, y_score);
    let n = curve.fps.len();
    let keep: Vec<usize> = if n > 2 {
        (0..n)
            .filter(|&i| {
                i == 0
                    || i == n - 1
                    || second_difference_nonzero(&curve.fps, i - 1)
                    || second_difference_nonzero(&curve.tps, i - 1)
            })
            .collect()
    } else {
        (0..n).collect()
    };

    let mut fps = vec![0.0];
    let mut tps = vec![0.0];
    let mut thresholds = vec![f64::INFINITY];
    for i in keep {
        fps.push(curve.fps[i]);
        tps.push(curve.tps[i]);
        thresholds.push(curve.thresholds[i]);
    }
    RocCurve {
        fpr: normalize_by_last(&fps),
        tpr: normalize_by_last(&tps),
        thresholds,
    }
}

/// Precision-recall curve, reported from the first threshold reaching full
/// recall down to the highest threshold, followed by `(recall 0, precision 1)`.
#[must_use]
pub fn precision_recall_curve(y_true: &[bool], probas_pred: &[f64]) -> PrecisionRecallCurve {
    let curve = binary_clf_curve(y_true, probas_pred);
    let precision: Vec<f64> = curve
        .tps
        .iter()
        .zip(&curve.fps)
        .map(|(tp, fp)| {
            let p = tp / (tp + fp);
            if p.is_nan() {
                0.0
            } else {
                p
            }
        })
        .collect();
    let total_positives = curve.tps.last().copied().unwrap_or(0.0);
    let recall: Vec<f64> = if total_positives > 0.0 {
        curve.tps.iter().map(|tp| tp / total_positives).collect()
    } else {
        vec![1.0; curve.tps.len()]
    };

    let last = curve
        .tps
        .iter()
        .position(|&tp| tp >= total_positives)
        .unwrap_or(0);
    let range = if curve.tps.is_empty() { 0..0 } else { 0..last + 1 };

    let mut out = PrecisionRecallCurve {
        precision: range.clone().rev().map(|i| precision[i]).collect(),
        recall: range.clone().rev().map(|i| recall[i]).collect(),
        thresholds: range.rev().map(|i| curve.thresholds[i]).collect(),
    };
    out.precision.push(1.0);
    out.recall.push(0.0);
    out
}

/// Trapezoidal area under `(x, y)`. `x` must be monotonic (increasing or
/// decreasing); otherwise the area is `NaN`.
#[must_use]
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    let dx: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let direction = if dx.iter().all(|d| *d >= 0.0) {
        1.0
    } else if dx.iter().all(|d| *d <= 0.0) {
        -1.0
    } else {
        return f64::NAN;
    };
    let area: f64 = dx
        .iter()
        .zip(y.windows(2))
        .map(|(d, w)| d * (w[0] + w[1]) / 2.0)
        .sum();
    direction * area
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// One curve for a binarised problem: `(x, y, label_suffix, area)`.
fn binary_curve(y: &[bool], score: &[f64], curve_type: CurveType) -> (Vec<f64>, Vec<f64>, String, f64) {
    match curve_type {
        CurveType::Roc => {
            let roc = roc_curve(y, score);
            let area = auc(&roc.fpr, &roc.tpr);
            (roc.fpr, roc.tpr, format!("AUC={area:.3}"), area)
        }
        CurveType::Pr => {
            let pr = precision_recall_curve(y, score);
            let ap = mean(&pr.precision);
            let area = auc(&pr.recall, &pr.precision);
            (pr.recall, pr.precision, format!("AP={ap:.3}"), area)
        }
    }
}

/// ROC or PR curve(s) of a classifier.
///
/// Binary problems produce one series for the largest label, scored by the
/// last probability column. Multiclass problems produce one one-vs-rest
/// series per label, labelled `label=<l>,AUC=<x.xxx>` or
/// `label=<l>,AP=<x.xxx>`, where AP is the mean precision of the series.
#[must_use]
pub fn classifier_curve(
    is_binary: bool,
    y_true: &[Label],
    y_probs: &[Vec<f64>],
    labels: &[Label],
    curve_type: CurveType,
) -> Curve {
    let (xlabel, ylabel) = match curve_type {
        CurveType::Roc => ("False Positive Rate", "True Positive Rate"),
        CurveType::Pr => ("recall", "precision"),
    };

    let (data_series, area) = if is_binary {
        let positive = labels.last();
        let y: Vec<bool> = y_true.iter().map(|l| Some(l) == positive).collect();
        let score: Vec<f64> = y_probs
            .iter()
            .map(|row| row.last().copied().unwrap_or(f64::NAN))
            .collect();
        let (x, y, label, area) = binary_curve(&y, &score, curve_type);
        (vec![DataSeries::new(label, x, y)], CurveArea::Single(area))
    } else {
        let mut series = Vec::with_capacity(labels.len());
        let mut areas = Vec::with_capacity(labels.len());
        for (index, label) in labels.iter().enumerate() {
            let y: Vec<bool> = y_true.iter().map(|l| l == label).collect();
            let score: Vec<f64> = y_probs
                .iter()
                .map(|row| row.get(index).copied().unwrap_or(f64::NAN))
                .collect();
            let (x, y, suffix, area) = binary_curve(&y, &score, curve_type);
            series.push(DataSeries::new(format!("label={label},{suffix}"), x, y));
            areas.push(area);
        }
        (series, CurveArea::PerLabel(areas))
    };

    Curve {
        plot: LinePlot {
            title: None,
            data_series,
            xlabel: xlabel.to_string(),
            ylabel: ylabel.to_string(),
            line_style: LineStyle::steps_post(),
        },
        area,
    }
}

/// Cumulative gain: `(percentages, gains)`, both starting at 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cumulative_gain_curve(y_true: &[bool], y_score: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = y_true.len();
    let total: f64 = y_true.iter().map(|&t| f64::from(u8::from(t))).sum();
    let mut gains = vec![0.0];
    let mut running = 0.0;
    for i in descending_order(y_score) {
        running += f64::from(u8::from(y_true[i]));
        gains.push(running / total);
    }
    let percentages = (0..=n).map(|i| i as f64 / n as f64).collect();
    (percentages, gains)
}

/// Lift curve of a binary classifier: one series per class (gain divided by
/// population share, first point dropped) plus the baseline at 1.
#[must_use]
pub fn lift_curve(y_true: &[Label], y_probs: &[Vec<f64>], labels: &[Label]) -> LinePlot {
    let mut data_series = Vec::with_capacity(labels.len() + 1);
    let mut span = (f64::INFINITY, f64::NEG_INFINITY);
    for (index, label) in labels.iter().enumerate() {
        let y: Vec<bool> = y_true.iter().map(|l| l == label).collect();
        let score: Vec<f64> = y_probs
            .iter()
            .map(|row| row.get(index).copied().unwrap_or(f64::NAN))
            .collect();
        let (percentages, gains) = cumulative_gain_curve(&y, &score);
        let x: Vec<f64> = percentages.into_iter().skip(1).collect();
        let lift: Vec<f64> = gains.iter().skip(1).zip(&x).map(|(g, p)| g / p).collect();
        if let (Some(first), Some(last)) = (x.first(), x.last()) {
            span = (span.0.min(*first), span.1.max(*last));
        }
        data_series.push(DataSeries::new(format!("Class {label}"), x, lift));
    }
    if span.0.is_finite() {
        data_series.push(DataSeries::new(
            "Baseline",
            vec![span.0, span.1],
            vec![1.0, 1.0],
        ));
    }
    LinePlot {
        title: Some("Lift Curve".to_string()),
        data_series,
        xlabel: "Percentage of sample".to_string(),
        ylabel: "Lift".to_string(),
        line_style: LineStyle::default(),
    }
}
