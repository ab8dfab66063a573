//! Explainability capability
//!
//! The attribution algorithm itself lives outside this crate behind
//! [`ExplainabilityBackend`]. The evaluator prepares the sample, the
//! background row and the display names, and turns the returned attributions
//! into plots.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use arrow::array::RecordBatch;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::Model;
use crate::plot::{BarChart, Figure, ScatterPlot, ScatterPoint};
use crate::{Error, Result};

/// Longest feature name shown in explainability plots.
pub const MAX_FEATURE_NAME_LEN: usize = 20;

/// Attribution algorithm requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplainerAlgorithm {
    /// Exact attributions.
    Exact,
    /// Model-agnostic sampling around a background instance.
    Kernel,
    /// Feature permutation.
    Permutation,
    /// Hierarchical feature partition.
    Partition,
}

impl ExplainerAlgorithm {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Kernel => "kernel",
            Self::Permutation => "permutation",
            Self::Partition => "partition",
        }
    }
}

impl fmt::Display for ExplainerAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExplainerAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exact" => Ok(Self::Exact),
            "kernel" => Ok(Self::Kernel),
            "permutation" => Ok(Self::Permutation),
            "partition" => Ok(Self::Partition),
            other => Err(Error::InvalidConfig(format!(
                "Unknown explainability algorithm '{other}'. \
                 Supported algorithms are: exact, kernel, permutation, partition"
            ))),
        }
    }
}

/// Input handed to an explainability backend.
pub struct ExplainRequest<'a> {
    /// Requested algorithm; `None` lets the backend choose.
    pub algorithm: Option<ExplainerAlgorithm>,
    /// Sample rows to explain.
    pub features: &'a RecordBatch,
    /// One-row background instance (kernel algorithm only).
    pub background: Option<&'a RecordBatch>,
    /// Display names, one per feature column.
    pub feature_names: &'a [String],
    /// Model being explained.
    pub model: &'a dyn Model,
}

/// Per-row, per-feature attributions returned by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    /// Attribution of each feature (columns) for each sample row (rows).
    pub values: Array2<f64>,
    /// Feature values the attributions refer to, same shape as `values`.
    pub data: Array2<f64>,
    /// Serialisable explainer state, persisted as a pickle when present.
    pub explainer: Option<Value>,
}

impl Explanation {
    /// Mean absolute attribution per feature.
    #[must_use]
    pub fn mean_abs(&self) -> Array1<f64> {
        self.values
            .mapv(f64::abs)
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.values.ncols()))
    }
}

/// External attribution algorithm.
pub trait ExplainabilityBackend: Send + Sync {
    /// Compute attributions for `request.features`.
    ///
    /// # Errors
    ///
    /// Returns `Explainability` (or any error) if attributions cannot be
    /// computed.
    fn explain(&self, request: &ExplainRequest<'_>) -> Result<Explanation>;
}

/// Shorten `s` to at most `max_len` characters by eliding the middle.
#[must_use]
pub fn truncate_str_from_middle(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        return s.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let left = keep / 2;
    let right = keep - left;
    let head: String = chars[..left].iter().collect();
    let tail: String = chars[chars.len() - right..].iter().collect();
    format!("{head}...{tail}")
}

/// Display names for explainability plots: truncated names, unless
/// truncation makes two of them equal.
#[must_use]
pub fn display_feature_names(names: &[String]) -> Vec<String> {
    let truncated: Vec<String> = names
        .iter()
        .map(|n| truncate_str_from_middle(n, MAX_FEATURE_NAME_LEN))
        .collect();
    let distinct: HashSet<&String> = truncated.iter().collect();
    if distinct.len() == names.len() {
        truncated
    } else {
        names.to_vec()
    }
}

fn importance_order(explanation: &Explanation) -> Vec<usize> {
    let importance = explanation.mean_abs();
    let mut order: Vec<usize> = (0..importance.len()).collect();
    order.sort_by(|&a, &b| importance[b].total_cmp(&importance[a]));
    order
}

/// Bar chart of mean absolute attribution per feature, most important first.
#[must_use]
pub fn feature_importance_plot(explanation: &Explanation, names: &[String]) -> Figure {
    let importance = explanation.mean_abs();
    let order = importance_order(explanation);
    Figure::Bars(BarChart {
        title: None,
        labels: order.iter().map(|&i| names[i].clone()).collect(),
        values: order.iter().map(|&i| importance[i]).collect(),
        xlabel: "mean(|attribution value|)".to_string(),
    })
}

/// Scatter of every attribution, one row per feature (most important on
/// top), coloured by the normalised feature value.
#[must_use]
pub fn beeswarm_plot(explanation: &Explanation, names: &[String]) -> Figure {
    attribution_scatter(explanation, names, None)
}

/// Attribution summary; like the beeswarm but with a title and capped to the
/// ten most important features.
#[must_use]
pub fn summary_plot(explanation: &Explanation, names: &[String]) -> Figure {
    attribution_scatter(explanation, names, Some(10))
}

fn attribution_scatter(
    explanation: &Explanation,
    names: &[String],
    max_features: Option<usize>,
) -> Figure {
    let mut order = importance_order(explanation);
    if let Some(cap) = max_features {
        order.truncate(cap);
    }
    let mut points = Vec::new();
    for (row, &feature) in order.iter().enumerate() {
        let column = explanation.data.column(feature);
        let (lo, hi) = column
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        for (sample, &value) in explanation.values.column(feature).iter().enumerate() {
            let raw = column[sample];
            let intensity = if hi > lo && raw.is_finite() {
                (raw - lo) / (hi - lo)
            } else {
                0.5
            };
            points.push(ScatterPoint {
                x: value,
                row,
                intensity,
            });
        }
    }
    Figure::Scatter(ScatterPlot {
        title: max_features.map(|_| "Attribution summary".to_string()),
        row_labels: order.iter().map(|&i| names[i].clone()).collect(),
        points,
        xlabel: "attribution value (impact on model output)".to_string(),
    })
}
