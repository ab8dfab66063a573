//! Metric library benchmarks
//!
//! Curves dominate classifier evaluation time: every threshold sweep sorts
//! the scores once per class.
//!
//! Run with: cargo bench --bench metrics_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trueno_eval::dataset::Label;
use trueno_eval::metrics::{
    classifier_curve, classifier_global_metrics, confusion_matrix, regressor_metrics, roc_curve,
    CurveType,
};

const SMALL_SIZE: usize = 1_000;
const MEDIUM_SIZE: usize = 100_000;
const NUM_CLASSES: i64 = 5;

fn binary_data(n: usize) -> (Vec<bool>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n)
        .map(|_| {
            let positive = rng.gen_bool(0.3);
            let score = if positive {
                rng.gen_range(0.3..1.0)
            } else {
                rng.gen_range(0.0..0.7)
            };
            (positive, score)
        })
        .unzip()
}

fn multiclass_data(n: usize) -> (Vec<Label>, Vec<Label>, Vec<Vec<f64>>) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut truth = Vec::with_capacity(n);
    let mut pred = Vec::with_capacity(n);
    let mut probs = Vec::with_capacity(n);
    for _ in 0..n {
        let label = rng.gen_range(0..NUM_CLASSES);
        let guess = if rng.gen_bool(0.8) {
            label
        } else {
            rng.gen_range(0..NUM_CLASSES)
        };
        let mut row: Vec<f64> = (0..NUM_CLASSES).map(|_| rng.gen_range(0.0..1.0)).collect();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            row[guess as usize] += 2.0;
        }
        let total: f64 = row.iter().sum();
        truth.push(Label::from(label));
        pred.push(Label::from(guess));
        probs.push(row.into_iter().map(|p| p / total).collect());
    }
    (truth, pred, probs)
}

/// Benchmark the ROC threshold sweep
fn bench_roc_curve(c: &mut Criterion) {
    let mut group = c.benchmark_group("roc_curve");

    for size in [SMALL_SIZE, MEDIUM_SIZE] {
        let data = binary_data(size);
        group.bench_with_input(BenchmarkId::new("binary", size), &data, |b, (y, s)| {
            b.iter(|| roc_curve(black_box(y), black_box(s)));
        });
    }

    group.finish();
}

/// Benchmark one-vs-rest curves over every class
fn bench_multiclass_curves(c: &mut Criterion) {
    let mut group = c.benchmark_group("multiclass_curves");
    group.sample_size(20);

    let (truth, _, probs) = multiclass_data(MEDIUM_SIZE);
    let labels: Vec<Label> = (0..NUM_CLASSES).map(Label::from).collect();
    for curve_type in [CurveType::Roc, CurveType::Pr] {
        group.bench_function(format!("{curve_type:?}"), |b| {
            b.iter(|| classifier_curve(false, black_box(&truth), black_box(&probs), &labels, curve_type));
        });
    }

    group.finish();
}

/// Benchmark global classifier metrics and the confusion matrix
fn bench_classifier_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("classifier_metrics");

    let (truth, pred, probs) = multiclass_data(MEDIUM_SIZE);
    let labels: Vec<Label> = (0..NUM_CLASSES).map(Label::from).collect();
    group.bench_function("global_with_log_loss", |b| {
        b.iter(|| {
            classifier_global_metrics(false, black_box(&truth), black_box(&pred), Some(&probs), &labels)
        });
    });
    group.bench_function("confusion_matrix", |b| {
        b.iter(|| confusion_matrix(black_box(&truth), black_box(&pred), &labels));
    });

    group.finish();
}

/// Benchmark regression metrics
fn bench_regressor_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("regressor_metrics");

    let mut rng = StdRng::seed_from_u64(3);
    for size in [SMALL_SIZE, MEDIUM_SIZE] {
        let truth: Vec<f64> = (0..size).map(|_| rng.gen_range(-100.0..100.0)).collect();
        let pred: Vec<f64> = truth.iter().map(|t| t + rng.gen_range(-1.0..1.0)).collect();
        group.bench_with_input(BenchmarkId::new("all", size), &(truth, pred), |b, (t, p)| {
            b.iter(|| regressor_metrics(black_box(t), black_box(p)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_roc_curve,
    bench_multiclass_curves,
    bench_classifier_metrics,
    bench_regressor_metrics
);
criterion_main!(benches);
