use classeval::data::Dataset;
use classeval::evaluation::{cross_validate, Scoring};
use classeval::training::{
    CVStrategy, Classifier, CrossValidator, DecisionTree, LogisticRegression, MaxFeatures, RandomForest,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_classification_data(n_rows: usize, n_features: usize) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let y = Array1::from_shape_fn(n_rows, |_| if rng.gen::<f64>() < 0.35 { 1.0 } else { 0.0 });
    let x = Array2::from_shape_fn((n_rows, n_features), |(i, j)| {
        y[i] * (j as f64 + 1.0) + rng.gen::<f64>() * 5.0
    });
    Dataset::new(x, y, Vec::new()).unwrap()
}

fn ten_fold() -> CrossValidator {
    CrossValidator::new(CVStrategy::KFold { n_splits: 10, shuffle: true }).with_random_state(1)
}

fn bench_cross_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_validation");
    group.sample_size(10);

    for n_rows in [768, 3000].iter() {
        let data = create_classification_data(*n_rows, 8);

        group.bench_with_input(BenchmarkId::new("logistic_regression", n_rows), &data, |b, data| {
            b.iter(|| {
                cross_validate(
                    &LogisticRegression::new(),
                    black_box(data.features()),
                    black_box(data.labels()),
                    &ten_fold(),
                    Scoring::Accuracy,
                )
                .unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("decision_tree", n_rows), &data, |b, data| {
            b.iter(|| {
                cross_validate(
                    &DecisionTree::new_classifier().with_max_features(3).with_random_state(1),
                    black_box(data.features()),
                    black_box(data.labels()),
                    &ten_fold(),
                    Scoring::Accuracy,
                )
                .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_forest(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_forest");
    group.sample_size(10);

    let data = create_classification_data(768, 8);
    group.bench_function("fit_100_trees", |b| {
        b.iter(|| {
            let mut forest = RandomForest::new(100)
                .with_max_features(MaxFeatures::Fixed(3))
                .with_random_state(1);
            forest.fit(black_box(data.features()), black_box(data.labels())).unwrap();
            forest
        })
    });

    group.finish();
}

criterion_group!(benches, bench_cross_validation, bench_forest);
criterion_main!(benches);
