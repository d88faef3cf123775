use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use model_trainer::config::{FailurePolicy, TrainerConfig};
use model_trainer::selection::{default_catalog, GridTable, ModelEvaluator, ParamGrid};
use model_trainer::training::{Estimator, RandomForestRegressor, Regressor};
use ndarray::{Array1, Array2};
use rand::prelude::*;

fn create_regression_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(42);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    // Target is the sum of features plus noise
    let y = x
        .rows()
        .into_iter()
        .map(|row| row.sum() + rng.gen::<f64>() * 0.1)
        .collect();
    (x, y)
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);

    let (x, y) = create_regression_data(2000, 10);
    for (name, estimator) in default_catalog().iter() {
        group.bench_with_input(BenchmarkId::new("estimator", name), estimator, |b, est| {
            b.iter(|| {
                let mut model = est.clone_unfitted();
                model.fit(black_box(&x), black_box(&y)).unwrap();
                model
            })
        });
    }

    group.finish();
}

fn bench_forest_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_forest");
    group.sample_size(10);

    for n_rows in [500, 2000, 5000].iter() {
        let (x, y) = create_regression_data(*n_rows, 10);
        group.bench_with_input(BenchmarkId::new("fit", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let mut model = Estimator::from(RandomForestRegressor::new(32));
                model.fit(black_box(x), black_box(y)).unwrap();
                model
            })
        });
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    group.sample_size(10);

    let (x_train, y_train) = create_regression_data(1000, 5);
    let (x_valid, y_valid) = create_regression_data(300, 5);
    let catalog = default_catalog();
    let mut grids = GridTable::new();
    grids.insert("Random Forest", ParamGrid::new().with("n_estimators", [8, 16]));
    grids.insert("Gradient Boosting", ParamGrid::new().with("n_estimators", [16, 32]));
    grids.insert("AdaBoost Regressor", ParamGrid::new().with("n_estimators", [8, 16]));
    grids.insert("KNeighbors Regressor", ParamGrid::new().with("n_neighbors", [5, 9]));

    let config = TrainerConfig::new().with_failure_policy(FailurePolicy::Abort);
    let evaluator = ModelEvaluator::from_config(&config);

    group.bench_function("default_catalog", |b| {
        b.iter(|| {
            evaluator
                .evaluate(&x_train, &y_train, &x_valid, &y_valid, black_box(&catalog), &grids)
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_fit, bench_forest_scaling, bench_evaluate);
criterion_main!(benches);
