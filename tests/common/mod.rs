//! Synthetic data shaped like the diabetes table: eight non-negative
//! features, roughly a third positive labels, seeded.

#![allow(dead_code)]

use classeval::data::{Dataset, PIMA_COLUMNS};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const MEANS: [f64; 8] = [3.8, 120.0, 69.0, 20.5, 80.0, 32.0, 0.47, 33.0];
const SHIFTS: [f64; 8] = [1.5, 30.0, 2.0, 2.5, 30.0, 4.5, 0.1, 5.0];
const SPREADS: [f64; 8] = [3.0, 25.0, 15.0, 12.0, 90.0, 6.0, 0.3, 10.0];

pub fn pima_like(n: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut x = Array2::zeros((n, 8));
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let positive = rng.gen::<f64>() < 0.35;
        y[i] = if positive { 1.0 } else { 0.0 };
        for j in 0..8 {
            let noise: f64 = rng.gen_range(-1.0..1.0) + rng.gen_range(-1.0..1.0);
            let shift = if positive { SHIFTS[j] } else { 0.0 };
            x[[i, j]] = (MEANS[j] + shift + noise * SPREADS[j]).max(0.0);
        }
    }
    let names = PIMA_COLUMNS[..8].iter().map(|s| s.to_string()).collect();
    Dataset::new(x, y, names).unwrap()
}

/// Same data with one column shifted below zero
pub fn with_negative_column(dataset: &Dataset) -> Dataset {
    let mut x = dataset.features().clone();
    x.column_mut(6).mapv_inplace(|v| v - 10.0);
    Dataset::new(x, dataset.labels().clone(), dataset.feature_names().to_vec()).unwrap()
}

/// Dataset written as a headerless CSV, label last
pub fn write_csv(dataset: &Dataset, path: &std::path::Path) {
    let mut out = String::new();
    for (row, label) in dataset.features().outer_iter().zip(dataset.labels().iter()) {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        out.push_str(&cells.join(","));
        out.push_str(&format!(",{}\n", label));
    }
    std::fs::write(path, out).unwrap();
}
