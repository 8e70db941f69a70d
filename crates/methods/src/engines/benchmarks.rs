//! Analytical test problems. Variables live in `[0, 1]`, objectives are
//! returned as the benchmark defines them (all minimized).

use std::f64::consts::PI;

use st_domain::problem::Benchmark;

pub fn evaluate(benchmark: Benchmark, x: &[f64], n_objectives: usize) -> Vec<f64> {
    match benchmark {
        Benchmark::Dtlz1 => dtlz1(x, n_objectives),
        Benchmark::Dtlz2 => dtlz2(x, n_objectives),
        Benchmark::Zdt1 => zdt1(x),
    }
}

/// A decision vector on the Pareto front whose position variables are `t`.
/// Distance variables are set to their optimal value.
pub fn pareto_point(benchmark: Benchmark, t: &[f64], n_variables: usize) -> Vec<f64> {
    let optimal = match benchmark {
        Benchmark::Dtlz1 | Benchmark::Dtlz2 => 0.5,
        Benchmark::Zdt1 => 0.0,
    };
    (0..n_variables)
        .map(|i| t.get(i).copied().unwrap_or(optimal))
        .collect()
}

/// Number of position variables (the rest are distance variables).
pub fn position_variables(benchmark: Benchmark, n_objectives: usize) -> usize {
    match benchmark {
        Benchmark::Dtlz1 | Benchmark::Dtlz2 => n_objectives - 1,
        Benchmark::Zdt1 => 1,
    }
}

fn dtlz1(x: &[f64], m: usize) -> Vec<f64> {
    let tail = &x[m - 1..];
    let g = 100.0
        * (tail.len() as f64
            + tail
                .iter()
                .map(|xi| (xi - 0.5).powi(2) - (20.0 * PI * (xi - 0.5)).cos())
                .sum::<f64>());
    (0..m)
        .map(|i| {
            let mut f = 0.5 * (1.0 + g);
            f *= x[..m - 1 - i].iter().product::<f64>();
            if i > 0 {
                f *= 1.0 - x[m - 1 - i];
            }
            f
        })
        .collect()
}

fn dtlz2(x: &[f64], m: usize) -> Vec<f64> {
    let g: f64 = x[m - 1..].iter().map(|xi| (xi - 0.5).powi(2)).sum();
    (0..m)
        .map(|i| {
            let mut f = 1.0 + g;
            f *= x[..m - 1 - i]
                .iter()
                .map(|xi| (xi * PI / 2.0).cos())
                .product::<f64>();
            if i > 0 {
                f *= (x[m - 1 - i] * PI / 2.0).sin();
            }
            f
        })
        .collect()
}

fn zdt1(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let f1 = x[0];
    let g = 1.0 + 9.0 * x[1..].iter().sum::<f64>() / (n - 1) as f64;
    let f2 = g * (1.0 - (f1 / g).sqrt());
    vec![f1, f2]
}
