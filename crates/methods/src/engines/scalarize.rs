//! Scalarization and dominance helpers shared by the reference engines.
//! Everything here works in minimization form.

use std::cmp::Ordering;

/// Augmentation term of the achievement scalarizing function.
const RHO: f64 = 1e-6;

/// Weights that normalize each objective by its ideal-to-nadir range.
pub fn range_weights(ideal: &[f64], nadir: &[f64]) -> Vec<f64> {
    ideal
        .iter()
        .zip(nadir)
        .map(|(i, n)| {
            let span = n - i;
            if span.abs() > f64::EPSILON {
                1.0 / span
            } else {
                1.0
            }
        })
        .collect()
}

/// Augmented achievement scalarizing function of `f` for reference `q`.
pub fn asf(f: &[f64], q: &[f64], w: &[f64]) -> f64 {
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for ((fi, qi), wi) in f.iter().zip(q).zip(w) {
        let term = wi * (fi - qi);
        max = max.max(term);
        sum += term;
    }
    max + RHO * sum
}

/// Index of the row minimizing the ASF, restricted to `among`.
/// Ties resolve to the lowest index so results are reproducible.
pub fn best_by_asf(rows: &[Vec<f64>], among: &[usize], q: &[f64], w: &[f64]) -> Option<usize> {
    among
        .iter()
        .copied()
        .map(|i| (i, asf(&rows[i], q, w)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)))
        .map(|(i, _)| i)
}

/// All objectives `<=` and at least one `<`.
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let at_least_as_good = a.iter().zip(b).all(|(x, y)| x <= y);
    let strictly_better = a.iter().zip(b).any(|(x, y)| x < y);
    at_least_as_good && strictly_better
}

/// Fast non-dominated sort. `fronts[0]` is the non-dominated set.
pub fn non_dominated_fronts(rows: &[Vec<f64>]) -> Vec<Vec<usize>> {
    let n = rows.len();
    let mut domination_count = vec![0usize; n];
    let mut dominated_set: Vec<Vec<usize>> = vec![vec![]; n];

    for i in 0..n {
        for j in (i + 1)..n {
            if dominates(&rows[i], &rows[j]) {
                dominated_set[i].push(j);
                domination_count[j] += 1;
            } else if dominates(&rows[j], &rows[i]) {
                dominated_set[j].push(i);
                domination_count[i] += 1;
            }
        }
    }

    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            for &j in &dominated_set[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        fronts.push(current);
        current = next;
    }
    fronts
}

/// Rank of every row (0 for the first front).
pub fn ranks(rows: &[Vec<f64>]) -> Vec<usize> {
    let mut rank = vec![0; rows.len()];
    for (r, front) in non_dominated_fronts(rows).iter().enumerate() {
        for &i in front {
            rank[i] = r;
        }
    }
    rank
}

/// Crowding distance of each member of `front`, in the order given.
pub fn crowding_distance(rows: &[Vec<f64>], front: &[usize]) -> Vec<f64> {
    let n = front.len();
    if n <= 2 {
        return vec![f64::INFINITY; n];
    }
    let mut distance = vec![0.0; n];
    let k = rows[front[0]].len();
    for obj in 0..k {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            rows[front[a]][obj]
                .partial_cmp(&rows[front[b]][obj])
                .unwrap_or(Ordering::Equal)
        });
        distance[order[0]] = f64::INFINITY;
        distance[order[n - 1]] = f64::INFINITY;

        let range = rows[front[order[n - 1]]][obj] - rows[front[order[0]]][obj];
        if range > 0.0 {
            for w in 1..(n - 1) {
                let prev = rows[front[order[w - 1]]][obj];
                let next = rows[front[order[w + 1]]][obj];
                distance[order[w]] += (next - prev) / range;
            }
        }
    }
    distance
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 4.0],
            vec![2.0, 2.0],
            vec![4.0, 1.0],
            vec![3.0, 3.0],
            vec![5.0, 5.0],
        ]
    }

    #[test]
    fn dominance_is_strict() {
        assert!(dominates(&[1.0, 1.0], &[1.0, 2.0]));
        assert!(!dominates(&[1.0, 2.0], &[1.0, 2.0]));
        assert!(!dominates(&[0.0, 3.0], &[1.0, 2.0]));
    }

    #[test]
    fn fronts_are_layered() {
        let fronts = non_dominated_fronts(&rows());
        assert_eq!(fronts[0], vec![0, 1, 2]);
        assert_eq!(fronts[1], vec![3]);
        assert_eq!(fronts[2], vec![4]);
        assert_eq!(ranks(&rows()), vec![0, 0, 0, 1, 2]);
    }

    #[test]
    fn asf_prefers_the_row_closest_to_the_reference() {
        let rows = rows();
        let w = range_weights(&[1.0, 1.0], &[5.0, 5.0]);
        let all: Vec<usize> = (0..rows.len()).collect();
        assert_eq!(best_by_asf(&rows, &all, &[2.0, 2.0], &w), Some(1));
        assert_eq!(best_by_asf(&rows, &all, &[0.0, 5.0], &w), Some(0));
        assert_eq!(best_by_asf(&rows, &[], &[0.0, 5.0], &w), None);
    }

    #[test]
    fn boundary_points_are_infinitely_crowded() {
        let d = crowding_distance(&rows(), &[0, 1, 2]);
        assert!(d[0].is_infinite() && d[2].is_infinite());
        assert!(d[1].is_finite() && d[1] > 0.0);
    }
}
