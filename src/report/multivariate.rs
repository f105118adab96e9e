//! Multivariate stage of the Result Aggregator (spec §4.F, §11): PCA over
//! the top-variance numeric columns' correlation matrix, and batch k-means
//! clustering over the same columns' jointly-sampled reservoir points with
//! k chosen by an elbow heuristic. Both run once, at finalize, over the
//! bounded point set the kernel already collected during the stream — there
//! is no online variant of either here.

use nalgebra::{DMatrix, SymmetricEigen};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{ClusterReport, PcaReport};

const MIN_POINTS_FOR_MULTIVARIATE: usize = 8;
const KMEANS_MAX_ITERS: usize = 100;
const KMEANS_RESTARTS: usize = 4;
const ELBOW_MIN_K: usize = 2;
const ELBOW_MAX_K: usize = 6;

/// Principal component analysis over the correlation matrix of `points`
/// (one row per sampled record, one column per tracked numeric column).
/// Returns `None` when there are too few points or too few dimensions to
/// make eigendecomposition meaningful.
pub fn compute_pca(points: &[Vec<f64>], columns: &[usize]) -> Option<PcaReport> {
    let d = columns.len();
    if d < 2 || points.len() < MIN_POINTS_FOR_MULTIVARIATE {
        return None;
    }

    let n = points.len() as f64;
    let means: Vec<f64> = (0..d)
        .map(|j| points.iter().map(|p| p[j]).sum::<f64>() / n)
        .collect();
    let stds: Vec<f64> = (0..d)
        .map(|j| {
            let var = points.iter().map(|p| (p[j] - means[j]).powi(2)).sum::<f64>() / n;
            var.sqrt()
        })
        .collect();
    if stds.iter().any(|&s| s <= 0.0) {
        return None;
    }

    let mut corr = DMatrix::<f64>::zeros(d, d);
    for a in 0..d {
        for b in 0..d {
            let cov: f64 = points
                .iter()
                .map(|p| (p[a] - means[a]) * (p[b] - means[b]))
                .sum::<f64>()
                / n;
            corr[(a, b)] = cov / (stds[a] * stds[b]);
        }
    }

    let eigen = SymmetricEigen::new(corr);
    // SymmetricEigen does not guarantee descending order.
    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }

    let explained_variance: Vec<f64> = order
        .iter()
        .map(|&i| eigen.eigenvalues[i].max(0.0) / total)
        .collect();
    let loadings: Vec<Vec<f64>> = order
        .iter()
        .map(|&i| eigen.eigenvectors.column(i).iter().copied().collect())
        .collect();

    Some(PcaReport {
        explained_variance,
        loadings,
        columns: columns.to_vec(),
    })
}

/// Batch k-means (Lloyd's algorithm) over `points`, choosing k in
/// `ELBOW_MIN_K..=ELBOW_MAX_K` by the largest relative drop in
/// within-cluster sum of squares (the elbow heuristic), then reporting the
/// winning partition's centers, sizes and silhouette score.
pub fn compute_clusters(points: &[Vec<f64>], seed: u64) -> Option<ClusterReport> {
    if points.len() < MIN_POINTS_FOR_MULTIVARIATE {
        return None;
    }
    let max_k = ELBOW_MAX_K.min(points.len() / 2).max(ELBOW_MIN_K);
    if max_k < ELBOW_MIN_K {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut runs: Vec<(usize, KMeansResult)> = Vec::new();
    for k in ELBOW_MIN_K..=max_k {
        if let Some(result) = best_of_restarts(points, k, &mut rng) {
            runs.push((k, result));
        }
    }
    if runs.is_empty() {
        return None;
    }

    let chosen = pick_elbow(&runs);
    let (k, result) = runs.into_iter().nth(chosen)?;

    let silhouette = silhouette_score(points, &result.assignments, k);

    Some(ClusterReport {
        k,
        centers: result.centers,
        sizes: result.sizes,
        silhouette,
    })
}

struct KMeansResult {
    centers: Vec<Vec<f64>>,
    sizes: Vec<usize>,
    assignments: Vec<usize>,
    inertia: f64,
}

fn best_of_restarts(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Option<KMeansResult> {
    (0..KMEANS_RESTARTS)
        .filter_map(|_| run_kmeans(points, k, rng))
        .min_by(|a, b| a.inertia.partial_cmp(&b.inertia).unwrap())
}

fn run_kmeans(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Option<KMeansResult> {
    if points.len() < k {
        return None;
    }
    let d = points[0].len();

    // k-means++ seeding: pick the first center uniformly, then each next
    // center with probability proportional to squared distance from the
    // nearest already-chosen center.
    let mut centers: Vec<Vec<f64>> = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())].clone());
    while centers.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| nearest_sq_dist(p, &centers))
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            centers.push(points[rng.gen_range(0..points.len())].clone());
            continue;
        }
        let mut target = rng.gen_range(0.0..total);
        let mut chosen = points.len() - 1;
        for (i, &w) in weights.iter().enumerate() {
            if target < w {
                chosen = i;
                break;
            }
            target -= w;
        }
        centers.push(points[chosen].clone());
    }

    let mut assignments = vec![0usize; points.len()];
    for _ in 0..KMEANS_MAX_ITERS {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let nearest = nearest_index(p, &centers);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        let mut sums = vec![vec![0.0; d]; k];
        let mut counts = vec![0usize; k];
        for (p, &a) in points.iter().zip(assignments.iter()) {
            counts[a] += 1;
            for j in 0..d {
                sums[a][j] += p[j];
            }
        }
        for c in 0..k {
            if counts[c] == 0 {
                continue;
            }
            for j in 0..d {
                centers[c][j] = sums[c][j] / counts[c] as f64;
            }
        }

        if !changed {
            break;
        }
    }

    let mut sizes = vec![0usize; k];
    let mut inertia = 0.0;
    for (p, &a) in points.iter().zip(assignments.iter()) {
        sizes[a] += 1;
        inertia += sq_dist(p, &centers[a]);
    }

    Some(KMeansResult {
        centers,
        sizes,
        assignments,
        inertia,
    })
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest_sq_dist(point: &[f64], centers: &[Vec<f64>]) -> f64 {
    centers
        .iter()
        .map(|c| sq_dist(point, c))
        .fold(f64::INFINITY, f64::min)
}

fn nearest_index(point: &[f64], centers: &[Vec<f64>]) -> usize {
    centers
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| sq_dist(point, a).partial_cmp(&sq_dist(point, b)).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Elbow pick: the k whose relative inertia drop from k-1 is largest,
/// falling back to the smallest k tried when inertia is non-increasing
/// (degenerate or near-perfectly-separated data).
fn pick_elbow(runs: &[(usize, KMeansResult)]) -> usize {
    if runs.len() == 1 {
        return 0;
    }
    let mut best_idx = 0;
    let mut best_drop = f64::NEG_INFINITY;
    for i in 1..runs.len() {
        let prev = runs[i - 1].1.inertia;
        let curr = runs[i].1.inertia;
        if prev <= 0.0 {
            continue;
        }
        let drop = (prev - curr) / prev;
        if drop > best_drop {
            best_drop = drop;
            best_idx = i;
        }
    }
    best_idx
}

/// Mean silhouette coefficient, subsampled to at most 500 points so the
/// O(n^2) pairwise-distance cost stays bounded regardless of reservoir size.
fn silhouette_score(points: &[Vec<f64>], assignments: &[usize], k: usize) -> Option<f64> {
    if k < 2 || points.len() < 3 {
        return None;
    }
    const SAMPLE_CAP: usize = 500;
    let step = (points.len() / SAMPLE_CAP).max(1);
    let indices: Vec<usize> = (0..points.len()).step_by(step).collect();

    let mut total = 0.0;
    let mut counted = 0usize;
    for &i in &indices {
        let own = assignments[i];
        let mut same_sum = 0.0;
        let mut same_n = 0usize;
        let mut other_sums = vec![0.0; k];
        let mut other_ns = vec![0usize; k];

        for &j in &indices {
            if i == j {
                continue;
            }
            let dist = sq_dist(&points[i], &points[j]).sqrt();
            if assignments[j] == own {
                same_sum += dist;
                same_n += 1;
            } else {
                other_sums[assignments[j]] += dist;
                other_ns[assignments[j]] += 1;
            }
        }

        if same_n == 0 {
            continue;
        }
        let a = same_sum / same_n as f64;
        let b = (0..k)
            .filter(|&c| c != own && other_ns[c] > 0)
            .map(|c| other_sums[c] / other_ns[c] as f64)
            .fold(f64::INFINITY, f64::min);
        if !b.is_finite() {
            continue;
        }
        let s = (b - a) / a.max(b);
        total += s;
        counted += 1;
    }

    (counted > 0).then(|| total / counted as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs(n_per_blob: usize) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut points = Vec::new();
        for center in [[-10.0, -10.0], [10.0, 10.0]] {
            for _ in 0..n_per_blob {
                let jitter_x: f64 = rng.gen_range(-1.0..1.0);
                let jitter_y: f64 = rng.gen_range(-1.0..1.0);
                points.push(vec![center[0] + jitter_x, center[1] + jitter_y]);
            }
        }
        points
    }

    #[test]
    fn pca_on_correlated_columns_has_dominant_first_component() {
        let mut rng = StdRng::seed_from_u64(3);
        let points: Vec<Vec<f64>> = (0..200)
            .map(|_| {
                let x: f64 = rng.gen_range(-5.0..5.0);
                let y = x * 2.0 + rng.gen_range(-0.01..0.01);
                vec![x, y]
            })
            .collect();
        let pca = compute_pca(&points, &[0, 1]).unwrap();
        assert!(pca.explained_variance[0] > 0.9, "{:?}", pca.explained_variance);
    }

    #[test]
    fn pca_returns_none_for_too_few_points() {
        let points = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert!(compute_pca(&points, &[0, 1]).is_none());
    }

    #[test]
    fn kmeans_recovers_two_separated_blobs() {
        let points = two_blobs(50);
        let report = compute_clusters(&points, 11).unwrap();
        assert_eq!(report.k, 2);
        assert_eq!(report.sizes.iter().sum::<usize>(), points.len());
        assert!(report.silhouette.unwrap() > 0.5, "{:?}", report.silhouette);
    }

    #[test]
    fn kmeans_returns_none_below_minimum_points() {
        let points = vec![vec![1.0]; 3];
        assert!(compute_clusters(&points, 1).is_none());
    }
}
