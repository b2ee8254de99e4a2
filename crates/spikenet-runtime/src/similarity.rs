//! Pairwise similarity metrics over fixed-width spike-time histograms
//! (§4.4, "Similarity"). Every metric is a pure function of two equal-length
//! non-negative vectors, normalized into `[0, 1]`, higher meaning more alike.

use crate::config::SimilarityMetric;

/// Bin a sorted sequence of spike offsets (each within `[0, window_size_ms]`)
/// into `bucket_count` fixed-width buckets.
pub fn histogram(offsets: &[f64], window_size_ms: f64, bucket_count: usize) -> Vec<f64> {
    let mut buckets = vec![0.0f64; bucket_count];
    if window_size_ms <= 0.0 || bucket_count == 0 {
        return buckets;
    }
    let bucket_width = window_size_ms / bucket_count as f64;
    for &t in offsets {
        if t < 0.0 {
            continue;
        }
        let idx = ((t / bucket_width) as usize).min(bucket_count - 1);
        buckets[idx] += 1.0;
    }
    buckets
}

/// Compute `similarity(a, b)` under the given metric, normalized to `[0, 1]`.
pub fn similarity(metric: SimilarityMetric, a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "histograms must share a bucket count");
    let value = match metric {
        SimilarityMetric::Cosine => cosine(a, b),
        SimilarityMetric::NormalizedEuclidean => normalized_euclidean(a, b),
        SimilarityMetric::Pearson => pearson(a, b),
        SimilarityMetric::CrossCorrelation => cross_correlation(a, b),
        SimilarityMetric::HistogramOverlap => histogram_overlap(a, b),
    };
    value.clamp(0.0, 1.0)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let (na, nb) = (norm(a), norm(b));
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot(a, b) / (na * nb)
}

fn normalized_euclidean(a: &[f64], b: &[f64]) -> f64 {
    let distance: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt();
    1.0 / (1.0 + distance)
}

fn mean(a: &[f64]) -> f64 {
    if a.is_empty() {
        0.0
    } else {
        a.iter().sum::<f64>() / a.len() as f64
    }
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let (ma, mb) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - ma;
        let dy = y - mb;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    let r = cov / (var_a.sqrt() * var_b.sqrt());
    (r + 1.0) / 2.0
}

/// Maximum, over integer lag shifts within `+/- bucket_count/4`, of the
/// normalized dot product of `a` against `b` shifted by that lag
/// (zero-padded at the boundary).
fn cross_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    if n == 0 {
        return 0.0;
    }
    let (na, nb) = (norm(a), norm(b));
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let max_lag = (n / 4) as isize;
    let mut best = f64::MIN;
    for lag in -max_lag..=max_lag {
        let mut acc = 0.0;
        for i in 0..n {
            let j = i as isize + lag;
            if j >= 0 && (j as usize) < n {
                acc += a[i] * b[j as usize];
            }
        }
        let score = acc / (na * nb);
        if score > best {
            best = score;
        }
    }
    best.max(0.0)
}

fn histogram_overlap(a: &[f64], b: &[f64]) -> f64 {
    let intersection: f64 = a.iter().zip(b).map(|(x, y)| x.min(*y)).sum();
    let union: f64 = a.iter().zip(b).map(|(x, y)| x.max(*y)).sum();
    if union <= f64::EPSILON {
        0.0
    } else {
        intersection / union
    }
}
