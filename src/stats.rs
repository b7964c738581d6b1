//! # Statistics
//!
//! Shared statistical primitives for the behavioral engine: descriptive
//! moments, histogram entropy, and Pearson correlation. All functions are
//! total — degenerate inputs yield zeros, never panics.

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance; 0.0 below two samples.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn stddev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Shannon entropy (bits) of a histogram over `values`, with sqrt-count
/// binning clamped to `[2, max_bins]`. 0.0 when the sample is too small or
/// degenerate (all values equal).
pub fn shannon_entropy(values: &[f64], max_bins: usize) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        return 0.0;
    }

    let bins = ((values.len() as f64).sqrt().ceil() as usize).clamp(2, max_bins.max(2));
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in values {
        let bin = (((v - min) / width).floor() as usize).min(bins - 1);
        counts[bin] += 1;
    }

    let total = values.len() as f64;
    counts
        .into_iter()
        .filter(|&c| c > 0)
        .map(|c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Largest entropy reachable with the binning used by [`shannon_entropy`]
/// for a sample of `n` values; normalization denominator for uniqueness
/// scoring.
pub fn max_entropy(n: usize, max_bins: usize) -> f64 {
    if n < 2 {
        return 0.0;
    }
    let bins = ((n as f64).sqrt().ceil() as usize).clamp(2, max_bins.max(2));
    (bins as f64).log2()
}

/// Pearson correlation over the common prefix of two series; 0.0 when
/// either side is degenerate or shorter than two samples.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let a = &a[..n];
    let b = &b[..n];
    let mean_a = mean(a);
    let mean_b = mean(b);

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a < f64::EPSILON || var_b < f64::EPSILON {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Distance of an observation from a population-typical center, squashed
/// into [0, 1): 0 at the center, approaching 1 far from it. `spread` is
/// the scale at which the distance starts to saturate.
pub fn center_distance(observed: f64, center: f64, spread: f64) -> f64 {
    if spread <= 0.0 {
        return 0.0;
    }
    let d = (observed - center).abs() / spread;
    d / (1.0 + d)
}
