//! Statistics the backends supply on top of the views: quartiles, KDE,
//! histogram bins, linear fits and confidence intervals.

use serde::Serialize;

/// Box-plot summary with 1.5 × IQR whiskers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quartiles {
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear-interpolated percentile of sorted data, `p` in `[0, 1]`.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    v.sort_by(f64::total_cmp);
    v
}

pub fn quartiles(values: &[f64]) -> Option<Quartiles> {
    let v = sorted(values);
    if v.is_empty() {
        return None;
    }
    let q1 = percentile_sorted(&v, 0.25);
    let median = percentile_sorted(&v, 0.5);
    let q3 = percentile_sorted(&v, 0.75);
    let iqr = q3 - q1;
    let lo_fence = q1 - 1.5 * iqr;
    let hi_fence = q3 + 1.5 * iqr;
    let lower_whisker = v.iter().copied().find(|x| *x >= lo_fence).unwrap_or(q1);
    let upper_whisker = v.iter().rev().copied().find(|x| *x <= hi_fence).unwrap_or(q3);
    let outliers = v
        .iter()
        .copied()
        .filter(|x| *x < lo_fence || *x > hi_fence)
        .collect();
    Some(Quartiles {
        lower_whisker,
        q1,
        median,
        q3,
        upper_whisker,
        outliers,
    })
}

/// Sturges' rule.
pub fn auto_bins(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    ((n as f64).log2().ceil() as usize + 1).max(1)
}

/// Equal-width bins over the data range as `(lo, hi, count)`.
pub fn histogram(values: &[f64], bins: usize) -> Vec<(f64, f64, usize)> {
    let v = sorted(values);
    if v.is_empty() || bins == 0 {
        return Vec::new();
    }
    let (min, max) = (v[0], v[v.len() - 1]);
    let (min, max) = if max > min { (min, max) } else { (min - 0.5, max + 0.5) };
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for x in &v {
        let idx = (((x - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| (min + i as f64 * width, min + (i + 1) as f64 * width, c))
        .collect()
}

/// Gaussian KDE on `points` evenly spaced samples, Scott's bandwidth.
/// The grid extends three bandwidths past the data range.
pub fn kde(values: &[f64], points: usize) -> Vec<(f64, f64)> {
    let v = sorted(values);
    let n = v.len();
    if n == 0 || points < 2 {
        return Vec::new();
    }
    let m = mean(&v);
    let var = if n > 1 {
        v.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };
    let sd = var.sqrt();
    let bw = if sd > 0.0 {
        sd * (n as f64).powf(-0.2)
    } else {
        1.0
    };
    let lo = v[0] - 3.0 * bw;
    let hi = v[n - 1] + 3.0 * bw;
    let norm = 1.0 / (n as f64 * bw * (2.0 * std::f64::consts::PI).sqrt());
    (0..points)
        .map(|i| {
            let x = lo + (hi - lo) * i as f64 / (points - 1) as f64;
            let d: f64 = v
                .iter()
                .map(|xi| (-0.5 * ((x - xi) / bw).powi(2)).exp())
                .sum();
            (x, d * norm)
        })
        .collect()
}

/// Ordinary least squares `y = slope * x + intercept`. `None` when x is constant.
pub fn linear_fit(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    let n = points.len();
    if n < 2 {
        return None;
    }
    let mx = points.iter().map(|p| p.0).sum::<f64>() / n as f64;
    let my = points.iter().map(|p| p.1).sum::<f64>() / n as f64;
    let sxx: f64 = points.iter().map(|p| (p.0 - mx).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = points.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum();
    let slope = sxy / sxx;
    Some((slope, my - slope * mx))
}

/// Fitted line over `steps` evenly spaced x with a 95% confidence band for
/// the mean response, as `(x, fit, lo, hi)`.
pub fn regression_band(points: &[(f64, f64)], steps: usize) -> Option<Vec<(f64, f64, f64, f64)>> {
    let (slope, intercept) = linear_fit(points)?;
    let (x_min, x_max) = finite_bounds(points.iter().map(|p| p.0))?;
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p.0).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - mx).powi(2)).sum();
    let sse: f64 = points
        .iter()
        .map(|p| (p.1 - (slope * p.0 + intercept)).powi(2))
        .sum();
    let s = if points.len() > 2 {
        (sse / (n - 2.0)).sqrt()
    } else {
        0.0
    };
    let steps = steps.max(2);
    Some(
        (0..steps)
            .map(|i| {
                let x = x_min + (x_max - x_min) * i as f64 / (steps - 1) as f64;
                let fit = slope * x + intercept;
                let half = 1.96 * s * (1.0 / n + (x - mx).powi(2) / sxx).sqrt();
                (x, fit, fit - half, fit + half)
            })
            .collect(),
    )
}

/// Mean with a normal-approximation 95% interval, `(mean, lo, hi)`.
pub fn mean_ci95(values: &[f64]) -> (f64, f64, f64) {
    let m = mean(values);
    let n = values.len();
    if n < 2 {
        return (m, m, m);
    }
    let sd = crate::aggregation::sample_std(values);
    let half = 1.96 * sd / (n as f64).sqrt();
    (m, m - half, m + half)
}

/// Deterministic horizontal offsets in `[-width/2, width/2]` that spread
/// points of one category so equal values do not overlap.
pub fn strip_offsets(values: &[f64], width: f64) -> Vec<f64> {
    let n = values.len();
    if n <= 1 {
        return vec![0.0; n];
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));
    let mut offsets = vec![0.0; n];
    let step = width / n as f64;
    for (rank, idx) in order.into_iter().enumerate() {
        // alternate sides around the centre line
        let k = (rank / 2 + 1) as f64;
        let side = if rank % 2 == 0 { 1.0 } else { -1.0 };
        offsets[idx] = (side * k * step).clamp(-width / 2.0, width / 2.0);
    }
    offsets
}

pub fn finite_bounds(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quartiles_of_small_sample() {
        let q = quartiles(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(q.median, 3.0);
        assert_eq!(q.q1, 2.0);
        assert_eq!(q.q3, 4.0);
        assert_eq!(q.lower_whisker, 1.0);
        assert_eq!(q.upper_whisker, 5.0);
        assert!(q.outliers.is_empty());
    }

    #[test]
    fn quartiles_flag_outliers() {
        let q = quartiles(&[1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 100.0]).unwrap();
        assert_eq!(q.outliers, vec![100.0]);
        assert!(q.upper_whisker < 100.0);
        assert!(quartiles(&[]).is_none());
    }

    #[test]
    fn histogram_counts_every_value() {
        let values: Vec<f64> = (0..100).map(f64::from).collect();
        let bins = histogram(&values, 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins.iter().map(|b| b.2).sum::<usize>(), 100);
        assert_eq!(bins[0].0, 0.0);
        assert!((bins[9].1 - 99.0).abs() < 1e-9);
    }

    #[test]
    fn histogram_of_constant_values_has_one_populated_bin() {
        let bins = histogram(&[3.0, 3.0, 3.0], 4);
        assert_eq!(bins.iter().filter(|b| b.2 > 0).count(), 1);
    }

    #[test]
    fn kde_integrates_to_about_one() {
        let values: Vec<f64> = (0..200).map(|i| (i as f64 * 0.37).sin() * 10.0).collect();
        let curve = kde(&values, 512);
        let dx = curve[1].0 - curve[0].0;
        let area: f64 = curve.iter().map(|(_, d)| d * dx).sum();
        assert!((area - 1.0).abs() < 0.02, "area = {area}");
    }

    #[test]
    fn linear_fit_recovers_line() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 2.0 * i as f64 + 1.0)).collect();
        let (slope, intercept) = linear_fit(&points).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);
        assert!(linear_fit(&[(1.0, 1.0), (1.0, 2.0)]).is_none());
    }

    #[test]
    fn regression_band_is_narrowest_at_the_mean() {
        let points: Vec<(f64, f64)> = (0..20)
            .map(|i| (i as f64, i as f64 + if i % 2 == 0 { 0.5 } else { -0.5 }))
            .collect();
        let band = regression_band(&points, 21).unwrap();
        assert_eq!(band.len(), 21);
        let width = |b: &(f64, f64, f64, f64)| b.3 - b.2;
        let mid = &band[10];
        assert!(width(mid) < width(&band[0]));
        assert!(width(mid) < width(&band[20]));
        assert!(band.iter().all(|b| b.2 <= b.1 && b.1 <= b.3));
    }

    #[test]
    fn ci_collapses_for_single_value() {
        assert_eq!(mean_ci95(&[4.0]), (4.0, 4.0, 4.0));
        let (m, lo, hi) = mean_ci95(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(m, 2.5);
        assert!(lo < m && m < hi);
    }

    #[test]
    fn strip_offsets_stay_within_width() {
        let values = [1.0, 1.0, 1.0, 2.0, 3.0, 3.0];
        let offsets = strip_offsets(&values, 0.8);
        assert_eq!(offsets.len(), values.len());
        assert!(offsets.iter().all(|o| o.abs() <= 0.4 + 1e-12));
        assert_eq!(strip_offsets(&values, 0.8), offsets);
    }

    #[test]
    fn auto_bins_grows_with_sample() {
        assert_eq!(auto_bins(1), 1);
        assert_eq!(auto_bins(224), 9);
    }
}
