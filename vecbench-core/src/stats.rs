/// Descriptive statistics over the successful latencies of a run (seconds).
///
/// Every latency field is `None` when the run had no successful query. `throughput` follows the
/// same rule, except that a non-empty set of zero latencies yields `Some(0.)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyStats {
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
    pub stddev: Option<f64>,
    /// Successful queries per second of accumulated latency. Not wall-clock throughput.
    pub throughput: Option<f64>,
}

impl LatencyStats {
    /// Reduce a set of latencies (in seconds) into summary statistics.
    pub fn aggregate(latencies: &[f64]) -> Self {
        if latencies.is_empty() {
            return Self::default();
        }

        let n = latencies.len() as f64;
        let sum: f64 = latencies.iter().sum();
        let mean = sum / n;
        let var = latencies.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / n;

        let mut sorted = latencies.to_vec();
        sorted.sort_by(f64::total_cmp);

        Self {
            avg: Some(mean),
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            p50: percentile(&sorted, 50.),
            p90: percentile(&sorted, 90.),
            p95: percentile(&sorted, 95.),
            p99: percentile(&sorted, 99.),
            stddev: Some(var.sqrt()),
            throughput: Some(if sum > 0. { n / sum } else { 0. }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.avg.is_none()
    }
}

/// Linearly interpolated percentile of an already sorted slice. `p` is in `[0, 100]`.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let last = sorted.len() - 1;
    let idx = last as f64 * (p.clamp(0., 100.) / 100.);
    let lower = idx.floor() as usize;
    let upper = (lower + 1).min(last);
    let weight = idx - lower as f64;

    Some(sorted[lower] * (1. - weight) + sorted[upper] * weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.map(|a| (a - b).abs() < 1e-9).unwrap_or(false)
    }

    #[test]
    fn percentile_interpolates_linearly() {
        assert_eq!(percentile(&[1., 2., 3., 4., 5.], 50.), Some(3.));
        assert_eq!(percentile(&[1., 2.], 50.), Some(1.5));
        assert!(approx(percentile(&[1., 2., 3., 4.], 90.), 3.7));
        assert_eq!(percentile(&[7.], 99.), Some(7.));
        assert_eq!(percentile(&[], 50.), None);
    }

    #[test]
    fn percentile_endpoints() {
        let sorted = [0.1, 0.4, 0.9];
        assert_eq!(percentile(&sorted, 0.), Some(0.1));
        assert_eq!(percentile(&sorted, 100.), Some(0.9));
    }

    #[test]
    fn empty_input_is_all_undefined() {
        let stats = LatencyStats::aggregate(&[]);
        assert_eq!(stats, LatencyStats::default());
        assert!(stats.is_empty());
        assert!(stats.throughput.is_none());
        assert!(stats.stddev.is_none());
    }

    #[test]
    fn population_stddev() {
        let flat = LatencyStats::aggregate(&[2., 2., 2., 2.]);
        assert_eq!(flat.stddev, Some(0.));

        let spread = LatencyStats::aggregate(&[1., 2., 3., 4.]);
        assert!(approx(spread.stddev, 1.118_033_988_749_895));
    }

    #[test]
    fn summary_of_unsorted_input() {
        let stats = LatencyStats::aggregate(&[0.3, 0.1, 0.2]);
        assert!(approx(stats.avg, 0.2));
        assert_eq!(stats.min, Some(0.1));
        assert_eq!(stats.max, Some(0.3));
        assert!(approx(stats.p50, 0.2));
        assert!(approx(stats.p90, 0.28));
    }

    #[test]
    fn throughput_is_count_over_latency_sum() {
        let stats = LatencyStats::aggregate(&[0.5, 0.25, 0.25]);
        assert!(approx(stats.throughput, 3.));
    }

    #[test]
    fn throughput_of_zero_latencies_is_zero() {
        let stats = LatencyStats::aggregate(&[0., 0., 0.]);
        assert_eq!(stats.throughput, Some(0.));
        assert_eq!(stats.avg, Some(0.));
    }
}
