//! One-pass min/max/mean/variance over a channel, partitioned across rayon workers.

use serde::Serialize;

use crate::core::array::{Array, Sample};
use crate::core::colorspace::ColorInfo;
use crate::core::scan_partitions;
use crate::with_samples;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistic {
    pub finite_count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
    pub deviation: f64,
}

impl Statistic {
    /// Result for a channel without a single finite sample.
    pub fn empty() -> Self {
        Self {
            finite_count: 0,
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
            variance: f64::NAN,
            deviation: f64::NAN,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.finite_count == 0
    }

    /// (min, max) when at least one finite sample was seen.
    pub fn extrema(&self) -> Option<(f64, f64)> {
        (!self.is_empty()).then_some((self.min, self.max))
    }
}

/// Per-partition accumulator. Non-finite values are never pushed into the sums.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialStatistic {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub sum_sq: f64,
}

impl Default for PartialStatistic {
    fn default() -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            sum_sq: 0.0,
        }
    }
}

impl PartialStatistic {
    #[inline]
    pub fn push(&mut self, v: f64) {
        if !v.is_finite() {
            return;
        }
        self.count += 1;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        self.sum += v;
        self.sum_sq += v * v;
    }

    pub fn merge(&mut self, other: &PartialStatistic) {
        if other.count == 0 {
            return;
        }
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }

    pub fn finish(&self) -> Statistic {
        if self.count == 0 {
            return Statistic::empty();
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        let variance = if self.count == 1 {
            0.0
        } else {
            // Cancellation can leave a tiny negative residue
            ((self.sum_sq - self.sum * self.sum / n) / (n - 1.0)).max(0.0)
        };
        Statistic {
            finite_count: self.count,
            min: self.min,
            max: self.max,
            mean,
            variance,
            deviation: variance.sqrt(),
        }
    }
}

/// Reduce `value(pixel)` over every pixel of an interleaved buffer.
///
/// Partitions are scanned in parallel and their partials merged in buffer order
/// on the calling thread.
pub fn compute_with<T, F>(data: &[T], channels: usize, value: F) -> Statistic
where
    T: Sample,
    F: Fn(&[T]) -> f64 + Sync,
{
    let channels = channels.max(1);
    let partials = scan_partitions(data, channels, |part| {
        let mut acc = PartialStatistic::default();
        for pixel in part.chunks_exact(channels) {
            acc.push(value(pixel));
        }
        acc
    });

    let mut total = PartialStatistic::default();
    for partial in &partials {
        total.merge(partial);
    }
    total.finish()
}

/// Statistic of one raw channel. An out-of-range channel yields the empty result.
pub fn compute(array: &Array, channel: usize) -> Statistic {
    let channels = array.channel_count();
    if channel >= channels {
        return Statistic::empty();
    }
    with_samples!(array.data(), buf => compute_with(buf, channels, |px| px[channel].to_f64()))
}

/// Statistic of the derived lightness channel; empty without a colour space.
pub fn compute_lightness(array: &Array, info: &ColorInfo) -> Statistic {
    if !info.has_color() {
        return Statistic::empty();
    }
    let channels = array.channel_count();
    with_samples!(array.data(), buf => compute_with(buf, channels, |px| info.lightness(px)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MIN_PARTITION_PIXELS;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_known_values() {
        let array = Array::new(4, 1, 1, vec![2.0f64, 4.0, 4.0, 6.0]).unwrap();
        let stat = compute(&array, 0);
        assert_eq!(stat.finite_count, 4);
        assert_eq!(stat.min, 2.0);
        assert_eq!(stat.max, 6.0);
        assert_eq!(stat.mean, 4.0);
        // Sample variance: (4 + 0 + 0 + 4) / 3
        assert!(close(stat.variance, 8.0 / 3.0));
        assert!(close(stat.deviation, (8.0f64 / 3.0).sqrt()));
    }

    #[test]
    fn test_skips_non_finite() {
        let data = vec![1.0f32, f32::NAN, f32::INFINITY, 3.0, f32::NEG_INFINITY];
        let array = Array::new(5, 1, 1, data).unwrap();
        let stat = compute(&array, 0);
        assert_eq!(stat.finite_count, 2);
        assert_eq!(stat.extrema(), Some((1.0, 3.0)));
        assert_eq!(stat.mean, 2.0);
    }

    #[test]
    fn test_all_non_finite_is_nan() {
        let array = Array::new(2, 1, 1, vec![f64::NAN, f64::NAN]).unwrap();
        let stat = compute(&array, 0);
        assert_eq!(stat.finite_count, 0);
        assert!(stat.min.is_nan() && stat.max.is_nan() && stat.mean.is_nan());
        assert!(stat.variance.is_nan() && stat.deviation.is_nan());
        assert_eq!(stat.extrema(), None);
    }

    #[test]
    fn test_single_sample_has_zero_variance() {
        let array = Array::new(1, 1, 1, vec![42u8]).unwrap();
        let stat = compute(&array, 0);
        assert_eq!(stat.finite_count, 1);
        assert_eq!(stat.variance, 0.0);
        assert_eq!(stat.deviation, 0.0);
    }

    #[test]
    fn test_constant_data_never_negative_variance() {
        let array = Array::new(1000, 1, 1, vec![0.1f64; 1000]).unwrap();
        let stat = compute(&array, 0);
        assert!(stat.variance >= 0.0);
        assert!(stat.variance < 1e-12);
    }

    #[test]
    fn test_interleaved_channel_selection() {
        let data: Vec<u16> = vec![1, 100, 2, 200, 3, 300];
        let array = Array::new(3, 1, 2, data).unwrap();
        assert_eq!(compute(&array, 0).mean, 2.0);
        assert_eq!(compute(&array, 1).mean, 200.0);
        assert!(compute(&array, 2).is_empty());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let pixels = MIN_PARTITION_PIXELS * 4 + 123;
        let data: Vec<f32> = (0..pixels).map(|i| ((i * 7919) % 1000) as f32 * 0.01).collect();
        let array = Array::new(pixels, 1, 1, data.clone()).unwrap();
        let stat = compute(&array, 0);

        let mut seq = PartialStatistic::default();
        for v in &data {
            seq.push(*v as f64);
        }
        let expected = seq.finish();
        assert_eq!(stat.finite_count, expected.finite_count);
        assert_eq!(stat.min, expected.min);
        assert_eq!(stat.max, expected.max);
        assert!(close(stat.mean, expected.mean));
        assert!(close(stat.variance, expected.variance));
    }

    #[test]
    fn test_lightness_statistic() {
        let array = Array::new(2, 1, 3, vec![0u8, 0, 0, 255, 255, 255])
            .unwrap()
            .with_interpretations(&["RED", "GREEN", "BLUE"])
            .unwrap();
        let info = ColorInfo::classify(&array);
        let stat = compute_lightness(&array, &info);
        assert_eq!(stat.finite_count, 2);
        assert!(close(stat.min, 0.0));
        assert!(close(stat.max, 100.0));

        let stat = compute_lightness(&array, &ColorInfo::NONE);
        assert!(stat.is_empty());
    }
}
