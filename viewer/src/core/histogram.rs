//! Binned counts over a channel with per-partition private bins.

use serde::Serialize;

use crate::core::array::{Array, ElementType, Sample};
use crate::core::colorspace::ColorInfo;
use crate::core::scan_partitions;
use crate::with_samples;

pub const BINS_8BIT: usize = 256;
pub const BINS_WIDE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub bins: Vec<u64>,
    pub max_bin_val: u64,
    pub range_min: f64,
    pub range_max: f64,
}

impl Histogram {
    /// Zero-filled histogram with the bin count of `element_type`.
    pub fn empty(element_type: ElementType, range_min: f64, range_max: f64) -> Self {
        Self {
            bins: vec![0; bin_count_for(element_type)],
            max_bin_val: 0,
            range_min,
            range_max,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }
}

pub fn bin_count_for(element_type: ElementType) -> usize {
    if element_type.is_8bit() {
        BINS_8BIT
    } else {
        BINS_WIDE
    }
}

/// Bin of `v` for the range [`min`, `max`]; always in `0..bins`.
#[inline]
pub fn bin_index(v: f64, min: f64, max: f64, bins: usize) -> usize {
    let pos = (v - min) / (max - min) * bins as f64;
    // A degenerate range yields NaN, which max() sends to bin 0
    (pos.floor().max(0.0) as usize).min(bins - 1)
}

/// Histogram of `value(pixel)` over an interleaved buffer. Non-finite values are skipped.
pub fn compute_with<T, F>(data: &[T], channels: usize, bins: usize, min: f64, max: f64, value: F) -> Histogram
where
    T: Sample,
    F: Fn(&[T]) -> f64 + Sync,
{
    let channels = channels.max(1);
    let bins = bins.max(1);
    let partials = scan_partitions(data, channels, |part| {
        let mut counts = vec![0u64; bins];
        for pixel in part.chunks_exact(channels) {
            let v = value(pixel);
            if v.is_finite() {
                counts[bin_index(v, min, max, bins)] += 1;
            }
        }
        counts
    });

    let mut merged = vec![0u64; bins];
    for counts in &partials {
        for (total, count) in merged.iter_mut().zip(counts) {
            *total += count;
        }
    }
    let max_bin_val = merged.iter().copied().max().unwrap_or(0);
    Histogram {
        bins: merged,
        max_bin_val,
        range_min: min,
        range_max: max,
    }
}

/// Histogram of raw channel `channel` over [`min`, `max`].
pub fn compute(array: &Array, channel: usize, min: f64, max: f64) -> Histogram {
    let bins = bin_count_for(array.element_type());
    let channels = array.channel_count();
    if channel >= channels {
        return Histogram::empty(array.element_type(), min, max);
    }
    with_samples!(array.data(), buf => compute_with(buf, channels, bins, min, max, |px| px[channel].to_f64()))
}

/// Histogram of the derived lightness channel over [`min`, `max`].
pub fn compute_lightness(array: &Array, info: &ColorInfo, min: f64, max: f64) -> Histogram {
    let bins = bin_count_for(array.element_type());
    if !info.has_color() {
        return Histogram::empty(array.element_type(), min, max);
    }
    let channels = array.channel_count();
    with_samples!(array.data(), buf => compute_with(buf, channels, bins, min, max, |px| info.lightness(px)))
}
