pub mod array;
pub mod color;
pub mod colorspace;
pub mod convert;
pub mod downsample;
pub mod histogram;
pub mod pyramid;
pub mod stats;

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;

/// Below this many pixels a partition is not worth handing to another worker.
pub const MIN_PARTITION_PIXELS: usize = 16 * 1024;

/// Rule used when a tile's element type differs from the type the renderer needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionPolicy {
    /// Rescale integer ranges onto each other; float targets keep the value.
    #[default]
    Normalize,
    /// Plain numeric cast, rounded and clamped to the target range.
    Saturate,
}

impl fmt::Display for ConversionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionPolicy::Normalize => write!(f, "normalize"),
            ConversionPolicy::Saturate => write!(f, "saturate"),
        }
    }
}

impl FromStr for ConversionPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normalize" | "rescale" => Ok(ConversionPolicy::Normalize),
            "saturate" | "clamp" | "cast" => Ok(ConversionPolicy::Saturate),
            _ => Err(format!("unknown conversion policy '{}'. Available: normalize, saturate", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// Partitioned scans
// ---------------------------------------------------------------------------

/// Pixels per partition so that every rayon worker gets one contiguous slice.
pub fn partition_pixels(pixels: usize) -> usize {
    let workers = rayon::current_num_threads().max(1);
    pixels.div_ceil(workers).max(MIN_PARTITION_PIXELS)
}

/// Run `scan` over contiguous pixel partitions of an interleaved buffer in parallel.
///
/// Each partition is handed whole pixels (`channels` samples each). The partial
/// results come back in buffer order so the caller can merge them on one thread.
pub fn scan_partitions<T, A, F>(data: &[T], channels: usize, scan: F) -> Vec<A>
where
    T: Sync,
    A: Send,
    F: Fn(&[T]) -> A + Sync,
{
    let channels = channels.max(1);
    if data.is_empty() {
        return Vec::new();
    }
    let chunk = partition_pixels(data.len() / channels) * channels;
    data.par_chunks(chunk).map(|part| scan(part)).collect()
}
