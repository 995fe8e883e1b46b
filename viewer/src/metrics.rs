// Lock-free counters shared by the tile store (rayon workers) and the render cache.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

pub struct TileMetrics {
    // Counters
    pub tiles_extracted: AtomicU64,
    pub tiles_downsampled: AtomicU64,
    pub uploads: AtomicU64,
    pub cache_reused: AtomicU64,
    pub cache_released: AtomicU64,
    pub cache_invalidations: AtomicU64,
    pub level_passes: AtomicU64,

    // Timings (microseconds)
    pub level_time_sum_us: AtomicU64,
    pub level_time_max_us: AtomicU64,
}

impl TileMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tiles_extracted: AtomicU64::new(0),
            tiles_downsampled: AtomicU64::new(0),
            uploads: AtomicU64::new(0),
            cache_reused: AtomicU64::new(0),
            cache_released: AtomicU64::new(0),
            cache_invalidations: AtomicU64::new(0),
            level_passes: AtomicU64::new(0),
            level_time_sum_us: AtomicU64::new(0),
            level_time_max_us: AtomicU64::new(0),
        })
    }

    #[inline(always)]
    pub fn record_extracted(&self, tiles: u64) {
        self.tiles_extracted.fetch_add(tiles, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_downsampled(&self, tiles: u64) {
        self.tiles_downsampled.fetch_add(tiles, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_upload(&self) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pass(&self, reused: u64, released: u64, invalidated: bool) {
        self.cache_reused.fetch_add(reused, Ordering::Relaxed);
        self.cache_released.fetch_add(released, Ordering::Relaxed);
        if invalidated {
            self.cache_invalidations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one level computation pass taking `elapsed_us`.
    pub fn record_level(&self, elapsed_us: u64) {
        self.level_passes.fetch_add(1, Ordering::Relaxed);
        self.level_time_sum_us.fetch_add(elapsed_us, Ordering::Relaxed);

        // Update max using CAS loop
        let mut current = self.level_time_max_us.load(Ordering::Relaxed);
        while elapsed_us > current {
            match self.level_time_max_us.compare_exchange_weak(
                current,
                elapsed_us,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current = x,
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tiles_extracted: self.tiles_extracted.load(Ordering::Relaxed),
            tiles_downsampled: self.tiles_downsampled.load(Ordering::Relaxed),
            uploads: self.uploads.load(Ordering::Relaxed),
            cache_reused: self.cache_reused.load(Ordering::Relaxed),
            cache_released: self.cache_released.load(Ordering::Relaxed),
            cache_invalidations: self.cache_invalidations.load(Ordering::Relaxed),
            level_passes: self.level_passes.load(Ordering::Relaxed),
            level_time_sum_us: self.level_time_sum_us.load(Ordering::Relaxed),
            level_time_max_us: self.level_time_max_us.load(Ordering::Relaxed),
        }
    }

    pub fn snapshot_and_reset(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tiles_extracted: self.tiles_extracted.swap(0, Ordering::Relaxed),
            tiles_downsampled: self.tiles_downsampled.swap(0, Ordering::Relaxed),
            uploads: self.uploads.swap(0, Ordering::Relaxed),
            cache_reused: self.cache_reused.swap(0, Ordering::Relaxed),
            cache_released: self.cache_released.swap(0, Ordering::Relaxed),
            cache_invalidations: self.cache_invalidations.swap(0, Ordering::Relaxed),
            level_passes: self.level_passes.swap(0, Ordering::Relaxed),
            level_time_sum_us: self.level_time_sum_us.swap(0, Ordering::Relaxed),
            level_time_max_us: self.level_time_max_us.swap(0, Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub tiles_extracted: u64,
    pub tiles_downsampled: u64,
    pub uploads: u64,
    pub cache_reused: u64,
    pub cache_released: u64,
    pub cache_invalidations: u64,
    pub level_passes: u64,
    pub level_time_sum_us: u64,
    pub level_time_max_us: u64,
}

impl MetricsSnapshot {
    pub fn level_avg_ms(&self) -> f64 {
        if self.level_passes > 0 {
            (self.level_time_sum_us as f64 / self.level_passes as f64) / 1000.0
        } else {
            0.0
        }
    }

    pub fn level_max_ms(&self) -> f64 {
        self.level_time_max_us as f64 / 1000.0
    }

    /// Share of requested tiles served from the render cache.
    pub fn reuse_ratio(&self) -> f64 {
        let requested = self.cache_reused + self.uploads;
        if requested > 0 {
            self.cache_reused as f64 / requested as f64
        } else {
            0.0
        }
    }
}
