//! Tile buffers of one frame, computed lazily level by level and tracked for staleness.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;

use crate::core::array::{Array, ArrayData, Sample};
use crate::core::colorspace::TextureFormat;
use crate::core::convert::convert_data;
use crate::core::downsample::{downsample_children, stitch_level_border};
use crate::core::pyramid::{extract_tile, Geometry, PixelRect, QuadCoord};
use crate::core::ConversionPolicy;
use crate::metrics::TileMetrics;
use crate::with_samples;

#[derive(Debug, Clone)]
struct Tile {
    data: Option<ArrayData>,
    dirty: bool,
}

impl Tile {
    fn stale() -> Self {
        Self { data: None, dirty: true }
    }
}

/// Every tile of every pyramid level for one frame.
///
/// Dirty tiles always have dirty ancestors, so the dirty set can be walked
/// upward with an early exit.
pub struct TileStore {
    geometry: Geometry,
    format: TextureFormat,
    conversion: ConversionPolicy,
    channels: usize,
    levels: Vec<Vec<Tile>>,
    changed: bool,
    metrics: Arc<TileMetrics>,
}

impl TileStore {
    /// All tiles start dirty and the store reports itself as changed.
    pub fn new(
        geometry: Geometry,
        format: TextureFormat,
        conversion: ConversionPolicy,
        channels: usize,
        metrics: Arc<TileMetrics>,
    ) -> Self {
        let levels = geometry
            .levels
            .iter()
            .map(|grid| vec![Tile::stale(); grid.tile_count()])
            .collect();
        Self {
            geometry,
            format,
            conversion,
            channels,
            levels,
            changed: true,
            metrics,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn format(&self) -> &TextureFormat {
        &self.format
    }

    fn index(&self, coord: QuadCoord) -> Option<usize> {
        let grid = self.geometry.level(coord.level)?;
        grid.contains(coord.x, coord.y).then(|| coord.y * grid.width + coord.x)
    }

    pub fn is_dirty(&self, coord: QuadCoord) -> bool {
        self.index(coord)
            .is_some_and(|i| self.levels[coord.level][i].dirty)
    }

    pub fn dirty_count(&self) -> usize {
        self.levels.iter().flatten().filter(|t| t.dirty).count()
    }

    /// Mark a tile and every ancestor built from it dirty.
    pub fn mark_dirty(&mut self, coord: QuadCoord) {
        let mut next = Some(coord);
        while let Some(cur) = next {
            let Some(i) = self.index(cur) else {
                break;
            };
            self.changed = true;
            let tile = &mut self.levels[cur.level][i];
            if tile.dirty {
                break;
            }
            tile.dirty = true;
            next = self.geometry.parent(cur);
        }
    }

    pub fn mark_all_dirty(&mut self) {
        for tile in self.levels.iter_mut().flatten() {
            tile.dirty = true;
        }
        self.changed = true;
    }

    /// Dirty every level-0 tile whose bordered window overlaps `rect`, plus ancestors.
    pub fn mark_region_dirty(&mut self, rect: PixelRect) {
        let touched = self.geometry.level0_tiles_touching(rect);
        debug!("region {:?} dirties {} level-0 tiles", rect, touched.len());
        for coord in touched {
            self.mark_dirty(coord);
        }
    }

    /// True once after any invalidation since the previous call.
    pub fn take_changed(&mut self) -> bool {
        std::mem::replace(&mut self.changed, false)
    }

    /// Recompute every dirty tile: level 0 from `array`, then each level from the one below.
    pub fn ensure_computed(&mut self, array: &Array) {
        if self.levels.iter().flatten().all(|t| !t.dirty) {
            return;
        }
        let geometry = self.geometry.clone();
        let format = self.format.clone();
        let conversion = self.conversion;
        let channels = self.channels;
        let (tile_w, tile_h) = (geometry.tile_width(), geometry.tile_height());

        // Level 0: independent extraction per tile
        let start = Instant::now();
        let grid_w = geometry.levels[0].width;
        let extracted = self.levels[0]
            .par_iter_mut()
            .enumerate()
            .filter(|(_, tile)| tile.dirty)
            .map(|(i, tile)| {
                let x0 = (i % grid_w * geometry.core_width) as isize - geometry.border as isize;
                let y0 = (i / grid_w * geometry.core_height) as isize - geometry.border as isize;
                let raw = with_samples!(array.data(), buf => extract_window(
                    buf, array, x0, y0, tile_w, tile_h
                ));
                tile.data = Some(convert_data(raw, format.element_type, conversion));
                tile.dirty = false;
            })
            .count();
        self.metrics.record_extracted(extracted as u64);
        self.record_level(0, extracted, start);

        // Higher levels: strictly after the level below has finished
        for level in 1..self.levels.len() {
            let start = Instant::now();
            let (below, above) = self.levels.split_at_mut(level);
            let children = &below[level - 1];
            let child_w = geometry.levels[level - 1].width;
            let grid_w = geometry.levels[level].width;
            let reduced: Vec<usize> = above[0]
                .par_iter_mut()
                .enumerate()
                .filter(|(_, tile)| tile.dirty)
                .map(|(i, tile)| {
                    let coord = QuadCoord::new(level, i % grid_w, i / grid_w);
                    let inputs = geometry.children(coord).map(|child| {
                        child.and_then(|c| children[c.y * child_w + c.x].data.as_ref())
                    });
                    tile.data = Some(downsample_children(
                        format.element_type,
                        inputs,
                        tile_w,
                        tile_h,
                        geometry.border,
                        channels,
                        &format.gamma_channels,
                    ));
                    tile.dirty = false;
                    i
                })
                .collect();
            self.metrics.record_downsampled(reduced.len() as u64);
            self.stitch_borders(level, &reduced);
            self.record_level(level, reduced.len(), start);
        }
    }

    /// Rebuild the border ring of every recomputed tile on `level` and of the
    /// neighbours whose borders overlap it, from core pixels of the same level.
    fn stitch_borders(&mut self, level: usize, recomputed: &[usize]) {
        let geometry = &self.geometry;
        let border = geometry.border;
        if border == 0 || recomputed.is_empty() {
            return;
        }
        let grid = geometry.levels[level];
        let reach = border.div_ceil(geometry.core_width.min(geometry.core_height).max(1));
        let mut targets: Vec<usize> = recomputed
            .iter()
            .flat_map(|&i| {
                let (x, y) = ((i % grid.width) as isize, (i / grid.width) as isize);
                let r = reach as isize;
                (y - r..=y + r).flat_map(move |ny| (x - r..=x + r).map(move |nx| (nx, ny)))
            })
            .filter(|&(nx, ny)| nx >= 0 && ny >= 0 && grid.contains(nx as usize, ny as usize))
            .map(|(nx, ny)| ny as usize * grid.width + nx as usize)
            .collect();
        targets.sort_unstable();
        targets.dedup();

        let tiles: Vec<Option<&ArrayData>> = self.levels[level].iter().map(|t| t.data.as_ref()).collect();
        let element_type = self.format.element_type;
        let channels = self.channels;
        let stitched: Vec<(usize, ArrayData)> = targets
            .par_iter()
            .filter(|&&i| tiles[i].is_some())
            .map(|&i| {
                let data = stitch_level_border(
                    element_type,
                    &tiles,
                    grid.width,
                    i % grid.width,
                    i / grid.width,
                    geometry.core_width,
                    geometry.core_height,
                    border,
                    channels,
                );
                (i, data)
            })
            .collect();
        drop(tiles);

        debug!("level {} stitched {} tile borders", level, stitched.len());
        let row = &mut self.levels[level];
        for (i, data) in stitched {
            row[i].data = Some(data);
        }
    }

    fn record_level(&self, level: usize, tiles: usize, start: Instant) {
        if tiles == 0 {
            return;
        }
        let elapsed = start.elapsed();
        self.metrics.record_level(elapsed.as_micros() as u64);
        debug!(
            "level {} computed {} tiles in {:.2}ms",
            level,
            tiles,
            elapsed.as_secs_f64() * 1000.0
        );
    }

    /// Computed buffer of a clean tile. Dirty or unknown tiles return `None`.
    pub fn tile(&self, coord: QuadCoord) -> Option<&ArrayData> {
        let i = self.index(coord)?;
        let tile = &self.levels[coord.level][i];
        if tile.dirty {
            return None;
        }
        tile.data.as_ref()
    }

    /// Bytes held by computed tile buffers.
    pub fn resident_bytes(&self) -> usize {
        self.levels
            .iter()
            .flatten()
            .filter_map(|t| t.data.as_ref())
            .map(|d| d.len() * d.element_type().size_bytes())
            .sum()
    }
}

fn extract_window<T: Sample>(
    buf: &[T],
    array: &Array,
    x0: isize,
    y0: isize,
    tile_w: usize,
    tile_h: usize,
) -> ArrayData {
    T::into_data(extract_tile(
        buf,
        array.width(),
        array.height(),
        array.channel_count(),
        x0,
        y0,
        tile_w,
        tile_h,
    ))
}
