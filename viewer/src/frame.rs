//! A loaded frame: source array plus everything derived from it on demand.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cache::{ChannelSelector, TextureBackend, TextureDesc, TileUpload};
use crate::config::TilingConfig;
use crate::core::array::{Array, ArrayData, TAG_MAXVAL, TAG_MINVAL};
use crate::core::colorspace::{ColorInfo, ColorSpace, TextureFormat};
use crate::core::histogram::{self, Histogram};
use crate::core::pyramid::{Geometry, PixelRect, QuadCoord};
use crate::core::stats::{self, Statistic};
use crate::metrics::TileMetrics;
use crate::tiles::TileStore;
use crate::with_samples;

/// A raw channel or the derived lightness channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRef {
    Channel(usize),
    Color,
}

// ---------------------------------------------------------------------------
// Memoized slots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Uncomputed,
    Computing,
    Ready,
}

impl SlotState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SlotState::Computing,
            2 => SlotState::Ready,
            _ => SlotState::Uncomputed,
        }
    }
}

/// Value computed at most once until cleared. Concurrent callers wait for the first.
///
/// The lifecycle state lives beside the lock so it can be read without
/// waiting on a computation or a reader.
pub struct Memo<T> {
    slot: Mutex<Option<T>>,
    state: AtomicU8,
}

impl<T: Clone> Memo<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            state: AtomicU8::new(SlotState::Uncomputed as u8),
        }
    }

    pub fn get_or_compute(&self, compute: impl FnOnce() -> T) -> T {
        let mut slot = self.slot.lock();
        if let Some(value) = &*slot {
            return value.clone();
        }
        self.state.store(SlotState::Computing as u8, Ordering::Release);
        let value = compute();
        *slot = Some(value.clone());
        self.state.store(SlotState::Ready as u8, Ordering::Release);
        value
    }

    pub fn state(&self) -> SlotState {
        SlotState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn clear(&self) {
        let mut slot = self.slot.lock();
        *slot = None;
        self.state.store(SlotState::Uncomputed as u8, Ordering::Release);
    }
}

impl<T: Clone> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn memo_slots<T: Clone>(count: usize) -> Vec<Memo<T>> {
    (0..count).map(|_| Memo::new()).collect()
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

pub struct Frame {
    array: Arc<Array>,
    config: TilingConfig,
    color: Memo<ColorInfo>,
    /// One slot per raw channel plus a trailing slot for [`ChannelRef::Color`].
    statistics: Vec<Memo<Statistic>>,
    histograms: Vec<Memo<Histogram>>,
    visible_overrides: Vec<Option<(f64, f64)>>,
    geometry: Geometry,
    tiles: Option<TileStore>,
    metrics: Arc<TileMetrics>,
}

impl Frame {
    pub fn new(array: impl Into<Arc<Array>>, config: TilingConfig) -> Self {
        let array = array.into();
        let channels = array.channel_count();
        let geometry = Self::layout(&array, &config);
        Self {
            array,
            config,
            color: Memo::new(),
            statistics: memo_slots(channels + 1),
            histograms: memo_slots(channels + 1),
            visible_overrides: vec![None; channels + 1],
            geometry,
            tiles: None,
            metrics: TileMetrics::new(),
        }
    }

    fn layout(array: &Array, config: &TilingConfig) -> Geometry {
        let geometry = Geometry::new(
            array.width(),
            array.height(),
            config.max_texture_size,
            config.tile_core,
            config.border,
        );
        info!(
            "frame {}x{}x{} {}: {} levels, level 0 grid {}x{}, tile {}x{}",
            array.width(),
            array.height(),
            array.channel_count(),
            array.element_type(),
            geometry.level_count(),
            geometry.levels[0].width,
            geometry.levels[0].height,
            geometry.tile_width(),
            geometry.tile_height()
        );
        geometry
    }

    /// Replace the source array and drop everything derived from the old one.
    pub fn reset(&mut self, array: impl Into<Arc<Array>>) {
        let array = array.into();
        let channels = array.channel_count();
        self.geometry = Self::layout(&array, &self.config);
        self.array = array;
        self.color.clear();
        self.statistics = memo_slots(channels + 1);
        self.histograms = memo_slots(channels + 1);
        self.visible_overrides = vec![None; channels + 1];
        self.tiles = None;
        self.metrics.snapshot_and_reset();
    }

    /// Swap in updated data of identical shape (watch mode).
    ///
    /// Statistics and histograms are recomputed on demand; tiles touching
    /// `changed` (everything when `None`) and their ancestors become dirty.
    pub fn refresh(&mut self, array: impl Into<Arc<Array>>, changed: Option<PixelRect>) -> Result<()> {
        let array = array.into();
        if !self.array.same_geometry(&array) {
            return Err(anyhow!(
                "refreshed array {}x{}x{} {} does not match loaded {}x{}x{} {}",
                array.width(),
                array.height(),
                array.channel_count(),
                array.element_type(),
                self.array.width(),
                self.array.height(),
                self.array.channel_count(),
                self.array.element_type()
            ));
        }
        self.array = array;
        self.color.clear();
        self.statistics.iter().for_each(Memo::clear);
        self.histograms.iter().for_each(Memo::clear);

        let format = self.texture_format();
        if let Some(store) = self.tiles.as_mut() {
            if store.format() != &format {
                info!("texture format changed to {:?}, rebuilding tiles", format);
                let mut rebuilt = TileStore::new(
                    self.geometry.clone(),
                    format,
                    self.config.conversion,
                    self.array.channel_count(),
                    Arc::clone(&self.metrics),
                );
                rebuilt.mark_all_dirty();
                *store = rebuilt;
            } else {
                match changed {
                    Some(rect) => store.mark_region_dirty(rect),
                    None => store.mark_all_dirty(),
                }
            }
        }
        debug!("frame refreshed, changed region {:?}", changed);
        Ok(())
    }

    pub fn array(&self) -> &Arc<Array> {
        &self.array
    }

    pub fn config(&self) -> &TilingConfig {
        &self.config
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn metrics(&self) -> Arc<TileMetrics> {
        Arc::clone(&self.metrics)
    }

    // -----------------------------------------------------------------------
    // Colour
    // -----------------------------------------------------------------------

    pub fn color_info(&self) -> ColorInfo {
        self.color.get_or_compute(|| ColorInfo::classify(&self.array))
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_info().space
    }

    /// Source channel behind colour slot `i` (0..3).
    pub fn color_channel_index(&self, i: usize) -> Option<usize> {
        let info = self.color_info();
        if !info.has_color() {
            return None;
        }
        info.color_channels.get(i).copied()
    }

    pub fn alpha_channel_index(&self) -> Option<usize> {
        self.color_info().alpha_channel
    }

    /// Colour composite when the frame has a colour space, else the first channel.
    pub fn default_channel(&self) -> ChannelRef {
        if self.color_info().has_color() {
            ChannelRef::Color
        } else {
            ChannelRef::Channel(0)
        }
    }

    pub fn channel_count(&self) -> usize {
        self.array.channel_count()
    }

    pub fn width(&self) -> usize {
        self.array.width()
    }

    pub fn height(&self) -> usize {
        self.array.height()
    }

    fn slot(&self, channel: ChannelRef) -> Option<usize> {
        match channel {
            ChannelRef::Channel(c) if c < self.channel_count() => Some(c),
            ChannelRef::Channel(_) => None,
            ChannelRef::Color => Some(self.channel_count()),
        }
    }

    /// Sample or lightness at a pixel; NaN outside the frame.
    pub fn value(&self, x: usize, y: usize, channel: ChannelRef) -> f64 {
        match channel {
            ChannelRef::Channel(c) => self.array.get(x, y, c),
            ChannelRef::Color => {
                if x >= self.width() || y >= self.height() {
                    return f64::NAN;
                }
                let info = self.color_info();
                let channels = self.channel_count();
                let start = (y * self.width() + x) * channels;
                with_samples!(self.array.data(), buf => info.lightness(&buf[start..start + channels]))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Ranges
    // -----------------------------------------------------------------------

    fn tagged(&self, channel: usize, key: &str) -> Option<f64> {
        self.array
            .tag(channel, key)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    /// Nominal lower bound of the data: MINVAL tag, type minimum, or observed minimum.
    pub fn min_val(&self, channel: ChannelRef) -> f64 {
        match channel {
            ChannelRef::Channel(c) => self.raw_range(c).0,
            ChannelRef::Color => self.color_envelope(|c| self.raw_range(c)).0,
        }
    }

    pub fn max_val(&self, channel: ChannelRef) -> f64 {
        match channel {
            ChannelRef::Channel(c) => self.raw_range(c).1,
            ChannelRef::Color => self.color_envelope(|c| self.raw_range(c)).1,
        }
    }

    fn raw_range(&self, c: usize) -> (f64, f64) {
        if c >= self.channel_count() {
            return (f64::NAN, f64::NAN);
        }
        let ty = self.array.element_type();
        let observed = || {
            if ty.is_float() {
                self.statistic(ChannelRef::Channel(c)).extrema()
            } else {
                Some((ty.min_value(), ty.max_value()))
            }
        };
        let min = self.tagged(c, TAG_MINVAL);
        let max = self.tagged(c, TAG_MAXVAL);
        match (min, max) {
            (Some(min), Some(max)) => (min, max),
            _ => {
                let (lo, hi) = observed().unwrap_or((0.0, 1.0));
                (min.unwrap_or(lo), max.unwrap_or(hi))
            }
        }
    }

    /// Union of `range` over the distinct colour channels.
    fn color_envelope(&self, range: impl Fn(usize) -> (f64, f64)) -> (f64, f64) {
        let info = self.color_info();
        if !info.has_color() {
            return (f64::NAN, f64::NAN);
        }
        let mut channels = info.color_channels.to_vec();
        channels.dedup();
        channels
            .into_iter()
            .map(range)
            .filter(|(lo, hi)| lo.is_finite() && hi.is_finite())
            .fold((f64::NAN, f64::NAN), |(lo, hi), (a, b)| (lo.min(a), hi.max(b)))
    }

    pub fn vis_min_val(&self, channel: ChannelRef) -> f64 {
        self.visible_range(channel).0
    }

    pub fn vis_max_val(&self, channel: ChannelRef) -> f64 {
        self.visible_range(channel).1
    }

    /// User override if set, else the default display range for the channel.
    pub fn visible_range(&self, channel: ChannelRef) -> (f64, f64) {
        let Some(slot) = self.slot(channel) else {
            return (f64::NAN, f64::NAN);
        };
        if let Some(range) = self.visible_overrides[slot] {
            return range;
        }
        match channel {
            ChannelRef::Channel(c) => self.observed_range(c),
            ChannelRef::Color => {
                let info = self.color_info();
                match info.space {
                    ColorSpace::None => (f64::NAN, f64::NAN),
                    ColorSpace::LinearGray | ColorSpace::LinearRgb => {
                        self.color_envelope(|c| self.observed_range(c))
                    }
                    ColorSpace::GammaGray | ColorSpace::GammaRgb => {
                        if self.array.element_type().is_float() {
                            self.statistic(ChannelRef::Color).extrema().unwrap_or((0.0, 100.0))
                        } else {
                            (0.0, 100.0)
                        }
                    }
                    ColorSpace::Y | ColorSpace::Xyz => self.observed_range(info.luminance_channel()),
                }
            }
        }
    }

    fn observed_range(&self, c: usize) -> (f64, f64) {
        self.statistic(ChannelRef::Channel(c))
            .extrema()
            .unwrap_or_else(|| self.raw_range(c))
    }

    pub fn set_visible_range(&mut self, channel: ChannelRef, min: f64, max: f64) -> Result<()> {
        let slot = self
            .slot(channel)
            .ok_or_else(|| anyhow!("channel {:?} out of range", channel))?;
        if !(min.is_finite() && max.is_finite() && min <= max) {
            return Err(anyhow!("invalid visible range [{}, {}]", min, max));
        }
        self.visible_overrides[slot] = Some((min, max));
        Ok(())
    }

    pub fn clear_visible_range(&mut self, channel: ChannelRef) {
        if let Some(slot) = self.slot(channel) {
            self.visible_overrides[slot] = None;
        }
    }

    // -----------------------------------------------------------------------
    // Statistics and histograms
    // -----------------------------------------------------------------------

    /// Memoized statistic; out-of-range channels get the empty result.
    pub fn statistic(&self, channel: ChannelRef) -> Statistic {
        let Some(slot) = self.slot(channel) else {
            return Statistic::empty();
        };
        self.statistics[slot].get_or_compute(|| match channel {
            ChannelRef::Channel(c) => stats::compute(&self.array, c),
            ChannelRef::Color => stats::compute_lightness(&self.array, &self.color_info()),
        })
    }

    pub fn statistic_state(&self, channel: ChannelRef) -> SlotState {
        self.slot(channel)
            .map_or(SlotState::Uncomputed, |slot| self.statistics[slot].state())
    }

    pub fn histogram_state(&self, channel: ChannelRef) -> SlotState {
        self.slot(channel)
            .map_or(SlotState::Uncomputed, |slot| self.histograms[slot].state())
    }

    /// Memoized histogram over the channel's statistic extrema.
    pub fn histogram(&self, channel: ChannelRef) -> Histogram {
        let Some(slot) = self.slot(channel) else {
            return Histogram::empty(self.array.element_type(), f64::NAN, f64::NAN);
        };
        // Resolve the range before taking the histogram slot
        let (min, max) = self.statistic(channel).extrema().unwrap_or_else(|| match channel {
            ChannelRef::Channel(c) => self.raw_range(c),
            ChannelRef::Color => (0.0, 100.0),
        });
        self.histograms[slot].get_or_compute(|| self.histogram_in_range(channel, min, max))
    }

    /// Uncached histogram over an explicit range.
    pub fn histogram_in_range(&self, channel: ChannelRef, min: f64, max: f64) -> Histogram {
        match channel {
            ChannelRef::Channel(c) => histogram::compute(&self.array, c, min, max),
            ChannelRef::Color => histogram::compute_lightness(&self.array, &self.color_info(), min, max),
        }
    }

    // -----------------------------------------------------------------------
    // Quadtree
    // -----------------------------------------------------------------------

    pub fn quad_tree_levels(&self) -> usize {
        self.geometry.level_count()
    }

    /// Tile grid width of `level`; 0 past the top.
    pub fn quad_tree_level_width(&self, level: usize) -> usize {
        self.geometry.level(level).map_or(0, |grid| grid.width)
    }

    pub fn quad_tree_level_height(&self, level: usize) -> usize {
        self.geometry.level(level).map_or(0, |grid| grid.height)
    }

    /// Stored tile width including both borders.
    pub fn quad_width(&self) -> usize {
        self.geometry.tile_width()
    }

    pub fn quad_height(&self) -> usize {
        self.geometry.tile_height()
    }

    pub fn quad_border_size(&self, level: usize) -> usize {
        if level < self.geometry.level_count() {
            self.geometry.border
        } else {
            0
        }
    }

    pub fn texture_format(&self) -> TextureFormat {
        TextureFormat::decide(self.array.element_type(), self.channel_count(), &self.color_info())
    }

    pub fn texture_desc(&self, selector: ChannelSelector) -> Result<TextureDesc> {
        let format = self.texture_format();
        let (channels, srgb) = match selector {
            ChannelSelector::Packed => {
                if self.channel_count() > 4 {
                    return Err(anyhow!(
                        "cannot pack {} channels into one texture",
                        self.channel_count()
                    ));
                }
                (self.channel_count(), format.any_gamma())
            }
            ChannelSelector::Channel(c) => {
                if c >= self.channel_count() {
                    return Err(anyhow!("channel {} out of range ({} channels)", c, self.channel_count()));
                }
                (1, format.is_gamma(c))
            }
        };
        Ok(TextureDesc {
            width: self.geometry.tile_width(),
            height: self.geometry.tile_height(),
            channels,
            element_type: format.element_type,
            srgb,
        })
    }

    fn tile_store(&mut self) -> &mut TileStore {
        let store = match self.tiles.take() {
            Some(store) => store,
            None => TileStore::new(
                self.geometry.clone(),
                self.texture_format(),
                self.config.conversion,
                self.channel_count(),
                Arc::clone(&self.metrics),
            ),
        };
        self.tiles.insert(store)
    }

    /// Computed buffer of one tile, computing any dirty tiles first.
    pub fn tile(&mut self, coord: QuadCoord) -> Result<&ArrayData> {
        let array = Arc::clone(&self.array);
        let store = self.tile_store();
        store.ensure_computed(&array);
        store
            .tile(coord)
            .ok_or_else(|| anyhow!("quad {:?} outside the pyramid", coord))
    }

    /// Number of tiles awaiting recomputation; every tile counts before first access.
    pub fn dirty_tile_count(&self) -> usize {
        match &self.tiles {
            Some(store) => store.dirty_count(),
            None => self.geometry.levels.iter().map(|g| g.tile_count()).sum(),
        }
    }

    /// Bring the tile up to date and upload the selected channels into `handle`.
    pub fn upload_quad_to_texture<B: TextureBackend>(
        &mut self,
        backend: &mut B,
        handle: &B::Handle,
        coord: QuadCoord,
        selector: ChannelSelector,
    ) -> Result<()> {
        let desc = self.texture_desc(selector)?;
        let channels = self.channel_count();
        let metrics = Arc::clone(&self.metrics);
        let tile = self.tile(coord)?;
        let data = match selector {
            ChannelSelector::Packed => Cow::Borrowed(tile),
            ChannelSelector::Channel(c) => Cow::Owned(tile.channel_plane(channels, c)),
        };
        backend.upload(
            handle,
            &TileUpload {
                coord,
                selector,
                desc,
                data,
            },
        )?;
        metrics.record_upload();
        Ok(())
    }

    /// Returns `false` when cached textures may be stale and must all be rebuilt.
    ///
    /// With `force_refresh` the level-0 tiles under each relevant quad are
    /// invalidated first, so the pass re-reads their source pixels and rebuilds
    /// every ancestor.
    pub fn prepare_quads_for_rendering(&mut self, relevant: &[QuadCoord], force_refresh: bool) -> bool {
        let store = self.tile_store();
        if force_refresh {
            let sources: Vec<QuadCoord> = relevant
                .iter()
                .flat_map(|&coord| store.geometry().level0_descendants(coord))
                .collect();
            for coord in sources {
                store.mark_dirty(coord);
            }
        }
        let changed = store.take_changed();
        if changed {
            debug!("tile store changed, render cache invalid");
        }
        !changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::array::TAG_INTERPRETATION;

    fn rgb_u8() -> Array {
        // 2x1: black and white pixels
        Array::new(2, 1, 3, vec![0u8, 0, 0, 255, 255, 255])
            .unwrap()
            .with_interpretations(&["RED", "GREEN", "BLUE"])
            .unwrap()
    }

    #[test]
    fn test_memo_states() {
        let memo: Memo<u32> = Memo::new();
        assert_eq!(memo.state(), SlotState::Uncomputed);
        assert_eq!(memo.get_or_compute(|| 7), 7);
        assert_eq!(memo.state(), SlotState::Ready);
        assert_eq!(memo.get_or_compute(|| 9), 7);
        memo.clear();
        assert_eq!(memo.state(), SlotState::Uncomputed);
        assert_eq!(memo.get_or_compute(|| 9), 9);
    }

    #[test]
    fn test_memo_computing_only_while_computing() {
        let memo: Memo<u32> = Memo::new();
        let seen = memo.get_or_compute(|| {
            assert_eq!(memo.state(), SlotState::Computing);
            3
        });
        assert_eq!(seen, 3);

        // A holder of the lock that is only reading does not look like a computation
        let guard = memo.slot.lock();
        assert_eq!(memo.state(), SlotState::Ready);
        drop(guard);
    }

    #[test]
    fn test_color_statistic_ready_without_color_space() {
        let frame = Frame::new(Array::new(2, 2, 1, vec![1.0f32; 4]).unwrap(), TilingConfig::default());
        assert_eq!(frame.statistic_state(ChannelRef::Color), SlotState::Uncomputed);
        let stat = frame.statistic(ChannelRef::Color);
        assert!(stat.mean.is_nan());
        assert_eq!(frame.statistic_state(ChannelRef::Color), SlotState::Ready);
    }

    #[test]
    fn test_color_accessors() {
        let frame = Frame::new(rgb_u8(), TilingConfig::default());
        assert_eq!(frame.color_space(), ColorSpace::LinearRgb);
        assert_eq!(frame.color_channel_index(2), Some(2));
        assert_eq!(frame.color_channel_index(3), None);
        assert_eq!(frame.alpha_channel_index(), None);
        assert_eq!(frame.default_channel(), ChannelRef::Color);
        assert!((frame.value(1, 0, ChannelRef::Color) - 100.0).abs() < 1e-9);
        assert_eq!(frame.value(0, 0, ChannelRef::Color), 0.0);
        assert!(frame.value(2, 0, ChannelRef::Color).is_nan());
        assert_eq!(frame.value(1, 0, ChannelRef::Channel(1)), 255.0);
    }

    #[test]
    fn test_integer_range_uses_type_or_tags() {
        let array = Array::new(2, 1, 1, vec![10u16, 20])
            .unwrap()
            .with_tag(0, TAG_MAXVAL, "4095")
            .unwrap();
        let frame = Frame::new(array, TilingConfig::default());
        assert_eq!(frame.min_val(ChannelRef::Channel(0)), 0.0);
        assert_eq!(frame.max_val(ChannelRef::Channel(0)), 4095.0);
        assert_eq!(frame.vis_min_val(ChannelRef::Channel(0)), 10.0);
        assert_eq!(frame.vis_max_val(ChannelRef::Channel(0)), 20.0);
    }

    #[test]
    fn test_float_range_uses_statistic() {
        let frame = Frame::new(Array::new(3, 1, 1, vec![-2.0f32, 0.5, 8.0]).unwrap(), TilingConfig::default());
        assert_eq!(frame.min_val(ChannelRef::Channel(0)), -2.0);
        assert_eq!(frame.max_val(ChannelRef::Channel(0)), 8.0);
    }

    #[test]
    fn test_gamma_integer_visible_range_is_fixed() {
        let array = Array::new(1, 1, 3, vec![10u16, 20, 30])
            .unwrap()
            .with_interpretations(&["SRGB/R", "SRGB/G", "SRGB/B"])
            .unwrap();
        let frame = Frame::new(array, TilingConfig::default());
        assert_eq!(frame.visible_range(ChannelRef::Color), (0.0, 100.0));
        assert_eq!(frame.max_val(ChannelRef::Color), 65535.0);
    }

    #[test]
    fn test_linear_color_visible_range_is_channel_envelope() {
        let array = Array::new(2, 1, 3, vec![10u8, 20, 30, 40, 50, 60])
            .unwrap()
            .with_interpretations(&["RED", "GREEN", "BLUE"])
            .unwrap();
        let frame = Frame::new(array, TilingConfig::default());
        assert_eq!(frame.visible_range(ChannelRef::Color), (10.0, 60.0));
    }

    #[test]
    fn test_y_visible_range_follows_luminance_channel() {
        let array = Array::new(2, 1, 2, vec![0.0f32, 5.0, 0.0, 25.0])
            .unwrap()
            .with_tag(1, TAG_INTERPRETATION, "XYZ/Y")
            .unwrap();
        let frame = Frame::new(array, TilingConfig::default());
        assert_eq!(frame.color_space(), ColorSpace::Y);
        assert_eq!(frame.visible_range(ChannelRef::Color), (5.0, 25.0));
    }

    #[test]
    fn test_visible_override() {
        let mut frame = Frame::new(rgb_u8(), TilingConfig::default());
        frame.set_visible_range(ChannelRef::Channel(0), 5.0, 6.0).unwrap();
        assert_eq!(frame.visible_range(ChannelRef::Channel(0)), (5.0, 6.0));
        assert!(frame.set_visible_range(ChannelRef::Channel(9), 0.0, 1.0).is_err());
        assert!(frame.set_visible_range(ChannelRef::Color, 2.0, 1.0).is_err());
        frame.clear_visible_range(ChannelRef::Channel(0));
        assert_eq!(frame.visible_range(ChannelRef::Channel(0)), (0.0, 255.0));
    }

    #[test]
    fn test_quad_accessors_single_tile() {
        let frame = Frame::new(rgb_u8(), TilingConfig::default());
        assert_eq!(frame.quad_tree_levels(), 1);
        assert_eq!(frame.quad_tree_level_width(0), 1);
        assert_eq!(frame.quad_tree_level_width(1), 0);
        assert_eq!(frame.quad_width(), 2);
        assert_eq!(frame.quad_height(), 1);
        assert_eq!(frame.quad_border_size(0), 0);
    }

    #[test]
    fn test_refresh_rejects_new_shape() {
        let mut frame = Frame::new(rgb_u8(), TilingConfig::default());
        let other = Array::new(1, 1, 3, vec![0u8; 3]).unwrap();
        assert!(frame.refresh(other, None).is_err());
    }

    #[test]
    fn test_refresh_clears_statistics() {
        let mut frame = Frame::new(Array::new(2, 1, 1, vec![1.0f32, 2.0]).unwrap(), TilingConfig::default());
        assert_eq!(frame.statistic(ChannelRef::Channel(0)).max, 2.0);
        frame
            .refresh(Array::new(2, 1, 1, vec![1.0f32, 9.0]).unwrap(), None)
            .unwrap();
        assert_eq!(frame.statistic_state(ChannelRef::Channel(0)), SlotState::Uncomputed);
        assert_eq!(frame.statistic(ChannelRef::Channel(0)).max, 9.0);
    }

    #[test]
    fn test_reset_reinitialises_everything() {
        let mut frame = Frame::new(rgb_u8(), TilingConfig::default());
        frame.statistic(ChannelRef::Color);
        frame.set_visible_range(ChannelRef::Channel(0), 1.0, 2.0).unwrap();
        frame.tile(QuadCoord::new(0, 0, 0)).unwrap();

        frame.reset(Array::new(4, 4, 1, vec![3i16; 16]).unwrap());
        assert_eq!(frame.channel_count(), 1);
        assert_eq!(frame.color_space(), ColorSpace::None);
        assert_eq!(frame.statistic_state(ChannelRef::Color), SlotState::Uncomputed);
        assert_eq!(frame.visible_range(ChannelRef::Channel(0)), (3.0, 3.0));
        assert_eq!(frame.dirty_tile_count(), 1);
        assert_eq!(frame.quad_width(), 4);
        assert_eq!(frame.metrics().snapshot().tiles_extracted, 0);
    }
}
