use crate::core::array::Sample;

/// Tile identity inside the quadtree: level 0 is full resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuadCoord {
    pub level: usize,
    pub x: usize,
    pub y: usize,
}

impl QuadCoord {
    pub fn new(level: usize, x: usize, y: usize) -> Self {
        Self { level, x, y }
    }

    /// Tile one level up that is built from this one.
    pub fn parent(&self) -> QuadCoord {
        QuadCoord::new(self.level + 1, self.x / 2, self.y / 2)
    }
}

/// Tile grid of one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelGrid {
    pub width: usize,
    pub height: usize,
}

impl LevelGrid {
    pub fn tile_count(&self) -> usize {
        self.width * self.height
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    fn halved(&self) -> LevelGrid {
        LevelGrid {
            width: self.width.div_ceil(2),
            height: self.height.div_ceil(2),
        }
    }
}

/// Axis-aligned rectangle in level-0 pixel coordinates, `x1`/`y1` exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl PixelRect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn is_empty(&self) -> bool {
        !(self.x1 > self.x0 && self.y1 > self.y0)
    }
}

/// Quadtree layout of an array: tile size, border and the grid of every level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub image_width: usize,
    pub image_height: usize,
    /// Pixels a tile advances by; the stored tile adds `border` on each side.
    pub core_width: usize,
    pub core_height: usize,
    pub border: usize,
    pub levels: Vec<LevelGrid>,
}

impl Geometry {
    /// Lay out the pyramid. Arrays that fit in one texture of `max_texture_size`
    /// get a single borderless tile; anything larger is cut into `tile_core`
    /// tiles with `border` replicated pixels on each side.
    pub fn new(
        image_width: usize,
        image_height: usize,
        max_texture_size: usize,
        tile_core: usize,
        border: usize,
    ) -> Self {
        if image_width <= max_texture_size && image_height <= max_texture_size {
            return Self {
                image_width,
                image_height,
                core_width: image_width,
                core_height: image_height,
                border: 0,
                levels: vec![LevelGrid { width: 1, height: 1 }],
            };
        }

        let core = tile_core.max(1);
        let mut grid = LevelGrid {
            width: image_width.div_ceil(core).max(1),
            height: image_height.div_ceil(core).max(1),
        };
        let mut levels = vec![grid];
        while grid.width > 1 || grid.height > 1 {
            grid = grid.halved();
            levels.push(grid);
        }

        Self {
            image_width,
            image_height,
            core_width: core,
            core_height: core,
            border,
            levels,
        }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, level: usize) -> Option<LevelGrid> {
        self.levels.get(level).copied()
    }

    pub fn is_single_tile(&self) -> bool {
        self.levels.len() == 1 && self.border == 0
    }

    /// Stored tile width including both borders.
    pub fn tile_width(&self) -> usize {
        self.core_width + 2 * self.border
    }

    pub fn tile_height(&self) -> usize {
        self.core_height + 2 * self.border
    }

    /// Sample count of one stored tile.
    pub fn tile_len(&self, channels: usize) -> usize {
        self.tile_width() * self.tile_height() * channels
    }

    pub fn contains(&self, coord: QuadCoord) -> bool {
        self.level(coord.level)
            .is_some_and(|grid| grid.contains(coord.x, coord.y))
    }

    pub fn parent(&self, coord: QuadCoord) -> Option<QuadCoord> {
        let parent = coord.parent();
        self.contains(parent).then_some(parent)
    }

    /// Children in top-left, top-right, bottom-left, bottom-right order; absent at grid edges.
    pub fn children(&self, coord: QuadCoord) -> [Option<QuadCoord>; 4] {
        let mut out = [None; 4];
        if coord.level == 0 {
            return out;
        }
        for (idx, slot) in out.iter_mut().enumerate() {
            let child = QuadCoord::new(coord.level - 1, coord.x * 2 + idx % 2, coord.y * 2 + idx / 2);
            if self.contains(child) {
                *slot = Some(child);
            }
        }
        out
    }

    /// Level-0 tiles whose pixels feed `coord`, clipped to the level-0 grid.
    pub fn level0_descendants(&self, coord: QuadCoord) -> Vec<QuadCoord> {
        if !self.contains(coord) {
            return Vec::new();
        }
        let grid = self.levels[0];
        let span = 1usize << coord.level;
        let xs = coord.x * span..((coord.x + 1) * span).min(grid.width);
        let ys = coord.y * span..((coord.y + 1) * span).min(grid.height);
        ys.flat_map(|y| xs.clone().map(move |x| QuadCoord::new(0, x, y)))
            .collect()
    }

    /// Level-0 pixels spanned by one tile core at `level`.
    pub fn level_span(&self, level: usize) -> (f64, f64) {
        let scale = (1u64 << level.min(62)) as f64;
        (self.core_width as f64 * scale, self.core_height as f64 * scale)
    }

    /// Coarsest level whose texels are still no larger than one screen pixel.
    ///
    /// `screen_per_image` is the number of screen pixels per level-0 pixel.
    pub fn level_for_scale(&self, screen_per_image: f64) -> usize {
        if screen_per_image.is_nan() || screen_per_image <= 0.0 || screen_per_image >= 1.0 {
            return 0;
        }
        let level = (1.0 / screen_per_image).log2().floor() as usize;
        level.min(self.level_count() - 1)
    }

    /// Tiles at `level` whose core intersects `rect`, row-major.
    pub fn quads_in_rect(&self, level: usize, rect: PixelRect) -> Vec<QuadCoord> {
        let Some(grid) = self.level(level) else {
            return Vec::new();
        };
        if rect.is_empty() || self.core_width == 0 || self.core_height == 0 {
            return Vec::new();
        }
        let (span_w, span_h) = self.level_span(level);
        let range = |lo: f64, hi: f64, span: f64, count: usize| {
            let first = (lo / span).floor().max(0.0) as usize;
            let last = ((hi / span).ceil().max(0.0) as usize).min(count);
            first.min(count)..last
        };
        let xs = range(rect.x0, rect.x1, span_w, grid.width);
        let ys = range(rect.y0, rect.y1, span_h, grid.height);

        let mut quads = Vec::with_capacity(xs.len() * ys.len());
        for y in ys {
            for x in xs.clone() {
                quads.push(QuadCoord::new(level, x, y));
            }
        }
        quads
    }

    /// Level-0 tiles whose bordered window touches `rect`.
    pub fn level0_tiles_touching(&self, rect: PixelRect) -> Vec<QuadCoord> {
        let b = self.border as f64;
        self.quads_in_rect(0, PixelRect::new(rect.x0 - b, rect.y0 - b, rect.x1 + b, rect.y1 + b))
    }
}

/// Copy a `tile_w` x `tile_h` window starting at (`x0`, `y0`) out of an interleaved
/// plane. Coordinates outside the plane are clamped to the nearest edge pixel.
pub fn extract_tile<T: Sample>(
    plane: &[T],
    plane_w: usize,
    plane_h: usize,
    channels: usize,
    x0: isize,
    y0: isize,
    tile_w: usize,
    tile_h: usize,
) -> Vec<T> {
    let mut out = vec![T::default(); tile_w * tile_h * channels];
    if plane_w == 0 || plane_h == 0 {
        return out;
    }
    let clamp = |v: isize, len: usize| v.clamp(0, len as isize - 1) as usize;
    let columns: Vec<usize> = (0..tile_w).map(|x| clamp(x0 + x as isize, plane_w)).collect();
    let row_stride = plane_w * channels;
    let tile_stride = tile_w * channels;

    let inside = x0 >= 0 && (x0 as usize + tile_w) <= plane_w;

    for (y, out_row) in out.chunks_exact_mut(tile_stride.max(1)).take(tile_h).enumerate() {
        let py = clamp(y0 + y as isize, plane_h);
        let src_row = &plane[py * row_stride..(py + 1) * row_stride];
        if inside {
            let start = x0 as usize * channels;
            out_row.copy_from_slice(&src_row[start..start + tile_stride]);
            continue;
        }
        for (x, &px) in columns.iter().enumerate() {
            let dst = x * channels;
            let src = px * channels;
            out_row[dst..dst + channels].copy_from_slice(&src_row[src..src + channels]);
        }
    }
    out
}
