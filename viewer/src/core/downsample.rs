//! 2x2 box reduction building one pyramid tile from its four children.

use crate::core::array::{ArrayData, ElementType, Sample};
use crate::core::color::{linear_to_srgb, srgb_to_linear};
use crate::with_element_type;

/// For each destination core column (or row), the two (child, local offset)
/// pairs it averages.
///
/// Destination core pixel `c` reads mosaic core pixels `2c` and `2c + 1`.
fn sample_map(core: usize, border: usize) -> Vec<(usize, usize)> {
    let mut map = Vec::with_capacity(core * 2);
    for s in 0..2 * core {
        map.push((s / core, s % core + border));
    }
    map
}

/// Build the core of a parent tile from up to four children (top-left,
/// top-right, bottom-left, bottom-right), all shaped like the output.
///
/// Absent children count as zero and every output pixel divides by four.
/// Channels flagged in `gamma` are averaged in linear light. The border ring
/// is left zeroed; [`stitch_border`] fills it once the whole level is built.
pub fn downsample_tile<T: Sample>(
    children: [Option<&[T]>; 4],
    tile_w: usize,
    tile_h: usize,
    border: usize,
    channels: usize,
    gamma: &[bool],
) -> Vec<T> {
    let mut out = vec![T::default(); tile_w * tile_h * channels];
    if tile_w <= 2 * border || tile_h <= 2 * border {
        return out;
    }
    let (core_w, core_h) = (tile_w - 2 * border, tile_h - 2 * border);
    let x_map = sample_map(core_w, border);
    let y_map = sample_map(core_h, border);
    let scale = if T::TYPE.is_float() { 1.0 } else { T::TYPE.max_value() };

    for cy in 0..core_h {
        for cx in 0..core_w {
            let dst = ((cy + border) * tile_w + cx + border) * channels;
            for ch in 0..channels {
                let is_gamma = gamma.get(ch).copied().unwrap_or(false);
                let mut acc = 0.0;
                for &(ky, ly) in &y_map[cy * 2..cy * 2 + 2] {
                    for &(kx, lx) in &x_map[cx * 2..cx * 2 + 2] {
                        let Some(child) = children[ky * 2 + kx] else {
                            continue;
                        };
                        let v = child[(ly * tile_w + lx) * channels + ch];
                        acc += if is_gamma {
                            srgb_to_linear(v.normalized())
                        } else {
                            v.to_f64()
                        };
                    }
                }
                let mean = acc / 4.0;
                out[dst + ch] = if is_gamma {
                    T::from_f64(linear_to_srgb(mean) * scale)
                } else {
                    T::from_f64(mean)
                };
            }
        }
    }
    out
}

/// Copy of tile `(tx, ty)` with its border ring rebuilt from the core pixels
/// of the surrounding tiles on the same level.
///
/// `tiles` holds the level row-major, `grid_w` tiles per row. Positions past
/// the level's outer edge clamp to the nearest core pixel. Missing neighbours
/// leave the border pixel unchanged.
pub fn stitch_border<T: Sample>(
    tiles: &[Option<&[T]>],
    grid_w: usize,
    tx: usize,
    ty: usize,
    core_w: usize,
    core_h: usize,
    border: usize,
    channels: usize,
) -> Vec<T> {
    let grid_h = tiles.len() / grid_w.max(1);
    let Some(own) = tiles.get(ty * grid_w + tx).copied().flatten() else {
        return Vec::new();
    };
    let mut out = own.to_vec();
    if border == 0 || grid_w == 0 {
        return out;
    }
    let tile_w = core_w + 2 * border;
    let tile_h = core_h + 2 * border;
    let span_w = (grid_w * core_w) as isize;
    let span_h = (grid_h * core_h) as isize;
    let b = border as isize;

    for dy in 0..tile_h {
        let on_row_edge = dy < border || dy >= tile_h - border;
        let gy = (ty as isize * core_h as isize + dy as isize - b).clamp(0, span_h - 1) as usize;
        for dx in 0..tile_w {
            if !on_row_edge && dx >= border && dx < tile_w - border {
                continue;
            }
            let gx = (tx as isize * core_w as isize + dx as isize - b).clamp(0, span_w - 1) as usize;
            let Some(src) = tiles[(gy / core_h) * grid_w + gx / core_w] else {
                continue;
            };
            let from = ((gy % core_h + border) * tile_w + gx % core_w + border) * channels;
            let to = (dy * tile_w + dx) * channels;
            out[to..to + channels].copy_from_slice(&src[from..from + channels]);
        }
    }
    out
}

/// [`downsample_tile`] over type-erased tile buffers of `element_type`.
pub fn downsample_children(
    element_type: ElementType,
    children: [Option<&ArrayData>; 4],
    tile_w: usize,
    tile_h: usize,
    border: usize,
    channels: usize,
    gamma: &[bool],
) -> ArrayData {
    with_element_type!(element_type, T => {
        let typed: [Option<&[T]>; 4] = children.map(|child| child.and_then(T::slice_of));
        T::into_data(downsample_tile(typed, tile_w, tile_h, border, channels, gamma))
    })
}

/// [`stitch_border`] over the type-erased tiles of one level.
pub fn stitch_level_border(
    element_type: ElementType,
    tiles: &[Option<&ArrayData>],
    grid_w: usize,
    tx: usize,
    ty: usize,
    core_w: usize,
    core_h: usize,
    border: usize,
    channels: usize,
) -> ArrayData {
    with_element_type!(element_type, T => {
        let typed: Vec<Option<&[T]>> = tiles.iter().map(|tile| tile.and_then(T::slice_of)).collect();
        T::into_data(stitch_border(&typed, grid_w, tx, ty, core_w, core_h, border, channels))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_map_reads_child_cores() {
        // core 2, border 1 -> tile 4 wide
        let map = sample_map(2, 1);
        // c=0 -> s=0,1 -> child 0 local 1,2
        assert_eq!(&map[0..2], &[(0, 1), (0, 2)]);
        // c=1 -> s=2,3 -> child 1 local 1,2
        assert_eq!(&map[2..4], &[(1, 1), (1, 2)]);
    }

    #[test]
    fn test_constant_children_keep_constant_core() {
        let tile = vec![77u8; 4 * 4 * 2];
        let children = [Some(tile.as_slice()); 4];
        let out = downsample_tile(children, 4, 4, 1, 2, &[false, false]);
        for y in 1..3 {
            for x in 1..3 {
                assert_eq!(&out[(y * 4 + x) * 2..(y * 4 + x) * 2 + 2], &[77, 77]);
            }
        }
        // Border waits for stitching
        assert_eq!(out[0], 0);

        let tile = vec![0.3f32; 6 * 6];
        let out = downsample_tile([Some(tile.as_slice()); 4], 6, 6, 1, 1, &[false]);
        assert_eq!(out[7], 0.3);
    }

    #[test]
    fn test_child_borders_are_ignored() {
        // core 1, border 1: only the centre of each 3x3 child counts
        let mut tl = vec![255u8; 9];
        tl[4] = 40;
        let children = [Some(tl.as_slice()); 4];
        let out = downsample_tile(children, 3, 3, 1, 1, &[false]);
        assert_eq!(out[4], 40);
    }

    #[test]
    fn test_stitch_takes_neighbour_core() {
        // 1x2 level, core 2, border 1: tiles are 4x4
        let tile = |base: f32| -> Vec<f32> {
            let mut t = vec![-1.0f32; 16];
            for y in 1..3 {
                for x in 1..3 {
                    t[y * 4 + x] = base + (x - 1) as f32 + 10.0 * (y - 1) as f32;
                }
            }
            t
        };
        let left = tile(0.0);
        let right = tile(100.0);
        let tiles = [Some(left.as_slice()), Some(right.as_slice())];

        let stitched = stitch_border(&tiles, 2, 0, 0, 2, 2, 1, 1);
        // Right border of the left tile is the right tile's first core column
        assert_eq!(stitched[4 + 3], 100.0);
        assert_eq!(stitched[8 + 3], 110.0);
        // Left border past the level edge clamps to its own first core column
        assert_eq!(stitched[4], 0.0);
        // Top row clamps to the first core row, corners included
        assert_eq!(&stitched[0..4], &[0.0, 0.0, 1.0, 100.0]);
        assert_eq!(&stitched[12..16], &[10.0, 10.0, 11.0, 110.0]);
        // Core is untouched
        assert_eq!(stitched[5], 0.0);

        let stitched = stitch_border(&tiles, 2, 1, 0, 2, 2, 1, 1);
        assert_eq!(stitched[4], 1.0);
        assert_eq!(stitched[4 + 3], 101.0);
    }

    #[test]
    fn test_stitch_without_border_is_copy() {
        let only = vec![5u16, 6, 7, 8];
        let out = stitch_border(&[Some(only.as_slice())], 1, 0, 0, 2, 2, 0, 1);
        assert_eq!(out, only);
    }

    #[test]
    fn test_absent_children_pad_with_zero() {
        // core 2, no border; only the top-left child exists
        let tl = vec![100u8; 4];
        let out = downsample_tile([Some(tl.as_slice()), None, None, None], 2, 2, 0, 1, &[false]);
        assert_eq!(out, vec![100, 0, 0, 0]);
    }

    #[test]
    fn test_half_covered_block_averages_against_zero() {
        // 1x1 tiles: left column present, right column absent
        let bright = vec![200u16];
        let out = downsample_tile([Some(bright.as_slice()), None, Some(bright.as_slice()), None], 1, 1, 0, 1, &[false]);
        assert_eq!(out, vec![100]);
    }

    #[test]
    fn test_gamma_average_in_linear_light() {
        let white = vec![255u8];
        let black = vec![0u8];
        let children = [Some(white.as_slice()), Some(black.as_slice()), Some(white.as_slice()), Some(black.as_slice())];

        // Linear light 0.5 encodes to sRGB ~0.7354 -> 187.5 -> 188
        assert_eq!(downsample_tile(children, 1, 1, 0, 1, &[true]), vec![188]);
        // Plain average rounds 127.5 up
        assert_eq!(downsample_tile(children, 1, 1, 0, 1, &[false]), vec![128]);
    }

    #[test]
    fn test_gamma_float_channel() {
        let one = vec![1.0f32];
        let zero = vec![0.0f32];
        let children = [Some(one.as_slice()), Some(zero.as_slice()), Some(one.as_slice()), Some(zero.as_slice())];
        let out = downsample_tile(children, 1, 1, 0, 1, &[true]);
        assert!((out[0] - 0.735357).abs() < 1e-4, "{}", out[0]);
    }

    #[test]
    fn test_type_erased_dispatch() {
        let tile = ArrayData::from(vec![9i16; 4]);
        let out = downsample_children(ElementType::I16, [Some(&tile); 4], 2, 2, 0, 1, &[false]);
        assert_eq!(out, ArrayData::I16(vec![9; 4]));
    }
}
