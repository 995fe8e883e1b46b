use quadview::{Array, ArrayData, ChannelRef, ColorSpace, ElementType, Frame, PixelRect, QuadCoord, SlotState, TilingConfig};

fn config(max_texture_size: usize, tile_core: usize) -> TilingConfig {
    TilingConfig {
        max_texture_size,
        tile_core,
        ..TilingConfig::default()
    }
}

#[test]
fn test_rgb_u8_fits_one_texture() {
    let array = Array::new(4096, 4096, 3, vec![0u8; 4096 * 4096 * 3])
        .unwrap()
        .with_interpretations(&["RED", "GREEN", "BLUE"])
        .unwrap();
    let frame = Frame::new(array, TilingConfig::default());

    assert_eq!(frame.color_space(), ColorSpace::LinearRgb);
    assert_eq!(
        (0..3).map(|i| frame.color_channel_index(i)).collect::<Vec<_>>(),
        vec![Some(0), Some(1), Some(2)]
    );
    assert_eq!(frame.quad_tree_levels(), 1);
    assert_eq!(frame.quad_border_size(0), 0);
    assert_eq!(frame.quad_width(), 4096);
}

#[test]
fn test_untagged_float_is_tiled() {
    let array = Array::new(5000, 3000, 1, vec![0.0f32; 5000 * 3000]).unwrap();
    let frame = Frame::new(array, config(4096, 1022));

    assert_eq!(frame.color_space(), ColorSpace::None);
    assert_eq!(frame.default_channel(), ChannelRef::Channel(0));
    assert_eq!(frame.quad_tree_level_width(0), 5);
    assert_eq!(frame.quad_tree_level_height(0), 3);
    assert!(frame.quad_tree_levels() > 1);
    assert_eq!(frame.quad_width(), 1024);
    assert_eq!(frame.quad_border_size(0), 1);
}

#[test]
fn test_two_level_pyramid() {
    let array = Array::new(2000, 2000, 1, vec![0u8; 2000 * 2000]).unwrap();
    let frame = Frame::new(array, config(1024, 1022));
    assert_eq!(frame.quad_tree_level_width(0), 2);
    assert_eq!(frame.quad_tree_level_height(0), 2);
    assert_eq!(frame.quad_tree_level_width(1), 1);
    assert_eq!(frame.quad_tree_levels(), 2);
}

#[test]
fn test_histogram_independent_of_query_order() {
    let make = || {
        let data: Vec<f32> = (0..64 * 64).map(|i| ((i * 37) % 1000) as f32 / 7.0).collect();
        Frame::new(Array::new(64, 64, 1, data).unwrap(), TilingConfig::default())
    };

    let histogram_first = make();
    assert_eq!(histogram_first.statistic_state(ChannelRef::Channel(0)), SlotState::Uncomputed);
    let a = histogram_first.histogram(ChannelRef::Channel(0));

    let statistic_first = make();
    let stat = statistic_first.statistic(ChannelRef::Channel(0));
    let b = statistic_first.histogram(ChannelRef::Channel(0));

    assert_eq!(a.bins, b.bins);
    assert_eq!(a.range_min, stat.min);
    assert_eq!(a.range_max, stat.max);
    assert_eq!(a.total(), stat.finite_count);
}

#[test]
fn test_color_histogram_uses_lightness_statistic() {
    let data: Vec<u8> = (0..32 * 32).flat_map(|i| [(i % 256) as u8, (i / 4 % 256) as u8, 40]).collect();
    let array = Array::new(32, 32, 3, data)
        .unwrap()
        .with_interpretations(&["SRGB/R", "SRGB/G", "SRGB/B"])
        .unwrap();
    let frame = Frame::new(array, TilingConfig::default());
    let hist = frame.histogram(ChannelRef::Color);
    let stat = frame.statistic(ChannelRef::Color);
    assert_eq!(hist.range_min, stat.min);
    assert_eq!(hist.range_max, stat.max);
    assert_eq!(hist.total(), 32 * 32);
    assert_eq!(hist.bin_count(), 256);
}

#[test]
fn test_constant_array_constant_at_every_level() {
    // core 6, border 1: 24x24 gives a 4x4 grid, then 2x2, then 1x1
    let array = Array::new(24, 24, 2, vec![1234u16; 24 * 24 * 2]).unwrap();
    let mut frame = Frame::new(array, config(8, 6));
    assert_eq!(frame.quad_tree_levels(), 3);

    for level in 0..frame.quad_tree_levels() {
        for y in 0..frame.quad_tree_level_height(level) {
            for x in 0..frame.quad_tree_level_width(level) {
                let tile = frame.tile(QuadCoord::new(level, x, y)).unwrap();
                assert_eq!(tile, &ArrayData::U16(vec![1234; 8 * 8 * 2]), "level {} ({}, {})", level, x, y);
            }
        }
    }
}

#[test]
fn test_single_tile_round_trip() {
    let data: Vec<i16> = (0..37 * 23 * 2).map(|i| (i as i16).wrapping_mul(31)).collect();
    let array = Array::new(37, 23, 2, data.clone()).unwrap();
    let mut frame = Frame::new(array, TilingConfig::default());
    let tile = frame.tile(QuadCoord::new(0, 0, 0)).unwrap();
    assert_eq!(tile, &ArrayData::I16(data));
}

#[test]
fn test_level0_window_matches_source() {
    let (w, h) = (50, 30);
    let data: Vec<f32> = (0..w * h).map(|i| i as f32).collect();
    let array = Array::new(w, h, 1, data).unwrap();
    let mut frame = Frame::new(array, config(16, 14));
    let tile_w = frame.quad_width();

    // Tile (2,1) starts at (2*14-1, 1*14-1) = (27, 13)
    let tile = frame.tile(QuadCoord::new(0, 2, 1)).unwrap().clone();
    for ty in 0..tile_w {
        for tx in 0..tile_w {
            let (sx, sy) = (27 + tx, 13 + ty);
            if sx < w && sy < h {
                assert_eq!(tile.get_f64(ty * tile_w + tx), (sy * w + sx) as f64);
            }
        }
    }
}

#[test]
fn test_watch_refresh_invalidates_region() {
    let array = Array::new(40, 40, 1, vec![10u8; 1600]).unwrap();
    let mut frame = Frame::new(array, config(16, 14));
    let relevant = [QuadCoord::new(0, 0, 0)];

    frame.tile(QuadCoord::new(0, 0, 0)).unwrap();
    assert!(!frame.prepare_quads_for_rendering(&relevant, false));
    assert!(frame.prepare_quads_for_rendering(&relevant, false));
    assert_eq!(frame.dirty_tile_count(), 0);

    let mut data = vec![10u8; 1600];
    data[35 * 40 + 35] = 200;
    frame
        .refresh(Array::new(40, 40, 1, data).unwrap(), Some(PixelRect::new(35.0, 35.0, 36.0, 36.0)))
        .unwrap();

    // Tile (2,2), its parent (1,1) and the root
    assert_eq!(frame.dirty_tile_count(), 3);
    assert!(!frame.prepare_quads_for_rendering(&relevant, false));
    assert_eq!(frame.statistic(ChannelRef::Channel(0)).max, 200.0);

    let tile = frame.tile(QuadCoord::new(0, 2, 2)).unwrap().clone();
    // Source (35,35) sits at local (35 - 27, 35 - 27)
    assert_eq!(tile.get_f64(8 * 16 + 8), 200.0);
    assert_eq!(frame.dirty_tile_count(), 0);
}

#[test]
fn test_non_finite_samples_never_counted() {
    let mut data = vec![1.0f64; 100];
    data[3] = f64::NAN;
    data[50] = f64::INFINITY;
    let frame = Frame::new(Array::new(10, 10, 1, data).unwrap(), TilingConfig::default());
    let stat = frame.statistic(ChannelRef::Channel(0));
    assert_eq!(stat.finite_count, 98);
    assert_eq!(frame.histogram(ChannelRef::Channel(0)).total(), 98);
}

#[test]
fn test_srgb_u16_pyramid_averages_in_linear_light() {
    // Alternating white and black columns; 4x4 tiles at level 0, then 2x2, 1x1
    let data: Vec<u16> = (0..24 * 24).map(|i| if i % 2 == 0 { 65535 } else { 0 }).collect();
    let gamma = Array::new(24, 24, 1, data.clone())
        .unwrap()
        .with_interpretations(&["SRGB/GRAY"])
        .unwrap();
    let mut frame = Frame::new(gamma, config(8, 6));
    assert_eq!(frame.color_space(), ColorSpace::GammaGray);
    assert_eq!(frame.quad_tree_levels(), 3);

    let level0 = frame.tile(QuadCoord::new(0, 1, 1)).unwrap().clone();
    assert_eq!(level0.element_type(), ElementType::U8);
    // Core (0,0) of tile (1,1) is source (6,6), a white column
    assert_eq!(level0.get_f64(9), 255.0);
    assert_eq!(level0.get_f64(10), 0.0);

    let level1 = frame.tile(QuadCoord::new(1, 0, 0)).unwrap().clone();
    assert_eq!(level1.get_f64(9), 188.0);
    // Stitched border carries the neighbour's core value
    assert_eq!(level1.get_f64(8 + 7), 188.0);

    let plain = Array::new(24, 24, 1, data).unwrap();
    let mut frame = Frame::new(plain, config(8, 6));
    let level1 = frame.tile(QuadCoord::new(1, 0, 0)).unwrap().clone();
    assert_eq!(level1.element_type(), ElementType::U16);
    assert_eq!(level1.get_f64(9), 32768.0);
}

#[test]
fn test_force_refresh_rereads_source_tiles() {
    // 3x3 tiles at level 0, then 2x2, 1x1
    let array = Array::new(40, 40, 1, vec![10u8; 1600]).unwrap();
    let mut frame = Frame::new(array, config(16, 14));
    frame.tile(QuadCoord::new(0, 0, 0)).unwrap();
    assert_eq!(frame.metrics().snapshot().tiles_extracted, 9);
    assert!(!frame.prepare_quads_for_rendering(&[], false));

    assert!(!frame.prepare_quads_for_rendering(&[QuadCoord::new(1, 0, 0)], true));
    // Four level-0 tiles, their level-1 parent and the root
    assert_eq!(frame.dirty_tile_count(), 6);

    frame.tile(QuadCoord::new(1, 0, 0)).unwrap();
    assert_eq!(frame.metrics().snapshot().tiles_extracted, 13);
    assert_eq!(frame.dirty_tile_count(), 0);
}
