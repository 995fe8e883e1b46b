use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;

use quadview::core::array::Sample;
use quadview::{
    channel_selectors, Array, ArrayData, ChannelRef, ElementType, Frame, PixelRect, RenderCache, TextureBackend,
    TextureDesc, TileUpload, TilingConfig,
};
use quadview::with_element_type;

#[derive(Parser, Debug)]
#[command(name = "quadview-bench", about = "Tile, analyse and render-cache a synthetic array")]
struct Args {
    #[arg(long, default_value_t = 6000)]
    width: usize,
    #[arg(long, default_value_t = 4000)]
    height: usize,
    #[arg(long, default_value_t = 3)]
    channels: usize,
    #[arg(long, default_value_t = ElementType::U16)]
    element: ElementType,
    /// INTERPRETATION tag per channel, e.g. RED,GREEN,BLUE
    #[arg(long, value_delimiter = ',')]
    interpretation: Vec<String>,
    #[arg(long, default_value_t = 8)]
    passes: usize,
    /// Screen width the whole array is fitted into
    #[arg(long, default_value_t = 1920)]
    viewport_width: usize,
    /// Invalidate the visible quads every N passes (watch mode)
    #[arg(long)]
    refresh_every: Option<usize>,
    #[command(flatten)]
    tiling: TilingConfig,
    /// Write the JSON summary here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Backend that only counts what would reach the GPU.
#[derive(Default)]
struct BenchBackend {
    next: u64,
    live: usize,
    uploaded_bytes: usize,
}

impl TextureBackend for BenchBackend {
    type Handle = u64;

    fn allocate(&mut self, _desc: &TextureDesc) -> Result<u64> {
        self.next += 1;
        self.live += 1;
        Ok(self.next)
    }

    fn upload(&mut self, _handle: &u64, upload: &TileUpload<'_>) -> Result<()> {
        self.uploaded_bytes += upload.data.len() * upload.desc.element_type.size_bytes();
        Ok(())
    }

    fn release(&mut self, _handle: u64) {
        self.live = self.live.saturating_sub(1);
    }
}

/// Smooth per-channel gradient spanning the element type's nominal range.
fn synthesize(width: usize, height: usize, channels: usize, element: ElementType) -> ArrayData {
    with_element_type!(element, T => {
        let span = element.max_value() - element.min_value().max(0.0);
        let mut data = Vec::with_capacity(width * height * channels);
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels {
                    let t = match c % 3 {
                        0 => x as f64 / width.max(1) as f64,
                        1 => y as f64 / height.max(1) as f64,
                        _ => ((x + y) % 256) as f64 / 255.0,
                    };
                    data.push(T::from_f64(t * span));
                }
            }
        }
        T::into_data(data)
    })
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    args.tiling.validate()?;
    args.tiling.install_thread_pool()?;

    let start = Instant::now();
    let data = synthesize(args.width, args.height, args.channels, args.element);
    let mut array = Array::new(args.width, args.height, args.channels, data)?;
    for (c, name) in args.interpretation.iter().enumerate() {
        array
            .set_tag(c, quadview::core::array::TAG_INTERPRETATION, name)
            .with_context(|| format!("tagging channel {} as {}", c, name))?;
    }
    let synth_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!("synthesized {}x{}x{} {} in {:.1}ms", args.width, args.height, args.channels, args.element, synth_ms);

    let mut frame = Frame::new(array, args.tiling.clone());

    let start = Instant::now();
    let color = frame.color_info();
    let classify_ms = start.elapsed().as_secs_f64() * 1000.0;

    let start = Instant::now();
    let mut channels: Vec<ChannelRef> = (0..frame.channel_count()).map(ChannelRef::Channel).collect();
    channels.push(ChannelRef::Color);
    let statistics: Vec<_> = channels
        .iter()
        .map(|&ch| json!({ "channel": format!("{:?}", ch), "statistic": frame.statistic(ch) }))
        .collect();
    let stats_ms = start.elapsed().as_secs_f64() * 1000.0;

    let start = Instant::now();
    let histograms: Vec<_> = channels
        .iter()
        .map(|&ch| {
            let hist = frame.histogram(ch);
            json!({
                "channel": format!("{:?}", ch),
                "bins": hist.bin_count(),
                "max_bin_val": hist.max_bin_val,
                "range": [hist.range_min, hist.range_max],
            })
        })
        .collect();
    let hist_ms = start.elapsed().as_secs_f64() * 1000.0;

    let display = frame.default_channel();
    let selectors = channel_selectors(&frame, display);
    let scale = args.viewport_width as f64 / args.width.max(1) as f64;
    let level = frame.geometry().level_for_scale(scale);
    let quads = frame
        .geometry()
        .quads_in_rect(level, PixelRect::new(0.0, 0.0, args.width as f64, args.height as f64));
    info!("rendering level {} with {} quads x {} selectors", level, quads.len(), selectors.len());

    let mut backend = BenchBackend::default();
    let mut cache = RenderCache::new();
    let mut passes = Vec::with_capacity(args.passes);
    for pass in 0..args.passes {
        let force = args.refresh_every.is_some_and(|n| n > 0 && pass > 0 && pass % n == 0);
        let start = Instant::now();
        let (draw, stats) = cache.render_pass(&mut frame, &mut backend, &quads, &selectors, force)?;
        passes.push(json!({
            "pass": pass,
            "ms": start.elapsed().as_secs_f64() * 1000.0,
            "draw_items": draw.len(),
            "stats": stats,
        }));
    }
    cache.clear(&mut backend);

    let metrics = frame.metrics().snapshot_and_reset();
    let summary = json!({
        "array": {
            "width": args.width,
            "height": args.height,
            "channels": args.channels,
            "element": args.element,
        },
        "color": color,
        "geometry": {
            "levels": frame.quad_tree_levels(),
            "level0_grid": [frame.quad_tree_level_width(0), frame.quad_tree_level_height(0)],
            "quad": [frame.quad_width(), frame.quad_height()],
            "border": frame.quad_border_size(0),
        },
        "texture_format": frame.texture_format(),
        "timings_ms": {
            "synthesize": synth_ms,
            "classify": classify_ms,
            "statistics": stats_ms,
            "histograms": hist_ms,
            "level_avg": metrics.level_avg_ms(),
            "level_max": metrics.level_max_ms(),
        },
        "statistics": statistics,
        "histograms": histograms,
        "render": {
            "level": level,
            "selectors": selectors,
            "passes": passes,
            "uploaded_bytes": backend.uploaded_bytes,
            "reuse_ratio": metrics.reuse_ratio(),
        },
        "metrics": metrics,
    });

    let text = serde_json::to_string_pretty(&summary)?;
    match &args.output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            info!("summary written to {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
