use anyhow::{anyhow, Result};
use clap::Args;
use tracing::info;

use crate::core::ConversionPolicy;

/// Tiling and worker settings shared by every frame of a viewer session.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TilingConfig {
    /// Largest texture dimension the renderer accepts
    #[arg(long, default_value_t = 8192)]
    pub max_texture_size: usize,
    /// Tile core size in pixels; stored tiles add the border on each side
    #[arg(long, default_value_t = 1022)]
    pub tile_core: usize,
    #[arg(long, default_value_t = 1)]
    pub border: usize,
    /// Element conversion applied when the renderer needs a different type
    #[arg(long, default_value_t = ConversionPolicy::Normalize)]
    pub conversion: ConversionPolicy,
    #[arg(long)]
    pub rayon_threads: Option<usize>,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            max_texture_size: 8192,
            tile_core: 1022,
            border: 1,
            conversion: ConversionPolicy::Normalize,
            rayon_threads: None,
        }
    }
}

impl TilingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tile_core == 0 {
            return Err(anyhow!("tile core must be at least one pixel"));
        }
        if self.tile_core + 2 * self.border > self.max_texture_size {
            return Err(anyhow!(
                "tile of {}+2*{} pixels exceeds max texture size {}",
                self.tile_core,
                self.border,
                self.max_texture_size
            ));
        }
        Ok(())
    }

    /// Size the global rayon pool when a thread count was requested.
    pub fn install_thread_pool(&self) -> Result<()> {
        if let Some(threads) = self.rayon_threads {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .map_err(|e| anyhow!("rayon init failed: {}", e))?;
        }
        info!("rayon pool ready with {} threads", rayon::current_num_threads());
        Ok(())
    }
}
