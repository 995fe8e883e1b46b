pub mod cache;
pub mod config;
pub mod core;
pub mod frame;
pub mod metrics;
pub mod tiles;

// Re-exports for easy access
pub use crate::cache::{channel_selectors, ChannelSelector, DrawItem, PassStats, RenderCache, TextureBackend, TextureDesc, TileUpload};
pub use crate::config::TilingConfig;
pub use crate::core::array::{Array, ArrayData, ElementType, Sample};
pub use crate::core::colorspace::{ColorInfo, ColorSpace, TextureFormat};
pub use crate::core::histogram::Histogram;
pub use crate::core::pyramid::{Geometry, LevelGrid, PixelRect, QuadCoord};
pub use crate::core::stats::Statistic;
pub use crate::core::ConversionPolicy;
pub use crate::frame::{ChannelRef, Frame, SlotState};
pub use crate::metrics::{MetricsSnapshot, TileMetrics};
pub use crate::tiles::TileStore;
