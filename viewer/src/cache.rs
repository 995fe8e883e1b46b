//! Per-paint cache of uploaded tile textures.
//!
//! Every render pass names the quads and channel selectors it needs. Entries
//! matching a previous pass are reused, missing ones are allocated and
//! uploaded, and anything the pass did not touch is released at the end.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::core::array::{ArrayData, ElementType};
use crate::core::pyramid::QuadCoord;
use crate::frame::{ChannelRef, Frame};

/// Which part of a tile a texture holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ChannelSelector {
    /// All channels interleaved in one texture (at most four).
    Packed,
    /// A single channel unpacked into its own texture.
    Channel(usize),
}

/// Selectors a pass needs to display `display`.
///
/// Frames with four channels or fewer upload one packed texture. Wider
/// frames unpack the displayed channel, or each colour and alpha channel
/// when showing the colour composite.
pub fn channel_selectors(frame: &Frame, display: ChannelRef) -> Vec<ChannelSelector> {
    if frame.channel_count() <= 4 {
        return vec![ChannelSelector::Packed];
    }
    match display {
        ChannelRef::Channel(c) => vec![ChannelSelector::Channel(c)],
        ChannelRef::Color => {
            let channels = frame.color_info().display_channels();
            if channels.is_empty() {
                vec![ChannelSelector::Channel(0)]
            } else {
                channels.into_iter().map(ChannelSelector::Channel).collect()
            }
        }
    }
}

/// Shape and format of one texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextureDesc {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub element_type: ElementType,
    /// Texels are sRGB encoded and should be sampled through an sRGB format.
    pub srgb: bool,
}

impl TextureDesc {
    pub fn byte_len(&self) -> usize {
        self.width * self.height * self.channels * self.element_type.size_bytes()
    }
}

/// Tile pixels handed to the backend, borrowed from the tile store when packed.
#[derive(Debug)]
pub struct TileUpload<'a> {
    pub coord: QuadCoord,
    pub selector: ChannelSelector,
    pub desc: TextureDesc,
    pub data: Cow<'a, ArrayData>,
}

/// GPU collaborator owning the actual texture objects.
pub trait TextureBackend {
    type Handle: Clone + fmt::Debug;

    fn allocate(&mut self, desc: &TextureDesc) -> Result<Self::Handle>;

    fn upload(&mut self, handle: &Self::Handle, upload: &TileUpload<'_>) -> Result<()>;

    fn release(&mut self, handle: Self::Handle);
}

/// One texture to draw this pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem<H> {
    pub coord: QuadCoord,
    pub selector: ChannelSelector,
    pub handle: H,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub reused: usize,
    pub uploaded: usize,
    pub released: usize,
    /// The tile store reported changed data and the cache was dropped first.
    pub invalidated: bool,
}

type CacheKey = (QuadCoord, ChannelSelector);

struct Entry<H> {
    handle: H,
    reused: bool,
}

/// Cache of live textures. Owned by the rendering thread.
pub struct RenderCache<H> {
    entries: HashMap<CacheKey, Entry<H>>,
}

impl<H> Default for RenderCache<H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<H: Clone + fmt::Debug> RenderCache<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, coord: QuadCoord, selector: ChannelSelector) -> bool {
        self.entries.contains_key(&(coord, selector))
    }

    /// Run one render pass over `quads` x `selectors`.
    ///
    /// Returns the draw list in request order. When the frame reports changed
    /// tiles every cached texture is released before anything is looked up.
    pub fn render_pass<B>(
        &mut self,
        frame: &mut Frame,
        backend: &mut B,
        quads: &[QuadCoord],
        selectors: &[ChannelSelector],
        force_refresh: bool,
    ) -> Result<(Vec<DrawItem<H>>, PassStats)>
    where
        B: TextureBackend<Handle = H>,
    {
        let mut stats = PassStats::default();
        if !frame.prepare_quads_for_rendering(quads, force_refresh) {
            stats.released += self.clear(backend);
            stats.invalidated = true;
        }
        for entry in self.entries.values_mut() {
            entry.reused = false;
        }

        let mut draw = Vec::with_capacity(quads.len() * selectors.len());
        for &coord in quads {
            for &selector in selectors {
                if let Some(entry) = self.entries.get_mut(&(coord, selector)) {
                    entry.reused = true;
                    stats.reused += 1;
                    draw.push(DrawItem {
                        coord,
                        selector,
                        handle: entry.handle.clone(),
                    });
                    continue;
                }

                let desc = frame.texture_desc(selector)?;
                let handle = backend.allocate(&desc)?;
                if let Err(e) = frame.upload_quad_to_texture(backend, &handle, coord, selector) {
                    backend.release(handle);
                    return Err(e);
                }
                stats.uploaded += 1;
                self.entries.insert(
                    (coord, selector),
                    Entry {
                        handle: handle.clone(),
                        reused: true,
                    },
                );
                draw.push(DrawItem {
                    coord,
                    selector,
                    handle,
                });
            }
        }

        let stale: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.reused)
            .map(|(key, _)| *key)
            .collect();
        for key in stale {
            if let Some(entry) = self.entries.remove(&key) {
                backend.release(entry.handle);
                stats.released += 1;
            }
        }

        frame
            .metrics()
            .record_pass(stats.reused as u64, stats.released as u64, stats.invalidated);
        debug!(
            "render pass: {} reused, {} uploaded, {} released, invalidated={}",
            stats.reused, stats.uploaded, stats.released, stats.invalidated
        );
        Ok((draw, stats))
    }

    /// Release every cached texture. Returns how many were released.
    pub fn clear<B: TextureBackend<Handle = H>>(&mut self, backend: &mut B) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            backend.release(entry.handle);
        }
        count
    }
}
