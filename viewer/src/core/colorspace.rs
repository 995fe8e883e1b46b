//! Colour space classification from channel `INTERPRETATION` tags.

use serde::Serialize;
use tracing::debug;

use crate::core::array::{Array, ElementType, Sample, TAG_INTERPRETATION};
use crate::core::color::{lightness_from_linear_rgb, lightness_from_luminance, srgb_to_linear};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ColorSpace {
    None,
    LinearGray,
    LinearRgb,
    GammaGray,
    GammaRgb,
    Y,
    Xyz,
}

impl ColorSpace {
    pub fn is_gamma(self) -> bool {
        matches!(self, ColorSpace::GammaGray | ColorSpace::GammaRgb)
    }
}

/// Result of classifying an array: which channels form the colour and which is alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColorInfo {
    pub space: ColorSpace,
    /// Red, green, blue (or X, Y, Z) channel indices; grey spaces repeat one index.
    pub color_channels: [usize; 3],
    pub alpha_channel: Option<usize>,
}

impl ColorInfo {
    pub const NONE: ColorInfo = ColorInfo {
        space: ColorSpace::None,
        color_channels: [0, 0, 0],
        alpha_channel: None,
    };

    /// Classify an array from its channel tags. First match wins:
    /// GRAY, RED/GREEN/BLUE, SRGB/GRAY, SRGB/R/G/B, XYZ/X/Y/Z, XYZ/Y.
    pub fn classify(array: &Array) -> Self {
        let find = |names: &[&str]| -> Option<usize> {
            (0..array.channel_count()).find(|&c| {
                array
                    .tag(c, TAG_INTERPRETATION)
                    .is_some_and(|tag| names.contains(&tag))
            })
        };
        let triple = |r: Option<usize>, g: Option<usize>, b: Option<usize>| match (r, g, b) {
            (Some(r), Some(g), Some(b)) => Some([r, g, b]),
            _ => None,
        };

        let alpha = find(&["ALPHA"]);
        let with_alpha = |space, color_channels| ColorInfo {
            space,
            color_channels,
            alpha_channel: alpha,
        };

        let info = if let Some(gray) = find(&["GRAY"]) {
            with_alpha(ColorSpace::LinearGray, [gray; 3])
        } else if let Some(rgb) = triple(find(&["RED"]), find(&["GREEN"]), find(&["BLUE"])) {
            with_alpha(ColorSpace::LinearRgb, rgb)
        } else if let Some(gray) = find(&["SRGB/GRAY"]) {
            with_alpha(ColorSpace::GammaGray, [gray; 3])
        } else if let Some(rgb) = triple(
            find(&["SRGB/R", "SRGB/RED"]),
            find(&["SRGB/G", "SRGB/GREEN"]),
            find(&["SRGB/B", "SRGB/BLUE"]),
        )
        .filter(|_| alpha.map_or(true, |a| a == 3))
        {
            with_alpha(ColorSpace::GammaRgb, rgb)
        } else if let Some(xyz) = triple(find(&["XYZ/X"]), find(&["XYZ/Y"]), find(&["XYZ/Z"])) {
            with_alpha(ColorSpace::Xyz, xyz)
        } else if let Some(y) = find(&["XYZ/Y"]) {
            with_alpha(ColorSpace::Y, [y; 3])
        } else {
            ColorInfo::NONE
        };

        debug!(
            "classified {} channels as {:?} color={:?} alpha={:?}",
            array.channel_count(),
            info.space,
            info.color_channels,
            info.alpha_channel
        );
        info
    }

    pub fn has_color(&self) -> bool {
        self.space != ColorSpace::None
    }

    pub fn is_gamma(&self) -> bool {
        self.space.is_gamma()
    }

    /// Index of the channel carrying luminance for Y/XYZ spaces.
    pub fn luminance_channel(&self) -> usize {
        self.color_channels[1]
    }

    /// Distinct colour channel indices followed by alpha, in order.
    pub fn display_channels(&self) -> Vec<usize> {
        if !self.has_color() {
            return Vec::new();
        }
        let mut channels = Vec::with_capacity(4);
        for c in self.color_channels.iter().copied().chain(self.alpha_channel) {
            if !channels.contains(&c) {
                channels.push(c);
            }
        }
        channels
    }

    /// Perceptual lightness L* of one interleaved pixel; NaN without a colour space.
    #[inline]
    pub fn lightness<T: Sample>(&self, pixel: &[T]) -> f64 {
        let [r, g, b] = self.color_channels;
        match self.space {
            ColorSpace::None => f64::NAN,
            ColorSpace::LinearGray | ColorSpace::LinearRgb => {
                lightness_from_linear_rgb(pixel[r].normalized(), pixel[g].normalized(), pixel[b].normalized())
            }
            ColorSpace::GammaGray | ColorSpace::GammaRgb => lightness_from_linear_rgb(
                srgb_to_linear(pixel[r].normalized()),
                srgb_to_linear(pixel[g].normalized()),
                srgb_to_linear(pixel[b].normalized()),
            ),
            ColorSpace::Y | ColorSpace::Xyz => {
                let sample = pixel[self.luminance_channel()];
                // Integer Y is normalised to [0,1]; float Y is already on the 0..100 scale.
                let y = if T::TYPE.is_float() {
                    sample.to_f64()
                } else {
                    sample.normalized() * 100.0
                };
                lightness_from_luminance(y)
            }
        }
    }
}

/// Element type and per-channel encoding of the buffers handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextureFormat {
    pub element_type: ElementType,
    /// Channels stored gamma encoded; these are linearised while downsampling.
    pub gamma_channels: Vec<bool>,
}

impl TextureFormat {
    /// Gamma colour from integers wider than 8 bits is forced to 8 bits; 32/64-bit
    /// integers and f64 are carried as f32; everything else passes through.
    pub fn decide(source: ElementType, channels: usize, info: &ColorInfo) -> Self {
        let element_type = match source {
            ElementType::I8 | ElementType::U8 => source,
            _ if info.is_gamma() && !source.is_float() => ElementType::U8,
            ElementType::I16 | ElementType::U16 | ElementType::F32 => source,
            _ => ElementType::F32,
        };
        let mut gamma_channels = vec![false; channels];
        if info.is_gamma() {
            for &c in &info.color_channels {
                if let Some(flag) = gamma_channels.get_mut(c) {
                    *flag = true;
                }
            }
        }
        Self {
            element_type,
            gamma_channels,
        }
    }

    pub fn is_gamma(&self, channel: usize) -> bool {
        self.gamma_channels.get(channel).copied().unwrap_or(false)
    }

    pub fn any_gamma(&self) -> bool {
        self.gamma_channels.iter().any(|&g| g)
    }
}
