/// Knee of the sRGB decoding curve (encoded domain).
const SRGB_DECODE_KNEE: f64 = 0.04045;
/// Knee of the sRGB encoding curve (linear domain).
const SRGB_ENCODE_KNEE: f64 = 0.0031308;

/// CIELAB epsilon, (6/29)^3.
const LAB_EPSILON: f64 = (6.0 / 29.0) * (6.0 / 29.0) * (6.0 / 29.0);
/// CIELAB kappa, (29/3)^3.
const LAB_KAPPA: f64 = (29.0 / 3.0) * (29.0 / 3.0) * (29.0 / 3.0);

/// Inverse sRGB transfer: gamma-encoded [0,1] to linear light.
#[inline]
pub fn srgb_to_linear(v: f64) -> f64 {
    if v <= SRGB_DECODE_KNEE {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// Forward sRGB transfer: linear light to gamma-encoded [0,1].
#[inline]
pub fn linear_to_srgb(v: f64) -> f64 {
    if v <= SRGB_ENCODE_KNEE {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

/// CIE luminance Y in [0,100] of a linear Rec.709 RGB triple in [0,1].
#[inline]
pub fn luminance(r: f64, g: f64, b: f64) -> f64 {
    100.0 * (0.2126 * r + 0.7152 * g + 0.0722 * b)
}

/// CIE L* lightness from luminance Y in [0,100].
#[inline]
pub fn lightness_from_luminance(y: f64) -> f64 {
    let ratio = y / 100.0;
    if ratio <= LAB_EPSILON {
        LAB_KAPPA * ratio
    } else {
        116.0 * ratio.cbrt() - 16.0
    }
}

/// L* of a linear RGB triple in [0,1].
#[inline]
pub fn lightness_from_linear_rgb(r: f64, g: f64, b: f64) -> f64 {
    lightness_from_luminance(luminance(r, g, b))
}

/// L* of a gamma-encoded sRGB triple in [0,1].
#[inline]
pub fn lightness_from_srgb(r: f64, g: f64, b: f64) -> f64 {
    lightness_from_linear_rgb(srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b))
}
