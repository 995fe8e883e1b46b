//! Source arrays: interleaved 2D buffers of one of ten numeric element types.
//!
//! Numeric routines are written once, generic over [`Sample`], and dispatched
//! on the runtime element type with [`with_samples!`](crate::with_samples) or
//! [`with_element_type!`](crate::with_element_type).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::Serialize;

/// Tag key naming a channel's colour role (`RED`, `SRGB/G`, `ALPHA`, ...).
pub const TAG_INTERPRETATION: &str = "INTERPRETATION";
/// Tag key overriding the nominal minimum of a channel.
pub const TAG_MINVAL: &str = "MINVAL";
/// Tag key overriding the nominal maximum of a channel.
pub const TAG_MAXVAL: &str = "MAXVAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ElementType {
    pub fn is_float(self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64)
    }

    pub fn is_8bit(self) -> bool {
        matches!(self, ElementType::I8 | ElementType::U8)
    }

    pub fn size_bytes(self) -> usize {
        match self {
            ElementType::I8 | ElementType::U8 => 1,
            ElementType::I16 | ElementType::U16 => 2,
            ElementType::I32 | ElementType::U32 | ElementType::F32 => 4,
            ElementType::I64 | ElementType::U64 | ElementType::F64 => 8,
        }
    }

    /// Largest representable value, or 1.0 for float types (normalised data).
    pub fn max_value(self) -> f64 {
        match self {
            ElementType::I8 => i8::MAX as f64,
            ElementType::U8 => u8::MAX as f64,
            ElementType::I16 => i16::MAX as f64,
            ElementType::U16 => u16::MAX as f64,
            ElementType::I32 => i32::MAX as f64,
            ElementType::U32 => u32::MAX as f64,
            ElementType::I64 => i64::MAX as f64,
            ElementType::U64 => u64::MAX as f64,
            ElementType::F32 | ElementType::F64 => 1.0,
        }
    }

    /// Smallest representable value, or 0.0 for float types.
    pub fn min_value(self) -> f64 {
        match self {
            ElementType::I8 => i8::MIN as f64,
            ElementType::I16 => i16::MIN as f64,
            ElementType::I32 => i32::MIN as f64,
            ElementType::I64 => i64::MIN as f64,
            _ => 0.0,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::I8 => "i8",
            ElementType::U8 => "u8",
            ElementType::I16 => "i16",
            ElementType::U16 => "u16",
            ElementType::I32 => "i32",
            ElementType::U32 => "u32",
            ElementType::I64 => "i64",
            ElementType::U64 => "u64",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ElementType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "i8" | "int8" => Ok(ElementType::I8),
            "u8" | "uint8" => Ok(ElementType::U8),
            "i16" | "int16" => Ok(ElementType::I16),
            "u16" | "uint16" => Ok(ElementType::U16),
            "i32" | "int32" => Ok(ElementType::I32),
            "u32" | "uint32" => Ok(ElementType::U32),
            "i64" | "int64" => Ok(ElementType::I64),
            "u64" | "uint64" => Ok(ElementType::U64),
            "f32" | "float32" | "float" => Ok(ElementType::F32),
            "f64" | "float64" | "double" => Ok(ElementType::F64),
            _ => Err(format!("unknown element type '{}'", s)),
        }
    }
}

/// A numeric sample of one of the supported element types.
pub trait Sample: Copy + Default + PartialOrd + fmt::Debug + Send + Sync + 'static {
    const TYPE: ElementType;

    fn to_f64(self) -> f64;

    /// Rounds to nearest and saturates for integer types. NaN maps to zero.
    fn from_f64(v: f64) -> Self;

    fn into_data(data: Vec<Self>) -> ArrayData;

    fn slice_of(data: &ArrayData) -> Option<&[Self]>;

    /// Sample value scaled to [0,1] by the type maximum; floats pass through.
    #[inline]
    fn normalized(self) -> f64 {
        if Self::TYPE.is_float() {
            self.to_f64()
        } else {
            self.to_f64() / Self::TYPE.max_value()
        }
    }
}

macro_rules! impl_sample {
    (int: $($t:ty => $variant:ident),*) => {
        $(
            impl Sample for $t {
                const TYPE: ElementType = ElementType::$variant;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64(v: f64) -> Self {
                    v.round().clamp(<$t>::MIN as f64, <$t>::MAX as f64) as $t
                }

                fn into_data(data: Vec<Self>) -> ArrayData {
                    ArrayData::$variant(data)
                }

                fn slice_of(data: &ArrayData) -> Option<&[Self]> {
                    match data {
                        ArrayData::$variant(buf) => Some(buf.as_slice()),
                        _ => None,
                    }
                }
            }
        )*
    };
    (float: $($t:ty => $variant:ident),*) => {
        $(
            impl Sample for $t {
                const TYPE: ElementType = ElementType::$variant;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64(v: f64) -> Self {
                    v as $t
                }

                fn into_data(data: Vec<Self>) -> ArrayData {
                    ArrayData::$variant(data)
                }

                fn slice_of(data: &ArrayData) -> Option<&[Self]> {
                    match data {
                        ArrayData::$variant(buf) => Some(buf.as_slice()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_sample!(int: i8 => I8, u8 => U8, i16 => I16, u16 => U16, i32 => I32, u32 => U32, i64 => I64, u64 => U64);
impl_sample!(float: f32 => F32, f64 => F64);

/// Typed sample storage, one variant per element type.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Bind the typed buffer inside an [`ArrayData`] and evaluate a generic body once.
///
/// ```ignore
/// let sum = with_samples!(array.data(), buf => buf.iter().map(|v| v.to_f64()).sum::<f64>());
/// ```
#[macro_export]
macro_rules! with_samples {
    ($data:expr, $buf:ident => $body:expr) => {
        match $data {
            $crate::core::array::ArrayData::I8($buf) => $body,
            $crate::core::array::ArrayData::U8($buf) => $body,
            $crate::core::array::ArrayData::I16($buf) => $body,
            $crate::core::array::ArrayData::U16($buf) => $body,
            $crate::core::array::ArrayData::I32($buf) => $body,
            $crate::core::array::ArrayData::U32($buf) => $body,
            $crate::core::array::ArrayData::I64($buf) => $body,
            $crate::core::array::ArrayData::U64($buf) => $body,
            $crate::core::array::ArrayData::F32($buf) => $body,
            $crate::core::array::ArrayData::F64($buf) => $body,
        }
    };
}

/// Alias the Rust type matching a runtime [`ElementType`] and evaluate a body with it.
#[macro_export]
macro_rules! with_element_type {
    ($ty:expr, $t:ident => $body:expr) => {
        match $ty {
            $crate::core::array::ElementType::I8 => {
                type $t = i8;
                $body
            }
            $crate::core::array::ElementType::U8 => {
                type $t = u8;
                $body
            }
            $crate::core::array::ElementType::I16 => {
                type $t = i16;
                $body
            }
            $crate::core::array::ElementType::U16 => {
                type $t = u16;
                $body
            }
            $crate::core::array::ElementType::I32 => {
                type $t = i32;
                $body
            }
            $crate::core::array::ElementType::U32 => {
                type $t = u32;
                $body
            }
            $crate::core::array::ElementType::I64 => {
                type $t = i64;
                $body
            }
            $crate::core::array::ElementType::U64 => {
                type $t = u64;
                $body
            }
            $crate::core::array::ElementType::F32 => {
                type $t = f32;
                $body
            }
            $crate::core::array::ElementType::F64 => {
                type $t = f64;
                $body
            }
        }
    };
}

impl ArrayData {
    /// Zero-filled storage of the given type.
    pub fn zeroed(ty: ElementType, len: usize) -> Self {
        with_element_type!(ty, T => T::into_data(vec![T::default(); len]))
    }

    pub fn element_type(&self) -> ElementType {
        with_samples!(self, buf => sample_type_of(buf.as_slice()))
    }

    pub fn len(&self) -> usize {
        with_samples!(self, buf => buf.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_f64(&self, index: usize) -> f64 {
        with_samples!(self, buf => buf.get(index).map_or(f64::NAN, |v| v.to_f64()))
    }

    /// Copy channel `channel` out of an interleaved buffer with `channels` samples per pixel.
    pub fn channel_plane(&self, channels: usize, channel: usize) -> ArrayData {
        with_samples!(self, buf => plane_of(buf, channels, channel))
    }
}

fn sample_type_of<T: Sample>(_: &[T]) -> ElementType {
    T::TYPE
}

fn plane_of<T: Sample>(data: &[T], channels: usize, channel: usize) -> ArrayData {
    T::into_data(data.iter().skip(channel).step_by(channels.max(1)).copied().collect())
}

macro_rules! impl_from_vec {
    ($($t:ty => $variant:ident),*) => {
        $(
            impl From<Vec<$t>> for ArrayData {
                fn from(data: Vec<$t>) -> Self {
                    ArrayData::$variant(data)
                }
            }
        )*
    };
}

impl_from_vec!(i8 => I8, u8 => U8, i16 => I16, u16 => U16, i32 => I32, u32 => U32, i64 => I64, u64 => U64, f32 => F32, f64 => F64);

/// Immutable per-frame source buffer with per-channel string tags.
///
/// Samples are interleaved: index `(y * width + x) * channels + c`.
#[derive(Debug, Clone)]
pub struct Array {
    width: usize,
    height: usize,
    channels: usize,
    data: ArrayData,
    tags: Vec<HashMap<String, String>>,
}

impl Array {
    pub fn new(width: usize, height: usize, channels: usize, data: impl Into<ArrayData>) -> Result<Self> {
        let data = data.into();
        if channels == 0 {
            return Err(anyhow!("array must have at least one channel"));
        }
        let expected = width
            .checked_mul(height)
            .and_then(|p| p.checked_mul(channels))
            .ok_or_else(|| anyhow!("array dimensions {}x{}x{} overflow", width, height, channels))?;
        if data.len() != expected {
            return Err(anyhow!(
                "buffer holds {} samples, {}x{}x{} needs {}",
                data.len(),
                width,
                height,
                channels,
                expected
            ));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
            tags: vec![HashMap::new(); channels],
        })
    }

    /// Builder form of [`Array::set_tag`].
    pub fn with_tag(mut self, channel: usize, key: &str, value: &str) -> Result<Self> {
        self.set_tag(channel, key, value)?;
        Ok(self)
    }

    /// Tag every channel's `INTERPRETATION` in order.
    pub fn with_interpretations(mut self, names: &[&str]) -> Result<Self> {
        for (channel, name) in names.iter().enumerate() {
            self.set_tag(channel, TAG_INTERPRETATION, name)?;
        }
        Ok(self)
    }

    pub fn set_tag(&mut self, channel: usize, key: &str, value: &str) -> Result<()> {
        let tags = self
            .tags
            .get_mut(channel)
            .ok_or_else(|| anyhow!("channel {} out of range ({} channels)", channel, self.channels))?;
        tags.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn tag(&self, channel: usize, key: &str) -> Option<&str> {
        self.tags.get(channel)?.get(key).map(String::as_str)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Sample at (x, y, channel) as f64; NaN outside the array.
    pub fn get(&self, x: usize, y: usize, channel: usize) -> f64 {
        if x >= self.width || y >= self.height || channel >= self.channels {
            return f64::NAN;
        }
        self.data.get_f64((y * self.width + x) * self.channels + channel)
    }

    /// True when `other` can replace this array without rebuilding tile geometry.
    pub fn same_geometry(&self, other: &Array) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.channels == other.channels
            && self.element_type() == other.element_type()
    }
}
