//! Element type conversion applied to extracted tiles before upload.

use crate::core::array::{ArrayData, ElementType, Sample};
use crate::core::ConversionPolicy;
use crate::{with_element_type, with_samples};

#[inline]
pub fn convert_sample<S: Sample, D: Sample>(v: S, policy: ConversionPolicy) -> D {
    match policy {
        ConversionPolicy::Saturate => D::from_f64(v.to_f64()),
        ConversionPolicy::Normalize => match (S::TYPE.is_float(), D::TYPE.is_float()) {
            (_, true) => D::from_f64(v.to_f64()),
            (true, false) => D::from_f64(v.to_f64() * D::TYPE.max_value()),
            (false, false) => D::from_f64(v.to_f64() / S::TYPE.max_value() * D::TYPE.max_value()),
        },
    }
}

/// Convert a whole buffer. Returns it untouched when the types already match.
pub fn convert_data(data: ArrayData, target: ElementType, policy: ConversionPolicy) -> ArrayData {
    if data.element_type() == target {
        return data;
    }
    with_samples!(&data, src => convert_slice(src, target, policy))
}

fn convert_slice<S: Sample>(src: &[S], target: ElementType, policy: ConversionPolicy) -> ArrayData {
    with_element_type!(target, D => D::into_data(
        src.iter().map(|&v| convert_sample::<S, D>(v, policy)).collect()
    ))
}
