/*!
 * Linear scaling between raw signal numbers and physical values
 */

use crate::signal_layout::{fixed_point_unit, SignalLayout, ValueType};

/// physical = raw * scale + offset
#[inline]
pub fn to_physical(raw: f64, scale: f64, offset: f64) -> f64 {
    raw * scale + offset
}

/// Convert a physical (engineering) value to the raw unsigned integer
/// that gets packed into the CAN frame data.
///
/// This is the inverse of `to_physical`:
///   raw = (physical - offset) / scale
///
/// Typed encoding never calls this; it is for callers that start from a
/// measurement, such as `FrameBuilder::set_physical`. Integer results are rounded to nearest and truncated to
/// `bit_length` bits (two's complement for signed signals). Fixed point
/// signals count units of `2^-decimal`. Float signals return the IEEE bit
/// pattern.
pub fn physical_to_raw(physical: f64, signal: &SignalLayout) -> u64 {
    let raw_f64 = (physical - signal.offset) / signal.scale;

    match signal.value_type {
        ValueType::Signed => (raw_f64.round() as i64 as u64) & signal.raw_mask(),
        ValueType::Unsigned => (raw_f64.round() as u64) & signal.raw_mask(),
        ValueType::Float32 => (raw_f64 as f32).to_bits() as u64,
        ValueType::Float64 => raw_f64.to_bits(),
        ValueType::FixedPoint { decimal, .. } => {
            ((raw_f64 * fixed_point_unit(decimal)).round() as u64) & signal.raw_mask()
        }
    }
}
