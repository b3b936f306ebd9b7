use crate::models::orientation::{degrees_to_normalized, AngularOffset, NormalizedOrientation};

/// Adds `offset` to the current pan/tilt. Zoom passes through untouched.
///
/// `(pan * 180 + offset) / 180` is evaluated as `pan + offset / 180`, which is
/// the same line but keeps a zero offset bit-exact.
///
/// The result is not clamped to the device range; range handling belongs to
/// the caller's `RangePolicy`.
pub fn compose_target(current: NormalizedOrientation, offset: AngularOffset) -> NormalizedOrientation {
    NormalizedOrientation {
        pan: current.pan + degrees_to_normalized(offset.pan_offset_deg),
        tilt: current.tilt + degrees_to_normalized(offset.tilt_offset_deg),
        zoom: current.zoom,
    }
}
