//! Pixel → angular offset mapping.
//!
//! Linear degrees-per-pixel model with no lens or perspective correction, so
//! accuracy drops toward the image edges and at wide field of view.

use crate::models::orientation::{AngularOffset, FieldOfView, ImageSize, PixelPoint};

/// Offset of `point` from the image center. Up and right are positive.
///
/// Points outside the image extrapolate along the same linear model.
pub fn pixel_to_angle_offset(point: PixelPoint, image: ImageSize, fov: FieldOfView) -> AngularOffset {
    let width = image.width() as f64;
    let height = image.height() as f64;
    let center = image.center();

    let dx = point.x - center.x;
    // Image rows grow downward; camera tilt grows upward.
    let dy = center.y - point.y;

    let deg_per_px_x = fov.hfov_deg / width;
    let deg_per_px_y = fov.vfov_deg / height;

    AngularOffset {
        pan_offset_deg: dx * deg_per_px_x,
        tilt_offset_deg: dy * deg_per_px_y,
    }
}
