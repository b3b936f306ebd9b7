//! Value types shared by the targeting pipeline.
//!
//! Every value here lives for a single targeting request. The camera's own
//! orientation is never cached; it is re-read through `CameraPort` each time.

use serde::{Deserialize, Serialize};

/// Degrees covered by one normalized unit of pan or tilt.
pub const DEGREES_PER_NORMALIZED_UNIT: f64 = 180.0;

/// Camera orientation in the device's own normalized coordinates.
///
/// `pan`/`tilt` span [-1, 1]; `zoom` spans [0, 1] with 0 at the wide end.
/// `zoom` is `None` when the camera does not report a zoom axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedOrientation {
    pub pan: f64,
    pub tilt: f64,
    #[serde(default)]
    pub zoom: Option<f64>,
}

impl NormalizedOrientation {
    pub fn new(pan: f64, tilt: f64, zoom: Option<f64>) -> Self {
        Self { pan, tilt, zoom }
    }

    pub fn to_angular(self) -> AngularOrientation {
        AngularOrientation {
            pan_deg: normalized_to_degrees(self.pan),
            tilt_deg: normalized_to_degrees(self.tilt),
        }
    }

    /// True when pan and tilt both lie inside the device range [-1, 1].
    pub fn is_within_device_range(self) -> bool {
        (-1.0..=1.0).contains(&self.pan) && (-1.0..=1.0).contains(&self.tilt)
    }
}

/// Pan/tilt in degrees. No wrap-around: ±180° maps to ±1.0 exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AngularOrientation {
    pub pan_deg: f64,
    pub tilt_deg: f64,
}

impl AngularOrientation {
    /// Re-expresses the angles in normalized units, attaching `zoom` unchanged.
    pub fn to_normalized(self, zoom: Option<f64>) -> NormalizedOrientation {
        NormalizedOrientation {
            pan: degrees_to_normalized(self.pan_deg),
            tilt: degrees_to_normalized(self.tilt_deg),
            zoom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOfView {
    pub hfov_deg: f64,
    pub vfov_deg: f64,
}

/// Pixel position on a captured image. Fractional values are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Dimensions of the image a click was made on. Both sides are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    width: u32,
    height: u32,
}

impl ImageSize {
    /// Returns `None` when either side is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }

    pub fn width(self) -> u32 {
        self.width
    }

    pub fn height(self) -> u32 {
        self.height
    }

    pub fn center(self) -> PixelPoint {
        PixelPoint {
            x: self.width as f64 / 2.0,
            y: self.height as f64 / 2.0,
        }
    }

    /// Inclusive on all edges, so a click on the last pixel column still counts.
    pub fn contains(self, point: PixelPoint) -> bool {
        (0.0..=self.width as f64).contains(&point.x) && (0.0..=self.height as f64).contains(&point.y)
    }
}

/// Signed pan/tilt offset from the image center, in degrees.
/// Positive tilt means "up".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AngularOffset {
    pub pan_offset_deg: f64,
    pub tilt_offset_deg: f64,
}

impl AngularOffset {
    pub fn magnitude_deg(self) -> f64 {
        self.pan_offset_deg.hypot(self.tilt_offset_deg)
    }
}

/// Estimated time for a commanded move to complete, in whole milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleDuration {
    pub millis: u64,
}

impl SettleDuration {
    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub fn as_duration(self) -> std::time::Duration {
        std::time::Duration::from_millis(self.millis)
    }
}

pub fn normalized_to_degrees(value: f64) -> f64 {
    value * DEGREES_PER_NORMALIZED_UNIT
}

pub fn degrees_to_normalized(value_deg: f64) -> f64 {
    value_deg / DEGREES_PER_NORMALIZED_UNIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_degrees_mapping_hits_range_ends() {
        assert_eq!(normalized_to_degrees(1.0), 180.0);
        assert_eq!(normalized_to_degrees(-1.0), -180.0);
        assert_eq!(degrees_to_normalized(-180.0), -1.0);
        assert_eq!(degrees_to_normalized(90.0), 0.5);

        let angular = NormalizedOrientation::new(0.5, -0.25, Some(0.3)).to_angular();
        assert_eq!(angular.pan_deg, 90.0);
        assert_eq!(angular.tilt_deg, -45.0);
        assert_eq!(
            angular.to_normalized(Some(0.3)),
            NormalizedOrientation::new(0.5, -0.25, Some(0.3))
        );
    }

    #[test]
    fn zero_sized_images_are_rejected() {
        assert!(ImageSize::new(0, 480).is_none());
        assert!(ImageSize::new(640, 0).is_none());
        let size = ImageSize::new(640, 480).expect("valid size");
        assert_eq!(size.center(), PixelPoint::new(320.0, 240.0));
    }

    #[test]
    fn image_contains_its_edges_but_not_outside_points() {
        let size = ImageSize::new(640, 480).expect("valid size");
        assert!(size.contains(PixelPoint::new(0.0, 0.0)));
        assert!(size.contains(PixelPoint::new(640.0, 480.0)));
        assert!(!size.contains(PixelPoint::new(-1.0, 10.0)));
        assert!(!size.contains(PixelPoint::new(10.0, 481.0)));
    }

    #[test]
    fn orientation_serializes_camel_case_and_accepts_missing_zoom() {
        let parsed: NormalizedOrientation =
            serde_json::from_str(r#"{"pan":0.25,"tilt":-0.5}"#).expect("parse");
        assert_eq!(parsed, NormalizedOrientation::new(0.25, -0.5, None));

        let offset = AngularOffset {
            pan_offset_deg: 3.0,
            tilt_offset_deg: 4.0,
        };
        let json = serde_json::to_string(&offset).expect("serialize");
        assert!(json.contains("panOffsetDeg"));
        assert_eq!(offset.magnitude_deg(), 5.0);
    }
}
