//! Click-to-target pipeline: read → estimate FOV → map pixel → compose → move.
//!
//! `plan_target` is the pure part; `target_pixel` wraps it with the two camera
//! round-trips. Every check runs before `move_absolute`, so a failed request
//! never leaves a half-applied move behind.

use serde::Serialize;
use thiserror::Error;

use crate::algorithm::angle_mapper::pixel_to_angle_offset;
use crate::algorithm::fov::FovEstimator;
use crate::algorithm::settle::SettleEstimator;
use crate::algorithm::target_composer::compose_target;
use crate::camera::port::{AbsoluteMove, CameraError, CameraPort};
use crate::models::config::{RangePolicy, TargetingConfig};
use crate::models::orientation::{
    AngularOffset, FieldOfView, ImageSize, NormalizedOrientation, PixelPoint, SettleDuration,
};

#[derive(Debug, Error)]
pub enum TargetingError {
    #[error("invalid image dimensions {width}x{height}: both sides must be positive")]
    InvalidImageDimensions { width: u32, height: u32 },
    #[error("pixel ({x}, {y}) lies outside the {width}x{height} image")]
    PixelOutOfFrame {
        x: f64,
        y: f64,
        width: u32,
        height: u32,
    },
    #[error("target pan={pan:.4} tilt={tilt:.4} is outside the device range [-1, 1]")]
    TargetOutOfRange { pan: f64, tilt: f64 },
    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// Everything derived for one click.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPlan {
    pub current: NormalizedOrientation,
    pub fov: FieldOfView,
    pub offset: AngularOffset,
    pub target: NormalizedOrientation,
    pub settle: SettleDuration,
}

impl TargetPlan {
    pub fn to_move(&self, config: &TargetingConfig) -> AbsoluteMove {
        AbsoluteMove {
            pan: self.target.pan,
            tilt: self.target.tilt,
            zoom: self.target.zoom,
            speed: config.speed,
        }
    }
}

pub fn image_size(width: u32, height: u32) -> Result<ImageSize, TargetingError> {
    ImageSize::new(width, height).ok_or(TargetingError::InvalidImageDimensions { width, height })
}

/// Pure targeting computation for a click on `image` given the camera's
/// `current` orientation.
pub fn plan_target(
    current: NormalizedOrientation,
    point: PixelPoint,
    image: ImageSize,
    config: &TargetingConfig,
) -> Result<TargetPlan, TargetingError> {
    if config.range_policy == RangePolicy::Strict && !image.contains(point) {
        return Err(TargetingError::PixelOutOfFrame {
            x: point.x,
            y: point.y,
            width: image.width(),
            height: image.height(),
        });
    }

    // A camera without a zoom axis is treated as sitting at the wide end.
    let fov = FovEstimator::new(config.fov).estimate(current.zoom.unwrap_or(0.0));
    let offset = pixel_to_angle_offset(point, image, fov);
    let target = compose_target(current, offset);

    if config.range_policy == RangePolicy::Strict && !target.is_within_device_range() {
        return Err(TargetingError::TargetOutOfRange {
            pan: target.pan,
            tilt: target.tilt,
        });
    }

    let settle = SettleEstimator::new(config.settle).estimate(offset);

    Ok(TargetPlan {
        current,
        fov,
        offset,
        target,
        settle,
    })
}

/// Points the camera at `point` on a `width`x`height` image and returns the
/// plan, whose `settle` is how long to wait before the next state read.
pub async fn target_pixel<P: CameraPort>(
    camera: &P,
    point: PixelPoint,
    width: u32,
    height: u32,
    config: &TargetingConfig,
) -> Result<TargetPlan, TargetingError> {
    let image = image_size(width, height)?;

    let current = camera.current_orientation().await?;
    let plan = plan_target(current, point, image, config)?;

    let current_deg = current.to_angular();
    let target_deg = plan.target.to_angular();
    log::info!(
        "target_pixel: click=({:.1}, {:.1}) image={}x{} fov=({:.2}, {:.2}) offset=({:.3}, {:.3}) pan {:.2}->{:.2} deg tilt {:.2}->{:.2} deg",
        point.x,
        point.y,
        width,
        height,
        plan.fov.hfov_deg,
        plan.fov.vfov_deg,
        plan.offset.pan_offset_deg,
        plan.offset.tilt_offset_deg,
        current_deg.pan_deg,
        target_deg.pan_deg,
        current_deg.tilt_deg,
        target_deg.tilt_deg,
    );

    camera.move_absolute(plan.to_move(config)).await?;
    log::info!("target_pixel: move issued, settle={} ms", plan.settle.millis);

    Ok(plan)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// In-memory camera that records every move it receives.
    pub struct FakeCamera {
        pub orientation: Mutex<Result<NormalizedOrientation, &'static str>>,
        pub moves: Mutex<Vec<AbsoluteMove>>,
        /// Time the camera takes to accept a move command.
        pub move_delay: Option<Duration>,
    }

    impl FakeCamera {
        pub fn at(orientation: NormalizedOrientation) -> Self {
            Self {
                orientation: Mutex::new(Ok(orientation)),
                moves: Mutex::new(Vec::new()),
                move_delay: None,
            }
        }

        pub fn disconnected() -> Self {
            Self {
                orientation: Mutex::new(Err("not-connected")),
                moves: Mutex::new(Vec::new()),
                move_delay: None,
            }
        }

        pub fn recorded_moves(&self) -> Vec<AbsoluteMove> {
            self.moves.lock().unwrap().clone()
        }
    }

    impl CameraPort for FakeCamera {
        async fn current_orientation(&self) -> Result<NormalizedOrientation, CameraError> {
            match *self.orientation.lock().unwrap() {
                Ok(orientation) => Ok(orientation),
                Err("no-profile") => Err(CameraError::NoActiveProfile),
                Err(_) => Err(CameraError::NotConnected),
            }
        }

        async fn move_absolute(&self, command: AbsoluteMove) -> Result<(), CameraError> {
            if let Some(delay) = self.move_delay {
                tokio::time::sleep(delay).await;
            }
            self.moves.lock().unwrap().push(command);
            let mut orientation = self.orientation.lock().unwrap();
            if let Ok(current) = orientation.as_mut() {
                current.pan = command.pan;
                current.tilt = command.tilt;
                if command.zoom.is_some() {
                    current.zoom = command.zoom;
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeCamera;
    use super::*;
    use crate::models::config::{FovCalibration, FovPair};

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// Calibration whose zoom 0.2 point is exactly 60° x 34°.
    fn sixty_degree_config() -> TargetingConfig {
        TargetingConfig {
            fov: FovCalibration {
                wide: FovPair {
                    hfov_deg: 60.0,
                    vfov_deg: 34.0,
                },
                tele: FovPair {
                    hfov_deg: 60.0,
                    vfov_deg: 34.0,
                },
            },
            ..TargetingConfig::default()
        }
    }

    #[test]
    fn plans_reference_scenario() {
        let current = NormalizedOrientation::new(0.1, 0.0, Some(0.2));
        let image = image_size(640, 480).expect("valid size");
        let plan = plan_target(
            current,
            PixelPoint::new(384.0, 240.0),
            image,
            &sixty_degree_config(),
        )
        .expect("plan");

        assert!(approx_eq(plan.offset.pan_offset_deg, 6.0));
        assert_eq!(plan.offset.tilt_offset_deg, 0.0);
        assert!(approx_eq(plan.target.pan, 24.0 / 180.0));
        assert!((plan.target.pan - 0.1333).abs() < 1e-4);
        assert_eq!(plan.target.tilt, 0.0);
        assert_eq!(plan.target.zoom, Some(0.2));
        assert_eq!(plan.settle.millis, 1_000);
    }

    #[test]
    fn missing_zoom_uses_wide_end_and_is_not_sent() {
        let current = NormalizedOrientation::new(0.0, 0.0, None);
        let image = image_size(640, 480).expect("valid size");
        let config = TargetingConfig::default();
        let plan = plan_target(current, PixelPoint::new(0.0, 240.0), image, &config).expect("plan");
        assert_eq!(plan.fov.hfov_deg, 61.2);
        assert!(approx_eq(plan.offset.pan_offset_deg, -30.6));
        assert_eq!(plan.to_move(&config).zoom, None);
    }

    #[test]
    fn strict_policy_rejects_out_of_frame_pixels() {
        let config = TargetingConfig {
            range_policy: RangePolicy::Strict,
            ..TargetingConfig::default()
        };
        let image = image_size(640, 480).expect("valid size");
        let current = NormalizedOrientation::new(0.0, 0.0, Some(0.0));
        let err = plan_target(current, PixelPoint::new(700.0, 10.0), image, &config)
            .expect_err("outside frame");
        assert!(matches!(err, TargetingError::PixelOutOfFrame { width: 640, .. }));

        let extrapolated = plan_target(
            current,
            PixelPoint::new(700.0, 10.0),
            image,
            &TargetingConfig::default(),
        );
        assert!(extrapolated.is_ok());
    }

    #[test]
    fn strict_policy_rejects_targets_beyond_device_range() {
        let config = TargetingConfig {
            range_policy: RangePolicy::Strict,
            ..TargetingConfig::default()
        };
        let image = image_size(640, 480).expect("valid size");
        let current = NormalizedOrientation::new(0.99, 0.0, Some(0.0));
        let err = plan_target(current, PixelPoint::new(640.0, 240.0), image, &config)
            .expect_err("beyond +1");
        assert!(matches!(err, TargetingError::TargetOutOfRange { .. }));

        let plan = plan_target(
            current,
            PixelPoint::new(640.0, 240.0),
            image,
            &TargetingConfig::default(),
        )
        .expect("extrapolate passes through");
        assert!(plan.target.pan > 1.0);
    }

    #[tokio::test]
    async fn target_pixel_moves_camera_with_configured_speed() {
        let camera = FakeCamera::at(NormalizedOrientation::new(0.1, 0.0, Some(0.2)));
        let config = sixty_degree_config();
        let plan = target_pixel(&camera, PixelPoint::new(384.0, 240.0), 640, 480, &config)
            .await
            .expect("target");

        let moves = camera.recorded_moves();
        assert_eq!(moves.len(), 1);
        assert!(approx_eq(moves[0].pan, 24.0 / 180.0));
        assert_eq!(moves[0].tilt, 0.0);
        assert_eq!(moves[0].zoom, Some(0.2));
        assert_eq!(moves[0].speed.pan, 0.5);
        assert_eq!(plan.settle.millis, 1_000);
    }

    #[tokio::test]
    async fn zero_dimensions_fail_before_touching_camera() {
        let camera = FakeCamera::disconnected();
        let err = target_pixel(
            &camera,
            PixelPoint::new(1.0, 1.0),
            0,
            480,
            &TargetingConfig::default(),
        )
        .await
        .expect_err("zero width");
        assert!(matches!(
            err,
            TargetingError::InvalidImageDimensions {
                width: 0,
                height: 480
            }
        ));
    }

    #[tokio::test]
    async fn camera_errors_propagate_unchanged() {
        let camera = FakeCamera::disconnected();
        let err = target_pixel(
            &camera,
            PixelPoint::new(1.0, 1.0),
            640,
            480,
            &TargetingConfig::default(),
        )
        .await
        .expect_err("not connected");
        assert!(matches!(err, TargetingError::Camera(CameraError::NotConnected)));

        let camera = FakeCamera::at(NormalizedOrientation::new(0.0, 0.0, None));
        *camera.orientation.lock().unwrap() = Err("no-profile");
        let err = target_pixel(
            &camera,
            PixelPoint::new(1.0, 1.0),
            640,
            480,
            &TargetingConfig::default(),
        )
        .await
        .expect_err("no profile");
        assert!(matches!(err, TargetingError::Camera(CameraError::NoActiveProfile)));
        assert!(camera.recorded_moves().is_empty());
    }

    #[tokio::test]
    async fn strict_rejection_never_issues_a_move() {
        let camera = FakeCamera::at(NormalizedOrientation::new(0.0, 0.0, Some(0.0)));
        let config = TargetingConfig {
            range_policy: RangePolicy::Strict,
            ..TargetingConfig::default()
        };
        let result = target_pixel(&camera, PixelPoint::new(-5.0, 0.0), 640, 480, &config).await;
        assert!(result.is_err());
        assert!(camera.recorded_moves().is_empty());
    }
}
