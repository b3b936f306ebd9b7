use crate::models::config::FovCalibration;
use crate::models::orientation::FieldOfView;

/// Linear zoom → field-of-view model between the wide and tele calibration ends.
#[derive(Debug, Clone, Copy)]
pub struct FovEstimator {
    calibration: FovCalibration,
}

impl FovEstimator {
    pub fn new(calibration: FovCalibration) -> Self {
        Self { calibration }
    }

    /// Zoom outside [0, 1] extrapolates along the same line.
    pub fn estimate(&self, zoom_norm: f64) -> FieldOfView {
        let wide = self.calibration.wide;
        let tele = self.calibration.tele;
        FieldOfView {
            hfov_deg: lerp(wide.hfov_deg, tele.hfov_deg, zoom_norm),
            vfov_deg: lerp(wide.vfov_deg, tele.vfov_deg, zoom_norm),
        }
    }
}

impl Default for FovEstimator {
    fn default() -> Self {
        Self::new(FovCalibration::default())
    }
}

fn lerp(start: f64, end: f64, t: f64) -> f64 {
    start + (end - start) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::FovPair;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn endpoints_match_calibration_exactly() {
        let estimator = FovEstimator::default();
        let wide = estimator.estimate(0.0);
        let tele = estimator.estimate(1.0);
        assert_eq!(wide.hfov_deg, 61.2);
        assert_eq!(wide.vfov_deg, 37.0);
        assert_eq!(tele.hfov_deg, 2.9);
        assert_eq!(tele.vfov_deg, 1.6);
    }

    #[test]
    fn half_zoom_is_midpoint() {
        let fov = FovEstimator::default().estimate(0.5);
        assert!(approx_eq(fov.hfov_deg, 32.05));
        assert!(approx_eq(fov.vfov_deg, 19.3));
    }

    #[test]
    fn fov_never_grows_as_zoom_increases() {
        let estimator = FovEstimator::default();
        let mut previous = estimator.estimate(0.0);
        for step in 1..=100 {
            let current = estimator.estimate(step as f64 / 100.0);
            assert!(current.hfov_deg <= previous.hfov_deg);
            assert!(current.vfov_deg <= previous.vfov_deg);
            previous = current;
        }
    }

    #[test]
    fn out_of_range_zoom_extrapolates() {
        let estimator = FovEstimator::new(FovCalibration {
            wide: FovPair {
                hfov_deg: 60.0,
                vfov_deg: 40.0,
            },
            tele: FovPair {
                hfov_deg: 10.0,
                vfov_deg: 0.0,
            },
        });
        let below = estimator.estimate(-0.2);
        assert!(approx_eq(below.hfov_deg, 70.0));
        assert!(approx_eq(below.vfov_deg, 48.0));
    }
}
