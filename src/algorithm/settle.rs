use crate::models::config::SettleCalibration;
use crate::models::orientation::{AngularOffset, SettleDuration};

/// Distance-proportional settle estimate. Acceleration is not modelled.
#[derive(Debug, Clone, Copy)]
pub struct SettleEstimator {
    calibration: SettleCalibration,
}

impl SettleEstimator {
    pub fn new(calibration: SettleCalibration) -> Self {
        Self { calibration }
    }

    /// Always within `[min_ms, max_ms]`. With inverted bounds `min_ms` wins.
    pub fn estimate(&self, offset: AngularOffset) -> SettleDuration {
        let SettleCalibration {
            ms_per_degree,
            min_ms,
            max_ms,
        } = self.calibration;

        let raw_ms = offset.magnitude_deg() * ms_per_degree;
        // NaN offsets fall to the floor rather than poisoning the clamp.
        let raw_ms = if raw_ms.is_nan() { 0.0 } else { raw_ms };
        let clamped = raw_ms.min(max_ms as f64).max(min_ms as f64);
        SettleDuration::from_millis(clamped as u64)
    }
}

impl Default for SettleEstimator {
    fn default() -> Self {
        Self::new(SettleCalibration::default())
    }
}
