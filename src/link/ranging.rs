//! Signal-strength ranging.
//!
//! Converts an RSSI sample into an approximate distance in metres using the
//! log-distance path-loss model. The estimate is coarse by nature; it only
//! has to order nearby peripherals, not survey them.

use serde::{Deserialize, Serialize};

/// Sentinel distance for a missing or out-of-range sample.
pub const DISTANCE_UNKNOWN: f64 = -1.0;

/// Tunables for the path-loss model and the per-peripheral smoothing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RangingParams {
    /// Expected RSSI at one metre, in dBm.
    pub measured_power_dbm: f64,
    /// Environmental attenuation exponent (2.0 free space, higher indoors).
    pub path_loss_exponent: f64,
    /// Weight of the newest sample in the exponential smoothing.
    pub smoothing_alpha: f64,
}

impl Default for RangingParams {
    fn default() -> Self {
        Self {
            measured_power_dbm: -59.0,
            path_loss_exponent: 2.0,
            smoothing_alpha: 0.6,
        }
    }
}

/// Estimates the distance to a peripheral from one RSSI sample.
///
/// Monotonic: a weaker signal never yields a smaller distance. Samples that
/// cannot come from a real sighting (zero, positive, or below the radio's
/// sensitivity floor) map to [`DISTANCE_UNKNOWN`] instead of failing.
pub fn estimate_distance(rssi: i16, params: &RangingParams) -> f64 {
    if rssi >= 0 || rssi < -120 {
        return DISTANCE_UNKNOWN;
    }
    let exponent = (params.measured_power_dbm - f64::from(rssi))
        / (10.0 * params.path_loss_exponent);
    10f64.powf(exponent)
}

/// Blends a fresh estimate into the previous one for the same peripheral.
/// Unknown values pass the other side through unchanged.
pub fn smooth(previous: f64, next: f64, params: &RangingParams) -> f64 {
    if previous < 0.0 {
        return next;
    }
    if next < 0.0 {
        return previous;
    }
    params.smoothing_alpha * next + (1.0 - params.smoothing_alpha) * previous
}
