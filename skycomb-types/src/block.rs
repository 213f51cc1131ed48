//! `Block` — one record per processed frame, stamped with interpolated
//! platform pose. See spec.md §3.

use crate::ids::{BlockId, StepId};
use serde::{Deserialize, Serialize};

/// Interpolated platform state attached to a block.
///
/// `northing_m`/`easting_m` are local-tangent-plane meters (not lat/lon);
/// the pose/ground sources (§6) are responsible for the projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlatformPose {
    pub northing_m: f64,
    pub easting_m: f64,
    pub altitude_m: f64,
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
    /// Angle from vertical to the camera boresight, positive forward (§4.3).
    pub camera_to_vertical_forward_deg: f64,
}

/// One processed frame.
///
/// Invariants (enforced by the run controller, see
/// `skycomb-core::RunController::push_block`):
/// * `block_id` is strictly monotonic across the run.
/// * `sum_lineal_m` is non-decreasing.
/// * `input_frame_ms` is monotonic except where `frame_ms_reset` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_id: BlockId,
    pub input_frame_id: u64,
    pub input_frame_ms: i64,
    /// True if this block's `input_frame_ms` is allowed to be non-monotonic
    /// relative to the previous block (an intentional capture-clock reset).
    pub frame_ms_reset: bool,
    pub pose: PlatformPose,
    /// Nearest `FlightStep` and the pair of interpolation weights used to
    /// derive `pose` from the two bracketing steps.
    pub nearest_step_id: StepId,
    pub step_interp_weights: (f64, f64),
    /// Cumulative linear distance flown, meters.
    pub sum_lineal_m: f64,
    /// DEM elevation at the platform's nominal image-center ground point,
    /// as reported directly by the telemetry/ground source for this frame
    /// (a geometry fallback value, see spec §4.3).
    pub input_image_dem_m: Option<f64>,
    /// True if this block falls within a tagged flight leg.
    pub has_leg: bool,
}

impl Block {
    /// `true` if `other` may legally follow `self` in the run (monotonicity
    /// check used by the run controller before insertion).
    pub fn can_precede(&self, other: &Block) -> bool {
        if other.block_id <= self.block_id {
            return false;
        }
        if other.sum_lineal_m < self.sum_lineal_m {
            return false;
        }
        if !other.frame_ms_reset && other.input_frame_ms < self.input_frame_ms {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose() -> PlatformPose {
        PlatformPose {
            northing_m: 0.0,
            easting_m: 0.0,
            altitude_m: 100.0,
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            roll_deg: 0.0,
            camera_to_vertical_forward_deg: 30.0,
        }
    }

    fn block(id: u32, ms: i64, lineal: f64) -> Block {
        Block {
            block_id: BlockId(id),
            input_frame_id: id as u64,
            input_frame_ms: ms,
            frame_ms_reset: false,
            pose: pose(),
            nearest_step_id: StepId(0),
            step_interp_weights: (0.5, 0.5),
            sum_lineal_m: lineal,
            input_image_dem_m: Some(50.0),
            has_leg: true,
        }
    }

    #[test]
    fn monotonic_chain_accepted() {
        let a = block(1, 100, 0.0);
        let b = block(2, 133, 1.5);
        assert!(a.can_precede(&b));
    }

    #[test]
    fn out_of_order_block_id_rejected() {
        let a = block(2, 100, 0.0);
        let b = block(1, 133, 1.5);
        assert!(!a.can_precede(&b));
    }

    #[test]
    fn non_reset_time_regression_rejected() {
        let a = block(1, 200, 0.0);
        let b = block(2, 100, 1.0);
        assert!(!a.can_precede(&b));
    }

    #[test]
    fn reset_time_regression_allowed() {
        let a = block(1, 200, 0.0);
        let mut b = block(2, 100, 1.0);
        b.frame_ms_reset = true;
        assert!(a.can_precede(&b));
    }

    #[test]
    fn decreasing_lineal_rejected() {
        let a = block(1, 100, 5.0);
        let b = block(2, 133, 4.0);
        assert!(!a.can_precede(&b));
    }
}
