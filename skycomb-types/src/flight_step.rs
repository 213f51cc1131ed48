//! `FlightStep` — an external telemetry sample (spec.md §3, §6). The run
//! consumes these via the pose source; it never creates them, only borrows
//! `step_id` and interpolation weights into `Block`.

use crate::ids::StepId;
use crate::object::AttitudeCorrection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlightStep {
    pub step_id: StepId,
    pub time_ms: i64,
    pub northing_m: f64,
    pub easting_m: f64,
    pub altitude_m: f64,
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
    pub ground_dem_m: Option<f64>,
    /// Id of the leg this step belongs to, if legs are present (§4.5, §6).
    pub leg_id: Option<u32>,
    /// Pose correction applied by the span optimizer, if any (§4.4).
    pub correction: Option<AttitudeCorrection>,
}

impl FlightStep {
    /// Apply `correction` on top of whatever correction (if any) is already
    /// attached, as the span optimizer does when committing a winning trial.
    pub fn with_correction(&self, correction: AttitudeCorrection) -> FlightStep {
        let mut next = *self;
        next.altitude_m += correction.fix_alt_m;
        next.yaw_deg += correction.fix_yaw_deg;
        next.pitch_deg += correction.fix_pitch_deg;
        next.correction = Some(correction);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correction_offsets_pose() {
        let step = FlightStep {
            step_id: StepId(0),
            time_ms: 0,
            northing_m: 0.0,
            easting_m: 0.0,
            altitude_m: 100.0,
            yaw_deg: 10.0,
            pitch_deg: 0.0,
            roll_deg: 0.0,
            ground_dem_m: Some(10.0),
            leg_id: Some(1),
            correction: None,
        };
        let corrected = step.with_correction(AttitudeCorrection {
            fix_alt_m: -2.0,
            fix_yaw_deg: 1.0,
            fix_pitch_deg: 0.5,
            hfov_deg: None,
        });
        assert_eq!(corrected.altitude_m, 98.0);
        assert_eq!(corrected.yaw_deg, 11.0);
        assert_eq!(corrected.pitch_deg, 0.5);
    }
}
