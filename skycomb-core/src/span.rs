//! Span optimizer (spec.md §4.4): per-leg attitude-correction search and
//! per-object ray-bundle triangulation.
//!
//! The attitude search is a coordinate-descent grid search with a
//! fine-tune box, evaluated against whatever cost the caller supplies (the
//! run controller re-runs geometry for trial corrections and reports back
//! summed location/height error). Triangulation is a bounded nonlinear
//! least-squares fit via `argmin`'s Nelder-Mead solver, the same pattern
//! `braid-april-cal` uses to refine a camera's distortion terms.

use argmin::core::{CostFunction, Error as ArgminError, Executor};
use argmin::solver::neldermead::NelderMead;
use nalgebra::Vector3;
use skycomb_types::{AttitudeCorrection, SpanConfig};

use crate::error::CoreError;

/// Coordinate-descent search over `(fix_alt_m, fix_yaw_deg, fix_pitch_deg)`
/// within the ranges named in `cfg`, minimizing whatever scalar `cost`
/// reports for a trial correction. Two passes: a coarse 5-step grid per
/// axis, then a fine-tune box at 1/5th the coarse step centered on the
/// coarse winner (spec §4.4).
pub fn search_attitude_correction(
    cfg: &SpanConfig,
    hfov_deg: Option<f64>,
    mut cost: impl FnMut(&AttitudeCorrection) -> f64,
) -> (AttitudeCorrection, f64) {
    let mut best = AttitudeCorrection {
        fix_alt_m: 0.0,
        fix_yaw_deg: 0.0,
        fix_pitch_deg: 0.0,
        hfov_deg,
    };
    let mut best_cost = cost(&best);

    let passes = [
        (cfg.alt_range_m, cfg.yaw_range_deg, cfg.pitch_range_deg, 5),
        (cfg.alt_range_m / 5.0, cfg.yaw_range_deg / 5.0, cfg.pitch_range_deg / 5.0, 5),
    ];

    for (alt_range, yaw_range, pitch_range, steps) in passes {
        best = coordinate_descend_axis(&best, &mut best_cost, -alt_range, alt_range, steps, hfov_deg, &mut cost, Axis::Alt, cfg.min_improvement_m);
        best = coordinate_descend_axis(&best, &mut best_cost, -yaw_range, yaw_range, steps, hfov_deg, &mut cost, Axis::Yaw, cfg.min_improvement_m);
        best = coordinate_descend_axis(&best, &mut best_cost, -pitch_range, pitch_range, steps, hfov_deg, &mut cost, Axis::Pitch, cfg.min_improvement_m);
    }

    if let Some(candidates) = (!cfg.hfov_candidates_deg.is_empty()).then_some(&cfg.hfov_candidates_deg) {
        for &candidate in candidates {
            let trial = AttitudeCorrection { hfov_deg: Some(candidate), ..best };
            let trial_cost = cost(&trial);
            if best_cost.sqrt() - trial_cost.sqrt() >= cfg.min_improvement_m {
                best_cost = trial_cost;
                best = trial;
            }
        }
    }

    (best, best_cost)
}

enum Axis {
    Alt,
    Yaw,
    Pitch,
}

/// Walks one axis over `lo..=hi` in `steps` increments, accepting a trial
/// only if it beats `base_cost` by at least `min_improvement_m` of RMS
/// (costs are summed squared location errors, so the comparison is done
/// on their square roots) — a trial that's merely fractionally lower does
/// not win the step (spec §4.4).
#[allow(clippy::too_many_arguments)]
fn coordinate_descend_axis(
    base: &AttitudeCorrection,
    base_cost: &mut f64,
    lo: f64,
    hi: f64,
    steps: u32,
    hfov_deg: Option<f64>,
    cost: &mut impl FnMut(&AttitudeCorrection) -> f64,
    axis: Axis,
    min_improvement_m: f64,
) -> AttitudeCorrection {
    let mut best = *base;
    if steps == 0 || (hi - lo).abs() < f64::EPSILON {
        return best;
    }
    let step = (hi - lo) / steps as f64;
    for i in 0..=steps {
        let offset = lo + step * i as f64;
        let trial = match axis {
            Axis::Alt => AttitudeCorrection { fix_alt_m: base.fix_alt_m + offset, hfov_deg, ..*base },
            Axis::Yaw => AttitudeCorrection { fix_yaw_deg: base.fix_yaw_deg + offset, hfov_deg, ..*base },
            Axis::Pitch => AttitudeCorrection { fix_pitch_deg: base.fix_pitch_deg + offset, hfov_deg, ..*base },
        };
        let trial_cost = cost(&trial);
        if base_cost.sqrt() - trial_cost.sqrt() >= min_improvement_m {
            *base_cost = trial_cost;
            best = trial;
        }
    }
    best
}

/// One line-of-sight observation feeding a triangulation: the platform
/// position at the time of the sighting and the unit direction of the ray
/// through the feature's pixel, both in local-tangent-plane meters.
#[derive(Debug, Clone, Copy)]
pub struct RayObservation {
    pub origin: Vector3<f64>,
    pub direction: Vector3<f64>,
}

struct RayBundleCost {
    rays: Vec<RayObservation>,
}

impl CostFunction for RayBundleCost {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, ArgminError> {
        let p = Vector3::new(param[0], param[1], param[2]);
        let mut sum = 0.0;
        for ray in &self.rays {
            let v = p - ray.origin;
            let t = v.dot(&ray.direction);
            let perp = v - ray.direction * t;
            sum += perp.norm_squared();
        }
        Ok(sum)
    }
}

/// Fit a single 3D point to a bundle of line-of-sight rays (one per
/// observing block) by minimizing summed squared perpendicular distance,
/// seeded from `initial_guess` (typically the flat-ground mean location).
///
/// Returns the fitted point and the RMS residual distance, in meters.
pub fn triangulate(
    rays: &[RayObservation],
    initial_guess: Vector3<f64>,
) -> Result<(Vector3<f64>, f64), CoreError> {
    if rays.len() < 2 {
        return Err(CoreError::SpanOptimization {
            reason: "triangulation needs at least two observing rays".to_string(),
        });
    }

    let problem = RayBundleCost { rays: rays.to_vec() };
    let g = initial_guess;
    let d = 2.0; // meter-scale initial simplex perturbation
    let simplex = vec![
        vec![g.x, g.y, g.z],
        vec![g.x + d, g.y, g.z],
        vec![g.x, g.y + d, g.z],
        vec![g.x, g.y, g.z + d],
    ];
    let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex);

    let result = Executor::new(problem, solver)
        .configure(|state| state.max_iters(500))
        .run()
        .map_err(|e| CoreError::SpanOptimization { reason: e.to_string() })?;

    let best_param = result.state.best_param.ok_or_else(|| CoreError::SpanOptimization {
        reason: "Nelder-Mead returned no best parameter".to_string(),
    })?;
    let best_cost = result.state.best_cost;
    let point = Vector3::new(best_param[0], best_param[1], best_param[2]);
    let rms = (best_cost / rays.len() as f64).sqrt();
    Ok((point, rms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn attitude_search_finds_the_minimum_of_a_simple_bowl() {
        let cfg = SpanConfig {
            alt_range_m: 5.0,
            yaw_range_deg: 5.0,
            pitch_range_deg: 5.0,
            min_improvement_m: 0.0,
            compare_interval_frames: 1,
            hfov_candidates_deg: vec![],
            triangulation_mode: false,
        };
        let target_alt = 2.0;
        let (best, best_cost) = search_attitude_correction(&cfg, None, |c| {
            (c.fix_alt_m - target_alt).powi(2) + c.fix_yaw_deg.powi(2) + c.fix_pitch_deg.powi(2)
        });
        assert!((best.fix_alt_m - target_alt).abs() < 0.2, "got {}", best.fix_alt_m);
        assert!(best_cost < 0.1);
    }

    #[test]
    fn triangulate_two_crossing_rays_recovers_their_intersection() {
        // Ray A looks straight down from (0,0,100); ray B looks down from
        // (10,0,100) tilted to also pass through (0,0,0).
        let a = RayObservation {
            origin: Vector3::new(0.0, 0.0, 100.0),
            direction: Vector3::new(0.0, 0.0, -1.0),
        };
        let b_origin = Vector3::new(10.0, 0.0, 100.0);
        let to_target = (Vector3::new(0.0, 0.0, 0.0) - b_origin).normalize();
        let b = RayObservation { origin: b_origin, direction: to_target };

        let (point, rms) = triangulate(&[a, b], Vector3::new(1.0, 1.0, 10.0)).unwrap();
        assert_relative_eq!(point.x, 0.0, epsilon = 0.05);
        assert_relative_eq!(point.y, 0.0, epsilon = 0.05);
        assert!(rms < 0.05);
    }

    #[test]
    fn triangulate_rejects_a_single_ray() {
        let a = RayObservation {
            origin: Vector3::new(0.0, 0.0, 100.0),
            direction: Vector3::new(0.0, 0.0, -1.0),
        };
        assert!(triangulate(&[a], Vector3::new(0.0, 0.0, 0.0)).is_err());
    }
}
