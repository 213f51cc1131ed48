//! Flat-ground location: intersect the line-of-sight with the horizontal
//! plane at the step-reported DEM (spec.md §4.3).

use crate::camera::SightRay;
use crate::error::GeometryError;
use skycomb_types::{PlatformPose, WorldLocation};

/// The flat-ground intersection of a ray with the horizontal plane
/// `z = ground_dem_m`, plus the vertical distance from the platform down
/// to that plane (`distance_down_m`, used later by baseline triangulation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatGroundFix {
    pub location: WorldLocation,
    pub distance_down_m: f64,
    /// Parametric distance along the 3D ray to the fix (used to seed the
    /// line-of-sight/DSM walk).
    pub ray_t: f64,
}

/// Intersect `ray` (originating at `pose`) with the flat ground plane at
/// `ground_dem_m`.
pub fn flat_ground_location(
    pose: &PlatformPose,
    ray: &SightRay,
    ground_dem_m: f64,
) -> Result<FlatGroundFix, GeometryError> {
    if ray.direction.z >= 0.0 {
        // A ray that doesn't point downward never reaches the ground.
        return Err(GeometryError::OutOfRange {
            x_frac: f64::NAN,
            y_frac: f64::NAN,
        });
    }
    let t = (ground_dem_m - pose.altitude_m) / ray.direction.z;
    let location = WorldLocation {
        northing_m: pose.northing_m + t * ray.direction.x,
        easting_m: pose.easting_m + t * ray.direction.y,
    };
    Ok(FlatGroundFix {
        location,
        distance_down_m: pose.altitude_m - ground_dem_m,
        ray_t: t,
    })
}
