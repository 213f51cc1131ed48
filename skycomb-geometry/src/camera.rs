//! Image-fraction to line-of-sight ray, per spec.md §4.3.
//!
//! World frame is local-tangent-plane (northing, easting, altitude), with
//! altitude positive up. The camera is body-fixed; its forward-down angle
//! from vertical (`camera_to_vertical_forward_deg`) is supplied per-block
//! by gimbal telemetry, and `yaw_deg` gives the compass heading (degrees
//! clockwise from north) the boresight is pointed along.

use nalgebra::Vector3;
use skycomb_types::{GeometryConfig, PlatformPose};

/// A unit line-of-sight ray in world space, plus the forward-down angle it
/// was derived at (needed by the baseline-triangulation Δtan calculation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SightRay {
    /// Unit vector (north, east, up).
    pub direction: Vector3<f64>,
    pub forward_down_deg: f64,
}

impl SightRay {
    /// Horizontal component magnitude of the ray direction, i.e.
    /// `sin(forward_down)`. Always non-negative.
    pub fn horizontal_component(&self) -> f64 {
        (self.direction.x * self.direction.x + self.direction.y * self.direction.y).sqrt()
    }
}

/// Feature centroid in image fractions (spec §4.3): `(x_frac, y_frac) =
/// (center_x / W, (H - center_y) / H)`, so `y_frac = 1` is the top of the
/// image (nearest the platform when looking forward and down).
pub fn image_fractions(center_x: f64, center_y: f64, width: u32, height: u32) -> (f64, f64) {
    let w = width as f64;
    let h = height as f64;
    (center_x / w, (h - center_y) / h)
}

/// Compute the world-frame line-of-sight ray for a feature centroid given
/// in image fractions, the camera intrinsics, and the block's pose.
pub fn sight_ray(x_frac: f64, y_frac: f64, cfg: &GeometryConfig, pose: &PlatformPose) -> SightRay {
    let azimuth_offset_deg = (x_frac - 0.5) * cfg.hfov_deg;
    // y_frac = 1 (image top) is nearest the platform, i.e. a shallower
    // (smaller) forward-down angle; y_frac = 0 (bottom) is farther.
    let forward_down_deg = pose.camera_to_vertical_forward_deg + (0.5 - y_frac) * cfg.vfov_deg;

    let azimuth_rad = (pose.yaw_deg + azimuth_offset_deg).to_radians();
    let forward_down_rad = forward_down_deg.to_radians();

    let horiz = forward_down_rad.sin();
    let up = -forward_down_rad.cos();
    let north = horiz * azimuth_rad.cos();
    let east = horiz * azimuth_rad.sin();

    SightRay {
        direction: Vector3::new(north, east, up),
        forward_down_deg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cfg() -> GeometryConfig {
        GeometryConfig {
            hfov_deg: 60.0,
            vfov_deg: 45.0,
            image_width: 640,
            image_height: 480,
            pixel_doubling_divisor: 1.0,
        }
    }

    fn pose(fwd: f64, yaw: f64) -> PlatformPose {
        PlatformPose {
            northing_m: 0.0,
            easting_m: 0.0,
            altitude_m: 100.0,
            yaw_deg: yaw,
            pitch_deg: 0.0,
            roll_deg: 0.0,
            camera_to_vertical_forward_deg: fwd,
        }
    }

    #[test]
    fn nadir_center_pixel_points_straight_down() {
        let ray = sight_ray(0.5, 0.5, &cfg(), &pose(0.0, 0.0));
        assert_relative_eq!(ray.direction.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(ray.direction.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(ray.direction.z, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn image_top_is_nearer_than_bottom() {
        let near = sight_ray(0.5, 1.0, &cfg(), &pose(30.0, 0.0));
        let far = sight_ray(0.5, 0.0, &cfg(), &pose(30.0, 0.0));
        assert!(near.forward_down_deg < far.forward_down_deg);
    }

    #[test]
    fn image_fractions_top_is_one() {
        let (_, y) = image_fractions(100.0, 0.0, 640, 480);
        assert_relative_eq!(y, 1.0, epsilon = 1e-9);
    }
}
