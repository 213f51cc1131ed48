//! Per-object aggregates (spec.md §4.3).

use skycomb_types::{GeometryConfig, WorldLocation};

/// Arithmetic mean of Real-feature locations, and the mean Euclidean
/// distance from each location to that mean (a 2D analog of standard
/// deviation). Returns `None` if `locations` is empty.
pub fn location_mean_and_err(locations: &[WorldLocation]) -> Option<(WorldLocation, f64)> {
    if locations.is_empty() {
        return None;
    }
    let n = locations.len() as f64;
    let mean = WorldLocation {
        northing_m: locations.iter().map(|l| l.northing_m).sum::<f64>() / n,
        easting_m: locations.iter().map(|l| l.easting_m).sum::<f64>() / n,
    };
    let err = locations.iter().map(|l| l.distance_to(&mean)).sum::<f64>() / n;
    Some((mean, err))
}

/// Mean of known heights, and `max(|max-mean|, |min-mean|)`. Unknown
/// (`None`) heights are ignored, per spec. Returns `None` if no height is
/// known.
pub fn height_mean_and_err(heights: &[f64]) -> Option<(f64, f64, f64, f64)> {
    if heights.is_empty() {
        return None;
    }
    let n = heights.len() as f64;
    let mean = heights.iter().sum::<f64>() / n;
    let min = heights.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = heights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let err = (max - mean).abs().max((min - mean).abs());
    Some((mean, err, min, max))
}

/// Ground footprint area of a single pixel at vertical distance
/// `distance_down_m` below the platform, in square centimeters (spec
/// §4.3: `size_cm2` derives from the maximum Real-feature hot-pixel count
/// scaled by this). Applies the configured pixel-doubling divisor (spec
/// §9 Open Question #3) to both axes.
pub fn pixel_footprint_area_cm2(cfg: &GeometryConfig, distance_down_m: f64) -> f64 {
    let ground_width_m = 2.0 * distance_down_m * (cfg.hfov_deg.to_radians() / 2.0).tan();
    let ground_height_m = 2.0 * distance_down_m * (cfg.vfov_deg.to_radians() / 2.0).tan();
    let per_pixel_m2 = (ground_width_m / cfg.image_width as f64)
        * (ground_height_m / cfg.image_height as f64)
        / (cfg.pixel_doubling_divisor * cfg.pixel_doubling_divisor);
    per_pixel_m2 * 10_000.0
}

pub fn size_cm2(cfg: &GeometryConfig, max_real_hot_pixels: u32, distance_down_m: f64) -> f64 {
    max_real_hot_pixels as f64 * pixel_footprint_area_cm2(cfg, distance_down_m)
}

/// Mean of the Euclidean ground distance from `object_location` to the
/// platform position at the object's first and last Real-feature blocks.
pub fn avg_range_m(
    object_location: &WorldLocation,
    platform_first: &WorldLocation,
    platform_last: &WorldLocation,
) -> f64 {
    (object_location.distance_to(platform_first) + object_location.distance_to(platform_last))
        / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identical_locations_have_zero_error() {
        let p = WorldLocation {
            northing_m: 5.0,
            easting_m: 5.0,
        };
        let (mean, err) = location_mean_and_err(&[p, p, p]).unwrap();
        assert_eq!(mean, p);
        assert_eq!(err, 0.0);
    }

    #[test]
    fn height_err_is_larger_side_deviation() {
        let (mean, err, min, max) = height_mean_and_err(&[1.0, 2.0, 9.0]).unwrap();
        assert_relative_eq!(mean, 4.0);
        assert_eq!(min, 1.0);
        assert_eq!(max, 9.0);
        assert_relative_eq!(err, 5.0); // |9-4| > |1-4|
    }

    #[test]
    fn footprint_area_grows_with_distance_down() {
        let cfg = GeometryConfig {
            hfov_deg: 57.0,
            vfov_deg: 42.0,
            image_width: 640,
            image_height: 480,
            pixel_doubling_divisor: 1.0,
        };
        let near = pixel_footprint_area_cm2(&cfg, 50.0);
        let far = pixel_footprint_area_cm2(&cfg, 100.0);
        assert!(far > near);
        assert_relative_eq!(far / near, 4.0, epsilon = 1e-9); // scales with distance^2
    }
}
