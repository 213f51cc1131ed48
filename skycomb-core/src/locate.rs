//! Wires `skycomb-geometry` into the per-block pipeline (spec.md §4.3):
//! resolve each newly-produced Real feature's world location and height,
//! then refresh the aggregates of every object it belongs to.
//!
//! Deliberately cheaper than the full pipeline during span-optimizer cost
//! evaluation: `locate_feature` runs line-of-sight refinement and the
//! baseline fallback on every live block, but the coordinate-descent
//! search in [`crate::span_optimizer`] only re-evaluates the flat-ground
//! term per trial correction, and re-runs this full pipeline once on the
//! winning correction.

use skycomb_geometry::{
    avg_range_m, baseline_triangulate, flat_ground_location, image_fractions,
    height_mean_and_err, location_mean_and_err, los_refine, sight_ray, size_cm2,
    BaselineObservation, GeometryError, GroundSource,
};
use skycomb_types::{
    FeatureHeightError, FeatureId, GeometryConfig, HeightAlgorithm, Object, WorldLocation,
};

use crate::arena::{Blocks, Features, Objects, Steps};

/// Resolve location/height for every id in `real_feature_ids`, then
/// refresh the aggregates of whichever objects ended up owning one of
/// them this block.
#[allow(clippy::too_many_arguments)]
pub fn locate_block(
    blocks: &Blocks,
    features: &mut Features,
    objects: &mut Objects,
    steps: &Steps,
    cfg: &GeometryConfig,
    ground: &dyn GroundSource,
    object_min_duration_ms: i64,
    real_feature_ids: &[FeatureId],
) {
    for &fid in real_feature_ids {
        locate_feature(blocks, features, cfg, ground, fid);
    }

    for object in objects.iter_mut() {
        refresh_object_aggregates(features, blocks, steps, cfg, ground, object, object_min_duration_ms);
    }
}

/// Spec §4.3's DEM-resolution priority chain: the object's ground
/// elevation is queried from the DSM first (densest, most local), then
/// the coarser DEM, then the observing block's own `input_image_dem_m`
/// (set from onboard telemetry), and finally the nearest flight step's
/// recorded ground elevation. Returns `0.0` only if every tier is absent.
fn resolve_ground_dem_m(
    ground: &dyn GroundSource,
    steps: &Steps,
    block: &skycomb_types::Block,
    location: WorldLocation,
) -> f64 {
    ground
        .elevation_dsm(location.northing_m, location.easting_m)
        .or_else(|| ground.elevation_dem(location.northing_m, location.easting_m))
        .or(block.input_image_dem_m)
        .or_else(|| steps.get(block.nearest_step_id).and_then(|s| s.ground_dem_m))
        .unwrap_or(0.0)
}

fn locate_feature(
    blocks: &Blocks,
    features: &mut Features,
    cfg: &GeometryConfig,
    ground: &dyn GroundSource,
    fid: FeatureId,
) {
    let (x_frac, y_frac, block_id) = match features.get(fid) {
        Some(f) if f.is_real() => {
            let (cx, cy) = f.pixel_box.center();
            let (xf, yf) = image_fractions(cx, cy, cfg.image_width, cfg.image_height);
            (xf, yf, f.block_id)
        }
        _ => return,
    };
    let Some(block) = blocks.get(block_id) else {
        return;
    };

    let ray = sight_ray(x_frac, y_frac, cfg, &block.pose);
    let ground_dem_m = block.input_image_dem_m.unwrap_or(0.0);

    let flat = match flat_ground_location(&block.pose, &ray, ground_dem_m) {
        Ok(flat) => flat,
        Err(err) => {
            tracing::debug!(?fid, ?block_id, ?err, "flat-ground location failed");
            if let Some(f) = features.get_mut(fid) {
                f.world_location = None;
                f.above_ground_height_m = None;
                f.height_algorithm =
                    Some(HeightAlgorithm::Error(FeatureHeightError::OutOfForwardDownRange));
            }
            return;
        }
    };

    let (location, height_m, algo) = match los_refine(&block.pose, &ray, &flat, ground) {
        Ok(fix) => (fix.location, fix.height_m, HeightAlgorithm::LineOfSight),
        Err(GeometryError::GroundLookupOutOfGrid { .. }) => {
            tracing::trace!(?fid, ?block_id, "no DSM coverage, falling back to flat-ground height");
            (flat.location, None, HeightAlgorithm::FlatGround)
        }
        Err(err) => {
            tracing::debug!(?fid, ?block_id, ?err, "line-of-sight refinement failed");
            (
                flat.location,
                None,
                HeightAlgorithm::Error(FeatureHeightError::OutOfForwardDownRange),
            )
        }
    };

    if let Some(f) = features.get_mut(fid) {
        f.world_location = Some(location);
        f.above_ground_height_m = height_m;
        f.height_algorithm = Some(algo);
    }
}

fn forward_down_deg(blocks: &Blocks, cfg: &GeometryConfig, feature_block_id: skycomb_types::BlockId, cx: f64, cy: f64) -> Option<f64> {
    let block = blocks.get(feature_block_id)?;
    let (xf, yf) = image_fractions(cx, cy, cfg.image_width, cfg.image_height);
    Some(sight_ray(xf, yf, cfg, &block.pose).forward_down_deg)
}

#[allow(clippy::too_many_arguments)]
fn refresh_object_aggregates(
    features: &Features,
    blocks: &Blocks,
    steps: &Steps,
    cfg: &GeometryConfig,
    ground: &dyn GroundSource,
    object: &mut Object,
    object_min_duration_ms: i64,
) {
    let real: Vec<_> = object
        .features
        .iter()
        .filter_map(|&fid| features.get(fid))
        .filter(|f| f.is_real())
        .collect();
    if real.is_empty() {
        return;
    }

    let locations: Vec<WorldLocation> = real.iter().filter_map(|f| f.world_location).collect();
    if let Some((mean, err)) = location_mean_and_err(&locations) {
        object.location_m = Some(mean);
        object.location_err_m = Some(err);
    }

    let heights: Vec<f64> = real.iter().filter_map(|f| f.above_ground_height_m).collect();
    if let Some((mean, err, min, max)) = height_mean_and_err(&heights) {
        object.height_m = Some(mean);
        object.height_err_m = Some(err);
        object.min_height_m = Some(min);
        object.max_height_m = Some(max);
    }

    object.max_real_hot_pixels = real.iter().map(|f| f.num_hot_pixels).max().unwrap_or(0);
    object.max_real_pixel_width = real.iter().map(|f| f.pixel_box.width).max().unwrap_or(0);
    object.max_real_pixel_height = real.iter().map(|f| f.pixel_box.height).max().unwrap_or(0);
    object.max_heat = real
        .iter()
        .flat_map(|f| f.pixels.iter())
        .map(|p| p.heat)
        .fold(object.max_heat, f32::max);

    let first = real.first().copied();
    let last = real.last().copied();
    if let (Some(first_f), Some(last_f)) = (first, last) {
        let (fcx, fcy) = first_f.pixel_box.center();
        let (lcx, lcy) = last_f.pixel_box.center();
        object.first_fwd_down_deg = forward_down_deg(blocks, cfg, first_f.block_id, fcx, fcy);
        object.last_fwd_down_deg = forward_down_deg(blocks, cfg, last_f.block_id, lcx, lcy);

        if object.height_m.is_none() && first_f.feature_id != last_f.feature_id {
            if let (Some(first_block), Some(last_block)) =
                (blocks.get(first_f.block_id), blocks.get(last_f.block_id))
            {
                if let (Some(fwd_first), Some(fwd_last)) =
                    (object.first_fwd_down_deg, object.last_fwd_down_deg)
                {
                    let dn = last_block.pose.northing_m - first_block.pose.northing_m;
                    let de = last_block.pose.easting_m - first_block.pose.easting_m;
                    let baseline_m = (dn * dn + de * de).sqrt();
                    let dem_location = object.location_m.unwrap_or(WorldLocation {
                        northing_m: last_block.pose.northing_m,
                        easting_m: last_block.pose.easting_m,
                    });
                    let object_dem_m = resolve_ground_dem_m(ground, steps, last_block, dem_location);

                    let obs_first = BaselineObservation {
                        forward_down_deg: fwd_first,
                        drone_altitude_m: first_block.pose.altitude_m,
                        block_time_ms: first_block.input_frame_ms,
                    };
                    let obs_last = BaselineObservation {
                        forward_down_deg: fwd_last,
                        drone_altitude_m: last_block.pose.altitude_m,
                        block_time_ms: last_block.input_frame_ms,
                    };

                    match baseline_triangulate(
                        &obs_first,
                        &obs_last,
                        baseline_m,
                        object_dem_m,
                        object_min_duration_ms,
                    ) {
                        Ok(fix) => {
                            object.height_m = Some(fix.height_m);
                            object.height_err_m = Some(0.0);
                            object.min_height_m = Some(fix.height_m);
                            object.max_height_m = Some(fix.height_m);
                        }
                        Err(_) => {}
                    }
                }
            }
        }
    }

    if let (Some(location), Some(first_f), Some(last_f)) = (object.location_m, first, last) {
        if let (Some(first_block), Some(last_block)) =
            (blocks.get(first_f.block_id), blocks.get(last_f.block_id))
        {
            let platform_first = WorldLocation {
                northing_m: first_block.pose.northing_m,
                easting_m: first_block.pose.easting_m,
            };
            let platform_last = WorldLocation {
                northing_m: last_block.pose.northing_m,
                easting_m: last_block.pose.easting_m,
            };
            object.avg_range_m = Some(avg_range_m(&location, &platform_first, &platform_last));

            let ground_dem_m = resolve_ground_dem_m(ground, steps, last_block, location);
            let distance_down_m = (last_block.pose.altitude_m - ground_dem_m).max(0.0);
            object.size_cm2 = Some(size_cm2(cfg, object.max_real_hot_pixels, distance_down_m));
        }
    }
}
