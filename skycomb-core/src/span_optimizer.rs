//! Closes a Span at a leg boundary (spec.md §4.4): runs the attitude
//! search or the per-object triangulation mode, then commits the result
//! if it clears `SpanConfig::min_improvement_m`.

use nalgebra::Vector3;
use skycomb_geometry::{flat_ground_location, image_fractions, location_mean_and_err, sight_ray, GroundSource};
use skycomb_types::{
    AttitudeCorrection, BlockId, Feature, FeatureId, GeometryConfig, ObjectId, PlatformPose, Span,
    SpanConfig, SpanId, WorldLocation,
};

use crate::arena::{Blocks, Features, Objects, Spans, Steps};
use crate::locate;
use crate::span::{search_attitude_correction, triangulate, RayObservation};

/// Gather the ids of every significant object with at least one Real
/// feature in `[min_block_id, max_block_id]`, plus that range's step and
/// aggregate-error bounds. Returns `None` if nothing qualifies.
fn span_scope(
    blocks: &Blocks,
    features: &Features,
    objects: &Objects,
    min_block_id: BlockId,
    max_block_id: BlockId,
) -> Option<(Vec<ObjectId>, BlockId, BlockId, f64, f64)> {
    let in_range = |f: &Feature| f.is_real() && f.block_id >= min_block_id && f.block_id <= max_block_id;

    let object_ids: Vec<ObjectId> = objects
        .iter()
        .filter(|o| o.significant)
        .filter(|o| o.features.iter().filter_map(|&fid| features.get(fid)).any(in_range))
        .map(|o| o.object_id)
        .collect();
    if object_ids.is_empty() {
        return None;
    }

    let (min_step, max_step) = blocks
        .iter()
        .filter(|b| b.block_id >= min_block_id && b.block_id <= max_block_id)
        .map(|b| b.nearest_step_id)
        .fold(None, |acc, step| match acc {
            None => Some((step, step)),
            Some((lo, hi)) => Some((lo.min(step), hi.max(step))),
        })?;

    let org_location_err: f64 = object_ids
        .iter()
        .filter_map(|&id| objects.get(id))
        .filter_map(|o| o.location_err_m)
        .sum();
    let org_height_err: f64 = object_ids
        .iter()
        .filter_map(|&id| objects.get(id))
        .filter_map(|o| o.height_err_m)
        .sum();

    Some((object_ids, min_step, max_step, org_location_err, org_height_err))
}

fn real_feature_ids_for(
    objects: &Objects,
    features: &Features,
    ids: &[ObjectId],
    min_block_id: BlockId,
    max_block_id: BlockId,
) -> Vec<FeatureId> {
    ids.iter()
        .filter_map(|&id| objects.get(id))
        .flat_map(|o| o.features.iter().copied())
        .filter(|&fid| {
            features
                .get(fid)
                .map(|f| f.is_real() && f.block_id >= min_block_id && f.block_id <= max_block_id)
                .unwrap_or(false)
        })
        .collect()
}

fn adjust_pose(pose: &PlatformPose, correction: &AttitudeCorrection) -> PlatformPose {
    PlatformPose {
        altitude_m: pose.altitude_m + correction.fix_alt_m,
        yaw_deg: pose.yaw_deg + correction.fix_yaw_deg,
        camera_to_vertical_forward_deg: pose.camera_to_vertical_forward_deg + correction.fix_pitch_deg,
        ..*pose
    }
}

/// Cheap flat-ground-only cost used while searching: recomputes every
/// in-range Real feature's location under a trial correction and sums
/// each touched object's location scatter.
fn attitude_cost(
    blocks: &Blocks,
    features: &Features,
    object_ids: &[ObjectId],
    objects: &Objects,
    geometry: &GeometryConfig,
    correction: &AttitudeCorrection,
) -> f64 {
    let hfov_cfg;
    let geometry = if let Some(hfov) = correction.hfov_deg {
        hfov_cfg = GeometryConfig { hfov_deg: hfov, ..geometry.clone() };
        &hfov_cfg
    } else {
        geometry
    };

    let mut total = 0.0;
    for &object_id in object_ids {
        let Some(object) = objects.get(object_id) else { continue };
        let mut locations = Vec::new();
        for &fid in &object.features {
            let Some(f) = features.get(fid) else { continue };
            if !f.is_real() {
                continue;
            }
            let Some(block) = blocks.get(f.block_id) else { continue };
            let pose = adjust_pose(&block.pose, correction);
            let (cx, cy) = f.pixel_box.center();
            let (xf, yf) = image_fractions(cx, cy, geometry.image_width, geometry.image_height);
            let ray = sight_ray(xf, yf, geometry, &pose);
            let ground_dem_m = block.input_image_dem_m.unwrap_or(0.0);
            if let Ok(fix) = flat_ground_location(&pose, &ray, ground_dem_m) {
                locations.push(fix.location);
            }
        }
        if let Some((_, err)) = location_mean_and_err(&locations) {
            total += err * err;
        }
    }
    total
}

#[allow(clippy::too_many_arguments)]
fn run_attitude_search(
    blocks: &mut Blocks,
    features: &mut Features,
    objects: &mut Objects,
    steps: &Steps,
    object_ids: &[ObjectId],
    geometry: &GeometryConfig,
    span_cfg: &SpanConfig,
    object_min_duration_ms: i64,
    ground: &dyn GroundSource,
    min_block_id: BlockId,
    max_block_id: BlockId,
) -> (AttitudeCorrection, f64) {
    let (best, best_cost) = {
        let blocks_ref: &Blocks = blocks;
        let features_ref: &Features = features;
        let objects_ref: &Objects = objects;
        search_attitude_correction(span_cfg, None, |candidate| {
            attitude_cost(blocks_ref, features_ref, object_ids, objects_ref, geometry, candidate)
        })
    };

    if best_cost.sqrt() < span_cfg.min_improvement_m {
        tracing::debug!(
            rms_m = best_cost.sqrt(),
            min_improvement_m = span_cfg.min_improvement_m,
            "attitude correction below improvement threshold, not committed"
        );
        return (AttitudeCorrection::default(), best_cost);
    }
    tracing::info!(
        ?min_block_id,
        ?max_block_id,
        rms_m = best_cost.sqrt(),
        fix_alt_m = best.fix_alt_m,
        fix_yaw_deg = best.fix_yaw_deg,
        fix_pitch_deg = best.fix_pitch_deg,
        "attitude correction committed"
    );

    for block in blocks.iter_mut() {
        if block.block_id >= min_block_id && block.block_id <= max_block_id {
            block.pose = adjust_pose(&block.pose, &best);
        }
    }

    let adjusted_geometry = match best.hfov_deg {
        Some(hfov) => GeometryConfig { hfov_deg: hfov, ..geometry.clone() },
        None => geometry.clone(),
    };
    let touched = real_feature_ids_for(objects, features, object_ids, min_block_id, max_block_id);
    locate::locate_block(blocks, features, objects, steps, &adjusted_geometry, ground, object_min_duration_ms, &touched);

    (best, best_cost)
}

fn run_triangulation(
    blocks: &Blocks,
    features: &Features,
    objects: &mut Objects,
    object_ids: &[ObjectId],
    geometry: &GeometryConfig,
) {
    for &object_id in object_ids {
        let rays: Vec<RayObservation> = {
            let Some(object) = objects.get(object_id) else { continue };
            object
                .features
                .iter()
                .filter_map(|&fid| features.get(fid))
                .filter(|f| f.is_real())
                .filter_map(|f| {
                    let block = blocks.get(f.block_id)?;
                    let (cx, cy) = f.pixel_box.center();
                    let (xf, yf) = image_fractions(cx, cy, geometry.image_width, geometry.image_height);
                    let ray = sight_ray(xf, yf, geometry, &block.pose);
                    Some(RayObservation {
                        origin: Vector3::new(block.pose.northing_m, block.pose.easting_m, block.pose.altitude_m),
                        direction: ray.direction,
                    })
                })
                .collect()
        };
        if rays.len() < 2 {
            continue;
        }
        let seed = {
            let object = objects.get(object_id).unwrap();
            match object.location_m {
                Some(loc) => Vector3::new(loc.northing_m, loc.easting_m, 0.0),
                None => Vector3::new(rays[0].origin.x, rays[0].origin.y, 0.0),
            }
        };
        if let Ok((point, rms)) = triangulate(&rays, seed) {
            if let Some(object) = objects.get_mut(object_id) {
                object.location_m = Some(WorldLocation { northing_m: point.x, easting_m: point.y });
                object.location_err_m = Some(rms);
                object.height_m = Some(point.z);
                object.height_err_m = Some(rms);
            }
        }
    }
}

/// Close a span over `[min_block_id, max_block_id]`: search for (or fit)
/// a pose correction, commit it if it clears `min_improvement_m`, and
/// return the audit record. `None` when no significant object falls in
/// range.
#[allow(clippy::too_many_arguments)]
pub fn close_span(
    blocks: &mut Blocks,
    features: &mut Features,
    objects: &mut Objects,
    spans: &mut Spans,
    steps: &Steps,
    geometry: &GeometryConfig,
    span_cfg: &SpanConfig,
    object_min_duration_ms: i64,
    ground: &dyn GroundSource,
    min_block_id: BlockId,
    max_block_id: BlockId,
    next_span_id: &mut SpanId,
) -> Option<Span> {
    let (object_ids, min_step_id, max_step_id, org_location_err, org_height_err) =
        span_scope(blocks, features, objects, min_block_id, max_block_id)?;

    let best_correction;
    let best_location_err;
    let best_height_err;

    if span_cfg.triangulation_mode {
        run_triangulation(blocks, features, objects, &object_ids, geometry);
        best_correction = AttitudeCorrection::default();
        best_location_err = object_ids.iter().filter_map(|&id| objects.get(id)).filter_map(|o| o.location_err_m).sum();
        best_height_err = object_ids.iter().filter_map(|&id| objects.get(id)).filter_map(|o| o.height_err_m).sum();
    } else {
        let (corr, _cost) = run_attitude_search(
            blocks,
            features,
            objects,
            steps,
            &object_ids,
            geometry,
            span_cfg,
            object_min_duration_ms,
            ground,
            min_block_id,
            max_block_id,
        );
        best_correction = corr;
        best_location_err = object_ids.iter().filter_map(|&id| objects.get(id)).filter_map(|o| o.location_err_m).sum();
        best_height_err = object_ids.iter().filter_map(|&id| objects.get(id)).filter_map(|o| o.height_err_m).sum();
    }

    let span_id = *next_span_id;
    *next_span_id = next_span_id.next();

    let span = Span {
        span_id,
        min_step_id,
        max_step_id,
        min_block_id,
        max_block_id,
        best_correction,
        best_sum_location_err_m: best_location_err,
        best_sum_height_err_m: best_height_err,
        org_sum_location_err_m: org_location_err,
        org_sum_height_err_m: org_height_err,
        num_significant_objects: object_ids.len() as u32,
    };
    tracing::info!(
        span_id = span.span_id.0,
        ?min_block_id,
        ?max_block_id,
        num_significant_objects = span.num_significant_objects,
        org_location_err = span.org_sum_location_err_m,
        best_location_err = span.best_sum_location_err_m,
        "span closed"
    );
    spans.push(span.clone());
    Some(span)
}
