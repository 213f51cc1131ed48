//! Temporal tracker: turns each block's fresh Real features into claims on
//! existing objects, fragments consumed into the winning claim, new seeds,
//! and Unreal placeholders bridging occlusion gaps (spec.md §4.2).

use skycomb_types::{
    BlockId, Feature, FeatureId, FeatureType, HeightAlgorithm, Object, ObjectId, ObjectState,
    PixelBox, TrackerConfig,
};

use crate::arena::{Blocks, Features, Objects};
use crate::error::CoreError;

/// One notable thing the tracker did to a block's features, used for the
/// run summary report and for `tracing` breadcrumbs.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackEvent {
    Claimed { object_id: ObjectId, feature_id: FeatureId },
    Consumed { feature_id: FeatureId, by_feature_id: FeatureId },
    Seeded { object_id: ObjectId, feature_id: FeatureId },
    UnrealAdded { object_id: ObjectId, feature_id: FeatureId },
    Killed { object_id: ObjectId },
}

fn last_real_feature<'a>(object: &Object, features: &'a Features) -> Option<&'a Feature> {
    let idx = object.last_real_feature_idx?;
    let feature_id = *object.features.get(idx)?;
    features.get(feature_id)
}

/// The pixel-box an object is expected to occupy in the next block (spec
/// §4.2): project the last Real feature's center forward by the object's
/// average per-block velocity `(last.center − first.center) / blocks_spanned`,
/// inflate to the object's max historical size, then pad by 5px of jitter
/// tolerance before comparing against candidate boxes.
fn expected_box(object: &Object, features: &Features) -> Option<PixelBox> {
    let last = last_real_feature(object, features)?;
    let first_id = *object.features.first()?;
    let first = features.get(first_id)?;

    let (lcx, lcy) = last.pixel_box.center();
    let (fcx, fcy) = first.pixel_box.center();
    let last_idx = object.last_real_feature_idx?;
    let blocks_spanned = (last_idx as f64).max(1.0);
    let vx = (lcx - fcx) / blocks_spanned;
    let vy = (lcy - fcy) / blocks_spanned;

    let cx = lcx + vx;
    let cy = lcy + vy;
    let half_w = (object.max_real_pixel_width.max(last.pixel_box.width) as f64) / 2.0;
    let half_h = (object.max_real_pixel_height.max(last.pixel_box.height) as f64) / 2.0;
    let x = (cx - half_w).max(0.0) as u32;
    let y = (cy - half_h).max(0.0) as u32;
    let w = (half_w * 2.0).round().max(1.0) as u32;
    let h = (half_h * 2.0).round().max(1.0) as u32;

    Some(PixelBox::new(x, y, w, h).inflate(5))
}

/// `true` iff `feature` clears the tracker's (object-level) per-block
/// significance bar, distinct from the scanner's own `Feature::significant`
/// (which only gates whether a blob is a usable detection at all).
fn meets_object_significance(feature: &Feature, cfg: &TrackerConfig) -> bool {
    feature.num_hot_pixels >= cfg.object_min_pixels_per_block
        && feature.density_pct() >= cfg.object_min_density_pct
}

fn object_duration_ms(object: &Object, features: &Features, blocks: &Blocks) -> Option<i64> {
    let first_id = *object.features.first()?;
    let last_idx = object.last_real_feature_idx?;
    let last_id = *object.features.get(last_idx)?;
    let first_block = blocks.get(features.get(first_id)?.block_id)?;
    let last_block = blocks.get(features.get(last_id)?.block_id)?;
    Some(last_block.input_frame_ms - first_block.input_frame_ms)
}

fn object_attributes(object: &Object, duration_ms: Option<i64>, cfg: &TrackerConfig) -> String {
    if object.significant {
        return "Yes".to_string();
    }
    let mut reasons = String::new();
    if object.num_sig_blocks == 0 {
        reasons.push_str("pix");
    }
    match duration_ms {
        Some(ms) if ms < cfg.object_min_duration_ms => {
            if !reasons.is_empty() {
                reasons.push(',');
            }
            reasons.push_str("dur");
        }
        _ => {}
    }
    if reasons.is_empty() {
        "No".to_string()
    } else {
        format!("No: {reasons}")
    }
}

/// Apply one block's worth of tracking: claim/consume/seed/persist, in
/// that order, against every currently-tracked object plus the block's
/// freshly-scanned Real features.
///
/// `next_object_id` is advanced past every id this call assigns.
/// `next_feature_id` is the same counter the scanner draws Real feature
/// ids from; Unreal placeholders are synthesized here and pushed into the
/// same `Features` arena, so they draw from it too — the arena's
/// vec-index-equals-id invariant only holds if every feature, Real or
/// Unreal, comes from one contiguous counter.
#[allow(clippy::too_many_arguments)]
pub fn process_block(
    objects: &mut Objects,
    features: &mut Features,
    blocks: &Blocks,
    block_id: BlockId,
    new_real_feature_ids: &[FeatureId],
    cfg: &TrackerConfig,
    min_overlap_pct: f64,
    next_object_id: &mut ObjectId,
    next_feature_id: &mut FeatureId,
) -> Result<Vec<TrackEvent>, CoreError> {
    let mut events = Vec::new();
    let mut available: Vec<FeatureId> = new_real_feature_ids.to_vec();
    let mut claimed_this_block: Vec<(ObjectId, FeatureId)> = Vec::new();

    // --- Claim + unreal-persistence pass, in ascending object id order. ---
    let object_ids: Vec<ObjectId> = objects.iter().map(|o| o.object_id).collect();
    for object_id in object_ids {
        let (is_tracked, exp_box, object_significant, last_viable) = {
            let object = objects
                .get(object_id)
                .ok_or(CoreError::UnknownObject { object_id })?;
            let last_viable = last_real_feature(object, features)
                .map(|f| f.tracking_flag_viable)
                .unwrap_or(false);
            (
                object.being_tracked && object.state != ObjectState::Dead,
                expected_box(object, features),
                object.significant,
                last_viable,
            )
        };
        if !is_tracked {
            continue;
        }
        let Some(exp_box) = exp_box else { continue };

        // spec §4.2 step 3: overlap alone isn't enough to claim — either
        // side must already be significant, and neither the candidate nor
        // the object's last feature may have failed the over-size/
        // under-density viability gate.
        let mut best: Option<(FeatureId, f64)> = None;
        for &cand_id in &available {
            let cand = features.get(cand_id).expect("scanned feature missing from arena");
            let overlap = exp_box.overlap_pct(&cand.pixel_box);
            if overlap < min_overlap_pct {
                continue;
            }
            if !(cand.significant || object_significant) {
                continue;
            }
            if !cand.tracking_flag_viable || !last_viable {
                continue;
            }
            if best.map(|(_, b)| overlap > b).unwrap_or(true) {
                best = Some((cand_id, overlap));
            }
        }

        if let Some((feature_id, _)) = best {
            available.retain(|&id| id != feature_id);
            claimed_this_block.push((object_id, feature_id));

            if cfg.focus_object_id == Some(object_id) {
                tracing::debug!(?block_id, ?object_id, ?feature_id, "focus object claimed a feature");
            }

            let feature = features.get_mut(feature_id).expect("claimed feature vanished");
            feature.owner_object_id = Some(object_id);

            let object = objects.get_mut(object_id).expect("object vanished mid-claim");
            object.features.push(feature_id);
            object.last_real_feature_idx = Some(object.features.len() - 1);
            object.unreal_blocks_remaining = cfg.object_max_unreal_blocks;
            object.max_real_hot_pixels = object.max_real_hot_pixels.max(feature.num_hot_pixels);
            object.max_real_pixel_width = object.max_real_pixel_width.max(feature.pixel_box.width);
            object.max_real_pixel_height = object.max_real_pixel_height.max(feature.pixel_box.height);
            object.max_heat = object.max_heat.max(feature.heat_max);
            if object.state == ObjectState::Seeded && object.features.len() >= 2 {
                object.state = ObjectState::Tentative;
            }
            if meets_object_significance(feature, cfg) {
                object.num_sig_blocks += 1;
            }

            events.push(TrackEvent::Claimed { object_id, feature_id });
        } else {
            let object = objects.get_mut(object_id).expect("object vanished mid-claim");
            if object.unreal_blocks_remaining > 0 {
                object.unreal_blocks_remaining -= 1;
                let last_real = object
                    .features
                    .get(object.last_real_feature_idx.expect("tracked object always has a real feature"))
                    .copied()
                    .expect("last real feature index out of range");
                let last_real_feature = features.get(last_real).expect("dangling last-real reference").clone();

                let unreal_id = *next_feature_id;
                *next_feature_id = next_feature_id.next();
                let unreal = Feature {
                    feature_id: unreal_id,
                    block_id,
                    feature_type: FeatureType::Unreal,
                    pixel_box: last_real_feature.pixel_box,
                    pixels: Vec::new(),
                    heat_min: 0.0,
                    heat_max: 0.0,
                    num_hot_pixels: 0,
                    owner_object_id: Some(object_id),
                    significant: false,
                    tracking_flag_viable: last_real_feature.tracking_flag_viable,
                    world_location: last_real_feature.world_location,
                    above_ground_height_m: last_real_feature.above_ground_height_m,
                    height_algorithm: Some(HeightAlgorithm::Copy),
                    label: None,
                    confidence: None,
                };
                features.push(unreal.clone());
                object.features.push(unreal_id);
                events.push(TrackEvent::UnrealAdded { object_id, feature_id: unreal_id });
            } else {
                if object.significant && object.state.can_advance_to(ObjectState::Fading) {
                    object.state = ObjectState::Fading;
                }
                object.kill();
                tracing::debug!(?block_id, ?object_id, significant = object.significant, "object killed");
                events.push(TrackEvent::Killed { object_id });
            }
        }

        let duration_ms = objects.get(object_id).and_then(|o| object_duration_ms(o, features, blocks));
        let object = objects.get_mut(object_id).expect("object vanished before attribute update");
        if !object.significant {
            if let Some(ms) = duration_ms {
                // Count + Density, already folded into `num_sig_blocks`
                // (spec §4.2: each block that clears both bars increments
                // it); Time is the duration check below; Composite is the
                // fourth, OR'd criterion.
                let count = object.max_real_hot_pixels;
                let density = if object.max_real_pixel_width > 0 && object.max_real_pixel_height > 0 {
                    count as f64 / (object.max_real_pixel_width as f64 * object.max_real_pixel_height as f64)
                } else {
                    0.0
                };
                let elevation_m = object.height_m.unwrap_or(0.0);
                let composite = elevation_m > 4.0
                    || count as f64 > 4.0 * cfg.object_min_pixels_per_block as f64
                    || density > 2.0 * cfg.object_min_density_pct
                    || (count as f64 > 2.0 * cfg.object_min_pixels_per_block as f64
                        && density > 1.5 * cfg.object_min_density_pct);

                if object.num_sig_blocks >= 1 && ms >= cfg.object_min_duration_ms && composite {
                    object.significant = true;
                    if object.state.can_advance_to(ObjectState::Significant) {
                        object.state = ObjectState::Significant;
                    }
                    // Back-fill: every feature this object already owns
                    // carries significant = true too (spec §8).
                    for &fid in object.features.iter() {
                        if let Some(f) = features.get_mut(fid) {
                            f.significant = true;
                        }
                    }
                    tracing::info!(?block_id, ?object_id, duration_ms = ms, "object became significant");
                }
            }
        }
        object.attributes = object_attributes(object, duration_ms, cfg);
    }

    // --- Consume pass: leftover unclaimed boxes that overlap a claim this
    // block are fragments of the same blob, not independent detections. ---
    let mut consumed = Vec::new();
    for &cand_id in &available {
        let cand = features.get(cand_id).unwrap();
        if let Some(&(_, claimed_feature_id)) = claimed_this_block.iter().find(|(_, fid)| {
            let claimed_box = features.get(*fid).unwrap().pixel_box;
            claimed_box.overlap_pct(&cand.pixel_box) >= min_overlap_pct
        }) {
            consumed.push((cand_id, claimed_feature_id));
        }
    }
    for (cand_id, by_feature_id) in &consumed {
        available.retain(|&id| id != *cand_id);

        // Fold the fragment's pixels into the winner before clearing it
        // (spec §4.2 step 4): concatenate the pixel set and grow the
        // winner's box to the bounding union of both.
        let (cand_pixels, cand_box, cand_heat_min, cand_heat_max, cand_hot) = {
            let cand = features.get(*cand_id).unwrap();
            (cand.pixels.clone(), cand.pixel_box, cand.heat_min, cand.heat_max, cand.num_hot_pixels)
        };
        if let Some(winner) = features.get_mut(*by_feature_id) {
            winner.pixel_box = winner.pixel_box.union(&cand_box);
            winner.pixels.extend(cand_pixels);
            winner.num_hot_pixels += cand_hot;
            winner.heat_min = winner.heat_min.min(cand_heat_min);
            winner.heat_max = winner.heat_max.max(cand_heat_max);
        }

        let f = features.get_mut(*cand_id).unwrap();
        f.feature_type = FeatureType::Consumed;
        f.pixels.clear();
        events.push(TrackEvent::Consumed { feature_id: *cand_id, by_feature_id: *by_feature_id });
    }

    // --- Seed pass: whatever remains and is scanner-significant starts a
    // brand-new object. ---
    for feature_id in available {
        let significant = features.get(feature_id).unwrap().significant;
        if !significant {
            continue;
        }
        let object_id = *next_object_id;
        *next_object_id = next_object_id.next();
        features.get_mut(feature_id).unwrap().owner_object_id = Some(object_id);
        objects.push(Object::new(object_id, feature_id, cfg.object_max_unreal_blocks));
        tracing::trace!(?block_id, ?object_id, ?feature_id, "object seeded");
        events.push(TrackEvent::Seeded { object_id, feature_id });
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycomb_types::{Block, FeatureType, PixelBox, PlatformPose, StepId};

    fn cfg() -> TrackerConfig {
        TrackerConfig {
            object_min_duration_ms: 100,
            object_min_pixels_per_block: 5,
            object_min_density_pct: 0.2,
            object_max_unreal_blocks: 2,
            focus_object_id: None,
        }
    }

    fn pose() -> PlatformPose {
        PlatformPose {
            northing_m: 0.0,
            easting_m: 0.0,
            altitude_m: 100.0,
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            roll_deg: 0.0,
            camera_to_vertical_forward_deg: 0.0,
        }
    }

    fn push_block(blocks: &mut Blocks, id: u32, ms: i64) -> BlockId {
        blocks.push(Block {
            block_id: BlockId(id),
            input_frame_id: id as u64,
            input_frame_ms: ms,
            frame_ms_reset: false,
            pose: pose(),
            nearest_step_id: StepId(0),
            step_interp_weights: (1.0, 0.0),
            sum_lineal_m: id as f64,
            input_image_dem_m: Some(0.0),
            has_leg: true,
        })
    }

    fn real_feature(id: u32, block_id: u32, pb: PixelBox, hot: u32) -> Feature {
        Feature {
            feature_id: FeatureId(id),
            block_id: BlockId(block_id),
            feature_type: FeatureType::Real,
            pixel_box: pb,
            pixels: vec![],
            heat_min: 10.0,
            heat_max: 20.0,
            num_hot_pixels: hot,
            owner_object_id: None,
            significant: true,
            tracking_flag_viable: true,
            world_location: None,
            above_ground_height_m: None,
            height_algorithm: None,
            label: None,
            confidence: None,
        }
    }

    #[test]
    fn first_block_seeds_an_object_for_every_significant_feature() {
        let mut objects = Objects::new();
        let mut features = Features::new();
        let mut blocks = Blocks::new();
        let block_id = push_block(&mut blocks, 0, 0);
        let fid = features.push(real_feature(0, 0, PixelBox::new(10, 10, 3, 3), 9));

        let mut next_object_id = ObjectId(0);
        let mut next_feature_id = FeatureId(features.len() as u32);
        let events = process_block(
            &mut objects,
            &mut features,
            &blocks,
            block_id,
            &[fid],
            &cfg(),
            0.10,
            &mut next_object_id,
            &mut next_feature_id,
        )
        .unwrap();

        assert_eq!(events, vec![TrackEvent::Seeded { object_id: ObjectId(0), feature_id: fid }]);
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn overlapping_feature_in_next_block_is_claimed_not_reseeded() {
        let mut objects = Objects::new();
        let mut features = Features::new();
        let mut blocks = Blocks::new();
        let mut next_object_id = ObjectId(0);

        let b0 = push_block(&mut blocks, 0, 0);
        let f0 = features.push(real_feature(0, 0, PixelBox::new(10, 10, 4, 4), 16));
        let mut next_feature_id = FeatureId(features.len() as u32);
        process_block(&mut objects, &mut features, &blocks, b0, &[f0], &cfg(), 0.10, &mut next_object_id, &mut next_feature_id).unwrap();

        let b1 = push_block(&mut blocks, 1, 40);
        let f1 = features.push(real_feature(1, 1, PixelBox::new(11, 11, 4, 4), 16));
        next_feature_id = FeatureId(features.len() as u32);
        let events = process_block(&mut objects, &mut features, &blocks, b1, &[f1], &cfg(), 0.10, &mut next_object_id, &mut next_feature_id).unwrap();

        assert_eq!(events, vec![TrackEvent::Claimed { object_id: ObjectId(0), feature_id: f1 }]);
        assert_eq!(objects.get(ObjectId(0)).unwrap().features, vec![f0, f1]);
    }

    #[test]
    fn unclaimed_object_gets_an_unreal_placeholder_then_dies_after_budget() {
        let mut objects = Objects::new();
        let mut features = Features::new();
        let mut blocks = Blocks::new();
        let mut next_object_id = ObjectId(0);

        let b0 = push_block(&mut blocks, 0, 0);
        let f0 = features.push(real_feature(0, 0, PixelBox::new(10, 10, 4, 4), 16));
        let mut next_feature_id = FeatureId(features.len() as u32);
        process_block(&mut objects, &mut features, &blocks, b0, &[f0], &cfg(), 0.10, &mut next_object_id, &mut next_feature_id).unwrap();

        // object_max_unreal_blocks == 2: two empty blocks survive, the
        // third kills it.
        for i in 1..=3u32 {
            let b = push_block(&mut blocks, i, i as i64 * 40);
            let events = process_block(&mut objects, &mut features, &blocks, b, &[], &cfg(), 0.10, &mut next_object_id, &mut next_feature_id).unwrap();
            if i <= 2 {
                assert!(matches!(events[0], TrackEvent::UnrealAdded { .. }), "block {i}");
            } else {
                assert!(matches!(events[0], TrackEvent::Killed { .. }), "block {i}");
            }
        }
        assert!(!objects.get(ObjectId(0)).unwrap().being_tracked);
        assert_eq!(objects.get(ObjectId(0)).unwrap().state, ObjectState::Dead);
    }

    #[test]
    fn object_becomes_significant_once_duration_and_pixel_bar_are_cleared() {
        let mut objects = Objects::new();
        let mut features = Features::new();
        let mut blocks = Blocks::new();
        let mut next_object_id = ObjectId(0);

        let b0 = push_block(&mut blocks, 0, 0);
        let f0 = features.push(real_feature(0, 0, PixelBox::new(10, 10, 4, 4), 16));
        let mut next_feature_id = FeatureId(features.len() as u32);
        process_block(&mut objects, &mut features, &blocks, b0, &[f0], &cfg(), 0.10, &mut next_object_id, &mut next_feature_id).unwrap();
        assert!(!objects.get(ObjectId(0)).unwrap().significant);

        let b1 = push_block(&mut blocks, 1, 150);
        let f1 = features.push(real_feature(1, 1, PixelBox::new(11, 11, 4, 4), 16));
        next_feature_id = FeatureId(features.len() as u32);
        process_block(&mut objects, &mut features, &blocks, b1, &[f1], &cfg(), 0.10, &mut next_object_id, &mut next_feature_id).unwrap();

        let object = objects.get(ObjectId(0)).unwrap();
        assert!(object.significant);
        assert_eq!(object.state, ObjectState::Significant);
        assert_eq!(object.attributes, "Yes");
    }
}
