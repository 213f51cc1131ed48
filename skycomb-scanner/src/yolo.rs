//! Yolo-mode frame scanner: turns detector bounding boxes into features,
//! optionally shrinking each box to the tight hull of its hot pixels
//! (spec.md §4.1 "Yolo mode").

use crate::comb::{is_over_sized, is_under_dense, significance_attributes};
use crate::error::ScannerError;
use crate::frame::{ColorFrame, MonoFrame};
use machine_vision_formats::ImageData;
use skycomb_types::{BlockId, Feature, FeatureId, FeatureType, PixelBox, PixelHeat, ScannerConfig};

/// One raw detector output: a box in pixel space plus the model's label
/// and confidence.
#[derive(Debug, Clone)]
pub struct YoloDetection {
    pub pixel_box: PixelBox,
    pub label: String,
    pub confidence: f32,
}

/// Scan the hot pixels strictly inside `detection.pixel_box`, clamped to
/// the frame. Returns `None` if the box contains no hot pixels at all.
fn hot_pixels_in_box(
    original: &ColorFrame,
    thresholded: &MonoFrame,
    block_id: BlockId,
    feature_id: FeatureId,
    pixel_box: &PixelBox,
) -> Option<(Vec<PixelHeat>, f32, f32, PixelBox)> {
    let w = thresholded.width();
    let h = thresholded.height();
    let x0 = pixel_box.x.min(w);
    let y0 = pixel_box.y.min(h);
    let x1 = (pixel_box.x + pixel_box.width).min(w);
    let y1 = (pixel_box.y + pixel_box.height).min(h);

    let mut pixels = Vec::new();
    let mut heat_min = f32::INFINITY;
    let mut heat_max = f32::NEG_INFINITY;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (x1, y1, x0, y0);

    for y in y0..y1 {
        for x in x0..x1 {
            if !thresholded.is_hot(x, y) {
                continue;
            }
            let heat = original.mean_channel(x, y);
            heat_min = heat_min.min(heat);
            heat_max = heat_max.max(heat);
            pixels.push(PixelHeat {
                block_id,
                feature_id,
                y,
                x,
                heat,
            });
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if pixels.is_empty() {
        None
    } else {
        let hull = PixelBox::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1);
        Some((pixels, heat_min, heat_max, hull))
    }
}

/// Build features from a set of detector boxes for one block.
///
/// `shrink_to_hull` replaces each detector box with the tight bounding box
/// of its own hot pixels (a detector's box is typically looser than the
/// thermal signature it found); when `false` the detector's box is used
/// as-is and heat statistics are still gathered from the pixels inside it.
pub fn scan_yolo(
    original: &ColorFrame,
    thresholded: &MonoFrame,
    block_id: BlockId,
    cfg: &ScannerConfig,
    detections: &[YoloDetection],
    shrink_to_hull: bool,
    mut next_feature_id: FeatureId,
) -> Result<(Vec<Feature>, FeatureId), ScannerError> {
    if original.width() != thresholded.width() || original.height() != thresholded.height() {
        return Err(ScannerError::InvalidFrame {
            block_id,
            orig_w: original.width(),
            orig_h: original.height(),
            thresh_w: thresholded.width(),
            thresh_h: thresholded.height(),
        });
    }

    let mut features = Vec::new();
    for detection in detections {
        let feature_id = next_feature_id;
        next_feature_id = next_feature_id.next();

        let found = hot_pixels_in_box(
            original,
            thresholded,
            block_id,
            feature_id,
            &detection.pixel_box,
        );
        let (pixels, heat_min, heat_max, hull) = match found {
            Some(v) => v,
            None => (Vec::new(), 0.0, 0.0, detection.pixel_box),
        };
        let pixel_box = if shrink_to_hull { hull } else { detection.pixel_box };
        let num_hot_pixels = pixels.len() as u32;
        let (significant, attributes) = significance_attributes(num_hot_pixels, &pixel_box, cfg);

        tracing::trace!(
            block_id = block_id.0,
            feature_id = feature_id.0,
            label = %detection.label,
            confidence = detection.confidence,
            %attributes,
            "yolo scanner emitted feature"
        );

        features.push(Feature {
            feature_id,
            block_id,
            feature_type: FeatureType::Real,
            pixel_box,
            pixels,
            heat_min,
            heat_max,
            num_hot_pixels,
            owner_object_id: None,
            significant,
            tracking_flag_viable: !is_over_sized(&pixel_box, cfg)
                && !is_under_dense(&pixel_box, num_hot_pixels, cfg),
            world_location: None,
            above_ground_height_m: None,
            height_algorithm: None,
            label: Some(detection.label.clone()),
            confidence: Some(detection.confidence),
        });
    }

    Ok((features, next_feature_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono_from_hot(w: u32, h: u32, hot: &[(u32, u32)]) -> MonoFrame {
        let mut data = vec![0u8; (w * h) as usize];
        for &(x, y) in hot {
            data[(y * w + x) as usize] = 255;
        }
        MonoFrame::new(w, h, data)
    }

    fn uniform_color(w: u32, h: u32, value: u8) -> ColorFrame {
        ColorFrame::new(w, h, vec![value; (w * h * 3) as usize])
    }

    fn cfg() -> ScannerConfig {
        ScannerConfig {
            feature_min_pixels: 4,
            feature_max_size: 50,
            feature_min_density_pct: 0.1,
            feature_min_overlap_pct: 0.10,
        }
    }

    #[test]
    fn shrink_to_hull_tightens_a_loose_detector_box() {
        let mut hot = Vec::new();
        for y in 20..23 {
            for x in 20..23 {
                hot.push((x, y));
            }
        }
        let thresh = mono_from_hot(64, 64, &hot);
        let color = uniform_color(64, 64, 200);
        let detections = vec![YoloDetection {
            pixel_box: PixelBox::new(10, 10, 30, 30),
            label: "drone".to_string(),
            confidence: 0.9,
        }];
        let (features, _) =
            scan_yolo(&color, &thresh, BlockId(1), &cfg(), &detections, true, FeatureId(0)).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].pixel_box, PixelBox::new(20, 20, 3, 3));
        assert_eq!(features[0].num_hot_pixels, 9);
    }

    #[test]
    fn without_shrink_the_detector_box_is_kept_verbatim() {
        let mut hot = Vec::new();
        for y in 20..23 {
            for x in 20..23 {
                hot.push((x, y));
            }
        }
        let thresh = mono_from_hot(64, 64, &hot);
        let color = uniform_color(64, 64, 200);
        let detections = vec![YoloDetection {
            pixel_box: PixelBox::new(10, 10, 30, 30),
            label: "drone".to_string(),
            confidence: 0.9,
        }];
        let (features, _) = scan_yolo(
            &color, &thresh, BlockId(1), &cfg(), &detections, false, FeatureId(0),
        )
        .unwrap();
        assert_eq!(features[0].pixel_box, PixelBox::new(10, 10, 30, 30));
    }

    #[test]
    fn empty_box_yields_zero_hot_pixels() {
        let thresh = mono_from_hot(64, 64, &[]);
        let color = uniform_color(64, 64, 10);
        let detections = vec![YoloDetection {
            pixel_box: PixelBox::new(5, 5, 5, 5),
            label: "none".to_string(),
            confidence: 0.1,
        }];
        let (features, _) =
            scan_yolo(&color, &thresh, BlockId(1), &cfg(), &detections, true, FeatureId(0)).unwrap();
        assert_eq!(features[0].num_hot_pixels, 0);
        assert!(!features[0].significant);
    }
}
