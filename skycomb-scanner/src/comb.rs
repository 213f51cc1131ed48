//! Comb-mode frame scanner: groups hot pixels into per-frame features
//! under density and size constraints, with an expanding/shrinking flood
//! (spec.md §4.1).

use crate::error::ScannerError;
use crate::frame::{ColorFrame, MonoFrame};
use machine_vision_formats::ImageData;
use skycomb_types::{BlockId, Feature, FeatureId, FeatureType, PixelBox, PixelHeat, ScannerConfig};

/// `true` iff `feature`'s pixel-box is over-sized (width or height exceeds
/// `feature_max_size`) (spec §4.1 step 4).
pub fn is_over_sized(pixel_box: &PixelBox, cfg: &ScannerConfig) -> bool {
    pixel_box.width > cfg.feature_max_size || pixel_box.height > cfg.feature_max_size
}

/// `true` iff `num_hot_pixels / area < feature_min_density_pct`.
pub fn is_under_dense(pixel_box: &PixelBox, num_hot_pixels: u32, cfg: &ScannerConfig) -> bool {
    let area = pixel_box.area();
    if area == 0 {
        return true;
    }
    (num_hot_pixels as f64 / area as f64) < cfg.feature_min_density_pct
}

/// A feature is significant iff it has enough hot pixels AND passes the
/// density check (spec §4.1 "Significance").
pub fn significance_attributes(
    num_hot_pixels: u32,
    pixel_box: &PixelBox,
    cfg: &ScannerConfig,
) -> (bool, String) {
    let pixels_ok = num_hot_pixels >= cfg.feature_min_pixels;
    let density_ok = !is_under_dense(pixel_box, num_hot_pixels, cfg);
    if pixels_ok && density_ok {
        (true, "Yes".to_string())
    } else {
        let mut reasons = String::new();
        if !pixels_ok {
            reasons.push('p');
        }
        if !density_ok {
            reasons.push('d');
        }
        (false, format!("No: {reasons}"))
    }
}

struct FloodState {
    feature_id: FeatureId,
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
    num_hot_pixels: u32,
    heat_min: f32,
    heat_max: f32,
    pixels: Vec<PixelHeat>,
}

impl FloodState {
    fn pixel_box(&self) -> PixelBox {
        PixelBox::new(
            self.min_x,
            self.min_y,
            self.max_x - self.min_x + 1,
            self.max_y - self.min_y + 1,
        )
    }
}

/// Flood one new feature starting at the first unvisited hot pixel
/// `(start_x, start_y)`, per spec §4.1's row-by-row expanding/contracting
/// window. Marks every cell it scans into `visited`. Stops growing as
/// soon as the accumulated box becomes over-sized or under-dense (spec
/// §4.1 step 4), not just when a row turns up no hot pixels.
#[allow(clippy::too_many_arguments)]
fn flood_feature(
    original: &ColorFrame,
    thresholded: &MonoFrame,
    visited: &mut [bool],
    start_x: u32,
    start_y: u32,
    block_id: BlockId,
    feature_id: FeatureId,
    cfg: &ScannerConfig,
) -> FloodState {
    let w = thresholded.width();
    let h = thresholded.height();
    let mut state = FloodState {
        feature_id,
        min_x: start_x,
        max_x: start_x,
        min_y: start_y,
        max_y: start_y,
        num_hot_pixels: 0,
        heat_min: f32::INFINITY,
        heat_max: f32::NEG_INFINITY,
        pixels: Vec::new(),
    };

    // Per-row window offsets relative to start_x; signed so "from" can walk
    // left past start_x and "to" can shrink past zero.
    let mut from: i64 = 0;
    let mut to: i64 = 3;

    for y in start_y..h {
        // 1. Expand-left.
        loop {
            let c = start_x as i64 + from;
            if c <= 0 {
                break;
            }
            if !thresholded.is_hot(c as u32, y) {
                break;
            }
            from -= 1;
        }

        let col_end = (start_x as i64 + to).min(w as i64);
        let col_start = start_x as i64 + from;

        let mut row_hot_count = 0u32;
        if col_start < col_end {
            for c in col_start..col_end {
                let cu = c as u32;
                let idx = (y as usize) * (w as usize) + cu as usize;
                visited[idx] = true;

                let hot = thresholded.is_hot(cu, y);
                if hot {
                    row_hot_count += 1;
                    let heat = original.mean_channel(cu, y);
                    state.heat_min = state.heat_min.min(heat);
                    state.heat_max = state.heat_max.max(heat);
                    state.pixels.push(PixelHeat {
                        block_id,
                        feature_id,
                        y,
                        x: cu,
                        heat,
                    });
                    state.min_x = state.min_x.min(cu);
                    state.max_x = state.max_x.max(cu);
                }

                if c == col_start && !hot {
                    from += 1;
                }
                if c == col_end - 1 {
                    if hot {
                        to += 1;
                    } else {
                        to -= 1;
                    }
                }
            }
        }

        if row_hot_count == 0 {
            break;
        }
        state.num_hot_pixels += row_hot_count;
        state.max_y = y;

        let pixel_box = state.pixel_box();
        if pixel_box.width > u32::MAX / 2 || pixel_box.height > u32::MAX / 2 {
            break; // defensive; unreachable with real frame sizes
        }
        if is_over_sized(&pixel_box, cfg) || is_under_dense(&pixel_box, state.num_hot_pixels, cfg) {
            break;
        }
    }

    state
}

/// Scan `original`/`thresholded` (identical dimensions) and return the
/// Real features found, plus the next available feature id.
pub fn scan_comb(
    original: &ColorFrame,
    thresholded: &MonoFrame,
    block_id: BlockId,
    cfg: &ScannerConfig,
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

    let w = thresholded.width();
    let h = thresholded.height();
    let mut visited = vec![false; w as usize * h as usize];
    let mut features = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = (y as usize) * (w as usize) + x as usize;
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            if !thresholded.is_hot(x, y) {
                continue;
            }

            let feature_id = next_feature_id;
            next_feature_id = next_feature_id.next();

            let flood = flood_feature(original, thresholded, &mut visited, x, y, block_id, feature_id, cfg);
            let pixel_box = flood.pixel_box();
            let (significant, attributes) =
                significance_attributes(flood.num_hot_pixels, &pixel_box, cfg);

            tracing::trace!(
                block_id = block_id.0,
                feature_id = feature_id.0,
                hot_pixels = flood.num_hot_pixels,
                %attributes,
                "scanner emitted feature"
            );

            features.push(Feature {
                feature_id,
                block_id,
                feature_type: FeatureType::Real,
                pixel_box,
                pixels: flood.pixels,
                heat_min: flood.heat_min,
                heat_max: flood.heat_max,
                num_hot_pixels: flood.num_hot_pixels,
                owner_object_id: None,
                significant,
                tracking_flag_viable: !is_over_sized(&pixel_box, cfg)
                    && !is_under_dense(&pixel_box, flood.num_hot_pixels, cfg),
                world_location: None,
                above_ground_height_m: None,
                height_algorithm: None,
                label: None,
                confidence: None,
            });
        }
    }

    Ok((features, next_feature_id))
}
