//! Offline run input: a CSV manifest of one row per block plus raw frame
//! files on disk, in the spirit of `braid-offline`'s batch driver reading
//! telemetry + frame data from a directory rather than a live camera.
//!
//! Manifest columns: `block_id, input_frame_id, input_frame_ms,
//! frame_ms_reset, northing_m, easting_m, altitude_m, yaw_deg, pitch_deg,
//! roll_deg, camera_to_vertical_forward_deg, nearest_step_id,
//! step_weight_a, step_weight_b, sum_lineal_m, input_image_dem_m, has_leg,
//! image_width, image_height, thermal_frame_path, color_frame_path`.
//! `thermal_frame_path` names a raw MONO8 file (`width*height` bytes,
//! already thresholded hot/cold upstream); `color_frame_path` is optional
//! raw RGB8 (`width*height*3` bytes) — when absent a uniform mid-gray
//! frame is substituted, so heat statistics degrade gracefully rather
//! than failing the run.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use skycomb_scanner::{ColorFrame, MonoFrame};
use skycomb_types::{Block, BlockId, PlatformPose, StepId};

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("{source}")]
    Csv {
        #[from]
        source: csv::Error,
    },
    #[error("{source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("frame file {path} has {actual} bytes, expected {expected}")]
    WrongFrameSize { path: PathBuf, actual: usize, expected: usize },
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestRow {
    block_id: u32,
    input_frame_id: u64,
    input_frame_ms: i64,
    frame_ms_reset: bool,
    northing_m: f64,
    easting_m: f64,
    altitude_m: f64,
    yaw_deg: f64,
    pitch_deg: f64,
    roll_deg: f64,
    camera_to_vertical_forward_deg: f64,
    nearest_step_id: u32,
    step_weight_a: f64,
    step_weight_b: f64,
    sum_lineal_m: f64,
    input_image_dem_m: Option<f64>,
    has_leg: bool,
    image_width: u32,
    image_height: u32,
    thermal_frame_path: String,
    color_frame_path: Option<String>,
}

/// One manifest row resolved into a ready-to-track block plus its frames.
pub struct ManifestEntry {
    pub block: Block,
    pub thermal: MonoFrame,
    pub color: ColorFrame,
}

fn read_raw(base_dir: &Path, relative: &str, expected_len: usize) -> Result<Vec<u8>, ManifestError> {
    let path = base_dir.join(relative);
    let data = std::fs::read(&path)?;
    if data.len() != expected_len {
        return Err(ManifestError::WrongFrameSize {
            path,
            actual: data.len(),
            expected: expected_len,
        });
    }
    Ok(data)
}

/// Parse `manifest.csv` under `base_dir`, resolving every row's frame
/// files relative to the same directory.
pub fn load(base_dir: &Path, manifest_path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    let mut reader = csv::Reader::from_path(manifest_path)?;
    let mut entries = Vec::new();

    for row in reader.deserialize::<ManifestRow>() {
        let row = row?;
        let w = row.image_width;
        let h = row.image_height;

        let thermal_bytes = read_raw(base_dir, &row.thermal_frame_path, (w * h) as usize)?;
        let thermal = MonoFrame::new(w, h, thermal_bytes);

        let color = match &row.color_frame_path {
            Some(p) => {
                let bytes = read_raw(base_dir, p, (w * h * 3) as usize)?;
                ColorFrame::new(w, h, bytes)
            }
            None => ColorFrame::new(w, h, vec![128u8; (w * h * 3) as usize]),
        };

        let block = Block {
            block_id: BlockId(row.block_id),
            input_frame_id: row.input_frame_id,
            input_frame_ms: row.input_frame_ms,
            frame_ms_reset: row.frame_ms_reset,
            pose: PlatformPose {
                northing_m: row.northing_m,
                easting_m: row.easting_m,
                altitude_m: row.altitude_m,
                yaw_deg: row.yaw_deg,
                pitch_deg: row.pitch_deg,
                roll_deg: row.roll_deg,
                camera_to_vertical_forward_deg: row.camera_to_vertical_forward_deg,
            },
            nearest_step_id: StepId(row.nearest_step_id),
            step_interp_weights: (row.step_weight_a, row.step_weight_b),
            sum_lineal_m: row.sum_lineal_m,
            input_image_dem_m: row.input_image_dem_m,
            has_leg: row.has_leg,
        };

        entries.push(ManifestEntry { block, thermal, color });
    }

    Ok(entries)
}
