//! Configuration keys enumerated in spec.md §6, modeled after
//! `flydra_types::TrackingParams` / `braid-config-data::MainbrainConfig`:
//! a serde-derived struct tree with per-field defaults, loadable from TOML.

use serde::{Deserialize, Serialize};

fn default_feature_min_pixels() -> u32 {
    9
}
fn default_feature_max_size() -> u32 {
    200
}
fn default_feature_min_density_pct() -> f64 {
    0.25
}
fn default_feature_min_overlap_pct() -> f64 {
    0.10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScannerConfig {
    #[serde(default = "default_feature_min_pixels")]
    pub feature_min_pixels: u32,
    #[serde(default = "default_feature_max_size")]
    pub feature_max_size: u32,
    #[serde(default = "default_feature_min_density_pct")]
    pub feature_min_density_pct: f64,
    #[serde(default = "default_feature_min_overlap_pct")]
    pub feature_min_overlap_pct: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig {
            feature_min_pixels: default_feature_min_pixels(),
            feature_max_size: default_feature_max_size(),
            feature_min_density_pct: default_feature_min_density_pct(),
            feature_min_overlap_pct: default_feature_min_overlap_pct(),
        }
    }
}

fn default_object_min_duration_ms() -> i64 {
    200
}
fn default_object_min_pixels_per_block() -> u32 {
    9
}
fn default_object_min_density_pct() -> f64 {
    0.25
}
fn default_object_max_unreal_blocks() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackerConfig {
    #[serde(default = "default_object_min_duration_ms")]
    pub object_min_duration_ms: i64,
    #[serde(default = "default_object_min_pixels_per_block")]
    pub object_min_pixels_per_block: u32,
    #[serde(default = "default_object_min_density_pct")]
    pub object_min_density_pct: f64,
    #[serde(default = "default_object_max_unreal_blocks")]
    pub object_max_unreal_blocks: u32,
    /// Debug breakpoint id; never alters control flow (spec §9 Open
    /// Question #2 — see `skycomb-core::tracker`).
    #[serde(default)]
    pub focus_object_id: Option<u32>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            object_min_duration_ms: default_object_min_duration_ms(),
            object_min_pixels_per_block: default_object_min_pixels_per_block(),
            object_min_density_pct: default_object_min_density_pct(),
            object_max_unreal_blocks: default_object_max_unreal_blocks(),
            focus_object_id: None,
        }
    }
}

fn default_hfov_deg() -> f64 {
    57.0
}
fn default_vfov_deg() -> f64 {
    42.0
}
fn default_image_width() -> u32 {
    640
}
fn default_image_height() -> u32 {
    480
}
/// The DJI-camera pixel-doubling adjustment (spec §9 Open Question #3):
/// default to `1` (no adjustment) unless the sensor is known to double.
fn default_pixel_doubling_divisor() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeometryConfig {
    #[serde(default = "default_hfov_deg")]
    pub hfov_deg: f64,
    #[serde(default = "default_vfov_deg")]
    pub vfov_deg: f64,
    #[serde(default = "default_image_width")]
    pub image_width: u32,
    #[serde(default = "default_image_height")]
    pub image_height: u32,
    #[serde(default = "default_pixel_doubling_divisor")]
    pub pixel_doubling_divisor: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        GeometryConfig {
            hfov_deg: default_hfov_deg(),
            vfov_deg: default_vfov_deg(),
            image_width: default_image_width(),
            image_height: default_image_height(),
            pixel_doubling_divisor: default_pixel_doubling_divisor(),
        }
    }
}

fn default_alt_range_m() -> f64 {
    5.0
}
fn default_yaw_range_deg() -> f64 {
    5.0
}
fn default_pitch_range_deg() -> f64 {
    5.0
}
fn default_min_improvement_m() -> f64 {
    0.10
}
fn default_compare_interval_frames() -> u32 {
    1
}
fn default_hfov_candidates() -> Vec<f64> {
    vec![36.0, 38.0, 40.0, 42.0, 44.0, 57.0]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpanConfig {
    #[serde(default = "default_alt_range_m")]
    pub alt_range_m: f64,
    #[serde(default = "default_yaw_range_deg")]
    pub yaw_range_deg: f64,
    #[serde(default = "default_pitch_range_deg")]
    pub pitch_range_deg: f64,
    #[serde(default = "default_min_improvement_m")]
    pub min_improvement_m: f64,
    #[serde(default = "default_compare_interval_frames")]
    pub compare_interval_frames: u32,
    #[serde(default = "default_hfov_candidates")]
    pub hfov_candidates_deg: Vec<f64>,
    /// When `true`, run the per-object ray-bundle triangulation mode
    /// instead of the coordinate-descent attitude search (spec §4.4).
    #[serde(default = "default_true")]
    pub triangulation_mode: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SpanConfig {
    fn default() -> Self {
        SpanConfig {
            alt_range_m: default_alt_range_m(),
            yaw_range_deg: default_yaw_range_deg(),
            pitch_range_deg: default_pitch_range_deg(),
            min_improvement_m: default_min_improvement_m(),
            compare_interval_frames: default_compare_interval_frames(),
            hfov_candidates_deg: default_hfov_candidates(),
            triangulation_mode: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Comb,
    Yolo,
    Threshold,
}

fn default_confidence() -> f32 {
    0.5
}
fn default_iou() -> f32 {
    0.45
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectorConfig {
    pub kind: DetectorKind,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default = "default_iou")]
    pub iou: f32,
    #[serde(default)]
    pub model_path: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            kind: DetectorKind::Comb,
            confidence: default_confidence(),
            iou: default_iou(),
            model_path: None,
        }
    }
}

/// Top-level run configuration, loaded from a TOML file via
/// [`RunConfig::from_path`] or constructed with [`RunConfig::default`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunConfig {
    pub scanner: ScannerConfig,
    pub tracker: TrackerConfig,
    pub geometry: GeometryConfig,
    pub span: SpanConfig,
    pub detector: DetectorConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("{source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
}

impl RunConfig {
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
