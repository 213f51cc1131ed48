//! Output writers (spec.md §6, §10.5): one `csv::Writer` per output table
//! plus a YAML run-metadata sidecar, in the shape of
//! `flydra2::write_data::WritingState` — a readme file held open for the
//! duration of the run to lock the output directory, one writer per table,
//! metadata written once up front.

use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use skycomb_types::{Feature, Object, PixelHeat, Span};

use crate::error::CoreError;

const README_TEXT: &str = "\n\nThis directory holds one SkyComb run's persisted object catalog.\n\n";

#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub schema: u32,
    pub saving_program_name: String,
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct BlockRow {
    block_id: u32,
    input_frame_id: u64,
    input_frame_ms: i64,
    northing_m: f64,
    easting_m: f64,
    altitude_m: f64,
    yaw_deg: f64,
    pitch_deg: f64,
    roll_deg: f64,
    sum_lineal_m: f64,
    has_leg: bool,
}

#[derive(Debug, Clone, Serialize)]
struct ObjectRow {
    object_id: u32,
    name: String,
    state: String,
    significant: bool,
    num_features: usize,
    max_real_hot_pixels: u32,
    max_real_pixel_width: u32,
    max_real_pixel_height: u32,
    northing_m: Option<f64>,
    easting_m: Option<f64>,
    location_err_m: Option<f64>,
    height_m: Option<f64>,
    height_err_m: Option<f64>,
    min_height_m: Option<f64>,
    max_height_m: Option<f64>,
    avg_range_m: Option<f64>,
    size_cm2: Option<f64>,
    max_heat: f32,
    attributes: String,
}

#[derive(Debug, Clone, Serialize)]
struct FeatureRow {
    feature_id: u32,
    block_id: u32,
    object_id: Option<u32>,
    feature_type: String,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    heat_min: f32,
    heat_max: f32,
    num_hot_pixels: u32,
    density_pct: f64,
    significant: bool,
    northing_m: Option<f64>,
    easting_m: Option<f64>,
    above_ground_height_m: Option<f64>,
    height_algorithm: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct SpanRow {
    span_id: u32,
    min_step_id: u32,
    max_step_id: u32,
    min_block_id: u32,
    max_block_id: u32,
    fix_alt_m: f64,
    fix_yaw_deg: f64,
    fix_pitch_deg: f64,
    hfov_deg: Option<f64>,
    best_sum_location_err_m: f64,
    best_sum_height_err_m: f64,
    org_sum_location_err_m: f64,
    org_sum_height_err_m: f64,
    num_significant_objects: u32,
}

/// Holds every output-table writer plus the readme/metadata sidecar files
/// for one run's output directory. Dropping this flushes nothing
/// implicitly; call [`PersistenceWriter::finish`] to flush and close.
pub struct PersistenceWriter {
    #[allow(dead_code)]
    readme_fd: File,
    blocks_wtr: csv::Writer<File>,
    objects_wtr: csv::Writer<File>,
    spans_wtr: csv::Writer<File>,
    features_wtr: csv::Writer<File>,
    pixel_heat_wtr: csv::Writer<File>,
}

impl PersistenceWriter {
    pub fn create(output_dir: impl AsRef<Path>, metadata: &RunMetadata) -> Result<Self, CoreError> {
        let output_dir = output_dir.as_ref();
        std::fs::create_dir_all(output_dir)?;

        let mut readme_fd = File::create(output_dir.join("README.md"))?;
        readme_fd.write_all(README_TEXT.as_bytes())?;

        let metadata_text = serde_yaml::to_string(metadata)?;
        std::fs::write(output_dir.join("run_metadata.yaml"), metadata_text)?;

        Ok(PersistenceWriter {
            readme_fd,
            blocks_wtr: csv::Writer::from_path(output_dir.join("blocks.csv"))?,
            objects_wtr: csv::Writer::from_path(output_dir.join("objects.csv"))?,
            spans_wtr: csv::Writer::from_path(output_dir.join("spans.csv"))?,
            features_wtr: csv::Writer::from_path(output_dir.join("features.csv"))?,
            pixel_heat_wtr: csv::Writer::from_path(output_dir.join("pixel_heat.csv"))?,
        })
    }

    pub fn write_block(&mut self, block: &skycomb_types::Block) -> Result<(), CoreError> {
        self.blocks_wtr.serialize(BlockRow {
            block_id: block.block_id.0,
            input_frame_id: block.input_frame_id,
            input_frame_ms: block.input_frame_ms,
            northing_m: block.pose.northing_m,
            easting_m: block.pose.easting_m,
            altitude_m: block.pose.altitude_m,
            yaw_deg: block.pose.yaw_deg,
            pitch_deg: block.pose.pitch_deg,
            roll_deg: block.pose.roll_deg,
            sum_lineal_m: block.sum_lineal_m,
            has_leg: block.has_leg,
        })?;
        Ok(())
    }

    pub fn write_object(&mut self, object: &Object) -> Result<(), CoreError> {
        self.objects_wtr.serialize(ObjectRow {
            object_id: object.object_id.0,
            name: object.name.clone().unwrap_or_default(),
            state: format!("{:?}", object.state),
            significant: object.significant,
            num_features: object.features.len(),
            max_real_hot_pixels: object.max_real_hot_pixels,
            max_real_pixel_width: object.max_real_pixel_width,
            max_real_pixel_height: object.max_real_pixel_height,
            northing_m: object.location_m.map(|l| l.northing_m),
            easting_m: object.location_m.map(|l| l.easting_m),
            location_err_m: object.location_err_m,
            height_m: object.height_m,
            height_err_m: object.height_err_m,
            min_height_m: object.min_height_m,
            max_height_m: object.max_height_m,
            avg_range_m: object.avg_range_m,
            size_cm2: object.size_cm2,
            max_heat: object.max_heat,
            attributes: object.attributes.clone(),
        })?;
        Ok(())
    }

    pub fn write_span(&mut self, span: &Span) -> Result<(), CoreError> {
        self.spans_wtr.serialize(SpanRow {
            span_id: span.span_id.0,
            min_step_id: span.min_step_id.0,
            max_step_id: span.max_step_id.0,
            min_block_id: span.min_block_id.0,
            max_block_id: span.max_block_id.0,
            fix_alt_m: span.best_correction.fix_alt_m,
            fix_yaw_deg: span.best_correction.fix_yaw_deg,
            fix_pitch_deg: span.best_correction.fix_pitch_deg,
            hfov_deg: span.best_correction.hfov_deg,
            best_sum_location_err_m: span.best_sum_location_err_m,
            best_sum_height_err_m: span.best_sum_height_err_m,
            org_sum_location_err_m: span.org_sum_location_err_m,
            org_sum_height_err_m: span.org_sum_height_err_m,
            num_significant_objects: span.num_significant_objects,
        })?;
        Ok(())
    }

    pub fn write_feature(&mut self, feature: &Feature) -> Result<(), CoreError> {
        self.features_wtr.serialize(FeatureRow {
            feature_id: feature.feature_id.0,
            block_id: feature.block_id.0,
            object_id: feature.owner_object_id.map(|id| id.0),
            feature_type: format!("{:?}", feature.feature_type),
            x: feature.pixel_box.x,
            y: feature.pixel_box.y,
            width: feature.pixel_box.width,
            height: feature.pixel_box.height,
            heat_min: feature.heat_min,
            heat_max: feature.heat_max,
            num_hot_pixels: feature.num_hot_pixels,
            density_pct: feature.density_pct(),
            significant: feature.significant,
            northing_m: feature.world_location.map(|l| l.northing_m),
            easting_m: feature.world_location.map(|l| l.easting_m),
            above_ground_height_m: feature.above_ground_height_m,
            height_algorithm: feature.height_algorithm.map(|a| format!("{a:?}")),
        })?;
        Ok(())
    }

    pub fn write_pixel_heat(&mut self, pixel: &PixelHeat) -> Result<(), CoreError> {
        self.pixel_heat_wtr.serialize(pixel)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<(), CoreError> {
        self.blocks_wtr.flush()?;
        self.objects_wtr.flush()?;
        self.spans_wtr.flush()?;
        self.features_wtr.flush()?;
        self.pixel_heat_wtr.flush()?;
        Ok(())
    }
}

/// Helper used by the run controller to bulk-dump the arenas at `RunEnd`.
pub fn write_all(
    writer: &mut PersistenceWriter,
    blocks: &crate::arena::Blocks,
    objects: &crate::arena::Objects,
    spans: &crate::arena::Spans,
    features: &crate::arena::Features,
) -> Result<(), CoreError> {
    for block in blocks.iter() {
        writer.write_block(block)?;
    }
    for object in objects.iter() {
        writer.write_object(object)?;
    }
    for span in spans.iter() {
        writer.write_span(span)?;
    }
    for feature in features.iter() {
        writer.write_feature(feature)?;
        for pixel in &feature.pixels {
            writer.write_pixel_heat(pixel)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycomb_types::{BlockId, FeatureId, ObjectId, PlatformPose, StepId};
    use tempfile::tempdir;

    fn pose() -> PlatformPose {
        PlatformPose {
            northing_m: 1.0,
            easting_m: 2.0,
            altitude_m: 100.0,
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            roll_deg: 0.0,
            camera_to_vertical_forward_deg: 30.0,
        }
    }

    #[test]
    fn writes_tables_and_metadata_to_disk() {
        let dir = tempdir().unwrap();
        let metadata = RunMetadata {
            schema: 1,
            saving_program_name: "skycomb-core-test".to_string(),
            config_path: None,
        };
        let mut writer = PersistenceWriter::create(dir.path(), &metadata).unwrap();

        writer
            .write_block(&skycomb_types::Block {
                block_id: BlockId(0),
                input_frame_id: 0,
                input_frame_ms: 0,
                frame_ms_reset: false,
                pose: pose(),
                nearest_step_id: StepId(0),
                step_interp_weights: (1.0, 0.0),
                sum_lineal_m: 0.0,
                input_image_dem_m: Some(10.0),
                has_leg: true,
            })
            .unwrap();

        writer
            .write_object(&Object::new(ObjectId(0), FeatureId(0), 3))
            .unwrap();

        writer
            .write_feature(&skycomb_types::Feature {
                feature_id: FeatureId(0),
                block_id: BlockId(0),
                feature_type: skycomb_types::FeatureType::Real,
                pixel_box: skycomb_types::PixelBox::new(1, 1, 3, 3),
                pixels: Vec::new(),
                heat_min: 10.0,
                heat_max: 42.0,
                num_hot_pixels: 9,
                owner_object_id: None,
                significant: true,
                tracking_flag_viable: true,
                world_location: None,
                above_ground_height_m: None,
                height_algorithm: None,
                label: None,
                confidence: None,
            })
            .unwrap();

        writer
            .write_pixel_heat(&PixelHeat {
                block_id: BlockId(0),
                feature_id: FeatureId(0),
                y: 1,
                x: 1,
                heat: 42.0,
            })
            .unwrap();

        writer.finish().unwrap();

        assert!(dir.path().join("README.md").exists());
        assert!(dir.path().join("run_metadata.yaml").exists());
        assert!(dir.path().join("blocks.csv").exists());
        assert!(dir.path().join("objects.csv").exists());
        assert!(dir.path().join("features.csv").exists());
        assert!(dir.path().join("pixel_heat.csv").exists());

        let blocks_text = std::fs::read_to_string(dir.path().join("blocks.csv")).unwrap();
        assert!(blocks_text.contains("input_frame_id"));
    }
}
