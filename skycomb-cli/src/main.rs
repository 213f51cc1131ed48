//! `skycomb`: batch-process a recorded flight's thermal frames into a
//! persisted object catalog (spec.md §1, §10.4).

mod logging;
mod manifest;
mod telemetry;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use skycomb_core::{FrameInput, PersistenceWriter, RunController, RunEventHandler, RunMetadata};
use skycomb_geometry::{ConstantGround, GridGround, GroundSource};
use skycomb_types::{BlockId, DetectorKind, RunConfig};

/// `--detector` override, accepted in addition to (and taking precedence
/// over) whatever `DetectorConfig::kind` the TOML config carries.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DetectorArg {
    Comb,
    Yolo,
    Threshold,
}

impl From<DetectorArg> for DetectorKind {
    fn from(value: DetectorArg) -> Self {
        match value {
            DetectorArg::Comb => DetectorKind::Comb,
            DetectorArg::Yolo => DetectorKind::Yolo,
            DetectorArg::Threshold => DetectorKind::Threshold,
        }
    }
}

/// Process one flight's manifest + frames into a geo-referenced object
/// catalog.
#[derive(Debug, Parser)]
#[command(name = "skycomb", version, about)]
struct Cli {
    /// TOML run configuration. Defaults loaded when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding `manifest.csv` and the frame files it names.
    #[arg(long)]
    input_dir: PathBuf,

    /// Output directory for the persisted object catalog.
    #[arg(long)]
    output_dir: PathBuf,

    /// Flight-telemetry CSV (one `FlightStep` per row) pushed into the run
    /// controller ahead of processing. Omit to run without step-level
    /// ground fallback (spec §4.3's last DEM-resolution tier then just
    /// never matches).
    #[arg(long)]
    telemetry: Option<PathBuf>,

    /// Scattered-point DEM/DSM grid CSV (`northing_m, easting_m, dem_m,
    /// dsm_m`, `dsm_m` optional). Omit to run with no grid coverage at
    /// all (every feature falls through to the block/step DEM tiers).
    #[arg(long)]
    ground_grid: Option<PathBuf>,

    /// Only process blocks whose `input_frame_ms` falls within this
    /// window, in seconds.
    #[arg(long)]
    from_s: Option<f64>,
    #[arg(long)]
    to_s: Option<f64>,

    /// Override the config file's `detector.kind`.
    #[arg(long, value_enum)]
    detector: Option<DetectorArg>,
}

struct LoggingEventHandler;

impl RunEventHandler for LoggingEventHandler {
    fn on_run_start(&mut self) {
        tracing::info!("run starting");
    }

    fn on_leg_start_after(&mut self, block_id: BlockId) {
        tracing::info!(block_id = block_id.0, "leg started");
    }

    fn on_leg_end_before(&mut self, block_id: BlockId) {
        tracing::info!(block_id = block_id.0, "leg ended");
    }

    fn on_run_end(&mut self, summary: &skycomb_core::RunSummary) {
        tracing::info!(
            num_blocks = summary.num_blocks,
            num_objects = summary.num_objects,
            num_significant_objects = summary.num_significant_objects,
            "run finished"
        );
    }
}

fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RunConfig::from_path(path)?,
        None => RunConfig::default(),
    };
    if let Some(detector) = cli.detector {
        config.detector.kind = detector.into();
    }

    let manifest_path = cli.input_dir.join("manifest.csv");
    let entries = manifest::load(&cli.input_dir, &manifest_path)?;
    tracing::info!(count = entries.len(), "loaded manifest");

    let ground: Box<dyn GroundSource> = match &cli.ground_grid {
        Some(path) => Box::new(telemetry::load_ground_grid(path)?),
        None => Box::new(ConstantGround { dem_m: None, dsm_m: None }),
    };
    let mut controller = RunController::new(config, ground, LoggingEventHandler);
    if let (Some(from_s), Some(to_s)) = (cli.from_s, cli.to_s) {
        controller = controller.with_window(from_s, to_s);
    }

    if let Some(path) = &cli.telemetry {
        let steps = telemetry::load_steps(path)?;
        tracing::info!(count = steps.len(), "loaded telemetry");
        for step in steps {
            controller.push_step(step);
        }
    }

    for entry in &entries {
        controller.push_block(
            entry.block.clone(),
            FrameInput {
                original: &entry.color,
                thresholded: &entry.thermal,
                yolo_detections: &[],
            },
        )?;
    }

    let metadata = RunMetadata {
        schema: 1,
        saving_program_name: "skycomb-cli".to_string(),
        config_path: cli.config.map(|p| p.display().to_string()),
    };
    let mut writer = PersistenceWriter::create(&cli.output_dir, &metadata)?;
    skycomb_core::persistence::write_all(
        &mut writer,
        &controller.blocks,
        &controller.objects,
        &controller.spans,
        &controller.features,
    )?;
    writer.finish()?;

    let summary = controller.finish();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
