//! Loaders for the two optional sidecar inputs the manifest itself
//! doesn't carry: a flight-telemetry step log and a DEM/DSM point grid.

use std::path::Path;

use serde::Deserialize;
use skycomb_geometry::GridGround;
use skycomb_types::{FlightStep, StepId};

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("{source}")]
    Csv {
        #[from]
        source: csv::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct StepRow {
    step_id: u32,
    time_ms: i64,
    northing_m: f64,
    easting_m: f64,
    altitude_m: f64,
    yaw_deg: f64,
    pitch_deg: f64,
    roll_deg: f64,
    ground_dem_m: Option<f64>,
    leg_id: Option<u32>,
}

/// Parse a flight-telemetry CSV into `FlightStep`s, in file order.
pub fn load_steps(path: &Path) -> Result<Vec<FlightStep>, TelemetryError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut steps = Vec::new();
    for row in reader.deserialize::<StepRow>() {
        let row = row?;
        steps.push(FlightStep {
            step_id: StepId(row.step_id),
            time_ms: row.time_ms,
            northing_m: row.northing_m,
            easting_m: row.easting_m,
            altitude_m: row.altitude_m,
            yaw_deg: row.yaw_deg,
            pitch_deg: row.pitch_deg,
            roll_deg: row.roll_deg,
            ground_dem_m: row.ground_dem_m,
            leg_id: row.leg_id,
            correction: None,
        });
    }
    Ok(steps)
}

#[derive(Debug, Clone, Deserialize)]
struct GridRow {
    northing_m: f64,
    easting_m: f64,
    dem_m: f64,
    dsm_m: Option<f64>,
}

/// Parse a DEM/DSM point-grid CSV into a [`GridGround`].
pub fn load_ground_grid(path: &Path) -> Result<GridGround, TelemetryError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut dem_points = Vec::new();
    let mut dsm_points = Vec::new();
    for row in reader.deserialize::<GridRow>() {
        let row = row?;
        dem_points.push((row.northing_m, row.easting_m, row.dem_m));
        if let Some(dsm_m) = row.dsm_m {
            dsm_points.push((row.northing_m, row.easting_m, dsm_m));
        }
    }
    Ok(GridGround::new(dem_points, dsm_points))
}
