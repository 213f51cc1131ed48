//! Geometry error kinds (spec.md §7). Recoverable ones downgrade the
//! feature's height to `None`/`HeightAlgorithm::Error(..)`, never abort
//! the run.

#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq)]
pub enum GeometryError {
    #[error("image fraction out of [0,1] tolerance: x={x_frac}, y={y_frac}")]
    OutOfRange { x_frac: f64, y_frac: f64 },
    #[error("ground lookup fell outside the loaded grid at ({northing_m}, {easting_m})")]
    GroundLookupOutOfGrid { northing_m: f64, easting_m: f64 },
    #[error("baseline insufficient: {reason}")]
    BaselineInsufficient { reason: &'static str },
}
