//! Core data model for the SkyComb thermal-track geolocation pipeline.
//!
//! Entities (`Block`, `Feature`, `Object`, `Span`, `FlightStep`) live in
//! id-keyed arenas owned by the run controller (`skycomb-core`);
//! cross-entity references here are always ids, never addresses, so the
//! object/feature/block graph can be snapshotted and persisted without
//! cycles (spec.md §9).

pub mod block;
pub mod config;
pub mod error;
pub mod feature;
pub mod flight_step;
pub mod ids;
pub mod object;

pub use block::{Block, PlatformPose};
pub use config::{
    ConfigError, DetectorConfig, DetectorKind, GeometryConfig, RunConfig, ScannerConfig,
    SpanConfig, TrackerConfig,
};
pub use error::EntityError;
pub use feature::{
    Feature, FeatureHeightError, FeatureType, HeightAlgorithm, PixelBox, PixelHeat, WorldLocation,
};
pub use flight_step::FlightStep;
pub use ids::{BlockId, FeatureId, ObjectId, SpanId, StepId};
pub use object::{AttitudeCorrection, Object, ObjectState, Span};
