//! Temporal tracker, span optimizer, persistence and run controller: the
//! parts of the pipeline that own the entity arenas across the whole run
//! (spec.md §4.2, §4.4, §4.5, §5, §6), grounded on the shape of
//! `flydra2` (tracking_core + frame_bundler + model_server + write_data
//! bundled behind one crate).

pub mod arena;
pub mod error;
pub mod locate;
pub mod namer;
pub mod persistence;
pub mod run_controller;
pub mod span;
pub mod span_optimizer;
pub mod tracker;

pub use arena::{Arena, Blocks, Features, Objects, Spans, Steps};
pub use error::CoreError;
pub use locate::locate_block;
pub use namer::Namer;
pub use persistence::{PersistenceWriter, RunMetadata};
pub use run_controller::{FrameInput, NullEventHandler, RunController, RunEventHandler, RunSummary};
pub use span::{search_attitude_correction, triangulate, RayObservation};
pub use span_optimizer::close_span;
pub use tracker::{process_block, TrackEvent};
