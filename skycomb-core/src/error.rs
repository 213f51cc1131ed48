//! Run-level error type, in the style of `flydra2::error::Error`: one
//! `thiserror` enum wrapping every failure surface the run controller can
//! hit, with `#[from]` conversions so `?` works across crate boundaries.
//! Spec §7 splits failures into recoverable (carried as values, e.g.
//! `FeatureHeightError`) and fatal (propagated here, aborting the run).

use skycomb_types::{BlockId, EntityError, ObjectId};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Scanner(#[from] skycomb_scanner::ScannerError),

    #[error(transparent)]
    Config(#[from] skycomb_types::ConfigError),

    #[error("object {object_id} not found in arena")]
    UnknownObject { object_id: ObjectId },

    #[error("block {block_id} not found in arena")]
    UnknownBlock { block_id: BlockId },

    #[error("span optimizer failed: {reason}")]
    SpanOptimization { reason: String },

    #[error("{source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("{source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    #[error("{source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },
}
