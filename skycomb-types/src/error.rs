//! Shared entity-level error kinds (spec.md §7), in the style of
//! `flydra2::error::Error`: a `thiserror`-derived enum carrying the
//! offending ids, used by every crate that mutates the arenas.

use crate::ids::{BlockId, FeatureId, ObjectId};

#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error("block {block_id} violates monotonicity (previous block {prev_block_id})")]
    BlockMonotonicityViolation {
        block_id: BlockId,
        prev_block_id: BlockId,
    },
    #[error("feature {feature_id} violates monotonicity (previous feature {prev_feature_id})")]
    FeatureMonotonicityViolation {
        feature_id: FeatureId,
        prev_feature_id: FeatureId,
    },
    #[error("feature {feature_id} already owned by object {owner}, cannot be claimed by {claimant}")]
    OwnershipViolation {
        feature_id: FeatureId,
        owner: ObjectId,
        claimant: ObjectId,
    },
    #[error(
        "invalid frame at block {block_id}: original/threshold image dimension mismatch \
         ({orig_w}x{orig_h} vs {thresh_w}x{thresh_h})"
    )]
    InvalidFrame {
        block_id: BlockId,
        orig_w: u32,
        orig_h: u32,
        thresh_w: u32,
        thresh_h: u32,
    },
}
