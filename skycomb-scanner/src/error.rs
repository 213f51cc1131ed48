//! Scanner error kinds (spec.md §7). `InvalidFrame` is fatal; it is
//! annotated with the offending ids and position before bubbling up to
//! the run controller (spec §7 Propagation).

use skycomb_types::BlockId;

#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error(
        "invalid frame at block {block_id}: original {orig_w}x{orig_h} vs \
         thresholded {thresh_w}x{thresh_h}"
    )]
    InvalidFrame {
        block_id: BlockId,
        orig_w: u32,
        orig_h: u32,
        thresh_w: u32,
        thresh_h: u32,
    },
}
