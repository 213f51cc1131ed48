//! Id-keyed entity arenas. Every cross-entity reference in `skycomb-types`
//! (`Feature::owner_object_id`, `Object::features`, ...) is an id rather
//! than a pointer, so the graph lives flat in these `Vec`s and can be
//! persisted wholesale (spec.md §9).

use skycomb_types::{Block, BlockId, Feature, FeatureId, FlightStep, Object, ObjectId, Span, SpanId, StepId};

/// Append-only store keyed by a `u32`-wrapping id, assigned in order.
#[derive(Debug, Default)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Arena { items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }
}

macro_rules! id_indexed_arena {
    ($arena:ident, $item:ty, $id:ty, $id_field:ident) => {
        impl Arena<$item> {
            pub fn push(&mut self, item: $item) -> $id {
                let id = item.$id_field;
                self.items.push(item);
                id
            }

            pub fn get(&self, id: $id) -> Option<&$item> {
                self.items.get(id.0 as usize)
            }

            pub fn get_mut(&mut self, id: $id) -> Option<&mut $item> {
                self.items.get_mut(id.0 as usize)
            }
        }

        pub type $arena = Arena<$item>;
    };
}

// Features, Objects and Spans are keyed by counters the run controller
// owns itself, so vec index == id always holds and direct indexing is
// correct. Blocks are keyed by `BlockId`s the caller supplies (spec.md
// §3: telemetry frame ids), which are only guaranteed strictly
// increasing, not contiguous from zero — so `Blocks` gets its own
// binary-search lookup instead of the macro's direct index.
id_indexed_arena!(Features, Feature, FeatureId, feature_id);
id_indexed_arena!(Objects, Object, ObjectId, object_id);
id_indexed_arena!(Spans, Span, SpanId, span_id);

pub type Blocks = Arena<Block>;

impl Arena<Block> {
    /// Push a block. Caller must have already checked `block_id` is
    /// strictly greater than every previously pushed block's (enforced by
    /// `RunController::push_block` via `Block::can_precede`), which keeps
    /// `items` sorted by `block_id` and `get`/`get_mut` binary-searchable.
    pub fn push(&mut self, item: Block) -> BlockId {
        let id = item.block_id;
        self.items.push(item);
        id
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        let idx = self.items.binary_search_by_key(&id, |b| b.block_id).ok()?;
        self.items.get(idx)
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        let idx = self.items.binary_search_by_key(&id, |b| b.block_id).ok()?;
        self.items.get_mut(idx)
    }
}

/// `FlightStep`s, keyed by the `StepId`s the telemetry source supplies.
/// Like `Blocks`, not guaranteed contiguous from zero, so lookups
/// binary-search rather than index directly.
pub type Steps = Arena<FlightStep>;

impl Arena<FlightStep> {
    pub fn push(&mut self, item: FlightStep) -> StepId {
        let id = item.step_id;
        self.items.push(item);
        id
    }

    pub fn get(&self, id: StepId) -> Option<&FlightStep> {
        let idx = self.items.binary_search_by_key(&id, |s| s.step_id).ok()?;
        self.items.get(idx)
    }

    pub fn get_mut(&mut self, id: StepId) -> Option<&mut FlightStep> {
        let idx = self.items.binary_search_by_key(&id, |s| s.step_id).ok()?;
        self.items.get_mut(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycomb_types::{FeatureType, PixelBox};

    fn feature(id: u32, block: u32) -> Feature {
        Feature {
            feature_id: FeatureId(id),
            block_id: BlockId(block),
            feature_type: FeatureType::Real,
            pixel_box: PixelBox::new(0, 0, 3, 3),
            pixels: vec![],
            heat_min: 0.0,
            heat_max: 0.0,
            num_hot_pixels: 9,
            owner_object_id: None,
            significant: false,
            tracking_flag_viable: true,
            world_location: None,
            above_ground_height_m: None,
            height_algorithm: None,
            label: None,
            confidence: None,
        }
    }

    #[test]
    fn push_then_get_round_trips_by_id() {
        let mut arena: Features = Arena::new();
        let id = arena.push(feature(0, 1));
        assert_eq!(arena.get(id).unwrap().block_id, BlockId(1));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn get_mut_allows_in_place_update() {
        let mut arena: Features = Arena::new();
        let id = arena.push(feature(0, 1));
        arena.get_mut(id).unwrap().significant = true;
        assert!(arena.get(id).unwrap().significant);
    }

    #[test]
    fn blocks_lookup_by_id_tolerates_gaps() {
        use skycomb_types::{PlatformPose, StepId};
        let pose = PlatformPose {
            northing_m: 0.0,
            easting_m: 0.0,
            altitude_m: 100.0,
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            roll_deg: 0.0,
            camera_to_vertical_forward_deg: 30.0,
        };
        let block = |id: u32| skycomb_types::Block {
            block_id: BlockId(id),
            input_frame_id: id as u64,
            input_frame_ms: id as i64,
            frame_ms_reset: false,
            pose,
            nearest_step_id: StepId(0),
            step_interp_weights: (1.0, 0.0),
            sum_lineal_m: 0.0,
            input_image_dem_m: None,
            has_leg: true,
        };

        let mut blocks: Blocks = Arena::new();
        blocks.push(block(100));
        blocks.push(block(250));
        blocks.push(block(251));

        assert_eq!(blocks.get(BlockId(250)).unwrap().block_id, BlockId(250));
        assert!(blocks.get(BlockId(101)).is_none());
    }
}
