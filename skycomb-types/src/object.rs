//! `Object` — a track of features believed to correspond to one physical
//! entity (spec.md §3, §4.2).

use crate::feature::WorldLocation;
use crate::ids::{BlockId, FeatureId, ObjectId};
use serde::{Deserialize, Serialize};

/// Object lifecycle state (spec.md §4.2 state machine). Transitions are
/// monotonic left-to-right; `Dead` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectState {
    Seeded,
    Tentative,
    Significant,
    Fading,
    Dead,
}

impl ObjectState {
    /// `true` if `self -> next` is a legal transition (monotonic, no
    /// skipping-backward; same-state is always allowed as a no-op step).
    pub fn can_advance_to(self, next: ObjectState) -> bool {
        use ObjectState::*;
        if self == Dead {
            return next == Dead;
        }
        let rank = |s: ObjectState| match s {
            Seeded => 0,
            Tentative => 1,
            Significant => 2,
            Fading => 3,
            Dead => 4,
        };
        rank(next) >= rank(self)
    }
}

/// A track of features believed to correspond to one physical entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Object {
    pub object_id: ObjectId,
    /// Ordered by `block_id` (invariant (i) of spec §3); both Real and
    /// Unreal features appear here, Consumed features never do (they stay
    /// addressable only via the arena for audit).
    pub features: Vec<FeatureId>,
    /// Index into `features` of the last Real feature, if any.
    pub last_real_feature_idx: Option<usize>,
    pub max_real_hot_pixels: u32,
    pub max_real_pixel_width: u32,
    pub max_real_pixel_height: u32,
    pub state: ObjectState,
    pub being_tracked: bool,
    pub significant: bool,
    pub num_sig_blocks: u32,
    /// Number of consecutive Unreal features remaining to be tolerated
    /// before the object is killed (spec §4.2, `object_max_unreal_blocks`).
    pub unreal_blocks_remaining: u32,
    pub location_m: Option<WorldLocation>,
    pub location_err_m: Option<f64>,
    pub height_m: Option<f64>,
    pub height_err_m: Option<f64>,
    pub min_height_m: Option<f64>,
    pub max_height_m: Option<f64>,
    pub avg_range_m: Option<f64>,
    pub size_cm2: Option<f64>,
    pub max_heat: f32,
    pub first_fwd_down_deg: Option<f64>,
    pub last_fwd_down_deg: Option<f64>,
    pub attributes: String,
    /// Stable display name (e.g. `"A1"`), assigned once on first
    /// significance (spec §4.5).
    pub name: Option<String>,
}

impl Object {
    pub fn new(object_id: ObjectId, first_feature: FeatureId, unreal_budget: u32) -> Self {
        Object {
            object_id,
            features: vec![first_feature],
            last_real_feature_idx: Some(0),
            max_real_hot_pixels: 0,
            max_real_pixel_width: 0,
            max_real_pixel_height: 0,
            state: ObjectState::Seeded,
            being_tracked: true,
            significant: false,
            num_sig_blocks: 0,
            unreal_blocks_remaining: unreal_budget,
            location_m: None,
            location_err_m: None,
            height_m: None,
            height_err_m: None,
            min_height_m: None,
            max_height_m: None,
            avg_range_m: None,
            size_cm2: None,
            max_heat: 0.0,
            first_fwd_down_deg: None,
            last_fwd_down_deg: None,
            attributes: String::new(),
            name: None,
        }
    }

    pub fn num_real_features(&self) -> usize {
        // Real features are exactly those counted by advancing
        // `last_real_feature_idx` tracking in the tracker; the arena owns
        // the authoritative type tag. This count is a cheap upper bound
        // used only for duration checks before the arena is consulted.
        self.features.len()
    }

    /// Kill the object permanently (spec invariant (iii)).
    pub fn kill(&mut self) {
        self.being_tracked = false;
        self.state = ObjectState::Dead;
    }
}

/// One contiguous range of blocks sharing a pose correction (spec §3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AttitudeCorrection {
    pub fix_alt_m: f64,
    pub fix_yaw_deg: f64,
    pub fix_pitch_deg: f64,
    pub hfov_deg: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub span_id: crate::ids::SpanId,
    pub min_step_id: crate::ids::StepId,
    pub max_step_id: crate::ids::StepId,
    pub min_block_id: BlockId,
    pub max_block_id: BlockId,
    pub best_correction: AttitudeCorrection,
    pub best_sum_location_err_m: f64,
    pub best_sum_height_err_m: f64,
    pub org_sum_location_err_m: f64,
    pub org_sum_height_err_m: f64,
    pub num_significant_objects: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_transitions_are_monotonic() {
        assert!(ObjectState::Seeded.can_advance_to(ObjectState::Tentative));
        assert!(ObjectState::Tentative.can_advance_to(ObjectState::Significant));
        assert!(!ObjectState::Significant.can_advance_to(ObjectState::Tentative));
        assert!(!ObjectState::Dead.can_advance_to(ObjectState::Fading));
    }

    #[test]
    fn new_object_starts_seeded_and_tracked() {
        let o = Object::new(ObjectId(1), FeatureId(5), 3);
        assert_eq!(o.state, ObjectState::Seeded);
        assert!(o.being_tracked);
        assert_eq!(o.unreal_blocks_remaining, 3);
    }

    #[test]
    fn kill_is_terminal() {
        let mut o = Object::new(ObjectId(1), FeatureId(5), 3);
        o.kill();
        assert!(!o.being_tracked);
        assert_eq!(o.state, ObjectState::Dead);
    }
}
