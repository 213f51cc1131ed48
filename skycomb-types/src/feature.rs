//! `Feature` — one detection within a block (spec.md §3, §4.1, §4.2).

use crate::ids::{BlockId, FeatureId, ObjectId};
use serde::{Deserialize, Serialize};

/// Axis-aligned pixel-space bounding box, half-open on neither edge
/// (`x..x+width`, `y..y+height`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        PixelBox {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &PixelBox) -> PixelBox {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width).max(other.x + other.width);
        let y1 = (self.y + self.height).max(other.y + other.height);
        PixelBox {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    /// Area of the intersection of `self` and `other`, 0 if disjoint.
    pub fn intersection_area(&self, other: &PixelBox) -> u64 {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        if x1 <= x0 || y1 <= y0 {
            0
        } else {
            (x1 - x0) as u64 * (y1 - y0) as u64
        }
    }

    /// `intersection_area / area_of_either`, used by the tracker's overlap
    /// gate (spec §4.2). Returns 0 if either box has zero area.
    pub fn overlap_pct(&self, other: &PixelBox) -> f64 {
        let inter = self.intersection_area(other) as f64;
        let a = self.area() as f64;
        let b = other.area() as f64;
        if a == 0.0 || b == 0.0 {
            return 0.0;
        }
        (inter / a).max(inter / b)
    }

    /// Inflate by `px` pixels on every side.
    pub fn inflate(&self, px: i64) -> PixelBox {
        let x = (self.x as i64 - px).max(0) as u32;
        let y = (self.y as i64 - px).max(0) as u32;
        let x1 = self.x as i64 + self.width as i64 + px;
        let y1 = self.y as i64 + self.height as i64 + px;
        PixelBox {
            x,
            y,
            width: (x1 - x as i64).max(0) as u32,
            height: (y1 - y as i64).max(0) as u32,
        }
    }
}

/// One hot pixel within a Real feature, `(block_id, feature_id, y, x, heat)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelHeat {
    pub block_id: BlockId,
    pub feature_id: FeatureId,
    pub y: u32,
    pub x: u32,
    pub heat: f32,
}

/// Feature kind (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureType {
    /// Carries hot pixels, produced by the scanner/detector.
    Real,
    /// Placeholder emitted by the tracker to bridge an occlusion gap; no
    /// pixels, inherits geometry from the claiming object.
    Unreal,
    /// A same-block fragment absorbed by another Real feature; pixels
    /// cleared, id retained for audit.
    Consumed,
}

/// Which algorithm produced `Feature::height_m` (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeightAlgorithm {
    /// Line-of-sight walked against the DSM.
    LineOfSight,
    /// First/last-feature baseline triangulation.
    Baseline,
    /// Height copied from the claiming object (Unreal features).
    Copy,
    /// Flat-ground plane intersection only; no refinement applied.
    FlatGround,
    /// A recoverable failure tag, e.g. `"BL_TooShort"`.
    Error(FeatureHeightError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureHeightError {
    BaselineTooShort,
    GroundLookupOutOfGrid,
    OutOfForwardDownRange,
}

impl FeatureHeightError {
    pub fn tag(&self) -> &'static str {
        match self {
            FeatureHeightError::BaselineTooShort => "BL_TooShort",
            FeatureHeightError::GroundLookupOutOfGrid => "GroundOutOfGrid",
            FeatureHeightError::OutOfForwardDownRange => "FwdDownOutOfRange",
        }
    }
}

/// A world-frame location in the same local-tangent-plane meters as
/// `PlatformPose`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldLocation {
    pub northing_m: f64,
    pub easting_m: f64,
}

impl WorldLocation {
    pub fn distance_to(&self, other: &WorldLocation) -> f64 {
        let dn = self.northing_m - other.northing_m;
        let de = self.easting_m - other.easting_m;
        (dn * dn + de * de).sqrt()
    }
}

/// One detection within a block (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub feature_id: FeatureId,
    pub block_id: BlockId,
    pub feature_type: FeatureType,
    pub pixel_box: PixelBox,
    /// Hot-pixel heat samples; empty for Unreal/Consumed.
    pub pixels: Vec<PixelHeat>,
    pub heat_min: f32,
    pub heat_max: f32,
    pub num_hot_pixels: u32,
    /// True once claimed by an object (or seeded as the first Real feature).
    pub owner_object_id: Option<ObjectId>,
    pub significant: bool,
    /// Set once the feature fails a viability gate (over-size or
    /// under-density), see spec §4.2 step 3.
    pub tracking_flag_viable: bool,
    pub world_location: Option<WorldLocation>,
    pub above_ground_height_m: Option<f64>,
    pub height_algorithm: Option<HeightAlgorithm>,
    /// Optional label/confidence supplied by a Yolo-mode detector.
    pub label: Option<String>,
    pub confidence: Option<f32>,
}

impl Feature {
    pub fn density_pct(&self) -> f64 {
        let area = self.pixel_box.area();
        if area == 0 {
            0.0
        } else {
            self.num_hot_pixels as f64 / area as f64
        }
    }

    pub fn is_real(&self) -> bool {
        self.feature_type == FeatureType::Real
    }
}
