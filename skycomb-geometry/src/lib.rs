//! Geometry layer: image->world location, height-by-line-of-sight, and
//! baseline trigonometry (spec.md §4.3).
//!
//! Grounded in the teacher repo's `mvg`/`flydra-mvg` crates' use of
//! `nalgebra` for pose/ray math, simplified to a single body-fixed
//! forward-down camera rather than a full multi-camera pinhole+distortion
//! model, since that is what this system's single airborne sensor needs.

pub mod aggregates;
pub mod baseline;
pub mod camera;
pub mod error;
pub mod flat_ground;
pub mod ground;
pub mod los_refine;

pub use aggregates::{avg_range_m, height_mean_and_err, location_mean_and_err, size_cm2};
pub use baseline::{baseline_triangulate, BaselineFix, BaselineObservation};
pub use camera::{image_fractions, sight_ray, SightRay};
pub use error::GeometryError;
pub use flat_ground::{flat_ground_location, FlatGroundFix};
pub use ground::{ConstantGround, GridGround, GroundSource};
pub use los_refine::{los_refine, LosFix};
