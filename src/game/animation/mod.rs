//! Skeletal animation: building skeletons from imported node trees, importing clips into
//! uniformly timed pose snapshots and evaluating them into skinning matrices every tick.

mod character;
mod clip;
mod evaluator;
mod importer;
mod skeleton;
mod systems;

pub use character::*;
pub use clip::*;
pub use evaluator::*;
pub use importer::*;
pub use skeleton::*;
pub use systems::*;

pub use crate::engine::bone_palette::MAX_BONES;

/// Index of a bone inside its [Skeleton].
pub type BoneIndex = u32;

/// Maps bone names to their index in the skeleton.
pub type NameLookup = ahash::HashMap<String, BoneIndex>;

/// Maximum number of clips a single model can carry.
pub const MAX_ANIMATIONS: usize = 10;

/// Ticks per second used for clips that do not specify it.
pub const DEFAULT_TICKS_PER_SECOND: f64 = 24.0;

/// Nodes with this in their name are helpers and not part of the skeleton.
pub const CONTROL_NODE_MARKER: &str = "Ctrl";
