use crate::utils;

/// Deepest level a tree may be configured with. Below this a node's sides shrink past
/// what an `f64` can still halve for any realistic domain.
pub const MAX_TREE_DEPTH: u32 = 64;

pub const DEFAULT_TREE_CONFIG: utils::TreeConfig = utils::TreeConfig {
    max_capacity: 16,
    prune_size: 8,
    min_depth: 0,
    max_depth: 32,
    neighbor_refinement: utils::NeighborRefinement::PathReplay,
    prune_trigger: utils::PruneTrigger::AnyRemoval,
};

pub const DEFAULT_GRAVITY_CONSTANTS: utils::GravityConstants = utils::GravityConstants {
    g: 6.67e-11,
    massless_threshold: 1e-7,
    coalescence_guard: 0.001,
};
