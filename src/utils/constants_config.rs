// src/utils/constants_config.rs
use crate::utils::{
    DEFAULT_GRAVITY_CONSTANTS,
    DEFAULT_TREE_CONFIG,
    MAX_TREE_DEPTH,
    errors::TreeError
};

/// How a neighbor found by path replay is refined before it joins the near field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborRefinement {
    /// The node reached by replaying the recorded path is the neighbor, whatever its size.
    PathReplay,
    /// When the path replays all the way down and the reached node is internal, take its
    /// two children facing the leaf, each split once more into its own facing children
    /// when it is internal too.
    TwoSublevels,
}

/// Which removals ask the parent of the affected leaf to try a collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneTrigger {
    /// Only a removal that leaves its leaf empty.
    EmptyLeaf,
    /// Every removal from a leaf that has a parent.
    AnyRemoval,
}

/// Shape limits of the spatial index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeConfig {
    /// A leaf above `min_depth` and below `max_depth` splits when it would exceed this.
    pub max_capacity: usize,
    /// Four sibling leaves holding this many bodies or fewer collapse into their parent.
    pub prune_size: usize,
    /// Nodes shallower than this are never leaves.
    pub min_depth: u32,
    /// Leaves at this depth accept any number of bodies. At most [`MAX_TREE_DEPTH`].
    pub max_depth: u32,
    pub neighbor_refinement: NeighborRefinement,
    pub prune_trigger: PruneTrigger,
}

impl Default for TreeConfig {
    fn default() -> Self {
        DEFAULT_TREE_CONFIG
    }
}

impl TreeConfig {
    pub fn new(
        max_capacity: Option<usize>,
        prune_size: Option<usize>,
        min_depth: Option<u32>,
        max_depth: Option<u32>,
    ) -> Result<Self, TreeError> {
        let default = DEFAULT_TREE_CONFIG;
        let config = Self {
            max_capacity: max_capacity.unwrap_or(default.max_capacity),
            prune_size: prune_size.unwrap_or(default.prune_size),
            min_depth: min_depth.unwrap_or(default.min_depth),
            max_depth: max_depth.unwrap_or(default.max_depth),
            ..default
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_neighbor_refinement(mut self, refinement: NeighborRefinement) -> Self {
        self.neighbor_refinement = refinement;
        self
    }

    pub fn with_prune_trigger(mut self, trigger: PruneTrigger) -> Self {
        self.prune_trigger = trigger;
        self
    }

    /// Rejects limits under which a collapse could immediately split again or a leaf
    /// could never hold a body.
    pub fn validate(&self) -> Result<(), TreeError> {
        if self.max_capacity == 0 {
            return Err(TreeError::InvalidConfig("max_capacity must be at least 1".to_string()));
        }
        if self.prune_size > self.max_capacity {
            return Err(TreeError::InvalidConfig(format!(
                "prune_size ({}) must not exceed max_capacity ({})",
                self.prune_size, self.max_capacity
            )));
        }
        if self.max_depth > MAX_TREE_DEPTH {
            return Err(TreeError::InvalidConfig(format!(
                "max_depth ({}) must not exceed {}",
                self.max_depth, MAX_TREE_DEPTH
            )));
        }
        if self.min_depth > self.max_depth {
            return Err(TreeError::InvalidConfig(format!(
                "min_depth ({}) must not exceed max_depth ({})",
                self.min_depth, self.max_depth
            )));
        }
        Ok(())
    }
}

/// Constants of the pairwise force law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityConstants {
    /// Gravitational constant, N * (m / kg) ^ 2.
    pub g: f64,
    /// Masses below this are treated as massless.
    pub massless_threshold: f64,
    /// Pairs whose summed coordinate deltas fall strictly inside this band exert no force.
    pub coalescence_guard: f64,
}

impl Default for GravityConstants {
    fn default() -> Self {
        DEFAULT_GRAVITY_CONSTANTS
    }
}

impl GravityConstants {
    pub fn new(
        g: Option<f64>,
        massless_threshold: Option<f64>,
        coalescence_guard: Option<f64>,
    ) -> Self {
        let default = DEFAULT_GRAVITY_CONSTANTS;
        Self {
            g: g.unwrap_or(default.g),
            massless_threshold: massless_threshold.unwrap_or(default.massless_threshold),
            coalescence_guard: coalescence_guard.unwrap_or(default.coalescence_guard),
        }
    }
}
