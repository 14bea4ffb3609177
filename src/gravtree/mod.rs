mod body;
mod quad_node;
mod spatial_index;
mod neighbors;
mod force_evaluator;
mod simulation;

pub use body::*;
pub use quad_node::*;
pub use spatial_index::*;
pub use neighbors::*;
pub use force_evaluator::*;
pub use simulation::*;

#[cfg(test)]
mod body_tests;
#[cfg(test)]
mod neighbors_tests;
#[cfg(test)]
mod simulation_tests;
