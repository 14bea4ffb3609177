pub mod utils;
pub mod gravtree;
