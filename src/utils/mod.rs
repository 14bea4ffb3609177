pub mod errors;
pub mod constants;
pub mod constants_config;

pub use errors::*;
pub use constants::*;
pub use constants_config::*;
