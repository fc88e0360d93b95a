//! Core message types and segmentation constants

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
