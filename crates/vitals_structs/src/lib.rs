//! Common structs for vital-sign samples and model outputs shared across crates.

mod artifact_kind;
mod prediction;
mod sample;

pub use artifact_kind::*;
pub use prediction::*;
pub use sample::*;
