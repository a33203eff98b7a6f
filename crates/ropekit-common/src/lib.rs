//! Common types for the ropekit rotary positional-encoding engine
//!
//! This crate provides the foundational types shared by the table builders
//! and the embedding layer: the raw and validated rope scaling configuration,
//! the resolved [`RotaryConfig`], output precision naming and the error type.

pub mod config;
pub mod dtype;
pub mod error;
pub mod model;
pub mod spec;

pub use config::*;
pub use dtype::RopeDType;
pub use error::*;
pub use model::ModelRopeConfig;
pub use spec::{RopeSpec, RotaryConfig};
