//! CLI command implementations.

pub mod logswitch;
pub mod tables;
pub mod topology;
