//! # xidrelay Testkit
//!
//! Test utilities for xidrelay.
//!
//! This crate provides:
//! - Fixtures: the `regextest` table catalog, a sample two-cluster topology,
//!   snapshot shorthands and log stores over a manual clock
//! - Property-based test generators using proptest
//! - A simulated master and replica for end-to-end visibility tests
//!
//! ## Usage
//!
//! ```rust
//! use xidrelay_testkit::prelude::*;
//!
//! let s = snapshot(10, 10, 20, &[11, 12, 13]);
//! assert!(s.is_committed_before(xid(14)));
//! assert!(!s.is_committed_before(xid(11)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod replay;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::replay::*;
}

pub use fixtures::*;
pub use generators::*;
pub use replay::*;
