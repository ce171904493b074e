//! Common utilities for the arbor crates.
//!
//! This crate provides shared infrastructure used by all components:
//! - **Warning System** - deduplicated warnings for unsupported or degraded input

pub mod warning;
