//! sprig benchmarking suite
//!
//! Resolution over generated registries, and parsing of manifests, index
//! documents and lock files.

pub mod common;

pub use common::*;
