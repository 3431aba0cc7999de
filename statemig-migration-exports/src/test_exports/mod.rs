// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! This module exposes useful tooling for testing.
//! It is only compiled and exported by the crate if the "test-exports" feature is enabled.
//!
//! ## config.rs
//! Provides default exporter and migrator configurations for testing.
//!
//! ## tree_builder.rs
//! Writes export trees into temporary directories.

mod config;
mod tree_builder;

pub use tree_builder::*;
