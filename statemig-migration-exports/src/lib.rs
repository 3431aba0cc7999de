// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Types, traits, configurations and errors shared by the state exporter and
//! the account migrator.
//!
//! The export tree layout lives here so both sides resolve the exact same paths.

#![warn(missing_docs)]

mod config;
mod controller_traits;
mod error;
mod report;
mod source;
mod tree;
mod types;

pub use config::{ExporterConfig, MigratorConfig};
pub use controller_traits::MigrationManager;
pub use error::{ExportError, MigrationError, SourceError, TreeError, TreeResult};
pub use report::ExportReport;
#[cfg(any(test, feature = "test-exports"))]
pub use source::MockStateSource;
pub use source::{RawAbi, ScopeSelector, ScopedRow, SourceStream, StateSource};
pub use tree::{read_bytes, read_json, read_json_opt, resolve_path, write_bytes, write_json, ExportTree};
pub use types::{
    AccountCreationCache, Batch, BootstrapContract, MigrationContext, MigrationEvent,
    MigrationStats,
};

/// Tests utils
#[cfg(feature = "test-exports")]
pub mod test_exports;
