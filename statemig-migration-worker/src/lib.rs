//! Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Exports the contract state of a ledger into a sharded file tree, and walks
//! such a tree back into batches of operations rebuilding that state on a
//! fresh ledger.

#![warn(unused_crate_dependencies)]

mod batch;
mod bootstrap;
mod exporter;
mod manager;
mod migrator;
mod permissions;
mod snapshot_source;
mod table_scope;
mod worker;

pub use batch::{BatchEmitter, BatchSink};
pub use bootstrap::{load_bootstrap_contract, migrator_abi};
pub use exporter::export;
pub use migrator::AccountMigrator;
pub use permissions::sort_permissions;
pub use snapshot_source::JsonSnapshotSource;
pub use table_scope::{RowTransaction, TableScope};
pub use worker::start_migration_worker;

#[cfg(test)]
mod tests;
