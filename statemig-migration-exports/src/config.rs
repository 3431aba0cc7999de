// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Settings of the exporter and of the migrator

use statemig_models::name::Name;
use std::path::PathBuf;

/// Exporter configuration
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// root of the export tree
    pub export_dir: PathBuf,
    /// also export account permissions when the source provides them.
    /// Scope payers are exported regardless.
    pub export_permissions: bool,
}

/// Migrator configuration
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// root of the export tree to replay
    pub export_dir: PathBuf,
    /// account receiving account and contract management actions
    pub system_account: Name,
    /// account creating every migrated account
    pub creator_account: Name,
    /// max number of batches waiting for the consumer
    pub channel_capacity: usize,
}
