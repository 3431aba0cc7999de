// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::{ExporterConfig, MigratorConfig};
use statemig_models::name::Name;

impl Default for ExporterConfig {
    /// default config used for testing
    fn default() -> Self {
        Self {
            export_dir: "export".into(),
            export_permissions: true,
        }
    }
}

impl Default for MigratorConfig {
    /// default config used for testing
    fn default() -> Self {
        Self {
            export_dir: "export".into(),
            system_account: Name::constant("eosio"),
            creator_account: Name::constant("eosio"),
            channel_capacity: 16,
        }
    }
}
