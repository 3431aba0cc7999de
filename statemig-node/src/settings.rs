// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Build here the default node settings from the config file toml

use directories::ProjectDirs;
use serde::Deserialize;
use statemig_models::name::Name;
use std::path::{Path, PathBuf};

const BASE_CONFIG_PATH: &str = "base_config/config.toml";
const OVERRIDE_CONFIG_PATH: &str = "config/config.toml";
const ENV_PREFIX: &str = "STATEMIG";

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct LoggingSettings {
    pub level: usize,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ExporterSettings {
    pub export_permissions: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MigratorSettings {
    pub system_account: Name,
    pub creator_account: Name,
    pub channel_capacity: usize,
    /// replaces the embedded migrator wasm
    #[serde(default)]
    pub bootstrap_code_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub exporter: ExporterSettings,
    pub migrator: MigratorSettings,
}

/// Layer, lowest priority first: the base config, the fallback config (or
/// `config/config.toml`), the user config directory, `STATEMIG__*` variables.
pub fn build_settings(fallback_config: Option<&Path>) -> Result<Settings, config::ConfigError> {
    let mut builder = config::Config::builder().add_source(config::File::with_name(BASE_CONFIG_PATH));

    match fallback_config {
        Some(path) => builder = builder.add_source(config::File::from(path)),
        None => {
            if Path::new(OVERRIDE_CONFIG_PATH).is_file() {
                builder = builder.add_source(config::File::with_name(OVERRIDE_CONFIG_PATH));
            }
        }
    }

    if let Some(proj_dirs) = ProjectDirs::from("com", "MassaLabs", "statemig") {
        // Portable user config loading
        let user_config_path = proj_dirs.config_dir().join("config.toml");
        if user_config_path.is_file() {
            builder = builder.add_source(config::File::from(user_config_path));
        }
    }

    builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    // base_config/config.toml is resolved from the crate root, where cargo runs the tests
    #[test]
    #[serial]
    fn test_fallback_config_overrides_base_config() {
        let mut fallback = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(fallback, "[migrator]\nchannel_capacity = 7").unwrap();

        let settings = build_settings(Some(fallback.path())).unwrap();
        assert_eq!(settings.migrator.channel_capacity, 7);
        assert_eq!(settings.migrator.system_account, Name::constant("eosio"));
        assert_eq!(settings.logging.level, 2);
        assert!(settings.exporter.export_permissions);
        // the migrator wasm is embedded unless overridden
        assert_eq!(settings.migrator.bootstrap_code_path, None);
    }

    #[test]
    #[serial]
    fn test_bootstrap_code_can_be_overridden() {
        let mut fallback = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(fallback, "[migrator]\nbootstrap_code_path = \"custom/migrator.wasm\"").unwrap();

        let settings = build_settings(Some(fallback.path())).unwrap();
        assert_eq!(
            settings.migrator.bootstrap_code_path,
            Some(PathBuf::from("custom/migrator.wasm"))
        );
    }

    #[test]
    #[serial]
    fn test_environment_has_the_last_word() {
        std::env::set_var("STATEMIG__LOGGING__LEVEL", "4");
        let settings = build_settings(None);
        std::env::remove_var("STATEMIG__LOGGING__LEVEL");
        assert_eq!(settings.unwrap().logging.level, 4);
    }
}
