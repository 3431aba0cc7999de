// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! The "migrator" contract installed on every account while its rows are replayed.
//! Code and schema ship with the crate; the code can be overridden from disk.

use statemig_migration_exports::{read_bytes, BootstrapContract, MigrationError};
use statemig_models::abi::{Abi, AbiSerializer};
use statemig_models::error::ModelsError;
use statemig_serialization::Serializer;
use std::path::Path;

const MIGRATOR_ABI_JSON: &str = include_str!("bootstrap/migrator.abi.json");
const MIGRATOR_CODE: &[u8] = include_bytes!("bootstrap/migrator.wasm");

/// Schema of the migrator contract
pub fn migrator_abi() -> Result<Abi, MigrationError> {
    serde_json::from_str(MIGRATOR_ABI_JSON)
        .map_err(|err| ModelsError::DeserializeError(format!("migrator abi: {}", err)).into())
}

/// Pair the migrator code with the embedded schema.
/// `code_override` replaces the embedded wasm when given.
pub fn load_bootstrap_contract(
    code_override: Option<&Path>,
) -> Result<BootstrapContract, MigrationError> {
    let code = match code_override {
        Some(path) => read_bytes(path)?,
        None => MIGRATOR_CODE.to_vec(),
    };
    let mut abi = Vec::new();
    AbiSerializer::new()
        .serialize(&migrator_abi()?, &mut abi)
        .map_err(ModelsError::from)?;
    Ok(BootstrapContract {
        code: code.into(),
        abi: abi.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use statemig_models::operation::{ACTION_EJECT, ACTION_IDXLDBL, ACTION_INJECT};

    #[test]
    fn test_embedded_abi_declares_every_replay_action() {
        let abi = migrator_abi().unwrap();
        let actions: Vec<_> = abi.actions.iter().map(|a| a.name).collect();
        assert_eq!(actions.len(), 7);
        for action in [ACTION_INJECT, ACTION_EJECT, ACTION_IDXLDBL] {
            assert!(actions.contains(&action));
        }
    }

    #[test]
    fn test_embedded_bootstrap_needs_no_file() {
        let contract = load_bootstrap_contract(None).unwrap();
        // wasm magic and version 1
        assert_eq!(&contract.code[..8], b"\0asm\x01\0\0\0");
        assert_eq!(contract.code.len(), MIGRATOR_CODE.len());
        assert!(!contract.abi.is_empty());
    }

    #[test]
    fn test_code_override_replaces_the_embedded_wasm() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("migrator.wasm");
        std::fs::write(&path, b"\0asm").unwrap();
        let contract = load_bootstrap_contract(Some(&path)).unwrap();
        assert_eq!(&contract.code[..], b"\0asm");
        assert_eq!(contract.abi, load_bootstrap_contract(None).unwrap().abi);

        assert!(load_bootstrap_contract(Some(&dir.path().join("missing.wasm"))).is_err());
    }
}
