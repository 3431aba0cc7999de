use crate::batch::BatchSink;
use crate::migrator::AccountMigrator;
use serde_json::json;
use statemig_migration_exports::test_exports::name;
use statemig_migration_exports::{
    Batch, BootstrapContract, ExportTree, MigrationContext, MigrationError, MigrationStats,
    MigratorConfig,
};
use statemig_models::abi::{Abi, FieldDef, StructDef, TableDef};
use statemig_models::operation::Operation;
use statemig_models::public_key::PublicKey;
use statemig_models::row::TableRow;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub const TEST_PUBLIC_KEY: &str = "EOS6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV";
pub const TOKEN_CODE: &[u8] = b"\x00asm token";

pub fn public_key() -> PublicKey {
    PublicKey::from_str(TEST_PUBLIC_KEY).unwrap()
}

pub fn bootstrap() -> BootstrapContract {
    BootstrapContract {
        code: Arc::from(&b"\x00asm migrator"[..]),
        abi: Arc::from(&[0x0e_u8, 0x00][..]),
    }
}

/// Contract with two tables, `accounts` and `stat`, both holding `{balance: uint64}` rows
pub fn token_abi() -> Abi {
    let table = |table: &str| TableDef {
        name: name(table),
        index_type: "i64".into(),
        ty: "account".into(),
        ..Default::default()
    };
    Abi {
        version: "eosio::abi/1.1".into(),
        structs: vec![StructDef {
            name: "account".into(),
            base: String::new(),
            fields: vec![FieldDef {
                name: "balance".into(),
                ty: "uint64".into(),
            }],
        }],
        tables: vec![table("accounts"), table("stat")],
        ..Default::default()
    }
}

pub fn balance_row(key: &str, payer: &str, balance: u64) -> TableRow {
    TableRow {
        key: key.to_string(),
        payer: name(payer),
        json_data: Some(json!({ "balance": balance })),
        hex_data: None,
        secondary_indexes: Vec::new(),
    }
}

pub fn migrator_config(tree: &ExportTree) -> MigratorConfig {
    MigratorConfig {
        export_dir: tree.root().to_path_buf(),
        ..Default::default()
    }
}

pub fn run_migrator(
    tree: &ExportTree,
    stop: Arc<AtomicBool>,
) -> Result<(Vec<Batch>, MigrationStats), MigrationError> {
    let context = MigrationContext::new(bootstrap(), public_key());
    AccountMigrator::new(migrator_config(tree), context, Vec::new(), stop).run()
}

/// Run a full migration into memory
pub fn migrate(tree: &ExportTree) -> (Vec<Batch>, MigrationStats) {
    run_migrator(tree, Arc::new(AtomicBool::new(false))).expect("migration failed")
}

pub fn created_accounts(batches: &[Batch]) -> Vec<String> {
    batches
        .iter()
        .flatten()
        .filter_map(|op| match op {
            Operation::CreateAccount { name, .. } => Some(name.to_string()),
            _ => None,
        })
        .collect()
}

/// Sink failing on the n-th delivery, as a consumer going away would
#[derive(Debug)]
pub struct ClosingSink {
    pub remaining: usize,
}

impl BatchSink for ClosingSink {
    fn deliver(&mut self, _batch: Batch) -> Result<(), MigrationError> {
        if self.remaining == 0 {
            return Err(MigrationError::ChannelClosed);
        }
        self.remaining -= 1;
        Ok(())
    }
}
