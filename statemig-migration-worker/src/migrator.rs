// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Walks an export tree and emits the operations rebuilding it on the
//! destination ledger.

use crate::batch::{BatchEmitter, BatchSink};
use crate::permissions::sort_permissions;
use crate::table_scope::TableScope;
use statemig_migration_exports::{
    read_bytes, read_json, read_json_opt, BootstrapContract, ExportTree, MigrationContext,
    MigrationError, MigrationStats, MigratorConfig,
};
use statemig_models::abi::{Abi, AbiSerializer};
use statemig_models::abi_encoder::AbiEncoder;
use statemig_models::error::ModelsError;
use statemig_models::name::Name;
use statemig_models::operation::Operation;
use statemig_models::permission::AccountInfo;
use statemig_models::public_key::PublicKey;
use statemig_models::row::{ScopePayers, TableRow};
use statemig_serialization::Serializer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Single sequential walk of one export tree
pub struct AccountMigrator<S: BatchSink> {
    config: MigratorConfig,
    tree: ExportTree,
    bootstrap: BootstrapContract,
    public_key: PublicKey,
    emitter: BatchEmitter<S>,
    stop: Arc<AtomicBool>,
    stats: MigrationStats,
}

impl<S: BatchSink> AccountMigrator<S> {
    pub fn new(config: MigratorConfig, context: MigrationContext, sink: S, stop: Arc<AtomicBool>) -> Self {
        AccountMigrator {
            tree: ExportTree::new(&config.export_dir),
            config,
            bootstrap: context.bootstrap,
            public_key: context.public_key,
            emitter: BatchEmitter::new(sink, context.cache),
            stop,
            stats: MigrationStats::default(),
        }
    }

    fn cancelled(&mut self) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            self.stats.cancelled = true;
        }
        self.stats.cancelled
    }

    fn create_account(&mut self, name: Name) -> Result<(), MigrationError> {
        if name.is_empty() {
            return Ok(());
        }
        self.emitter.push(Operation::CreateAccount {
            creator: self.config.creator_account,
            name,
            public_key: self.public_key.clone(),
        })?;
        self.emitter.push(Operation::TransactionBoundary)
    }

    /// Run the whole walk. Stops early, between accounts, tables or scopes,
    /// when the stop flag is raised.
    pub fn run(mut self) -> Result<(S, MigrationStats), MigrationError> {
        let accounts: Vec<Name> = read_json(&self.tree.accounts_file())?;
        info!("migrating {} accounts from {:?}", accounts.len(), self.tree.root());

        for account in &accounts {
            self.create_account(*account)?;
        }

        for account in &accounts {
            if self.cancelled() {
                break;
            }
            let abi_file = self.tree.abi_file(*account)?;
            if !abi_file.exists() {
                continue;
            }
            match self.migrate_account(*account) {
                Ok(()) => {}
                Err(err) if err.is_structural() => {
                    warn!("abandoning account {}: {}", account, err);
                    self.stats.abandoned.push(*account);
                }
                Err(err) => return Err(err.in_account(account)),
            }
        }

        let (sink, emitted) = self.emitter.finish()?;
        let mut stats = self.stats;
        stats.accounts_created = emitted.accounts_created;
        stats.duplicate_accounts = emitted.duplicate_accounts;
        stats.batches = emitted.batches;
        info!(
            "migration {}: {} accounts, {} contracts, {} rows in {} batches",
            if stats.cancelled { "cancelled" } else { "done" },
            stats.accounts_created,
            stats.contracts_migrated,
            stats.rows,
            stats.batches
        );
        Ok((sink, stats))
    }

    fn migrate_account(&mut self, account: Name) -> Result<(), MigrationError> {
        debug!("migrating contract account {}", account);
        let abi: Abi = read_json(&self.tree.abi_file(account)?)?;
        let code = read_bytes(&self.tree.code_file(account)?)?;
        let encoder = AbiEncoder::new(&abi);

        self.emitter.push(Operation::SetContract {
            account,
            code: self.bootstrap.code.clone(),
            abi: self.bootstrap.abi.clone(),
        })?;
        self.emitter.push(Operation::TransactionBoundary)?;

        for table in self.tree.list_tables(account)? {
            if self.cancelled() {
                return Ok(());
            }
            if !self.migrate_table(&encoder, account, table)? {
                return Ok(());
            }
        }

        let mut abi_bytes = Vec::new();
        AbiSerializer::new()
            .serialize(&abi, &mut abi_bytes)
            .map_err(ModelsError::from)?;
        self.emitter.push(Operation::SetContract {
            account,
            code: code.into(),
            abi: abi_bytes.into(),
        })?;
        self.restore_permissions(account)?;
        self.emitter.push(Operation::TransactionBoundary)?;
        self.stats.contracts_migrated += 1;
        Ok(())
    }

    /// Returns `false` if the walk was cancelled inside the table
    fn migrate_table(&mut self, encoder: &AbiEncoder, account: Name, table: Name) -> Result<bool, MigrationError> {
        let scopes: Vec<Name> = read_json(&self.tree.scopes_file(account, table)?)?;
        debug!("migrating table {}/{} ({} scopes)", account, table, scopes.len());
        self.stats.tables += 1;

        for scope in scopes {
            if self.cancelled() {
                return Ok(false);
            }
            let rows: Vec<TableRow> = read_json(&self.tree.rows_file(account, table, scope)?)?;
            let payers: Option<ScopePayers> =
                read_json_opt(&self.tree.scope_payers_file(account, table, scope)?)?;
            let table_scope = TableScope::new(account, table, scope, rows, payers);

            for transaction in table_scope.transactions(encoder)? {
                for payer in &transaction.payers {
                    self.create_account(*payer)?;
                }
                self.stats.rows += 1;
                self.stats.indexes += transaction.indexes;
                if transaction.bracketed {
                    self.stats.placeholder_brackets += 1;
                }
                self.emitter.push_all(transaction.operations)?;
                self.emitter.push(Operation::TransactionBoundary)?;
            }
            self.stats.scopes += 1;
        }
        Ok(true)
    }

    fn restore_permissions(&mut self, account: Name) -> Result<(), MigrationError> {
        let Some(info) = read_json_opt::<AccountInfo>(&self.tree.account_info_file(account)?)? else {
            return Ok(());
        };
        for permission in sort_permissions(info.permissions) {
            self.emitter.push(Operation::UpdateAuth {
                account: permission.owner,
                permission: permission.name,
                parent: permission.parent,
                authority: permission.authority,
            })?;
        }
        for link in info.link_auths {
            self.emitter.push(Operation::LinkAuth {
                account,
                contract: link.contract,
                action: link.action,
                permission: link.permission,
            })?;
        }
        Ok(())
    }
}
