// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Materializes the state of a source ledger into an export tree.

use statemig_migration_exports::{
    write_bytes, write_json, ExportError, ExportReport, ExportTree, ExporterConfig, RawAbi,
    ScopeSelector, StateSource, TreeError,
};
use statemig_models::abi::{Abi, AbiDeserializer};
use statemig_models::name::Name;
use statemig_models::row::{ScopePayers, TableRow};
use statemig_serialization::{DeserializeError, Deserializer};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Export every account, contract, table, scope and row of `source` under
/// `config.export_dir`.
///
/// Contract accounts without code, without schema or with an unparsable
/// schema are skipped and listed in the report. Any other error aborts the
/// export and leaves the partially written tree behind.
pub fn export(source: &dyn StateSource, config: &ExporterConfig) -> Result<ExportReport, ExportError> {
    Exporter::new(source, config).run()
}

struct Exporter<'a> {
    source: &'a dyn StateSource,
    config: &'a ExporterConfig,
    tree: ExportTree,
    abi_deserializer: AbiDeserializer,
    report: ExportReport,
}

impl<'a> Exporter<'a> {
    fn new(source: &'a dyn StateSource, config: &'a ExporterConfig) -> Self {
        Exporter {
            source,
            config,
            tree: ExportTree::new(&config.export_dir),
            abi_deserializer: AbiDeserializer::new(),
            report: ExportReport::default(),
        }
    }

    fn run(mut self) -> Result<ExportReport, ExportError> {
        info!("exporting state to {:?}", self.tree.root());
        let accounts = self
            .source
            .stream_accounts()?
            .collect::<Result<Vec<Name>, _>>()?;
        write_json(&self.tree.accounts_file(), &accounts)?;
        self.report.accounts = accounts.len();
        info!("exported {} accounts", accounts.len());

        let contracts = self
            .source
            .stream_contract_accounts()?
            .collect::<Result<Vec<Name>, _>>()?;
        self.report.contracts = contracts.len();
        info!("exporting {} contracts", contracts.len());

        for account in contracts {
            match self.export_contract(account) {
                Ok(()) => {}
                Err(ExportError::Tree(TreeError::InvalidArgument(reason))) => {
                    warn!("abandoning contract {}: {}", account, reason);
                    self.report.failed.push(account);
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            "export done: {} contracts, {} tables, {} scopes, {} rows, {} skipped",
            self.report.exported_contracts,
            self.report.tables,
            self.report.scopes,
            self.report.rows,
            self.report.skipped()
        );
        Ok(self.report)
    }

    /// Schema of `account`, or the skip list it belongs to
    fn fetch_abi(&mut self, account: Name) -> Result<Option<Abi>, ExportError> {
        match self.source.fetch_abi(account)? {
            None => {
                warn!("skipping contract {}: no schema", account);
                self.report.missing_abi.push(account);
                Ok(None)
            }
            Some(RawAbi::Json(abi)) => Ok(Some(abi)),
            Some(RawAbi::Binary(bytes)) => {
                match self.abi_deserializer.deserialize::<DeserializeError>(&bytes) {
                    Ok((_, abi)) => Ok(Some(abi)),
                    Err(err) => {
                        warn!("skipping contract {}: invalid schema: {}", account, err);
                        self.report.invalid_abi.push(account);
                        Ok(None)
                    }
                }
            }
        }
    }

    fn export_contract(&mut self, account: Name) -> Result<(), ExportError> {
        let Some(code) = self.source.fetch_code(account)? else {
            warn!("skipping contract {}: no code", account);
            self.report.missing_code.push(account);
            return Ok(());
        };
        let Some(abi) = self.fetch_abi(account)? else {
            return Ok(());
        };
        debug!("exporting contract {} ({} tables)", account, abi.tables.len());

        write_json(&self.tree.abi_file(account)?, &abi)?;
        write_bytes(&self.tree.code_file(account)?, &code)?;
        if self.config.export_permissions {
            if let Some(info) = self.source.fetch_account_permissions(account)? {
                write_json(&self.tree.account_info_file(account)?, &info)?;
            }
        }

        let mut seen_tables = Vec::with_capacity(abi.tables.len());
        for table in abi.tables.iter().map(|t| t.name) {
            if seen_tables.contains(&table) {
                continue;
            }
            seen_tables.push(table);
            self.export_table(account, table)?;
        }
        self.report.exported_contracts += 1;
        Ok(())
    }

    fn export_table(&mut self, account: Name, table: Name) -> Result<(), ExportError> {
        let mut scopes: Vec<Name> = Vec::new();
        let mut rows: HashMap<Name, Vec<TableRow>> = HashMap::new();
        for scoped in self
            .source
            .stream_table_rows(account, table, ScopeSelector::All)?
        {
            let scoped = scoped?;
            rows.entry(scoped.scope)
                .or_insert_with(|| {
                    scopes.push(scoped.scope);
                    Vec::new()
                })
                .push(scoped.row);
        }
        debug!("table {}/{}: {} scopes", account, table, scopes.len());

        // scope paths are resolved before anything is written for the table
        let rows_files = scopes
            .iter()
            .map(|scope| self.tree.rows_file(account, table, *scope))
            .collect::<Result<Vec<_>, _>>()?;
        write_json(&self.tree.scopes_file(account, table)?, &scopes)?;

        for (scope, rows_file) in scopes.iter().zip(rows_files) {
            let scope_rows = rows.remove(scope).unwrap_or_default();
            self.report.rows += scope_rows.len();
            write_json(&rows_file, &scope_rows)?;
            // scope payers do not depend on `export_permissions`
            if let Some(payers) = self.source.fetch_scope_payers(account, table, *scope)? {
                write_json(
                    &self.tree.scope_payers_file(account, table, *scope)?,
                    &ScopePayers { payers },
                )?;
            }
        }
        self.report.tables += 1;
        self.report.scopes += scopes.len();
        Ok(())
    }
}
