// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::tree::{write_bytes, write_json, ExportTree};
use statemig_models::abi::Abi;
use statemig_models::name::Name;
use statemig_models::permission::AccountInfo;
use statemig_models::row::{ScopePayers, TableRow};
use std::str::FromStr;
use tempfile::TempDir;

/// Parse a name literal, panicking on invalid input
pub fn name(s: &str) -> Name {
    Name::from_str(s).unwrap_or_else(|err| panic!("bad test name {:?}: {}", s, err))
}

/// Writes an export tree into a fresh temporary directory
pub struct ExportTreeBuilder {
    dir: TempDir,
    tree: ExportTree,
}

impl ExportTreeBuilder {
    /// Empty tree
    pub fn new() -> Self {
        let dir = TempDir::new().expect("cannot create temp dir");
        let tree = ExportTree::new(dir.path());
        ExportTreeBuilder { dir, tree }
    }

    /// Write `accounts.json`
    pub fn accounts(self, accounts: &[&str]) -> Self {
        let accounts: Vec<Name> = accounts.iter().map(|a| name(a)).collect();
        write_json(&self.tree.accounts_file(), &accounts).expect("write accounts");
        self
    }

    /// Write the schema and code of a contract account
    pub fn contract(self, account: &str, abi: &Abi, code: &[u8]) -> Self {
        let account = name(account);
        write_json(&self.tree.abi_file(account).expect("abi path"), abi).expect("write abi");
        write_bytes(&self.tree.code_file(account).expect("code path"), code).expect("write code");
        self
    }

    /// Write `account.json`
    pub fn account_info(self, account: &str, info: &AccountInfo) -> Self {
        let path = self.tree.account_info_file(name(account)).expect("account path");
        write_json(&path, info).expect("write account info");
        self
    }

    /// Write a table with its scopes and their rows, scopes in the given order
    pub fn table(self, account: &str, table: &str, scopes: Vec<(&str, Vec<TableRow>)>) -> Self {
        let (account, table) = (name(account), name(table));
        let scope_names: Vec<Name> = scopes.iter().map(|(s, _)| name(s)).collect();
        write_json(&self.tree.scopes_file(account, table).expect("scopes path"), &scope_names)
            .expect("write scopes");
        for (scope, rows) in scopes {
            let path = self
                .tree
                .rows_file(account, table, name(scope))
                .expect("rows path");
            write_json(&path, &rows).expect("write rows");
        }
        self
    }

    /// Write `scope.json`
    pub fn scope_payers(self, account: &str, table: &str, scope: &str, payers: &[&str]) -> Self {
        let path = self
            .tree
            .scope_payers_file(name(account), name(table), name(scope))
            .expect("scope path");
        let payers = ScopePayers {
            payers: payers.iter().map(|p| name(p)).collect(),
        };
        write_json(&path, &payers).expect("write scope payers");
        self
    }

    /// Tree paths. Keep the `TempDir` alive while the tree is used.
    pub fn build(self) -> (TempDir, ExportTree) {
        (self.dir, self.tree)
    }
}

impl Default for ExportTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
