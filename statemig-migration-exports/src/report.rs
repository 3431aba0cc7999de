// Copyright (c) 2022 MASSA LABS <info@massa.net>

use serde::Serialize;
use statemig_models::name::Name;

/// Outcome of an export, returned even when some accounts were skipped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    /// accounts listed in `accounts.json`
    pub accounts: usize,
    /// accounts announced with a contract
    pub contracts: usize,
    /// contracts written to the tree
    pub exported_contracts: usize,
    /// tables written
    pub tables: usize,
    /// scopes written
    pub scopes: usize,
    /// rows written
    pub rows: usize,
    /// contract accounts skipped because the source has no code for them
    pub missing_code: Vec<Name>,
    /// contract accounts skipped because the source has no schema for them
    pub missing_abi: Vec<Name>,
    /// contract accounts skipped because their schema does not parse
    pub invalid_abi: Vec<Name>,
    /// contract accounts abandoned on a structural error (empty table or scope name)
    pub failed: Vec<Name>,
}

impl ExportReport {
    /// Number of skipped contract accounts
    pub fn skipped(&self) -> usize {
        self.missing_code.len() + self.missing_abi.len() + self.invalid_abi.len() + self.failed.len()
    }
}
