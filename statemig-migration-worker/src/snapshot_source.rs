//! State source backed by a JSON snapshot document.
//!
//! ```json
//! {
//!   "accounts": ["alice", "token"],
//!   "contracts": [
//!     {"account": "token", "code": "0061736d", "abi": {"version": "eosio::abi/1.1"}}
//!   ],
//!   "tables": [
//!     {"account": "token", "table": "accounts", "scope": "alice", "rows": []}
//!   ]
//! }
//! ```

use serde::Deserialize;
use serde_with::{hex::Hex, serde_as};
use statemig_migration_exports::{
    RawAbi, ScopeSelector, ScopedRow, SourceError, SourceStream, StateSource,
};
use statemig_models::abi::Abi;
use statemig_models::name::Name;
use statemig_models::permission::AccountInfo;
use statemig_models::row::TableRow;
use std::path::Path;

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
struct SnapshotContract {
    account: Name,
    #[serde_as(as = "Option<Hex>")]
    #[serde(default)]
    code: Option<Vec<u8>>,
    #[serde(default)]
    abi: Option<Abi>,
    #[serde_as(as = "Option<Hex>")]
    #[serde(default)]
    abi_hex: Option<Vec<u8>>,
    #[serde(default)]
    permissions: Option<AccountInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct SnapshotScope {
    account: Name,
    table: Name,
    scope: Name,
    #[serde(default)]
    payers: Option<Vec<Name>>,
    #[serde(default)]
    rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    accounts: Vec<Name>,
    #[serde(default)]
    contracts: Vec<SnapshotContract>,
    #[serde(default)]
    tables: Vec<SnapshotScope>,
}

/// In-memory ledger state loaded from a snapshot file
#[derive(Debug, Clone, Default)]
pub struct JsonSnapshotSource {
    snapshot: Snapshot,
}

impl JsonSnapshotSource {
    /// Read and parse a snapshot document
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| SourceError::Transport(format!("reading {:?}: {}", path, err)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SourceError> {
        let snapshot: Snapshot =
            serde_json::from_str(text).map_err(|err| SourceError::Malformed(err.to_string()))?;
        Ok(JsonSnapshotSource { snapshot })
    }

    fn contract(&self, account: Name) -> Option<&SnapshotContract> {
        self.snapshot.contracts.iter().find(|c| c.account == account)
    }
}

impl StateSource for JsonSnapshotSource {
    fn stream_accounts(&self) -> Result<SourceStream<Name>, SourceError> {
        Ok(Box::new(self.snapshot.accounts.clone().into_iter().map(Ok)))
    }

    fn stream_contract_accounts(&self) -> Result<SourceStream<Name>, SourceError> {
        let accounts: Vec<Name> = self.snapshot.contracts.iter().map(|c| c.account).collect();
        Ok(Box::new(accounts.into_iter().map(Ok)))
    }

    fn fetch_code(&self, account: Name) -> Result<Option<Vec<u8>>, SourceError> {
        Ok(self.contract(account).and_then(|c| c.code.clone()))
    }

    /// The JSON schema wins when both forms are present
    fn fetch_abi(&self, account: Name) -> Result<Option<RawAbi>, SourceError> {
        let Some(contract) = self.contract(account) else {
            return Ok(None);
        };
        Ok(match (&contract.abi, &contract.abi_hex) {
            (Some(abi), _) => Some(RawAbi::Json(abi.clone())),
            (None, Some(bytes)) => Some(RawAbi::Binary(bytes.clone())),
            (None, None) => None,
        })
    }

    fn stream_table_rows(
        &self,
        account: Name,
        table: Name,
        scopes: ScopeSelector,
    ) -> Result<SourceStream<ScopedRow>, SourceError> {
        let rows: Vec<ScopedRow> = self
            .snapshot
            .tables
            .iter()
            .filter(|s| s.account == account && s.table == table)
            .filter(|s| match &scopes {
                ScopeSelector::All => true,
                ScopeSelector::Only(only) => only.contains(&s.scope),
            })
            .flat_map(|s| {
                s.rows.iter().map(move |row| ScopedRow {
                    scope: s.scope,
                    row: row.clone(),
                })
            })
            .collect();
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn fetch_scope_payers(
        &self,
        account: Name,
        table: Name,
        scope: Name,
    ) -> Result<Option<Vec<Name>>, SourceError> {
        Ok(self
            .snapshot
            .tables
            .iter()
            .find(|s| s.account == account && s.table == table && s.scope == scope)
            .and_then(|s| s.payers.clone()))
    }

    fn fetch_account_permissions(&self, account: Name) -> Result<Option<AccountInfo>, SourceError> {
        Ok(self.contract(account).and_then(|c| c.permissions.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use statemig_migration_exports::test_exports::name;

    const SNAPSHOT: &str = r#"{
        "accounts": ["alice", "token"],
        "contracts": [
            {"account": "token", "code": "0061736d", "abi_hex": "0e"},
            {"account": "nocode", "abi": {"version": "eosio::abi/1.1"}}
        ],
        "tables": [
            {"account": "token", "table": "accounts", "scope": "alice", "payers": ["alice"],
             "rows": [{"key": "a", "payer": "alice", "hex_data": "01"}]},
            {"account": "token", "table": "accounts", "scope": "bob",
             "rows": [{"key": "b", "payer": "bob", "hex_data": "02"}]}
        ]
    }"#;

    #[test]
    fn test_snapshot_answers_every_query() {
        let source = JsonSnapshotSource::from_json(SNAPSHOT).unwrap();
        let accounts: Vec<Name> = source.stream_accounts().unwrap().map(Result::unwrap).collect();
        assert_eq!(accounts, vec![name("alice"), name("token")]);

        assert_eq!(source.fetch_code(name("token")).unwrap(), Some(vec![0x00, 0x61, 0x73, 0x6d]));
        assert_eq!(source.fetch_code(name("nocode")).unwrap(), None);
        assert_matches!(source.fetch_abi(name("token")).unwrap(), Some(RawAbi::Binary(b)) if b == vec![0x0e]);
        assert_matches!(source.fetch_abi(name("nocode")).unwrap(), Some(RawAbi::Json(_)));
        assert_eq!(source.fetch_abi(name("alice")).unwrap(), None);

        let rows: Vec<ScopedRow> = source
            .stream_table_rows(name("token"), name("accounts"), ScopeSelector::All)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].scope, name("bob"));

        let only_bob = source
            .stream_table_rows(name("token"), name("accounts"), ScopeSelector::Only(vec![name("bob")]))
            .unwrap()
            .count();
        assert_eq!(only_bob, 1);

        assert_eq!(
            source.fetch_scope_payers(name("token"), name("accounts"), name("alice")).unwrap(),
            Some(vec![name("alice")])
        );
        assert_eq!(
            source.fetch_scope_payers(name("token"), name("accounts"), name("bob")).unwrap(),
            None
        );
    }

    #[test]
    fn test_malformed_snapshot() {
        assert_matches!(
            JsonSnapshotSource::from_json("{\"accounts\": [\"UPPER\"]}"),
            Err(SourceError::Malformed(_))
        );
        assert_matches!(
            JsonSnapshotSource::load(Path::new("/nonexistent/snapshot.json")),
            Err(SourceError::Transport(_))
        );
    }
}
