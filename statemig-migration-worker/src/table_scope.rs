//! Replay plan of one table scope, with RAM payer reconciliation.
//!
//! The destination ledger bills a table scope (and each of its index tables)
//! to whoever creates its first entry. When no row of the scope belongs to
//! the designated payer, the first replayed row is bracketed by one-byte
//! placeholder rows injected under the designated payers and ejected right
//! after, all in the same transaction.

use statemig_logging::statemig_trace;
use statemig_migration_exports::MigrationError;
use statemig_models::abi_encoder::AbiEncoder;
use statemig_models::name::{index_table_name, Name};
use statemig_models::operation::{Operation, PLACEHOLDER_ROW_DATA};
use statemig_models::row::{ScopePayers, TableRow};
use std::collections::HashSet;
use tracing::debug;

/// Operations of one row, submitted as one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct RowTransaction {
    /// accounts that must exist before the transaction runs
    pub payers: Vec<Name>,
    pub operations: Vec<Operation>,
    pub indexes: usize,
    pub bracketed: bool,
}

pub struct TableScope {
    account: Name,
    table: Name,
    scope: Name,
    rows: Vec<TableRow>,
    payers: Vec<Name>,
}

impl TableScope {
    /// Without explicit payers, the first row designates them.
    pub fn new(
        account: Name,
        table: Name,
        scope: Name,
        rows: Vec<TableRow>,
        payers: Option<ScopePayers>,
    ) -> Self {
        let payers = match (payers, rows.first()) {
            (Some(payers), _) if !payers.payers.is_empty() => payers.payers,
            (_, Some(first)) => ScopePayers::from_row(first).payers,
            _ => Vec::new(),
        };
        TableScope {
            account,
            table,
            scope,
            rows,
            payers,
        }
    }

    pub fn payers(&self) -> &[Name] {
        &self.payers
    }

    /// First row already billed to the designated payer
    pub fn payer_row(&self) -> Option<usize> {
        let payer = self.payers.first()?;
        self.rows.iter().position(|row| row.payer == *payer)
    }

    /// Smallest key above the first row's key not used by any row of the scope
    fn placeholder_key(&self, first: &TableRow) -> Result<Name, MigrationError> {
        let used = self
            .rows
            .iter()
            .map(|row| row.key_name())
            .collect::<Result<HashSet<Name>, _>>()?;
        let mut key = first.key_name()?;
        loop {
            key = key.checked_next().ok_or_else(|| {
                MigrationError::Inconsistent(format!(
                    "no free placeholder key after {} in {}/{}/{}",
                    first.key, self.account, self.table, self.scope
                ))
            })?;
            if !used.contains(&key) {
                return Ok(key);
            }
        }
    }

    /// Placeholder injections under each designated payer and their ejections
    fn placeholder_bracket(
        &self,
        first: &TableRow,
    ) -> Result<(Vec<Operation>, Vec<Operation>), MigrationError> {
        let key = self.placeholder_key(first)?;
        let mut pre = Vec::with_capacity(self.payers.len());
        let mut post = Vec::with_capacity(self.payers.len());
        for (ordinal, payer) in self.payers.iter().enumerate() {
            let table = index_table_name(self.table, ordinal as u64)?;
            pre.push(Operation::InjectRow {
                account: self.account,
                table,
                scope: self.scope,
                payer: *payer,
                key,
                data: PLACEHOLDER_ROW_DATA.to_vec(),
            });
            post.push(Operation::EjectRow {
                account: self.account,
                table,
                scope: self.scope,
                key,
            });
        }
        Ok((pre, post))
    }

    fn row_transaction(
        &self,
        encoder: &AbiEncoder,
        row: &TableRow,
    ) -> Result<RowTransaction, MigrationError> {
        let key = row.key_name()?;
        let mut operations = Vec::with_capacity(1 + row.secondary_indexes.len());
        operations.push(Operation::inject_row(encoder, self.account, self.table, self.scope, row)?);
        for (ordinal, entry) in row.secondary_indexes.iter().enumerate() {
            operations.push(Operation::inject_index(
                self.account,
                self.table,
                self.scope,
                key,
                ordinal,
                entry,
            )?);
        }
        let mut payers = vec![row.payer];
        payers.extend(row.secondary_indexes.iter().map(|e| e.payer));
        statemig_trace!("migrator.row", {
            "account": self.account.to_string(),
            "table": self.table.to_string(),
            "scope": self.scope.to_string(),
            "key": row.key,
            "payer": row.payer.to_string(),
            "indexes": row.secondary_indexes.len(),
        });
        Ok(RowTransaction {
            payers,
            operations,
            indexes: row.secondary_indexes.len(),
            bracketed: false,
        })
    }

    /// One transaction per row. The designated payer's row goes first when it
    /// exists, otherwise the first row is bracketed.
    pub fn transactions(&self, encoder: &AbiEncoder) -> Result<Vec<RowTransaction>, MigrationError> {
        let Some(first) = self.rows.first() else {
            return Ok(Vec::new());
        };
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        let payer_row = self.payer_row();
        if let Some(i) = payer_row {
            order.remove(i);
            order.insert(0, i);
        }

        let mut transactions = Vec::with_capacity(self.rows.len());
        for i in order {
            transactions.push(self.row_transaction(encoder, &self.rows[i])?);
        }

        if payer_row.is_none() {
            debug!(
                "scope {}/{}/{}: designated payer owns no row, bracketing the first one",
                self.account, self.table, self.scope
            );
            let (mut operations, post) = self.placeholder_bracket(first)?;
            let tx = &mut transactions[0];
            tx.payers.extend(self.payers.iter().copied());
            operations.append(&mut tx.operations);
            operations.extend(post);
            tx.operations = operations;
            tx.bracketed = true;
        }
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statemig_models::abi::Abi;
    use statemig_models::secondary_index::{SecondaryIndexEntry, SecondaryValue};
    use std::str::FromStr;

    fn n(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn row(key: &str, payer: &str, indexes: &[&str]) -> TableRow {
        TableRow {
            key: key.to_string(),
            payer: n(payer),
            json_data: None,
            hex_data: Some(vec![0x42]),
            secondary_indexes: indexes
                .iter()
                .map(|p| SecondaryIndexEntry::new(SecondaryValue::Ui64(7), n(p)))
                .collect(),
        }
    }

    fn plan(rows: Vec<TableRow>, payers: Option<&[&str]>) -> Vec<RowTransaction> {
        let abi = Abi::default();
        let encoder = AbiEncoder::new(&abi);
        let payers = payers.map(|p| ScopePayers {
            payers: p.iter().map(|s| n(s)).collect(),
        });
        TableScope::new(n("acc"), n("tbl"), n("scp"), rows, payers)
            .transactions(&encoder)
            .unwrap()
    }

    #[test]
    fn test_no_bracket_when_first_row_belongs_to_payer() {
        let txs = plan(vec![row("k", "alice", &[]), row("l", "bob", &[])], None);
        assert_eq!(txs.len(), 2);
        assert!(txs.iter().all(|tx| !tx.bracketed));
        assert_eq!(txs[0].operations.len(), 1);
    }

    #[test]
    fn test_payer_row_is_replayed_first() {
        let txs = plan(
            vec![row("k", "bob", &[]), row("l", "alice", &[])],
            Some(&["alice"]),
        );
        assert!(txs.iter().all(|tx| !tx.bracketed));
        let Operation::InjectRow { key, .. } = &txs[0].operations[0] else {
            panic!("expected an injection");
        };
        assert_eq!(*key, n("l"));
    }

    #[test]
    fn test_missing_payer_row_is_bracketed_once() {
        let txs = plan(
            vec![row("k", "bob", &["bob"]), row("l", "bob", &["bob"])],
            Some(&["alice", "carol"]),
        );
        assert!(txs[0].bracketed);
        assert!(!txs[1].bracketed);
        let ops = &txs[0].operations;
        // 2 placeholders, row, index, 2 ejections
        assert_eq!(ops.len(), 6);

        let placeholder_key = n("k").checked_next().unwrap();
        assert_eq!(
            ops[0],
            Operation::InjectRow {
                account: n("acc"),
                table: n("tbl"),
                scope: n("scp"),
                payer: n("alice"),
                key: placeholder_key,
                data: vec![0x01],
            }
        );
        let Operation::InjectRow { table, payer, .. } = &ops[1] else {
            panic!("expected a placeholder");
        };
        assert_eq!(*table, index_table_name(n("tbl"), 1).unwrap());
        assert_eq!(*payer, n("carol"));
        assert_eq!(
            ops[4],
            Operation::EjectRow {
                account: n("acc"),
                table: n("tbl"),
                scope: n("scp"),
                key: placeholder_key,
            }
        );
        assert!(matches!(ops[5], Operation::EjectRow { .. }));
        assert!(txs[0].payers.contains(&n("alice")));
        assert!(txs[0].payers.contains(&n("carol")));
        assert!(txs[1].operations.iter().all(|op| !matches!(op, Operation::EjectRow { .. })));
    }

    #[test]
    fn test_placeholder_key_skips_used_keys() {
        let next = n("k").checked_next().unwrap();
        let txs = plan(
            vec![row("k", "bob", &[]), row(&next.to_string(), "bob", &[])],
            Some(&["alice"]),
        );
        let Operation::InjectRow { key, .. } = &txs[0].operations[0] else {
            panic!("expected a placeholder");
        };
        assert_eq!(*key, next.checked_next().unwrap());
    }

    #[test]
    fn test_empty_scope() {
        assert!(plan(vec![], Some(&["alice"])).is_empty());
    }
}
