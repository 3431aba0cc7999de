//! Reconstruction operations produced by the migrator, and their rendering
//! into ledger actions.

use crate::abi_encoder::AbiEncoder;
use crate::error::ModelsResult;
use crate::name::{index_table_name, Name, NameSerializer};
use crate::permission::{
    Authority, AuthoritySerializer, PermissionLevel, ACTIVE_PERMISSION, OWNER_PERMISSION,
};
use crate::public_key::PublicKey;
use crate::row::TableRow;
use crate::secondary_index::{SecondaryIndexEntry, SecondaryValue};
use serde::Serialize;
use serde_with::{hex::Hex, serde_as};
use statemig_serialization::{Serializer, VecU8Serializer};
use std::sync::Arc;

pub const ACTION_NEWACCOUNT: Name = Name::constant("newaccount");
pub const ACTION_SETALIMITS: Name = Name::constant("setalimits");
pub const ACTION_SETCODE: Name = Name::constant("setcode");
pub const ACTION_SETABI: Name = Name::constant("setabi");
pub const ACTION_UPDATEAUTH: Name = Name::constant("updateauth");
pub const ACTION_LINKAUTH: Name = Name::constant("linkauth");
pub const ACTION_INJECT: Name = Name::constant("inject");
pub const ACTION_EJECT: Name = Name::constant("eject");
pub const ACTION_IDXI: Name = Name::constant("idxi");
pub const ACTION_IDXII: Name = Name::constant("idxii");
pub const ACTION_IDXC: Name = Name::constant("idxc");
pub const ACTION_IDXDBL: Name = Name::constant("idxdbl");
pub const ACTION_IDXLDBL: Name = Name::constant("idxldbl");

/// Payload of the placeholder rows used to pin a scope's payer
pub const PLACEHOLDER_ROW_DATA: [u8; 1] = [0x01];

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateAccount {
        creator: Name,
        name: Name,
        public_key: PublicKey,
    },
    /// `abi` is the binary form of the schema
    SetContract {
        account: Name,
        code: Arc<[u8]>,
        abi: Arc<[u8]>,
    },
    InjectRow {
        account: Name,
        table: Name,
        scope: Name,
        payer: Name,
        key: Name,
        data: Vec<u8>,
    },
    /// `table` is the index table, already derived from the ordinal
    InjectIndex {
        account: Name,
        table: Name,
        scope: Name,
        payer: Name,
        key: Name,
        value: SecondaryValue,
    },
    EjectRow {
        account: Name,
        table: Name,
        scope: Name,
        key: Name,
    },
    UpdateAuth {
        account: Name,
        permission: Name,
        parent: Name,
        authority: Authority,
    },
    LinkAuth {
        account: Name,
        contract: Name,
        action: Name,
        permission: Name,
    },
    TransactionBoundary,
}

impl Operation {
    /// Encode `row` against the schema and build its `InjectRow`
    pub fn inject_row(
        encoder: &AbiEncoder,
        account: Name,
        table: Name,
        scope: Name,
        row: &TableRow,
    ) -> ModelsResult<Operation> {
        let key = row.key_name()?;
        let data = row.payload()?.encode(encoder, table)?;
        Ok(Operation::InjectRow {
            account,
            table,
            scope,
            payer: row.payer,
            key,
            data,
        })
    }

    /// Build the `InjectIndex` of the `ordinal`-th secondary index of a row
    pub fn inject_index(
        account: Name,
        table: Name,
        scope: Name,
        key: Name,
        ordinal: usize,
        entry: &SecondaryIndexEntry,
    ) -> ModelsResult<Operation> {
        let value = entry.typed_value()?;
        Ok(Operation::InjectIndex {
            account,
            table: index_table_name(table, ordinal as u64)?,
            scope,
            payer: entry.payer,
            key,
            value,
        })
    }

    pub fn is_boundary(&self) -> bool {
        matches!(self, Operation::TransactionBoundary)
    }

    /// Render as ledger actions. Contract management actions go to
    /// `system_account`, storage actions to the migrated account itself.
    pub fn to_actions(&self, system_account: Name) -> ModelsResult<Vec<Action>> {
        let names = NameSerializer::new();
        let bytes = VecU8Serializer::new();
        let mut data = Vec::new();
        let actions = match self {
            Operation::CreateAccount {
                creator,
                name,
                public_key,
            } => {
                let authority = Authority::from_key(public_key.clone());
                let authorities = AuthoritySerializer::new();
                names.serialize(creator, &mut data)?;
                names.serialize(name, &mut data)?;
                authorities.serialize(&authority, &mut data)?;
                authorities.serialize(&authority, &mut data)?;

                let mut limits = Vec::new();
                names.serialize(name, &mut limits)?;
                for _ in 0..3 {
                    limits.extend_from_slice(&(-1i64).to_le_bytes());
                }
                vec![
                    Action::new(system_account, ACTION_NEWACCOUNT, *creator, data),
                    Action::new(system_account, ACTION_SETALIMITS, system_account, limits),
                ]
            }
            Operation::SetContract { account, code, abi } => {
                names.serialize(account, &mut data)?;
                // vm type and vm version
                data.extend_from_slice(&[0, 0]);
                bytes.serialize(&code[..], &mut data)?;

                let mut abi_data = Vec::new();
                names.serialize(account, &mut abi_data)?;
                bytes.serialize(&abi[..], &mut abi_data)?;
                vec![
                    Action::new(system_account, ACTION_SETCODE, *account, data),
                    Action::new(system_account, ACTION_SETABI, *account, abi_data),
                ]
            }
            Operation::InjectRow {
                account,
                table,
                scope,
                payer,
                key,
                data: row,
            } => {
                for n in [table, scope, payer, key] {
                    names.serialize(n, &mut data)?;
                }
                bytes.serialize(&row[..], &mut data)?;
                vec![Action::new(*account, ACTION_INJECT, *payer, data)]
            }
            Operation::InjectIndex {
                account,
                table,
                scope,
                payer,
                key,
                value,
            } => {
                for n in [table, scope, payer, key] {
                    names.serialize(n, &mut data)?;
                }
                data.extend_from_slice(&value.to_bytes());
                let action = match value {
                    SecondaryValue::Ui64(_) => ACTION_IDXI,
                    SecondaryValue::Ui128(_) => ACTION_IDXII,
                    SecondaryValue::Ui256(_) => ACTION_IDXC,
                    SecondaryValue::Double(_) => ACTION_IDXDBL,
                    SecondaryValue::LongDouble(_) => ACTION_IDXLDBL,
                };
                vec![Action::new(*account, action, *payer, data)]
            }
            Operation::EjectRow {
                account,
                table,
                scope,
                key,
            } => {
                for n in [account, table, scope, key] {
                    names.serialize(n, &mut data)?;
                }
                vec![Action::new(*account, ACTION_EJECT, *account, data)]
            }
            Operation::UpdateAuth {
                account,
                permission,
                parent,
                authority,
            } => {
                for n in [account, permission, parent] {
                    names.serialize(n, &mut data)?;
                }
                AuthoritySerializer::new().serialize(authority, &mut data)?;
                let mut action = Action::new(system_account, ACTION_UPDATEAUTH, *account, data);
                action.authorization = vec![PermissionLevel::new(*account, OWNER_PERMISSION)];
                vec![action]
            }
            Operation::LinkAuth {
                account,
                contract,
                action,
                permission,
            } => {
                for n in [account, contract, action, permission] {
                    names.serialize(n, &mut data)?;
                }
                vec![Action::new(system_account, ACTION_LINKAUTH, *account, data)]
            }
            Operation::TransactionBoundary => Vec::new(),
        };
        Ok(actions)
    }
}

/// A ledger action with binary data
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub account: Name,
    pub name: Name,
    pub authorization: Vec<PermissionLevel>,
    #[serde_as(as = "Hex")]
    pub data: Vec<u8>,
}

impl Action {
    /// Action authorized by `actor@active`
    fn new(account: Name, name: Name, actor: Name, data: Vec<u8>) -> Self {
        Action {
            account,
            name,
            authorization: vec![PermissionLevel::new(actor, ACTIVE_PERMISSION)],
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::Abi;
    use crate::name::split_index_table_name;
    use serde_json::json;
    use std::str::FromStr;

    fn n(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    #[test]
    fn test_every_index_kind_targets_its_index_table() {
        let values = [
            (json!("bob"), "ui64", ACTION_IDXI),
            (json!("0x02000000000000000000000000000000"), "ui128", ACTION_IDXII),
            (json!("11".repeat(32)), "ui256", ACTION_IDXC),
            (json!(2.5), "dbl", ACTION_IDXDBL),
            (json!(format!("0x{}", "00".repeat(16))), "ldbl", ACTION_IDXLDBL),
        ];
        for (value, kind, action_name) in values {
            let entry = SecondaryIndexEntry {
                kind: kind.to_string(),
                value,
                payer: n("carol"),
            };
            for ordinal in 0..16 {
                let op = Operation::inject_index(n("acc"), n("tbl"), n("scp"), n("key"), ordinal, &entry)
                    .unwrap();
                let Operation::InjectIndex { table, payer, .. } = &op else {
                    panic!("unexpected operation {:?}", op);
                };
                assert_eq!(*payer, n("carol"));
                if ordinal == 0 {
                    assert_eq!(*table, n("tbl"));
                }
                assert_eq!(split_index_table_name(*table), (n("tbl"), ordinal as u64));

                let actions = op.to_actions(n("eosio")).unwrap();
                assert_eq!(actions.len(), 1);
                assert_eq!(actions[0].account, n("acc"));
                assert_eq!(actions[0].name, action_name);
            }
        }
    }

    #[test]
    fn test_unknown_index_kind() {
        let entry = SecondaryIndexEntry {
            kind: "ui512".to_string(),
            value: json!(1),
            payer: n("carol"),
        };
        assert!(matches!(
            Operation::inject_index(n("acc"), n("tbl"), n("scp"), n("key"), 0, &entry),
            Err(crate::error::ModelsError::UnsupportedIndexKind(_))
        ));
    }

    #[test]
    fn test_inject_row_action_data() {
        let abi = Abi::default();
        let encoder = AbiEncoder::new(&abi);
        let row = TableRow {
            key: "k".into(),
            payer: n("a"),
            json_data: None,
            hex_data: Some(vec![0xaa]),
            secondary_indexes: vec![],
        };
        let op = Operation::inject_row(&encoder, n("a"), n("t"), n("s"), &row).unwrap();
        let actions = op.to_actions(n("eosio")).unwrap();
        assert_eq!(actions[0].name, ACTION_INJECT);
        assert_eq!(actions[0].authorization, vec![PermissionLevel::new(n("a"), ACTIVE_PERMISSION)]);
        assert_eq!(actions[0].data.len(), 4 * 8 + 2);
        assert_eq!(&actions[0].data[32..], &[1, 0xaa]);
    }

    #[test]
    fn test_create_account_sets_unlimited_resources() {
        let key = PublicKey::from_str("EOS6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV").unwrap();
        let op = Operation::CreateAccount {
            creator: n("eosio"),
            name: n("alice"),
            public_key: key,
        };
        let actions = op.to_actions(n("eosio")).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].name, ACTION_NEWACCOUNT);
        assert_eq!(actions[1].name, ACTION_SETALIMITS);
        assert_eq!(&actions[1].data[8..], &[0xff; 24]);
        assert!(Operation::TransactionBoundary.to_actions(n("eosio")).unwrap().is_empty());
    }

    #[test]
    fn test_action_json() {
        let op = Operation::EjectRow {
            account: n("a"),
            table: n("t"),
            scope: n("s"),
            key: n("k"),
        };
        let actions = op.to_actions(n("eosio")).unwrap();
        let value = serde_json::to_value(&actions[0]).unwrap();
        assert_eq!(value["name"], "eject");
        assert_eq!(value["authorization"][0]["permission"], "active");
        assert_eq!(value["data"].as_str().unwrap().len(), 64);
    }
}
