//! Exported table rows.

use crate::abi_encoder::AbiEncoder;
use crate::error::{ModelsError, ModelsResult};
use crate::name::Name;
use crate::secondary_index::SecondaryIndexEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{hex::Hex, serde_as};

/// One row of a table scope, as written in `rows.json`
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub key: String,
    pub payer: Name,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_data: Option<Value>,
    #[serde_as(as = "Option<Hex>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex_data: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_indexes: Vec<SecondaryIndexEntry>,
}

/// Row content, either already encoded or to be encoded against the schema
#[derive(Debug, Clone, PartialEq)]
pub enum RowPayload {
    RawBytes(Vec<u8>),
    Structured(Value),
}

impl TableRow {
    /// Raw bytes win over structured data when a row carries both.
    pub fn payload(&self) -> ModelsResult<RowPayload> {
        match (&self.hex_data, &self.json_data) {
            (Some(bytes), _) if !bytes.is_empty() => Ok(RowPayload::RawBytes(bytes.clone())),
            (_, Some(value)) => Ok(RowPayload::Structured(value.clone())),
            (Some(bytes), None) => Ok(RowPayload::RawBytes(bytes.clone())),
            (None, None) => Err(ModelsError::MissingRowData(self.key.clone())),
        }
    }

    pub fn key_name(&self) -> ModelsResult<Name> {
        self.key.parse()
    }
}

impl RowPayload {
    /// Encode the payload as the row of `table`. Raw bytes pass through untouched.
    pub fn encode(self, encoder: &AbiEncoder, table: Name) -> ModelsResult<Vec<u8>> {
        match self {
            RowPayload::RawBytes(bytes) => Ok(bytes),
            RowPayload::Structured(value) => encoder.encode_table_row(table, &value),
        }
    }
}

/// Content of the optional `scope.json`: payer of the base table then of every
/// index table, by ordinal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopePayers {
    #[serde(default)]
    pub payers: Vec<Name>,
}

impl ScopePayers {
    /// Payers implied by a row: its own payer, then the payer of each of its indexes
    pub fn from_row(row: &TableRow) -> Self {
        let mut payers = vec![row.payer];
        payers.extend(row.secondary_indexes.iter().map(|idx| idx.payer));
        ScopePayers { payers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::Abi;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_row_json_shape() {
        let row: TableRow = serde_json::from_value(json!({
            "key": "alice",
            "payer": "alice",
            "hex_data": "0102",
            "secondary_indexes": [{"kind": "ui64", "value": "bob", "payer": "carol"}]
        }))
        .unwrap();
        assert_eq!(row.hex_data, Some(vec![1, 2]));
        assert_eq!(row.secondary_indexes[0].payer, Name::from_str("carol").unwrap());

        let back = serde_json::to_value(&row).unwrap();
        assert_eq!(back["hex_data"], "0102");
        assert!(back.get("json_data").is_none());
        assert_eq!(
            ScopePayers::from_row(&row).payers,
            vec![Name::from_str("alice").unwrap(), Name::from_str("carol").unwrap()]
        );
    }

    #[test]
    fn test_raw_bytes_pass_through() {
        let row = TableRow {
            key: "k".into(),
            payer: Name::from_str("a").unwrap(),
            json_data: Some(json!({"ignored": true})),
            hex_data: Some(vec![9, 9]),
            secondary_indexes: vec![],
        };
        let abi = Abi::default();
        let encoder = AbiEncoder::new(&abi);
        let payload = row.payload().unwrap();
        assert_eq!(payload, RowPayload::RawBytes(vec![9, 9]));
        // no table binding needed for raw bytes
        assert_eq!(payload.encode(&encoder, Name::from_str("t").unwrap()).unwrap(), vec![9, 9]);
    }

    #[test]
    fn test_structured_needs_table_binding() {
        let abi = Abi::default();
        let encoder = AbiEncoder::new(&abi);
        let payload = RowPayload::Structured(json!({"a": 1}));
        assert_matches!(
            payload.encode(&encoder, Name::from_str("t").unwrap()),
            Err(ModelsError::SchemaMismatch(_))
        );
    }

    #[test]
    fn test_row_without_data() {
        let row = TableRow {
            key: "k".into(),
            payer: Name::EMPTY,
            json_data: None,
            hex_data: None,
            secondary_indexes: vec![],
        };
        assert_matches!(row.payload(), Err(ModelsError::MissingRowData(k)) if k == "k");
    }
}
