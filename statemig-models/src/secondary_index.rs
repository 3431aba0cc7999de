// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::{ModelsError, ModelsResult};
use crate::name::Name;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Value encodings a secondary index can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecondaryIndexKind {
    Ui64,
    Ui128,
    Ui256,
    Double,
    LongDouble,
}

impl SecondaryIndexKind {
    /// Tag written in exported rows
    pub fn as_str(&self) -> &'static str {
        match self {
            SecondaryIndexKind::Ui64 => "ui64",
            SecondaryIndexKind::Ui128 => "ui128",
            SecondaryIndexKind::Ui256 => "ui256",
            SecondaryIndexKind::Double => "dbl",
            SecondaryIndexKind::LongDouble => "ldbl",
        }
    }
}

impl FromStr for SecondaryIndexKind {
    type Err = ModelsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ui64" => Ok(SecondaryIndexKind::Ui64),
            "ui128" => Ok(SecondaryIndexKind::Ui128),
            "ui256" => Ok(SecondaryIndexKind::Ui256),
            "dbl" | "double" => Ok(SecondaryIndexKind::Double),
            "ldbl" | "long double" => Ok(SecondaryIndexKind::LongDouble),
            other => Err(ModelsError::UnsupportedIndexKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for SecondaryIndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed secondary key
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SecondaryValue {
    Ui64(u64),
    Ui128(u128),
    /// 256-bit digest, in storage byte order
    Ui256([u8; 32]),
    Double(f64),
    /// Raw little endian 128-bit extended float
    LongDouble([u8; 16]),
}

impl SecondaryValue {
    pub fn kind(&self) -> SecondaryIndexKind {
        match self {
            SecondaryValue::Ui64(_) => SecondaryIndexKind::Ui64,
            SecondaryValue::Ui128(_) => SecondaryIndexKind::Ui128,
            SecondaryValue::Ui256(_) => SecondaryIndexKind::Ui256,
            SecondaryValue::Double(_) => SecondaryIndexKind::Double,
            SecondaryValue::LongDouble(_) => SecondaryIndexKind::LongDouble,
        }
    }

    /// Parse the exported JSON form of a value of the given kind
    pub fn from_json(kind: SecondaryIndexKind, value: &Value) -> ModelsResult<Self> {
        let bad = |reason: &str| ModelsError::InvalidIndexValue(kind.to_string(), reason.to_string());
        match kind {
            SecondaryIndexKind::Ui64 => match value {
                Value::Number(n) => n.as_u64().map(SecondaryValue::Ui64).ok_or_else(|| bad("not a u64")),
                Value::String(s) => Name::from_str(s)
                    .map(|name| SecondaryValue::Ui64(name.to_u64()))
                    .map_err(|err| bad(&err.to_string())),
                _ => Err(bad("expected a name or a number")),
            },
            SecondaryIndexKind::Ui128 => match value {
                Value::Number(n) => n
                    .as_u64()
                    .map(|v| SecondaryValue::Ui128(v as u128))
                    .ok_or_else(|| bad("not a u128")),
                Value::String(s) => match s.strip_prefix("0x") {
                    Some(hex_str) => {
                        let bytes = decode_fixed::<16>(hex_str).map_err(|e| bad(&e))?;
                        Ok(SecondaryValue::Ui128(u128::from_le_bytes(bytes)))
                    }
                    None => s
                        .parse()
                        .map(SecondaryValue::Ui128)
                        .map_err(|_| bad("not a u128")),
                },
                _ => Err(bad("expected a hex string or a number")),
            },
            SecondaryIndexKind::Ui256 => {
                let s = value.as_str().ok_or_else(|| bad("expected a hex string"))?;
                let bytes = decode_fixed::<32>(s.trim_start_matches("0x")).map_err(|e| bad(&e))?;
                Ok(SecondaryValue::Ui256(bytes))
            }
            SecondaryIndexKind::Double => match value {
                Value::Number(n) => n.as_f64().map(SecondaryValue::Double).ok_or_else(|| bad("not a float")),
                Value::String(s) => s
                    .parse()
                    .map(SecondaryValue::Double)
                    .map_err(|_| bad("not a float")),
                _ => Err(bad("expected a number")),
            },
            SecondaryIndexKind::LongDouble => {
                let s = value.as_str().ok_or_else(|| bad("expected a hex string"))?;
                let bytes = decode_fixed::<16>(s.trim_start_matches("0x")).map_err(|e| bad(&e))?;
                Ok(SecondaryValue::LongDouble(bytes))
            }
        }
    }

    /// JSON form, as written by the exporter
    pub fn to_json(&self) -> Value {
        match self {
            SecondaryValue::Ui64(v) => Value::String(Name::from_u64(*v).to_string()),
            SecondaryValue::Ui128(v) => Value::String(format!("0x{}", hex::encode(v.to_le_bytes()))),
            SecondaryValue::Ui256(bytes) => Value::String(hex::encode(bytes)),
            SecondaryValue::Double(v) => Value::from(*v),
            SecondaryValue::LongDouble(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        }
    }

    /// Binary form used as action data
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            SecondaryValue::Ui64(v) => v.to_le_bytes().to_vec(),
            SecondaryValue::Ui128(v) => v.to_le_bytes().to_vec(),
            SecondaryValue::Ui256(bytes) => bytes.to_vec(),
            SecondaryValue::Double(v) => v.to_le_bytes().to_vec(),
            SecondaryValue::LongDouble(bytes) => bytes.to_vec(),
        }
    }
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], String> {
    let mut out = [0u8; N];
    hex::decode_to_slice(s, &mut out).map_err(|err| err.to_string())?;
    Ok(out)
}

/// Secondary index entry of an exported row. The kind stays a raw tag until
/// the row is replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryIndexEntry {
    pub kind: String,
    pub value: Value,
    pub payer: Name,
}

impl SecondaryIndexEntry {
    pub fn new(value: SecondaryValue, payer: Name) -> Self {
        SecondaryIndexEntry {
            kind: value.kind().to_string(),
            value: value.to_json(),
            payer,
        }
    }

    /// Resolve the kind tag and the typed value
    pub fn typed_value(&self) -> ModelsResult<SecondaryValue> {
        let kind = SecondaryIndexKind::from_str(&self.kind)?;
        SecondaryValue::from_json(kind, &self.value)
    }
}
