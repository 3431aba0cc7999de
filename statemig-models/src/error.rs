// Copyright (c) 2022 MASSA LABS <info@massa.net>

use displaydoc::Display;
use statemig_serialization::SerializeError;
use thiserror::Error;

pub type ModelsResult<T, E = ModelsError> = core::result::Result<T, E>;

#[non_exhaustive]
#[derive(Display, Error, Debug, Clone, PartialEq)]
pub enum ModelsError {
    /// invalid name: {0}
    InvalidName(String),
    /// secondary index ordinal {0} out of range (max 15)
    IndexOrdinalOutOfRange(u64),
    /// no table named {0} in schema
    SchemaMismatch(String),
    /// unknown schema type: {0}
    UnknownType(String),
    /// invalid value at `{0}`: {1}
    InvalidValue(String, String),
    /// unsupported secondary index kind: {0}
    UnsupportedIndexKind(String),
    /// invalid {0} secondary index value: {1}
    InvalidIndexValue(String, String),
    /// row {0} has neither json_data nor hex_data
    MissingRowData(String),
    /// invalid public key: {0}
    InvalidPublicKey(String),
    /// Serialization error: {0}
    SerializeError(#[from] SerializeError),
    /// Deserialization error: {0}
    DeserializeError(String),
}
