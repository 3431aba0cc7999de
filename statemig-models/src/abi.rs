//! Contract schema (ABI) model, with its JSON form and the ledger's binary form.

use crate::name::{Name, NameDeserializer, NameSerializer};
use nom::error::{context, ContextError, ParseError};
use nom::multi::length_count;
use nom::number::complete::{le_u16, le_u64};
use nom::sequence::tuple;
use nom::IResult;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use statemig_serialization::{
    Deserializer, SerializeError, Serializer, StringDeserializer, StringSerializer,
    U32VarIntDeserializer, U32VarIntSerializer, VecU8Deserializer, VecU8Serializer,
};
use std::ops::Bound::Included;

/// Max number of entries in any ABI list
pub const MAX_ABI_ENTRIES: u32 = 1_000_000;
/// Max length of any ABI string (type names, ricardian contracts)
pub const MAX_ABI_STRING_LENGTH: u32 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub new_type_name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDef {
    pub name: Name,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub ricardian_contract: String,
}

/// Binding of a table name to the struct type of its rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: Name,
    #[serde(default)]
    pub index_type: String,
    #[serde(default)]
    pub key_names: Vec<String>,
    #[serde(default)]
    pub key_types: Vec<String>,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClausePair {
    pub id: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error_code: u64,
    pub error_msg: String,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiExtension(pub u16, #[serde_as(as = "Hex")] pub Vec<u8>);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDef {
    pub name: String,
    pub types: Vec<String>,
}

/// A parsed contract schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abi {
    pub version: String,
    #[serde(default)]
    pub types: Vec<TypeDef>,
    #[serde(default)]
    pub structs: Vec<StructDef>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    #[serde(default)]
    pub tables: Vec<TableDef>,
    #[serde(default)]
    pub ricardian_clauses: Vec<ClausePair>,
    #[serde(default)]
    pub error_messages: Vec<ErrorMessage>,
    #[serde(default)]
    pub abi_extensions: Vec<AbiExtension>,
    #[serde(default)]
    pub variants: Vec<VariantDef>,
}

impl Abi {
    /// Row type bound to `table`, if the table is declared
    pub fn table_type(&self, table: Name) -> Option<&str> {
        self.tables
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.ty.as_str())
    }

    pub fn table(&self, table: Name) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == table)
    }
}

/// Serializer for `Abi` in the ledger binary format
#[derive(Clone, Default)]
pub struct AbiSerializer {
    len_serializer: U32VarIntSerializer,
    string_serializer: StringSerializer,
    name_serializer: NameSerializer,
    bytes_serializer: VecU8Serializer,
}

impl AbiSerializer {
    pub const fn new() -> Self {
        Self {
            len_serializer: U32VarIntSerializer::new(),
            string_serializer: StringSerializer::new(),
            name_serializer: NameSerializer::new(),
            bytes_serializer: VecU8Serializer::new(),
        }
    }

    fn serialize_len(&self, len: usize, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let len: u32 = len
            .try_into()
            .map_err(|_| SerializeError::NumberTooBig(format!("list of {} entries", len)))?;
        self.len_serializer.serialize(&len, buffer)
    }

    fn serialize_strings(&self, values: &[String], buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.serialize_len(values.len(), buffer)?;
        for value in values {
            self.string_serializer.serialize(value, buffer)?;
        }
        Ok(())
    }
}

impl Serializer<Abi> for AbiSerializer {
    /// ## Example
    /// ```rust
    /// # use statemig_models::abi::{Abi, AbiSerializer};
    /// # use statemig_serialization::Serializer;
    /// let abi = Abi { version: "eosio::abi/1.1".to_string(), ..Default::default() };
    /// let mut buffer = Vec::new();
    /// AbiSerializer::new().serialize(&abi, &mut buffer).unwrap();
    /// assert_eq!(buffer[0], 14);
    /// assert_eq!(&buffer[15..], &[0, 0, 0, 0, 0, 0, 0]);
    /// ```
    fn serialize(&self, value: &Abi, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.string_serializer.serialize(&value.version, buffer)?;

        self.serialize_len(value.types.len(), buffer)?;
        for t in &value.types {
            self.string_serializer.serialize(&t.new_type_name, buffer)?;
            self.string_serializer.serialize(&t.ty, buffer)?;
        }

        self.serialize_len(value.structs.len(), buffer)?;
        for s in &value.structs {
            self.string_serializer.serialize(&s.name, buffer)?;
            self.string_serializer.serialize(&s.base, buffer)?;
            self.serialize_len(s.fields.len(), buffer)?;
            for f in &s.fields {
                self.string_serializer.serialize(&f.name, buffer)?;
                self.string_serializer.serialize(&f.ty, buffer)?;
            }
        }

        self.serialize_len(value.actions.len(), buffer)?;
        for a in &value.actions {
            self.name_serializer.serialize(&a.name, buffer)?;
            self.string_serializer.serialize(&a.ty, buffer)?;
            self.string_serializer.serialize(&a.ricardian_contract, buffer)?;
        }

        self.serialize_len(value.tables.len(), buffer)?;
        for t in &value.tables {
            self.name_serializer.serialize(&t.name, buffer)?;
            self.string_serializer.serialize(&t.index_type, buffer)?;
            self.serialize_strings(&t.key_names, buffer)?;
            self.serialize_strings(&t.key_types, buffer)?;
            self.string_serializer.serialize(&t.ty, buffer)?;
        }

        self.serialize_len(value.ricardian_clauses.len(), buffer)?;
        for c in &value.ricardian_clauses {
            self.string_serializer.serialize(&c.id, buffer)?;
            self.string_serializer.serialize(&c.body, buffer)?;
        }

        self.serialize_len(value.error_messages.len(), buffer)?;
        for e in &value.error_messages {
            buffer.extend_from_slice(&e.error_code.to_le_bytes());
            self.string_serializer.serialize(&e.error_msg, buffer)?;
        }

        self.serialize_len(value.abi_extensions.len(), buffer)?;
        for AbiExtension(tag, data) in &value.abi_extensions {
            buffer.extend_from_slice(&tag.to_le_bytes());
            self.bytes_serializer.serialize(data, buffer)?;
        }

        // binary extension: only written when present
        if !value.variants.is_empty() {
            self.serialize_len(value.variants.len(), buffer)?;
            for v in &value.variants {
                self.string_serializer.serialize(&v.name, buffer)?;
                self.serialize_strings(&v.types, buffer)?;
            }
        }
        Ok(())
    }
}

/// Deserializer for `Abi` in the ledger binary format.
///
/// Trailing sections unknown to this model are left in the returned rest.
#[derive(Clone)]
pub struct AbiDeserializer {
    len_deserializer: U32VarIntDeserializer,
    string_deserializer: StringDeserializer,
    name_deserializer: NameDeserializer,
    bytes_deserializer: VecU8Deserializer,
}

impl AbiDeserializer {
    pub const fn new() -> Self {
        Self {
            len_deserializer: U32VarIntDeserializer::new(Included(0), Included(MAX_ABI_ENTRIES)),
            string_deserializer: StringDeserializer::new(
                Included(0),
                Included(MAX_ABI_STRING_LENGTH),
            ),
            name_deserializer: NameDeserializer::new(),
            bytes_deserializer: VecU8Deserializer::new(
                Included(0),
                Included(MAX_ABI_STRING_LENGTH),
            ),
        }
    }

    fn strings<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Vec<String>, E> {
        length_count(
            context("Failed length deserialization", |input| {
                self.len_deserializer.deserialize(input)
            }),
            |input| self.string_deserializer.deserialize(input),
        )(buffer)
    }
}

impl Default for AbiDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Abi> for AbiDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Abi, E> {
        let len = |input| self.len_deserializer.deserialize(input);
        let string = |input| self.string_deserializer.deserialize(input);
        let (rest, (version, types, structs, actions, tables, ricardian_clauses, error_messages, abi_extensions)) =
            context(
                "Failed Abi deserialization",
                tuple((
                    context("Failed version deserialization", string),
                    context(
                        "Failed types deserialization",
                        length_count(len, |input| {
                            let (rest, (new_type_name, ty)) = tuple((string, string))(input)?;
                            Ok((rest, TypeDef { new_type_name, ty }))
                        }),
                    ),
                    context(
                        "Failed structs deserialization",
                        length_count(len, |input| {
                            let (rest, (name, base, fields)) = tuple((
                                string,
                                string,
                                length_count(len, |input| {
                                    let (rest, (name, ty)) = tuple((string, string))(input)?;
                                    Ok((rest, FieldDef { name, ty }))
                                }),
                            ))(input)?;
                            Ok((rest, StructDef { name, base, fields }))
                        }),
                    ),
                    context(
                        "Failed actions deserialization",
                        length_count(len, |input| {
                            let (rest, (name, ty, ricardian_contract)) = tuple((
                                |input| self.name_deserializer.deserialize(input),
                                string,
                                string,
                            ))(input)?;
                            Ok((rest, ActionDef { name, ty, ricardian_contract }))
                        }),
                    ),
                    context(
                        "Failed tables deserialization",
                        length_count(len, |input| {
                            let (rest, (name, index_type, key_names, key_types, ty)) = tuple((
                                |input| self.name_deserializer.deserialize(input),
                                string,
                                |input| self.strings(input),
                                |input| self.strings(input),
                                string,
                            ))(input)?;
                            Ok((
                                rest,
                                TableDef {
                                    name,
                                    index_type,
                                    key_names,
                                    key_types,
                                    ty,
                                },
                            ))
                        }),
                    ),
                    context(
                        "Failed ricardian_clauses deserialization",
                        length_count(len, |input| {
                            let (rest, (id, body)) = tuple((string, string))(input)?;
                            Ok((rest, ClausePair { id, body }))
                        }),
                    ),
                    context(
                        "Failed error_messages deserialization",
                        length_count(len, |input| {
                            let (rest, (error_code, error_msg)) = tuple((le_u64, string))(input)?;
                            Ok((rest, ErrorMessage { error_code, error_msg }))
                        }),
                    ),
                    context(
                        "Failed abi_extensions deserialization",
                        length_count(len, |input| {
                            let (rest, (tag, data)) = tuple((le_u16, |input| {
                                self.bytes_deserializer.deserialize(input)
                            }))(input)?;
                            Ok((rest, AbiExtension(tag, data)))
                        }),
                    ),
                )),
            )(buffer)?;

        let (rest, variants) = if rest.is_empty() {
            (rest, Vec::new())
        } else {
            context(
                "Failed variants deserialization",
                length_count(len, |input| {
                    let (rest, (name, types)) = tuple((string, |input| self.strings(input)))(input)?;
                    Ok((rest, VariantDef { name, types }))
                }),
            )(rest)?
        };

        Ok((
            rest,
            Abi {
                version,
                types,
                structs,
                actions,
                tables,
                ricardian_clauses,
                error_messages,
                abi_extensions,
                variants,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statemig_serialization::DeserializeError;
    use std::str::FromStr;

    fn token_abi() -> Abi {
        serde_json::from_str(
            r#"{
                "version": "eosio::abi/1.1",
                "types": [{"new_type_name": "account_name", "type": "name"}],
                "structs": [
                    {"name": "account", "base": "", "fields": [{"name": "balance", "type": "asset"}]},
                    {"name": "transfer", "base": "", "fields": [
                        {"name": "from", "type": "account_name"},
                        {"name": "to", "type": "account_name"},
                        {"name": "quantity", "type": "asset"},
                        {"name": "memo", "type": "string"}
                    ]}
                ],
                "actions": [{"name": "transfer", "type": "transfer", "ricardian_contract": ""}],
                "tables": [{"name": "accounts", "index_type": "i64", "key_names": [], "key_types": [], "type": "account"}],
                "ricardian_clauses": [],
                "error_messages": [{"error_code": 7, "error_msg": "overdrawn"}],
                "abi_extensions": [],
                "variants": [{"name": "any_id", "types": ["uint64", "name"]}]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_table_type_lookup() {
        let abi = token_abi();
        assert_eq!(abi.table_type(Name::from_str("accounts").unwrap()), Some("account"));
        assert_eq!(abi.table_type(Name::from_str("stat").unwrap()), None);
    }

    #[test]
    fn test_binary_abi_roundtrip() {
        let abi = token_abi();
        let mut buffer = Vec::new();
        AbiSerializer::new().serialize(&abi, &mut buffer).unwrap();
        let (rest, back) = AbiDeserializer::new()
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(back, abi);
    }

    #[test]
    fn test_binary_abi_without_variants_section() {
        let mut abi = token_abi();
        abi.variants.clear();
        let mut buffer = Vec::new();
        AbiSerializer::new().serialize(&abi, &mut buffer).unwrap();
        let (_, back) = AbiDeserializer::new()
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(back.variants.is_empty());
        assert_eq!(back.tables.len(), 1);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let res = AbiDeserializer::new().deserialize::<DeserializeError>(&[0xff, 0xff, 0x01]);
        assert!(res.is_err());
    }
}
