// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Ledger names: up to 13 characters packed into a `u64`, 5 bits per
//! character (4 bits for the 13th one), most significant first.

use crate::error::ModelsError;
use nom::error::{context, ContextError, ParseError};
use nom::number::complete::le_u64;
use nom::IResult;
use statemig_serialization::{Deserializer, SerializeError, Serializer};
use std::str::FromStr;

const NAME_CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

/// Maximum number of characters in a name
pub const NAME_MAX_LENGTH: usize = 13;

/// Number of table names addressable from one base table
pub const MAX_INDEX_TABLES: u64 = 16;

/// A ledger name (account, table, scope, permission, action or name-shaped key)
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Name(u64);

impl Name {
    /// The empty name, used as parent of root permissions
    pub const EMPTY: Name = Name(0);

    pub const fn from_u64(value: u64) -> Self {
        Name(value)
    }

    pub const fn to_u64(self) -> u64 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Build a name from a literal at compile time. Invalid literals fail the build.
    pub const fn constant(s: &str) -> Name {
        let bytes = s.as_bytes();
        assert!(bytes.len() <= NAME_MAX_LENGTH, "name literal too long");
        let mut value = 0u64;
        let mut i = 0;
        while i < bytes.len() {
            let symbol = match char_to_symbol(bytes[i]) {
                Some(symbol) => symbol,
                None => panic!("invalid character in name literal"),
            };
            if i < 12 {
                value |= (symbol & 0x1f) << (64 - 5 * (i + 1));
            } else {
                assert!(symbol <= 0x0f, "invalid 13th character in name literal");
                value |= symbol;
            }
            i += 1;
        }
        Name(value)
    }

    /// Name whose numeric value is one above this one, if any
    pub fn checked_next(&self) -> Option<Name> {
        self.0.checked_add(1).map(Name)
    }
}

const fn char_to_symbol(c: u8) -> Option<u64> {
    match c {
        b'a'..=b'z' => Some((c - b'a') as u64 + 6),
        b'1'..=b'5' => Some((c - b'1') as u64 + 1),
        b'.' => Some(0),
        _ => None,
    }
}

impl FromStr for Name {
    type Err = ModelsError;

    /// ## Example
    /// ```rust
    /// # use statemig_models::name::Name;
    /// # use std::str::FromStr;
    /// let name = Name::from_str("eosio.token").unwrap();
    /// assert_eq!(name.to_u64(), 6138663591592764928);
    /// assert_eq!(name.to_string(), "eosio.token");
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() > NAME_MAX_LENGTH {
            return Err(ModelsError::InvalidName(format!(
                "{:?} is longer than {} characters",
                s, NAME_MAX_LENGTH
            )));
        }
        let mut value = 0u64;
        for (i, c) in bytes.iter().enumerate() {
            let symbol = char_to_symbol(*c).ok_or_else(|| {
                ModelsError::InvalidName(format!("{:?} contains invalid character {:?}", s, *c as char))
            })?;
            if i < 12 {
                value |= (symbol & 0x1f) << (64 - 5 * (i + 1));
            } else {
                if symbol > 0x0f {
                    return Err(ModelsError::InvalidName(format!(
                        "{:?} has a 13th character outside of [.1-5a-j]",
                        s
                    )));
                }
                value |= symbol;
            }
        }
        Ok(Name(value))
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = [b'.'; NAME_MAX_LENGTH];
        let mut tmp = self.0;
        for i in 0..NAME_MAX_LENGTH {
            let mask = if i == 0 { 0x0f } else { 0x1f };
            out[NAME_MAX_LENGTH - 1 - i] = NAME_CHARMAP[(tmp & mask) as usize];
            tmp >>= if i == 0 { 4 } else { 5 };
        }
        let len = out.iter().rposition(|c| *c != b'.').map_or(0, |p| p + 1);
        // charmap is ascii only
        f.write_str(std::str::from_utf8(&out[..len]).map_err(|_| std::fmt::Error)?)
    }
}

impl std::fmt::Debug for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl ::serde::Serialize for Name {
    fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.collect_str(&self.to_string())
        } else {
            s.serialize_u64(self.0)
        }
    }
}

impl<'de> ::serde::Deserialize<'de> for Name {
    fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<Name, D::Error> {
        if d.is_human_readable() {
            struct NameVisitor;

            impl<'de> ::serde::de::Visitor<'de> for NameVisitor {
                type Value = Name;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("a ledger name of at most 13 characters")
                }

                fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    Name::from_str(v).map_err(E::custom)
                }
            }
            d.deserialize_str(NameVisitor)
        } else {
            let value = <u64 as ::serde::Deserialize>::deserialize(d)?;
            Ok(Name(value))
        }
    }
}

/// Derive the name of the table holding the `ordinal`-th index of `table`.
///
/// Ordinal 0 maps back to `table` itself for any name of at most 12
/// characters, ordinals `1..16` replace the low nibble.
pub fn index_table_name(table: Name, ordinal: u64) -> Result<Name, ModelsError> {
    if ordinal >= MAX_INDEX_TABLES {
        return Err(ModelsError::IndexOrdinalOutOfRange(ordinal));
    }
    Ok(Name((table.0 & 0xFFFF_FFFF_FFFF_FFF0) | ordinal))
}

/// Split an index table name into its base table name and its ordinal
pub fn split_index_table_name(name: Name) -> (Name, u64) {
    (Name(name.0 & 0xFFFF_FFFF_FFFF_FFF0), name.0 & 0x0F)
}

/// Serializer for `Name` (little endian `u64`)
#[derive(Clone, Default)]
pub struct NameSerializer;

impl NameSerializer {
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<Name> for NameSerializer {
    fn serialize(&self, value: &Name, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(&value.0.to_le_bytes());
        Ok(())
    }
}

/// Deserializer for `Name`
#[derive(Clone, Default)]
pub struct NameDeserializer;

impl NameDeserializer {
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<Name> for NameDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Name, E> {
        context("Failed Name deserialization", |input: &'a [u8]| {
            let (rest, value) = le_u64(input)?;
            Ok((rest, Name(value)))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_name_string_roundtrip() {
        for s in ["eosio", "eosio.token", "a", "zzzzzzzzzzzzj", "1.2.3", ""] {
            let name = Name::from_str(s).unwrap();
            assert_eq!(name.to_string(), s);
        }
    }

    #[test]
    fn test_known_name_values() {
        assert_eq!(Name::from_str("eosio").unwrap().to_u64(), 6138663577826885632);
        assert_eq!(Name::from_str("active").unwrap().to_u64(), 3617214756542218240);
        assert_eq!(Name::EMPTY.to_string(), "");
    }

    #[test]
    fn test_invalid_names() {
        assert_matches!(Name::from_str("Alice"), Err(ModelsError::InvalidName(_)));
        assert_matches!(Name::from_str("abcdefghijklmn"), Err(ModelsError::InvalidName(_)));
        assert_matches!(Name::from_str("aaaaaaaaaaaak"), Err(ModelsError::InvalidName(_)));
        assert_matches!(Name::from_str("six6"), Err(ModelsError::InvalidName(_)));
    }

    #[test]
    fn test_index_table_names_are_reversible() {
        let base = Name::from_str("accounts").unwrap();
        assert_eq!(index_table_name(base, 0).unwrap(), base);

        let mut seen = std::collections::HashSet::new();
        for ordinal in 0..MAX_INDEX_TABLES {
            let table = index_table_name(base, ordinal).unwrap();
            assert!(seen.insert(table));
            assert_eq!(split_index_table_name(table), (base, ordinal));
        }
        assert_matches!(
            index_table_name(base, 16),
            Err(ModelsError::IndexOrdinalOutOfRange(16))
        );
    }

    #[test]
    fn test_constant_matches_parsing() {
        for s in ["eosio", "active", "owner", "eosio.token", "zzzzzzzzzzzzj"] {
            assert_eq!(Name::constant(s), Name::from_str(s).unwrap());
        }
    }

    #[test]
    fn test_checked_next() {
        let name = Name::from_str("a").unwrap();
        assert_eq!(name.checked_next().unwrap().to_u64(), name.to_u64() + 1);
        assert_eq!(Name::from_u64(u64::MAX).checked_next(), None);
    }

    #[test]
    fn test_name_json_is_a_string() {
        let name = Name::from_str("alice").unwrap();
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"alice\"");
        let back: Name = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(back, name);
    }
}
