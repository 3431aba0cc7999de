// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Generic binary (de)serialization traits used by every on-wire structure of
//! the migration tool (ABI blobs, row payloads, action data).
//!
//! Integers follow the ledger wire format: fixed width values are little
//! endian, lengths and counts are LEB128 varints.

use displaydoc::Display;
use nom::error::{context, ContextError, ErrorKind, ParseError};
use nom::IResult;
use std::fmt::Display;
use std::ops::{Bound, RangeBounds};
use thiserror::Error;

#[non_exhaustive]
#[derive(Display, Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializeError {
    /// Number {0} is too big to be serialized
    NumberTooBig(String),
    /// String too big {0}
    StringTooBig(String),
    /// General error {0}
    GeneralError(String),
}

/// Error type accumulating nom error kinds and contexts, innermost first.
#[derive(Debug)]
pub struct DeserializeError<'a> {
    errors: Vec<(&'a [u8], String)>,
}

impl<'a> DeserializeError<'a> {
    /// Contexts and error kinds collected while failing, innermost first.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|(_, msg)| msg.as_str())
    }
}

impl<'a> ParseError<&'a [u8]> for DeserializeError<'a> {
    fn from_error_kind(input: &'a [u8], kind: ErrorKind) -> Self {
        Self {
            errors: vec![(input, kind.description().to_string())],
        }
    }

    fn append(input: &'a [u8], kind: ErrorKind, mut other: Self) -> Self {
        other.errors.push((input, kind.description().to_string()));
        other
    }
}

impl<'a> ContextError<&'a [u8]> for DeserializeError<'a> {
    fn add_context(input: &'a [u8], ctx: &'static str, mut other: Self) -> Self {
        other.errors.push((input, ctx.to_string()));
        other
    }
}

impl<'a> Display for DeserializeError<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last = self.errors.len().saturating_sub(1);
        for (i, (input, msg)) in self.errors.iter().rev().enumerate() {
            write!(f, "{} / Input: {:?}", msg, &input[..input.len().min(16)])?;
            if i != last {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Trait that define the deserialize method that must be implemented for all types that have a deserializer.
pub trait Deserializer<T> {
    /// Deserialize a value `T` from a buffer of `u8`.
    ///
    /// ## Parameters
    /// * buffer: the buffer of u8 to read from
    ///
    /// ## Returns
    /// A nom result with the rest of the buffer and the deserialized value.
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], T, E>;
}

/// Trait that define the serialize method that must be implemented for all types that have a serializer.
pub trait Serializer<T: ?Sized> {
    /// Serialize a value `T` by appending it to a buffer of `u8`.
    fn serialize(&self, value: &T, buffer: &mut Vec<u8>) -> Result<(), SerializeError>;
}

macro_rules! gen_varint {
    ($($type:ident, $s:ident, $d:ident, $buf:ident, $d_doc:expr);*) => {
        $(
            #[doc = " Serializer for "]
            #[doc = $d_doc]
            #[doc = " in a varint form."]
            #[derive(Clone, Default)]
            pub struct $s;

            impl $s {
                #[doc = "Create a basic serializer for "]
                #[doc = $d_doc]
                #[doc = " in a varint form."]
                pub const fn new() -> Self {
                    Self
                }
            }

            impl Serializer<$type> for $s {
                fn serialize(&self, value: &$type, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
                    buffer.extend_from_slice(unsigned_varint::encode::$type(*value, &mut unsigned_varint::encode::$buf()));
                    Ok(())
                }
            }

            #[doc = " Deserializer for "]
            #[doc = $d_doc]
            #[doc = " in a varint form."]
            #[derive(Clone)]
            pub struct $d {
                range: (Bound<$type>, Bound<$type>),
            }

            impl $d {
                #[doc = "Create a basic deserializer for "]
                #[doc = $d_doc]
                #[doc = " in a varint form, rejecting values outside the given bounds."]
                pub const fn new(min: Bound<$type>, max: Bound<$type>) -> Self {
                    Self { range: (min, max) }
                }
            }

            impl Deserializer<$type> for $d {
                fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
                    &self,
                    buffer: &'a [u8],
                ) -> IResult<&'a [u8], $type, E> {
                    context(concat!("Failed ", stringify!($type), " deserialization"), |input: &'a [u8]| {
                        let (value, rest) = unsigned_varint::decode::$type(input)
                            .map_err(|_| nom::Err::Error(ParseError::from_error_kind(input, ErrorKind::Fail)))?;
                        if !self.range.contains(&value) {
                            return Err(nom::Err::Error(ParseError::from_error_kind(
                                input,
                                ErrorKind::Fail,
                            )));
                        }
                        Ok((rest, value))
                    })(buffer)
                }
            }
        )*
    };
}

gen_varint! {
    u32, U32VarIntSerializer, U32VarIntDeserializer, u32_buffer, "`u32`";
    u64, U64VarIntSerializer, U64VarIntDeserializer, u64_buffer, "`u64`"
}

/// Serializer for length prefixed byte blobs (`varuint32` length then the bytes).
#[derive(Clone, Default)]
pub struct VecU8Serializer {
    len_serializer: U32VarIntSerializer,
}

impl VecU8Serializer {
    /// Creates a new `VecU8Serializer`
    pub const fn new() -> Self {
        Self {
            len_serializer: U32VarIntSerializer::new(),
        }
    }
}

impl Serializer<Vec<u8>> for VecU8Serializer {
    fn serialize(&self, value: &Vec<u8>, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        <Self as Serializer<[u8]>>::serialize(self, &value[..], buffer)
    }
}

impl Serializer<[u8]> for VecU8Serializer {
    fn serialize(&self, value: &[u8], buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let len: u32 = value.len().try_into().map_err(|_| {
            SerializeError::NumberTooBig(format!("blob of {} bytes", value.len()))
        })?;
        self.len_serializer.serialize(&len, buffer)?;
        buffer.extend_from_slice(value);
        Ok(())
    }
}

/// Deserializer for length prefixed byte blobs.
#[derive(Clone)]
pub struct VecU8Deserializer {
    len_deserializer: U32VarIntDeserializer,
}

impl VecU8Deserializer {
    /// Creates a new `VecU8Deserializer` accepting lengths within the given bounds
    pub const fn new(min_length: Bound<u32>, max_length: Bound<u32>) -> Self {
        Self {
            len_deserializer: U32VarIntDeserializer::new(min_length, max_length),
        }
    }
}

impl Deserializer<Vec<u8>> for VecU8Deserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Vec<u8>, E> {
        context("Failed Vec<u8> deserialization", |input: &'a [u8]| {
            let (rest, len) = self.len_deserializer.deserialize(input)?;
            let (rest, data) = nom::bytes::complete::take(len as usize)(rest)?;
            Ok((rest, data.to_vec()))
        })(buffer)
    }
}

/// Serializer for `String`, encoded as a length prefixed utf-8 blob.
#[derive(Clone, Default)]
pub struct StringSerializer {
    bytes_serializer: VecU8Serializer,
}

impl StringSerializer {
    /// Creates a new `StringSerializer`
    pub const fn new() -> Self {
        Self {
            bytes_serializer: VecU8Serializer::new(),
        }
    }
}

impl Serializer<String> for StringSerializer {
    fn serialize(&self, value: &String, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        <Self as Serializer<str>>::serialize(self, value.as_str(), buffer)
    }
}

impl Serializer<str> for StringSerializer {
    fn serialize(&self, value: &str, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        <VecU8Serializer as Serializer<[u8]>>::serialize(&self.bytes_serializer, value.as_bytes(), buffer)
            .map_err(|_| SerializeError::StringTooBig(format!("{} bytes", value.len())))
    }
}

/// Deserializer for length prefixed utf-8 strings.
#[derive(Clone)]
pub struct StringDeserializer {
    bytes_deserializer: VecU8Deserializer,
}

impl StringDeserializer {
    /// Creates a new `StringDeserializer` accepting lengths within the given bounds
    pub const fn new(min_length: Bound<u32>, max_length: Bound<u32>) -> Self {
        Self {
            bytes_deserializer: VecU8Deserializer::new(min_length, max_length),
        }
    }
}

impl Deserializer<String> for StringDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], String, E> {
        context("Failed String deserialization", |input: &'a [u8]| {
            let (rest, bytes) = self.bytes_deserializer.deserialize(input)?;
            let value = String::from_utf8(bytes)
                .map_err(|_| nom::Err::Error(ParseError::from_error_kind(input, ErrorKind::Char)))?;
            Ok((rest, value))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::ops::Bound::Included;

    #[test]
    fn test_varint_matches_leb128() {
        let mut buffer = Vec::new();
        U32VarIntSerializer::new().serialize(&300, &mut buffer).unwrap();
        assert_eq!(buffer, vec![0xac, 0x02]);

        let (rest, value) = U32VarIntDeserializer::new(Included(0), Included(u32::MAX))
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(value, 300);
    }

    #[test]
    fn test_varint_out_of_bounds() {
        let mut buffer = Vec::new();
        U64VarIntSerializer::new().serialize(&1000, &mut buffer).unwrap();
        let res = U64VarIntDeserializer::new(Included(0), Included(999))
            .deserialize::<DeserializeError>(&buffer);
        assert_matches!(res, Err(nom::Err::Error(_)));
    }

    #[test]
    fn test_string_length_prefix() {
        let mut buffer = Vec::new();
        StringSerializer::new().serialize("eosio", &mut buffer).unwrap();
        assert_eq!(buffer, b"\x05eosio".to_vec());

        let (rest, value) = StringDeserializer::new(Included(0), Included(16))
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(value, "eosio");
    }

    #[test]
    fn test_truncated_blob_fails_with_context() {
        let buffer = vec![0x04, 0x01, 0x02];
        let err = VecU8Deserializer::new(Included(0), Included(u32::MAX))
            .deserialize::<DeserializeError>(&buffer)
            .unwrap_err();
        match err {
            nom::Err::Error(e) => {
                assert!(e.messages().any(|m| m == "Failed Vec<u8> deserialization"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
