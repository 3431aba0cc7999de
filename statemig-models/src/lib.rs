// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Data model of the state migration: ledger names, contract schemas and the
//! schema driven row codec, exported rows and secondary indexes, permissions,
//! and the operations replayed against the destination ledger.

pub mod abi;
pub mod abi_encoder;
pub mod error;
pub mod name;
pub mod operation;
pub mod permission;
pub mod public_key;
pub mod row;
pub mod secondary_index;
