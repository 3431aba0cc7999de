// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::name::{Name, NameSerializer};
use crate::public_key::PublicKey;
use serde::{Deserialize, Serialize};
use statemig_serialization::{SerializeError, Serializer, U32VarIntSerializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: Name,
    pub permission: Name,
}

impl PermissionLevel {
    pub fn new(actor: Name, permission: Name) -> Self {
        PermissionLevel { actor, permission }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyWeight {
    pub key: PublicKey,
    pub weight: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevelWeight {
    pub permission: PermissionLevel,
    pub weight: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitWeight {
    pub wait_sec: u32,
    pub weight: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub threshold: u32,
    #[serde(default)]
    pub keys: Vec<KeyWeight>,
    #[serde(default)]
    pub accounts: Vec<PermissionLevelWeight>,
    #[serde(default)]
    pub waits: Vec<WaitWeight>,
}

impl Authority {
    /// Single key authority with threshold 1
    pub fn from_key(key: PublicKey) -> Self {
        Authority {
            threshold: 1,
            keys: vec![KeyWeight { key, weight: 1 }],
            accounts: Vec::new(),
            waits: Vec::new(),
        }
    }
}

/// A named permission of `owner`. Root permissions have an empty parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionObject {
    pub owner: Name,
    pub name: Name,
    #[serde(default)]
    pub parent: Name,
    pub authority: Authority,
}

impl PermissionObject {
    pub fn is_root(&self) -> bool {
        self.parent.is_empty()
    }
}

/// Binding of a contract action to a permission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkAuth {
    pub permission: Name,
    pub contract: Name,
    #[serde(default)]
    pub action: Name,
}

/// Content of `account.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub permissions: Vec<PermissionObject>,
    #[serde(default)]
    pub link_auths: Vec<LinkAuth>,
}

pub const OWNER_PERMISSION: Name = Name::constant("owner");
pub const ACTIVE_PERMISSION: Name = Name::constant("active");

/// Binary serializer for `Authority`
#[derive(Clone, Default)]
pub struct AuthoritySerializer {
    len_serializer: U32VarIntSerializer,
    name_serializer: NameSerializer,
}

impl AuthoritySerializer {
    pub const fn new() -> Self {
        Self {
            len_serializer: U32VarIntSerializer::new(),
            name_serializer: NameSerializer::new(),
        }
    }

    fn serialize_len(&self, len: usize, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let len: u32 = len
            .try_into()
            .map_err(|_| SerializeError::NumberTooBig(format!("{} authority entries", len)))?;
        self.len_serializer.serialize(&len, buffer)
    }
}

impl Serializer<Authority> for AuthoritySerializer {
    fn serialize(&self, value: &Authority, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(&value.threshold.to_le_bytes());
        self.serialize_len(value.keys.len(), buffer)?;
        for kw in &value.keys {
            buffer.extend_from_slice(&kw.key.to_bytes());
            buffer.extend_from_slice(&kw.weight.to_le_bytes());
        }
        self.serialize_len(value.accounts.len(), buffer)?;
        for aw in &value.accounts {
            self.name_serializer.serialize(&aw.permission.actor, buffer)?;
            self.name_serializer.serialize(&aw.permission.permission, buffer)?;
            buffer.extend_from_slice(&aw.weight.to_le_bytes());
        }
        self.serialize_len(value.waits.len(), buffer)?;
        for ww in &value.waits {
            buffer.extend_from_slice(&ww.wait_sec.to_le_bytes());
            buffer.extend_from_slice(&ww.weight.to_le_bytes());
        }
        Ok(())
    }
}
