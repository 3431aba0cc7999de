// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::ModelsError;
use std::str::FromStr;

/// Size of a compressed curve point
pub const PUBLIC_KEY_SIZE_BYTES: usize = 33;
const CHECKSUM_SIZE_BYTES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    K1 = 0,
    R1 = 1,
}

/// Operator public key, kept with its textual form so it can be echoed back
/// unchanged into generated actions.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    text: String,
    key_type: KeyType,
    data: [u8; PUBLIC_KEY_SIZE_BYTES],
}

impl PublicKey {
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Binary form: variant index followed by the compressed point
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PUBLIC_KEY_SIZE_BYTES + 1);
        bytes.push(self.key_type as u8);
        bytes.extend_from_slice(&self.data);
        bytes
    }
}

impl FromStr for PublicKey {
    type Err = ModelsError;

    /// Accepts legacy `EOS...` keys and `PUB_K1_...` / `PUB_R1_...` keys.
    /// The trailing checksum is stripped, not verified.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key_type, encoded) = if let Some(rest) = s.strip_prefix("PUB_K1_") {
            (KeyType::K1, rest)
        } else if let Some(rest) = s.strip_prefix("PUB_R1_") {
            (KeyType::R1, rest)
        } else if let Some(rest) = s.strip_prefix("EOS") {
            (KeyType::K1, rest)
        } else {
            return Err(ModelsError::InvalidPublicKey(format!("{}: unknown prefix", s)));
        };
        let decoded = bs58::decode(encoded)
            .into_vec()
            .map_err(|err| ModelsError::InvalidPublicKey(format!("{}: {}", s, err)))?;
        if decoded.len() != PUBLIC_KEY_SIZE_BYTES + CHECKSUM_SIZE_BYTES {
            return Err(ModelsError::InvalidPublicKey(format!(
                "{}: expected {} bytes, got {}",
                s,
                PUBLIC_KEY_SIZE_BYTES + CHECKSUM_SIZE_BYTES,
                decoded.len()
            )));
        }
        let mut data = [0u8; PUBLIC_KEY_SIZE_BYTES];
        data.copy_from_slice(&decoded[..PUBLIC_KEY_SIZE_BYTES]);
        Ok(PublicKey {
            text: s.to_string(),
            key_type,
            data,
        })
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl ::serde::Serialize for PublicKey {
    fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&self.text)
    }
}

impl<'de> ::serde::Deserialize<'de> for PublicKey {
    fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<PublicKey, D::Error> {
        let text = String::deserialize(d)?;
        PublicKey::from_str(&text).map_err(::serde::de::Error::custom)
    }
}
