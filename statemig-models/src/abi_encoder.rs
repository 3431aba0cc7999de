//! Schema driven binary encoding of JSON values.

use crate::abi::{Abi, StructDef, VariantDef};
use crate::error::{ModelsError, ModelsResult};
use crate::name::Name;
use crate::public_key::PublicKey;
use serde_json::Value;
use statemig_serialization::{Serializer, U32VarIntSerializer};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, UNIX_EPOCH};

/// Max depth of nested types (aliases, structs, arrays) followed while encoding
const MAX_TYPE_DEPTH: usize = 32;

/// Milliseconds between unix epoch and the block timestamp epoch (2000-01-01)
const BLOCK_TIMESTAMP_EPOCH_MS: u64 = 946_684_800_000;
const BLOCK_INTERVAL_MS: u64 = 500;

/// Encodes JSON values against the types declared by one `Abi`
pub struct AbiEncoder<'a> {
    abi: &'a Abi,
    aliases: HashMap<&'a str, &'a str>,
    structs: HashMap<&'a str, &'a StructDef>,
    variants: HashMap<&'a str, &'a VariantDef>,
    varuint_serializer: U32VarIntSerializer,
}

impl<'a> AbiEncoder<'a> {
    pub fn new(abi: &'a Abi) -> Self {
        AbiEncoder {
            abi,
            aliases: abi
                .types
                .iter()
                .map(|t| (t.new_type_name.as_str(), t.ty.as_str()))
                .collect(),
            structs: abi.structs.iter().map(|s| (s.name.as_str(), s)).collect(),
            variants: abi.variants.iter().map(|v| (v.name.as_str(), v)).collect(),
            varuint_serializer: U32VarIntSerializer::new(),
        }
    }

    /// Encode a row of `table` with the struct type the table is bound to
    pub fn encode_table_row(&self, table: Name, value: &Value) -> ModelsResult<Vec<u8>> {
        let ty = self
            .abi
            .table_type(table)
            .ok_or_else(|| ModelsError::SchemaMismatch(table.to_string()))?;
        self.encode_type(ty, value)
    }

    /// Encode `value` as an instance of the type named `ty`
    pub fn encode_type(&self, ty: &str, value: &Value) -> ModelsResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.encode(ty, value, ty, &mut buffer, 0)?;
        Ok(buffer)
    }

    fn resolve<'t>(&'t self, mut ty: &'t str) -> ModelsResult<&'t str> {
        for _ in 0..MAX_TYPE_DEPTH {
            match self.aliases.get(ty) {
                Some(target) => ty = *target,
                None => return Ok(ty),
            }
        }
        Err(ModelsError::UnknownType(format!("{} (alias loop)", ty)))
    }

    fn encode(
        &self,
        ty: &str,
        value: &Value,
        path: &str,
        buffer: &mut Vec<u8>,
        depth: usize,
    ) -> ModelsResult<()> {
        if depth > MAX_TYPE_DEPTH {
            return Err(invalid(path, "type nesting too deep"));
        }
        let ty = self.resolve(ty)?;

        if let Some(inner) = ty.strip_suffix('$') {
            if value.is_null() {
                return Ok(());
            }
            return self.encode(inner, value, path, buffer, depth + 1);
        }
        if let Some(inner) = ty.strip_suffix('?') {
            if value.is_null() {
                buffer.push(0);
                return Ok(());
            }
            buffer.push(1);
            return self.encode(inner, value, path, buffer, depth + 1);
        }
        if let Some(inner) = ty.strip_suffix("[]") {
            let items = value
                .as_array()
                .ok_or_else(|| invalid(path, "expected an array"))?;
            self.encode_len(items.len(), buffer)?;
            for (i, item) in items.iter().enumerate() {
                self.encode(inner, item, &format!("{}[{}]", path, i), buffer, depth + 1)?;
            }
            return Ok(());
        }
        if let Some(def) = self.structs.get(ty) {
            return self.encode_struct(def, value, path, buffer, depth);
        }
        if let Some(def) = self.variants.get(ty) {
            return self.encode_variant(def, value, path, buffer, depth);
        }
        self.encode_builtin(ty, value, path, buffer)
    }

    fn encode_struct(
        &self,
        def: &StructDef,
        value: &Value,
        path: &str,
        buffer: &mut Vec<u8>,
        depth: usize,
    ) -> ModelsResult<()> {
        let object = value
            .as_object()
            .ok_or_else(|| invalid(path, "expected an object"))?;
        if !def.base.is_empty() {
            let base = self.resolve(&def.base)?;
            let base_def = self
                .structs
                .get(base)
                .ok_or_else(|| ModelsError::UnknownType(base.to_string()))?;
            self.encode_struct(base_def, value, path, buffer, depth + 1)?;
        }
        for field in &def.fields {
            let field_path = format!("{}.{}", path, field.name);
            match object.get(&field.name) {
                Some(field_value) => {
                    self.encode(&field.ty, field_value, &field_path, buffer, depth + 1)?
                }
                // binary extensions are trailing: the first absent one ends the struct
                None if field.ty.ends_with('$') => break,
                None if field.ty.ends_with('?') => buffer.push(0),
                None => return Err(invalid(&field_path, "missing field")),
            }
        }
        Ok(())
    }

    fn encode_variant(
        &self,
        def: &VariantDef,
        value: &Value,
        path: &str,
        buffer: &mut Vec<u8>,
        depth: usize,
    ) -> ModelsResult<()> {
        let (type_name, inner) = match value.as_array().map(|a| a.as_slice()) {
            Some([Value::String(type_name), inner]) => (type_name, inner),
            _ => return Err(invalid(path, "expected a [type, value] pair")),
        };
        let index = def
            .types
            .iter()
            .position(|t| t == type_name)
            .ok_or_else(|| invalid(path, &format!("{} is not part of {}", type_name, def.name)))?;
        self.encode_len(index, buffer)?;
        self.encode(type_name, inner, path, buffer, depth + 1)
    }

    fn encode_len(&self, len: usize, buffer: &mut Vec<u8>) -> ModelsResult<()> {
        let len: u32 = len
            .try_into()
            .map_err(|_| ModelsError::InvalidValue(len.to_string(), "length overflow".into()))?;
        self.varuint_serializer.serialize(&len, buffer)?;
        Ok(())
    }

    fn encode_builtin(
        &self,
        ty: &str,
        value: &Value,
        path: &str,
        buffer: &mut Vec<u8>,
    ) -> ModelsResult<()> {
        match ty {
            "bool" => {
                let b = value
                    .as_bool()
                    .ok_or_else(|| invalid(path, "expected a boolean"))?;
                buffer.push(b as u8);
            }
            "int8" => buffer.extend_from_slice(&to_signed::<i8>(value, path)?.to_le_bytes()),
            "int16" => buffer.extend_from_slice(&to_signed::<i16>(value, path)?.to_le_bytes()),
            "int32" => buffer.extend_from_slice(&to_signed::<i32>(value, path)?.to_le_bytes()),
            "int64" => buffer.extend_from_slice(&to_signed::<i64>(value, path)?.to_le_bytes()),
            "int128" => buffer.extend_from_slice(&to_signed::<i128>(value, path)?.to_le_bytes()),
            "uint8" => buffer.extend_from_slice(&to_unsigned::<u8>(value, path)?.to_le_bytes()),
            "uint16" => buffer.extend_from_slice(&to_unsigned::<u16>(value, path)?.to_le_bytes()),
            "uint32" => buffer.extend_from_slice(&to_unsigned::<u32>(value, path)?.to_le_bytes()),
            "uint64" => buffer.extend_from_slice(&to_unsigned::<u64>(value, path)?.to_le_bytes()),
            "uint128" => match value.as_str().and_then(|s| s.strip_prefix("0x")) {
                Some(hex_str) => buffer.extend_from_slice(&fixed_hex::<16>(hex_str, path)?),
                None => {
                    buffer.extend_from_slice(&to_unsigned::<u128>(value, path)?.to_le_bytes())
                }
            },
            "varint32" => {
                let v = to_signed::<i32>(value, path)?;
                let zigzag = ((v << 1) ^ (v >> 31)) as u32;
                self.varuint_serializer.serialize(&zigzag, buffer)?;
            }
            "varuint32" => {
                let v = to_unsigned::<u32>(value, path)?;
                self.varuint_serializer.serialize(&v, buffer)?;
            }
            "float32" => {
                buffer.extend_from_slice(&(to_float(value, path)? as f32).to_le_bytes())
            }
            "float64" => buffer.extend_from_slice(&to_float(value, path)?.to_le_bytes()),
            "float128" => {
                let s = as_str(value, path)?;
                buffer.extend_from_slice(&fixed_hex::<16>(s.trim_start_matches("0x"), path)?);
            }
            "time_point" => {
                let micros = to_time(value, path)?.as_micros();
                let micros: i64 = micros
                    .try_into()
                    .map_err(|_| invalid(path, "time_point out of range"))?;
                buffer.extend_from_slice(&micros.to_le_bytes());
            }
            "time_point_sec" => {
                let secs: u32 = to_time(value, path)?
                    .as_secs()
                    .try_into()
                    .map_err(|_| invalid(path, "time_point_sec out of range"))?;
                buffer.extend_from_slice(&secs.to_le_bytes());
            }
            "block_timestamp_type" => {
                let millis = to_time(value, path)?.as_millis() as u64;
                let slot = millis.saturating_sub(BLOCK_TIMESTAMP_EPOCH_MS) / BLOCK_INTERVAL_MS;
                let slot: u32 = slot
                    .try_into()
                    .map_err(|_| invalid(path, "block timestamp out of range"))?;
                buffer.extend_from_slice(&slot.to_le_bytes());
            }
            "name" => {
                let name = Name::from_str(as_str(value, path)?)?;
                buffer.extend_from_slice(&name.to_u64().to_le_bytes());
            }
            "bytes" => {
                let bytes = hex::decode(as_str(value, path)?)
                    .map_err(|err| invalid(path, &err.to_string()))?;
                self.encode_len(bytes.len(), buffer)?;
                buffer.extend_from_slice(&bytes);
            }
            "string" => {
                let s = as_str(value, path)?;
                self.encode_len(s.len(), buffer)?;
                buffer.extend_from_slice(s.as_bytes());
            }
            "checksum160" => buffer.extend_from_slice(&fixed_hex::<20>(as_str(value, path)?, path)?),
            "checksum256" => buffer.extend_from_slice(&fixed_hex::<32>(as_str(value, path)?, path)?),
            "checksum512" => buffer.extend_from_slice(&fixed_hex::<64>(as_str(value, path)?, path)?),
            "symbol_code" => {
                let code = symbol_code(as_str(value, path)?, path)?;
                buffer.extend_from_slice(&code.to_le_bytes());
            }
            "symbol" => {
                let (precision, code) = as_str(value, path)?
                    .split_once(',')
                    .ok_or_else(|| invalid(path, "expected <precision>,<code>"))?;
                let precision: u8 = precision
                    .parse()
                    .map_err(|_| invalid(path, "invalid symbol precision"))?;
                let symbol = (symbol_code(code, path)? << 8) | precision as u64;
                buffer.extend_from_slice(&symbol.to_le_bytes());
            }
            "asset" => encode_asset(as_str(value, path)?, path, buffer)?,
            "extended_asset" => {
                let quantity = value
                    .get("quantity")
                    .ok_or_else(|| invalid(path, "missing quantity"))?;
                let contract = value
                    .get("contract")
                    .ok_or_else(|| invalid(path, "missing contract"))?;
                encode_asset(as_str(quantity, path)?, path, buffer)?;
                let contract = Name::from_str(as_str(contract, path)?)?;
                buffer.extend_from_slice(&contract.to_u64().to_le_bytes());
            }
            "public_key" => {
                let key = PublicKey::from_str(as_str(value, path)?)?;
                buffer.extend_from_slice(&key.to_bytes());
            }
            other => return Err(ModelsError::UnknownType(other.to_string())),
        }
        Ok(())
    }
}

fn invalid(path: &str, reason: &str) -> ModelsError {
    ModelsError::InvalidValue(path.to_string(), reason.to_string())
}

fn as_str<'v>(value: &'v Value, path: &str) -> ModelsResult<&'v str> {
    value
        .as_str()
        .ok_or_else(|| invalid(path, "expected a string"))
}

fn to_signed<T: TryFrom<i128>>(value: &Value, path: &str) -> ModelsResult<T> {
    let wide: i128 = match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .ok_or_else(|| invalid(path, "expected an integer"))?,
        Value::String(s) => s
            .parse()
            .map_err(|_| invalid(path, "expected an integer"))?,
        _ => return Err(invalid(path, "expected an integer")),
    };
    T::try_from(wide).map_err(|_| invalid(path, "integer out of range"))
}

fn to_unsigned<T: TryFrom<u128>>(value: &Value, path: &str) -> ModelsResult<T> {
    let wide: u128 = match value {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| invalid(path, "expected an unsigned integer"))?,
        Value::String(s) => s
            .parse()
            .map_err(|_| invalid(path, "expected an unsigned integer"))?,
        _ => return Err(invalid(path, "expected an unsigned integer")),
    };
    T::try_from(wide).map_err(|_| invalid(path, "integer out of range"))
}

fn to_float(value: &Value, path: &str) -> ModelsResult<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| invalid(path, "expected a number")),
        Value::String(s) => s.parse().map_err(|_| invalid(path, "expected a number")),
        _ => Err(invalid(path, "expected a number")),
    }
}

/// Duration since unix epoch, from seconds or an RFC3339-like string (UTC)
fn to_time(value: &Value, path: &str) -> ModelsResult<Duration> {
    if let Some(secs) = value.as_u64() {
        return Ok(Duration::from_secs(secs));
    }
    let time = humantime::parse_rfc3339_weak(as_str(value, path)?)
        .map_err(|err| invalid(path, &err.to_string()))?;
    time.duration_since(UNIX_EPOCH)
        .map_err(|_| invalid(path, "time before unix epoch"))
}

fn fixed_hex<const N: usize>(s: &str, path: &str) -> ModelsResult<[u8; N]> {
    let mut out = [0u8; N];
    hex::decode_to_slice(s, &mut out).map_err(|err| invalid(path, &err.to_string()))?;
    Ok(out)
}

fn symbol_code(code: &str, path: &str) -> ModelsResult<u64> {
    if code.is_empty() || code.len() > 7 || !code.bytes().all(|c| c.is_ascii_uppercase()) {
        return Err(invalid(path, &format!("invalid symbol code {:?}", code)));
    }
    Ok(code
        .bytes()
        .enumerate()
        .fold(0u64, |acc, (i, c)| acc | (c as u64) << (8 * i)))
}

fn encode_asset(s: &str, path: &str, buffer: &mut Vec<u8>) -> ModelsResult<()> {
    let (amount, code) = s
        .trim()
        .split_once(' ')
        .ok_or_else(|| invalid(path, "expected <amount> <symbol>"))?;
    let precision = amount.split_once('.').map_or(0, |(_, frac)| frac.len());
    let precision: u8 = precision
        .try_into()
        .map_err(|_| invalid(path, "asset precision too large"))?;
    let amount: i64 = amount
        .replace('.', "")
        .parse()
        .map_err(|_| invalid(path, "invalid asset amount"))?;
    let symbol = (symbol_code(code.trim(), path)? << 8) | precision as u64;
    buffer.extend_from_slice(&amount.to_le_bytes());
    buffer.extend_from_slice(&symbol.to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn abi() -> Abi {
        serde_json::from_value(json!({
            "version": "eosio::abi/1.1",
            "types": [{"new_type_name": "account_name", "type": "name"}],
            "structs": [
                {"name": "base_row", "base": "", "fields": [{"name": "id", "type": "uint64"}]},
                {"name": "row", "base": "base_row", "fields": [
                    {"name": "owner", "type": "account_name"},
                    {"name": "balance", "type": "asset"},
                    {"name": "tags", "type": "string[]"},
                    {"name": "note", "type": "string?"},
                    {"name": "extra", "type": "uint8$"}
                ]},
                {"name": "holder", "base": "", "fields": [{"name": "what", "type": "any_id"}]}
            ],
            "tables": [
                {"name": "rows", "index_type": "i64", "key_names": [], "key_types": [], "type": "row"},
                {"name": "holders", "index_type": "i64", "key_names": [], "key_types": [], "type": "holder"}
            ],
            "variants": [{"name": "any_id", "types": ["uint64", "name"]}]
        }))
        .unwrap()
    }

    #[test]
    fn test_encode_row_with_base_and_extensions() {
        let abi = abi();
        let encoder = AbiEncoder::new(&abi);
        let bytes = encoder
            .encode_table_row(
                Name::from_str("rows").unwrap(),
                &json!({"id": 1, "owner": "eosio", "balance": "1.0000 EOS", "tags": ["a"], "note": null}),
            )
            .unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&1u64.to_le_bytes());
        expected.extend_from_slice(&Name::from_str("eosio").unwrap().to_u64().to_le_bytes());
        expected.extend_from_slice(&10000i64.to_le_bytes());
        expected.extend_from_slice(&[4, b'E', b'O', b'S', 0, 0, 0, 0]);
        expected.extend_from_slice(&[1, 1, b'a']);
        expected.push(0);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_encode_variant() {
        let abi = abi();
        let encoder = AbiEncoder::new(&abi);
        let bytes = encoder
            .encode_table_row(Name::from_str("holders").unwrap(), &json!({"what": ["name", "a"]}))
            .unwrap();
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes.len(), 9);
    }

    #[test]
    fn test_unbound_table_is_a_schema_mismatch() {
        let abi = abi();
        let encoder = AbiEncoder::new(&abi);
        assert_matches!(
            encoder.encode_table_row(Name::from_str("nope").unwrap(), &json!({})),
            Err(ModelsError::SchemaMismatch(t)) if t == "nope"
        );
    }

    #[test]
    fn test_errors_name_the_field() {
        let abi = abi();
        let encoder = AbiEncoder::new(&abi);
        let res = encoder.encode_table_row(
            Name::from_str("rows").unwrap(),
            &json!({"id": 1, "owner": "eosio", "balance": "1.0000 EOS", "tags": [3]}),
        );
        assert_matches!(res, Err(ModelsError::InvalidValue(path, _)) if path == "row.tags[0]");

        let res = encoder.encode_type("row", &json!({"id": 1}));
        assert_matches!(res, Err(ModelsError::InvalidValue(path, _)) if path == "row.owner");
        assert_matches!(encoder.encode_type("mystery", &json!(1)), Err(ModelsError::UnknownType(_)));
    }

    #[test]
    fn test_builtins() {
        let abi = Abi::default();
        let encoder = AbiEncoder::new(&abi);
        assert_eq!(encoder.encode_type("varint32", &json!(-1)).unwrap(), vec![1]);
        assert_eq!(encoder.encode_type("varuint32", &json!(300)).unwrap(), vec![0xac, 0x02]);
        assert_eq!(encoder.encode_type("int16", &json!("-2")).unwrap(), vec![0xfe, 0xff]);
        assert_eq!(encoder.encode_type("bytes", &json!("beef")).unwrap(), vec![2, 0xbe, 0xef]);
        assert_eq!(
            encoder.encode_type("time_point_sec", &json!("2018-06-01T12:00:00")).unwrap(),
            1527854400u32.to_le_bytes().to_vec()
        );
        assert_eq!(
            encoder.encode_type("block_timestamp_type", &json!("2000-01-01T00:00:01.000")).unwrap(),
            2u32.to_le_bytes().to_vec()
        );
        assert_matches!(
            encoder.encode_type("uint8", &json!(256)),
            Err(ModelsError::InvalidValue(_, _))
        );
        assert_matches!(
            encoder.encode_type("checksum256", &json!("00")),
            Err(ModelsError::InvalidValue(_, _))
        );
    }
}
