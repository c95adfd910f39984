//! Typed value codec.
//!
//! Converts between [`Value`]s and the wire form declared by a
//! [`TypeDescriptor`], in both directions, isomorphically. Scalars use the
//! protobuf singular wire form with no tag: varints for integers (zig-zag
//! for the signed variants and enums), fixed-width little-endian for
//! floats, length-delimited for strings and bytes. Messages and the
//! collection schemas travel as length-prefixed protobuf messages. Object
//! references are `u64` handles resolved through the [`ObjectStore`];
//! handle `0` is null.

use std::rc::Rc;

use bytes::Buf;
use prost::encoding::{decode_varint, encode_varint};
use prost::Message;

use gantry_wire as wire;

use crate::context::ClientId;
use crate::descriptor::TypeDescriptor;
use crate::error::CallError;
use crate::object_store::{Handle, ObjectStore};
use crate::value::Value;

/// A failed conversion in either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Truncated or otherwise malformed bytes.
    Malformed(String),
    /// Decoded enum value is not a member of the declared set.
    EnumOutOfRange { name: String, value: i32 },
    /// A dictionary carried the same key twice.
    DuplicateKey(String),
    /// Tuple element count does not match the declared arity.
    ArityMismatch { expected: usize, actual: usize },
    /// Value shape does not match the declared type (encode side).
    TypeMismatch {
        expected: String,
        actual: &'static str,
    },
    /// A non-zero handle that is not in the store.
    UnknownHandle(u64),
    /// A live handle whose class differs from the declared one.
    ClassMismatch { expected: String, actual: String },
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::Malformed(detail) => write!(f, "malformed value: {detail}"),
            CodecError::EnumOutOfRange { name, value } => {
                write!(f, "{value} is not a member of enumeration {name}")
            }
            CodecError::DuplicateKey(key) => write!(f, "duplicate dictionary key {key}"),
            CodecError::ArityMismatch { expected, actual } => {
                write!(f, "tuple arity mismatch: expected {expected}, got {actual}")
            }
            CodecError::TypeMismatch { expected, actual } => {
                write!(f, "expected a {expected} value, got {actual}")
            }
            CodecError::UnknownHandle(handle) => write!(f, "unknown object handle {handle}"),
            CodecError::ClassMismatch { expected, actual } => {
                write!(f, "expected an instance of {expected}, got {actual}")
            }
        }
    }
}

impl std::error::Error for CodecError {}

impl CodecError {
    /// Normalize a decode-side failure into the wire error kind an argument
    /// carries.
    pub fn into_argument_error(self) -> CallError {
        match self {
            CodecError::UnknownHandle(handle) => CallError::UnknownHandle(handle),
            other => CallError::InvalidArgument(other.to_string()),
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode a value against its declared type.
///
/// Live object references are registered in the store (idempotently) and
/// claimed for `client`.
pub fn encode(
    value: &Value,
    ty: &TypeDescriptor,
    store: &mut ObjectStore,
    client: ClientId,
) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    encode_into(value, ty, store, client, &mut buf)?;
    Ok(buf)
}

/// Encode a literal value with no object store at hand.
///
/// This is the helper for capturing parameter defaults at registration
/// time. Only the null object reference is representable; a live object
/// has no meaning as a registration-time literal.
pub fn encode_literal(value: &Value, ty: &TypeDescriptor) -> Result<Vec<u8>, CodecError> {
    if contains_live_object(value) {
        return Err(CodecError::TypeMismatch {
            expected: "null object reference".into(),
            actual: "object",
        });
    }
    let mut scratch = ObjectStore::new();
    encode(value, ty, &mut scratch, ClientId::new(0))
}

fn contains_live_object(value: &Value) -> bool {
    match value {
        Value::Object(obj) => obj.is_some(),
        Value::List(items) | Value::Set(items) | Value::Tuple(items) => {
            items.iter().any(contains_live_object)
        }
        Value::Dictionary(entries) => entries
            .iter()
            .any(|(k, v)| contains_live_object(k) || contains_live_object(v)),
        _ => false,
    }
}

fn mismatch(ty: &TypeDescriptor, value: &Value) -> CodecError {
    CodecError::TypeMismatch {
        expected: ty.to_string(),
        actual: value.kind(),
    }
}

fn encode_into(
    value: &Value,
    ty: &TypeDescriptor,
    store: &mut ObjectStore,
    client: ClientId,
    buf: &mut Vec<u8>,
) -> Result<(), CodecError> {
    match (ty, value) {
        (TypeDescriptor::Int32, Value::Int32(v)) => encode_varint(zigzag32(*v), buf),
        (TypeDescriptor::Int64, Value::Int64(v)) => encode_varint(zigzag64(*v), buf),
        (TypeDescriptor::UInt32, Value::UInt32(v)) => encode_varint(u64::from(*v), buf),
        (TypeDescriptor::UInt64, Value::UInt64(v)) => encode_varint(*v, buf),
        (TypeDescriptor::Float, Value::Float(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (TypeDescriptor::Double, Value::Double(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (TypeDescriptor::Bool, Value::Bool(v)) => encode_varint(u64::from(*v), buf),
        (TypeDescriptor::String, Value::String(s)) => {
            encode_varint(s.len() as u64, buf);
            buf.extend_from_slice(s.as_bytes());
        }
        (TypeDescriptor::Bytes, Value::Bytes(b)) => {
            encode_varint(b.len() as u64, buf);
            buf.extend_from_slice(b);
        }
        (TypeDescriptor::Enum(desc), Value::Enum(v)) => {
            if !desc.contains(*v) {
                return Err(CodecError::EnumOutOfRange {
                    name: desc.name().to_owned(),
                    value: *v,
                });
            }
            encode_varint(zigzag32(*v), buf);
        }
        (TypeDescriptor::Message(_), Value::Message(bytes)) => {
            encode_varint(bytes.len() as u64, buf);
            buf.extend_from_slice(bytes);
        }
        (TypeDescriptor::List(elem), Value::List(items)) => {
            let mut msg = wire::List::default();
            for item in items {
                msg.items.push(encode(item, elem, store, client)?);
            }
            buf.extend_from_slice(&msg.encode_length_delimited_to_vec());
        }
        (TypeDescriptor::Set(elem), Value::Set(items)) => {
            // Never emit duplicates, whatever the invoker handed back.
            let mut unique: Vec<&Value> = Vec::with_capacity(items.len());
            for item in items {
                if !unique.iter().any(|seen| *seen == item) {
                    unique.push(item);
                }
            }
            let mut msg = wire::Set::default();
            for item in unique {
                msg.items.push(encode(item, elem, store, client)?);
            }
            buf.extend_from_slice(&msg.encode_length_delimited_to_vec());
        }
        (TypeDescriptor::Dictionary { key, value: val }, Value::Dictionary(entries)) => {
            let mut msg = wire::Dictionary::default();
            for (i, (k, v)) in entries.iter().enumerate() {
                if entries[..i].iter().any(|(seen, _)| seen == k) {
                    return Err(CodecError::DuplicateKey(format!("{k:?}")));
                }
                msg.entries.push(wire::DictionaryEntry {
                    key: encode(k, key, store, client)?,
                    value: encode(v, val, store, client)?,
                });
            }
            buf.extend_from_slice(&msg.encode_length_delimited_to_vec());
        }
        (TypeDescriptor::Tuple(types), Value::Tuple(items)) => {
            if items.len() != types.len() {
                return Err(CodecError::ArityMismatch {
                    expected: types.len(),
                    actual: items.len(),
                });
            }
            let mut msg = wire::Tuple::default();
            for (item, item_ty) in items.iter().zip(types) {
                msg.items.push(encode(item, item_ty, store, client)?);
            }
            buf.extend_from_slice(&msg.encode_length_delimited_to_vec());
        }
        (TypeDescriptor::Object(_), Value::Object(None)) => encode_varint(0, buf),
        (TypeDescriptor::Object(class), Value::Object(Some(obj))) => {
            if obj.class != *class {
                return Err(CodecError::ClassMismatch {
                    expected: class.to_string(),
                    actual: obj.class.to_string(),
                });
            }
            let handle = store.add(obj.class.clone(), Rc::clone(&obj.target));
            store.claim(handle, client);
            encode_varint(handle.raw(), buf);
        }
        (ty, value) => return Err(mismatch(ty, value)),
    }
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a complete value of the declared type.
///
/// Every byte must be consumed; trailing garbage is malformed. Object
/// handles are resolved through the store and claimed for `client`.
pub fn decode(
    bytes: &[u8],
    ty: &TypeDescriptor,
    store: &mut ObjectStore,
    client: ClientId,
) -> Result<Value, CodecError> {
    let mut cursor = bytes;
    let value = decode_from(&mut cursor, ty, store, client)?;
    if cursor.has_remaining() {
        return Err(CodecError::Malformed(format!(
            "{} trailing bytes after {ty} value",
            cursor.remaining()
        )));
    }
    Ok(value)
}

fn decode_from(
    cursor: &mut &[u8],
    ty: &TypeDescriptor,
    store: &mut ObjectStore,
    client: ClientId,
) -> Result<Value, CodecError> {
    match ty {
        TypeDescriptor::Int32 => {
            let raw = varint(cursor)?;
            Ok(Value::Int32(unzigzag32(raw)?))
        }
        TypeDescriptor::Int64 => {
            let raw = varint(cursor)?;
            Ok(Value::Int64(unzigzag64(raw)))
        }
        TypeDescriptor::UInt32 => {
            let raw = varint(cursor)?;
            u32::try_from(raw)
                .map(Value::UInt32)
                .map_err(|_| CodecError::Malformed(format!("{raw} does not fit in uint32")))
        }
        TypeDescriptor::UInt64 => Ok(Value::UInt64(varint(cursor)?)),
        TypeDescriptor::Float => {
            if cursor.remaining() < 4 {
                return Err(CodecError::Malformed("truncated float".into()));
            }
            Ok(Value::Float(cursor.get_f32_le()))
        }
        TypeDescriptor::Double => {
            if cursor.remaining() < 8 {
                return Err(CodecError::Malformed("truncated double".into()));
            }
            Ok(Value::Double(cursor.get_f64_le()))
        }
        TypeDescriptor::Bool => Ok(Value::Bool(varint(cursor)? != 0)),
        TypeDescriptor::String => {
            let bytes = delimited(cursor)?;
            String::from_utf8(bytes)
                .map(Value::String)
                .map_err(|_| CodecError::Malformed("string is not valid UTF-8".into()))
        }
        TypeDescriptor::Bytes => Ok(Value::Bytes(delimited(cursor)?)),
        TypeDescriptor::Enum(desc) => {
            let raw = varint(cursor)?;
            let value = unzigzag32(raw)?;
            if !desc.contains(value) {
                return Err(CodecError::EnumOutOfRange {
                    name: desc.name().to_owned(),
                    value,
                });
            }
            Ok(Value::Enum(value))
        }
        TypeDescriptor::Message(_) => Ok(Value::Message(delimited(cursor)?)),
        TypeDescriptor::List(elem) => {
            let msg: wire::List = framed_message(cursor)?;
            let mut items = Vec::with_capacity(msg.items.len());
            for item in &msg.items {
                items.push(decode(item, elem, store, client)?);
            }
            Ok(Value::List(items))
        }
        TypeDescriptor::Set(elem) => {
            let msg: wire::Set = framed_message(cursor)?;
            let mut items: Vec<Value> = Vec::with_capacity(msg.items.len());
            for item in &msg.items {
                let decoded = decode(item, elem, store, client)?;
                // Duplicates are accepted and collapsed.
                if !items.contains(&decoded) {
                    items.push(decoded);
                }
            }
            Ok(Value::Set(items))
        }
        TypeDescriptor::Dictionary { key, value } => {
            let msg: wire::Dictionary = framed_message(cursor)?;
            let mut entries: Vec<(Value, Value)> = Vec::with_capacity(msg.entries.len());
            for entry in &msg.entries {
                let k = decode(&entry.key, key, store, client)?;
                if entries.iter().any(|(seen, _)| *seen == k) {
                    return Err(CodecError::DuplicateKey(format!("{k:?}")));
                }
                let v = decode(&entry.value, value, store, client)?;
                entries.push((k, v));
            }
            Ok(Value::Dictionary(entries))
        }
        TypeDescriptor::Tuple(types) => {
            let msg: wire::Tuple = framed_message(cursor)?;
            if msg.items.len() != types.len() {
                return Err(CodecError::ArityMismatch {
                    expected: types.len(),
                    actual: msg.items.len(),
                });
            }
            let mut items = Vec::with_capacity(types.len());
            for (item, item_ty) in msg.items.iter().zip(types) {
                items.push(decode(item, item_ty, store, client)?);
            }
            Ok(Value::Tuple(items))
        }
        TypeDescriptor::Object(class) => {
            let raw = varint(cursor)?;
            if raw == 0 {
                return Ok(Value::Object(None));
            }
            let handle = Handle::new(raw);
            let obj = store.get(handle).map_err(|err| match err {
                CallError::UnknownHandle(h) => CodecError::UnknownHandle(h),
                other => CodecError::Malformed(other.to_string()),
            })?;
            if obj.class != *class {
                return Err(CodecError::ClassMismatch {
                    expected: class.to_string(),
                    actual: obj.class.to_string(),
                });
            }
            store.claim(handle, client);
            Ok(Value::Object(Some(obj)))
        }
        TypeDescriptor::Void => Err(CodecError::Malformed("void has no encoded form".into())),
    }
}

// ============================================================================
// Primitive helpers
// ============================================================================

fn varint(cursor: &mut &[u8]) -> Result<u64, CodecError> {
    decode_varint(cursor).map_err(|_| CodecError::Malformed("truncated or invalid varint".into()))
}

fn delimited(cursor: &mut &[u8]) -> Result<Vec<u8>, CodecError> {
    let len = varint(cursor)? as usize;
    if cursor.remaining() < len {
        return Err(CodecError::Malformed(format!(
            "length prefix {len} exceeds remaining {} bytes",
            cursor.remaining()
        )));
    }
    let mut bytes = vec![0; len];
    cursor.copy_to_slice(&mut bytes);
    Ok(bytes)
}

fn framed_message<M: Message + Default>(cursor: &mut &[u8]) -> Result<M, CodecError> {
    let bytes = delimited(cursor)?;
    M::decode(&bytes[..]).map_err(|e| CodecError::Malformed(e.to_string()))
}

fn zigzag32(v: i32) -> u64 {
    u64::from(((v << 1) ^ (v >> 31)) as u32)
}

fn unzigzag32(raw: u64) -> Result<i32, CodecError> {
    let raw = u32::try_from(raw)
        .map_err(|_| CodecError::Malformed(format!("{raw} does not fit in int32")))?;
    Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
}

fn zigzag64(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

fn unzigzag64(raw: u64) -> i64 {
    ((raw >> 1) as i64) ^ -((raw & 1) as i64)
}
