//! Dynamic values crossing the RPC boundary.
//!
//! Every argument decoded from the wire and every return value handed back
//! by an invoker is a [`Value`]. The codec converts between `Value` and the
//! declared wire type; invokers and host services only ever see `Value`.

use std::any::Any;
use std::rc::Rc;

use crate::descriptor::ClassId;

/// A live host object travelling through the RPC layer.
///
/// The target is reference-counted and compared by identity, never by
/// structure. Host objects stay on the host thread; this type is
/// intentionally not `Send`.
#[derive(Clone)]
pub struct ObjectValue {
    pub class: ClassId,
    pub target: Rc<dyn Any>,
}

impl ObjectValue {
    pub fn new(class: ClassId, target: Rc<dyn Any>) -> Self {
        Self { class, target }
    }

    /// Downcast the target to its concrete host type.
    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.target).downcast().ok()
    }
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.target, &other.target)
    }
}

impl std::fmt::Debug for ObjectValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ObjectValue({} @ {:p})",
            self.class,
            Rc::as_ptr(&self.target)
        )
    }
}

/// A typed value in its decoded, host-side form.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    /// An enumeration member, backed by its declared numeric value.
    Enum(i32),
    /// An opaque protobuf message, kept as its unframed encoded bytes.
    Message(Vec<u8>),
    List(Vec<Value>),
    /// Element order is not significant; elements are unique.
    Set(Vec<Value>),
    Dictionary(Vec<(Value, Value)>),
    Tuple(Vec<Value>),
    /// An object reference. `None` is the null reference.
    Object(Option<ObjectValue>),
}

impl Value {
    /// A null object reference.
    pub fn null() -> Self {
        Value::Object(None)
    }

    /// A live object reference.
    pub fn object(class: ClassId, target: Rc<dyn Any>) -> Self {
        Value::Object(Some(ObjectValue::new(class, target)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Object(None))
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The live object behind an object reference, if this is one.
    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Value::Object(Some(obj)) => Some(obj),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::UInt32(_) => "uint32",
            Value::UInt64(_) => "uint64",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Enum(_) => "enum",
            Value::Message(_) => "message",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Dictionary(_) => "dictionary",
            Value::Tuple(_) => "tuple",
            Value::Object(_) => "object",
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
