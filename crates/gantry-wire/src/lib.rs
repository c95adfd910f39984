#![deny(unsafe_code)]

//! Wire-level message types for the gantry protocol.
//!
//! Every message that crosses a transport is defined here as a hand-written
//! prost struct. Field numbers are wire-significant and must never be
//! reordered. Framing is `varint(length) || message_bytes`; the helpers in
//! [`frame`] implement both directions.

pub mod frame;

/// A single remote procedure call.
///
/// `service` and `procedure` name the target; `arguments` carry the encoded
/// parameter values. Argument positions are zero-based, may arrive sparse and
/// unordered, and must not repeat.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Request {
    #[prost(string, tag = "1")]
    pub service: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub procedure: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "3")]
    pub arguments: ::prost::alloc::vec::Vec<Argument>,
}

/// One positional argument of a [`Request`].
///
/// `value` holds exactly the bytes a top-level protobuf field of the declared
/// parameter type would carry.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Argument {
    #[prost(uint32, tag = "1")]
    pub position: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}

/// The server's answer to a [`Request`].
///
/// An empty `error` string denotes success. `time` is the in-simulation
/// timestamp stamped by the host when the response is finalized.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Response {
    #[prost(double, tag = "1")]
    pub time: f64,
    #[prost(string, tag = "2")]
    pub error: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "3")]
    pub return_value: ::prost::alloc::vec::Vec<u8>,
}

impl Response {
    /// A successful response carrying an encoded return value.
    pub fn returning(return_value: Vec<u8>) -> Self {
        Response {
            time: 0.0,
            error: String::new(),
            return_value,
        }
    }

    /// A failed response. The error string carries the canonical kind prefix.
    pub fn failing(error: impl Into<String>) -> Self {
        Response {
            time: 0.0,
            error: error.into(),
            return_value: Vec::new(),
        }
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}

// ============================================================================
// Collection schemas
// ============================================================================
//
// Typed collections travel as protobuf messages with fixed shapes. Each
// `items` entry (or entry key/value) holds the encoded form of an element of
// the declared element type.

/// Encoded form of a `List(elem)` value.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct List {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub items: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

/// Encoded form of a `Set(elem)` value. The server never emits duplicates;
/// duplicates on decode are collapsed.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Set {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub items: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

/// Encoded form of a `Dictionary(key, value)` value. Key uniqueness is
/// enforced on decode.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Dictionary {
    #[prost(message, repeated, tag = "1")]
    pub entries: ::prost::alloc::vec::Vec<DictionaryEntry>,
}

/// One key/value pair of a [`Dictionary`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DictionaryEntry {
    #[prost(bytes = "vec", tag = "1")]
    pub key: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}

/// Encoded form of a `Tuple(elem1, .., elemN)` value. Element count must
/// match the declared arity exactly.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Tuple {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub items: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

// ============================================================================
// Connection handshake
// ============================================================================

/// Sent by a client immediately after the transport connection is
/// established.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConnectionRequest {
    /// Human-readable client name, echoed in server logs.
    #[prost(string, tag = "1")]
    pub client_name: ::prost::alloc::string::String,
}

/// The server's verdict on a [`ConnectionRequest`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConnectionResponse {
    #[prost(enumeration = "ConnectionStatus", tag = "1")]
    pub status: i32,
    /// Failure detail when `status != Ok`.
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
    /// Server-assigned client identifier, stable for the connection.
    #[prost(uint64, tag = "3")]
    pub client_identifier: u64,
}

/// Handshake outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ConnectionStatus {
    Ok = 0,
    MalformedRequest = 1,
    Timeout = 2,
}

// ============================================================================
// Introspection payloads
// ============================================================================
//
// Returned by the built-in introspection service. These are ordinary
// message-typed return values; nothing in the dispatch path special-cases
// them.

/// Server status, returned by `Gantry.GetStatus`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerStatus {
    #[prost(string, tag = "1")]
    pub version: ::prost::alloc::string::String,
    /// Total requests dispatched since startup.
    #[prost(uint64, tag = "2")]
    pub requests_executed: u64,
}

/// All registered services, returned by `Gantry.GetServices`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceCatalog {
    #[prost(message, repeated, tag = "1")]
    pub services: ::prost::alloc::vec::Vec<ServiceEntry>,
}

/// One service of a [`ServiceCatalog`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceEntry {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub procedures: ::prost::alloc::vec::Vec<ProcedureEntry>,
}

/// One procedure of a [`ServiceEntry`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProcedureEntry {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub parameters: ::prost::alloc::vec::Vec<ParameterEntry>,
    /// Display form of the return type; empty for void procedures.
    #[prost(string, tag = "3")]
    pub return_type: ::prost::alloc::string::String,
}

/// One parameter of a [`ProcedureEntry`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ParameterEntry {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    /// Display form of the parameter type.
    #[prost(string, tag = "2")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(bool, tag = "3")]
    pub has_default: bool,
}
