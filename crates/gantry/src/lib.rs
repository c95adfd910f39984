#![deny(unsafe_code)]

//! gantry - tick-scheduled protobuf RPC for game hosts
//!
//! This crate provides a unified API over the gantry component crates.
//! Users should depend on this crate rather than the individual pieces.
//!
//! The core ([`Server`]) is a single-threaded library the host embeds and
//! ticks from its game loop; procedures are registered through
//! [`ServiceDescriptor`]s and may suspend across ticks by yielding.
//! [`tcp`] carries the wire protocol over framed TCP.

// Core surface: registration, values, dispatch, scheduling.
pub use gantry_core::{
    codec, ActivityContext, CallError, ClassId, ClientId, Continuation, ContextSet,
    EnumDescriptor, Handle, Host, Invocation, InvokeResult, Invoker, ObjectStore, ObjectValue,
    Parameter, ProcedureDef, ProcedureKind, ProcedureSignature, Registry, RegistryError, Server,
    ServerBuilder, ServiceBuilder, ServiceDescriptor, TypeDescriptor, Value,
};

/// Name of the built-in introspection service.
pub use gantry_core::introspect::SERVICE_NAME as BUILTIN_SERVICE;

/// Wire-level message types and framing.
pub mod wire {
    pub use gantry_wire::frame;
    pub use gantry_wire::{
        Argument, ConnectionRequest, ConnectionResponse, ConnectionStatus, Dictionary,
        DictionaryEntry, List, ParameterEntry, ProcedureEntry, Request, Response, ServerStatus,
        ServiceCatalog, ServiceEntry, Set, Tuple,
    };
}

/// Framed TCP transport.
pub mod tcp {
    pub use gantry_tcp::{
        handshake_acceptor, handshake_initiator, serve, ClientEvent, ConnectionError, Framed,
        ServerConfig, Transport,
    };
}
