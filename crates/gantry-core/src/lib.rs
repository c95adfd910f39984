#![deny(unsafe_code)]

//! RPC server core: service registry, request dispatch and the cooperative
//! continuation scheduler.
//!
//! The core is a library embedded in a host game. It is single-threaded by
//! contract: every type here lives on the host tick thread, and the only
//! suspension point is an explicit yield raised by a target invoker.
//! Transports exchange plain [`gantry_wire`] requests and responses with the
//! core through [`Server::submit`] and [`Server::drain_responses`] and drive
//! progress by calling [`Server::tick`] once per host frame.

pub mod binder;
pub mod codec;
pub mod context;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod introspect;
pub mod object_store;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod value;

pub use context::{ActivityContext, ClientId, ContextSet, Host};
pub use descriptor::{
    ClassId, Continuation, EnumDescriptor, Invocation, InvokeResult, Invoker, Parameter,
    ProcedureDef, ProcedureKind, ProcedureSignature, ServiceBuilder, ServiceDescriptor,
    TypeDescriptor,
};
pub use dispatch::{Dispatcher, ExecOutcome, PendingCall, ServerStats};
pub use error::{CallError, RegistryError};
pub use object_store::{Handle, ObjectStore};
pub use registry::{Registry, ServiceRecord};
pub use scheduler::Scheduler;
pub use server::{Server, ServerBuilder};
pub use value::{ObjectValue, Value};
