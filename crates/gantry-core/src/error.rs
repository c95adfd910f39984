//! Error types.
//!
//! [`CallError`] is the normalized form of every failure that can reach the
//! wire: its `Display` impl renders the canonical `"<Kind>: <detail>"` string
//! placed in `Response.error`. [`RegistryError`] covers registration-time
//! problems, which are fatal at startup and never reach a client.

use crate::context::{ActivityContext, ContextSet};

/// A failed call, normalized for the wire.
///
/// The kind prefix is canonical and machine-matchable; the tail carries
/// human-readable detail.
#[derive(Debug, Clone, PartialEq)]
pub enum CallError {
    /// No service registered under this name.
    UnknownService(String),
    /// The service exists but has no such procedure.
    UnknownProcedure { service: String, procedure: String },
    /// The ambient activity context does not satisfy the procedure's
    /// required context.
    WrongContext {
        procedure: String,
        required: ContextSet,
        actual: ActivityContext,
    },
    /// A required parameter was neither supplied nor defaulted.
    MissingArgument { position: usize, name: String },
    /// Malformed argument bytes, out-of-range enum, duplicate dictionary
    /// key, arity mismatch, or an out-of-range/duplicate position.
    InvalidArgument(String),
    /// A non-zero object handle that is not in the store.
    UnknownHandle(u64),
    /// A null handle where a live receiver is required.
    NullReference(String),
    /// The invoker returned null for a non-nullable declared return type.
    NullReturn(String),
    /// The target invoker raised an error; the diagnostic is included.
    ProcedureFailed(String),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::UnknownService(service) => write!(f, "UnknownService: {service}"),
            CallError::UnknownProcedure { service, procedure } => {
                write!(f, "UnknownProcedure: {service}.{procedure}")
            }
            CallError::WrongContext {
                procedure,
                required,
                actual,
            } => write!(
                f,
                "WrongContext: {procedure} requires {required}, current context is {actual}"
            ),
            CallError::MissingArgument { position, name } => {
                write!(f, "MissingArgument: parameter {name} (position {position})")
            }
            CallError::InvalidArgument(detail) => write!(f, "InvalidArgument: {detail}"),
            CallError::UnknownHandle(handle) => write!(f, "UnknownHandle: {handle}"),
            CallError::NullReference(detail) => write!(f, "NullReference: {detail}"),
            CallError::NullReturn(procedure) => {
                write!(f, "NullReturn: {procedure} returned null for a non-nullable type")
            }
            CallError::ProcedureFailed(diagnostic) => {
                write!(f, "ProcedureFailed: {diagnostic}")
            }
        }
    }
}

impl std::error::Error for CallError {}

/// Fatal problem while registering a service descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Service name is empty.
    EmptyServiceName,
    /// Procedure name is empty or does not fit the naming grammar.
    BadProcedureName(String),
    /// Two procedures share a fully qualified name.
    DuplicateProcedure(String),
    /// Two services share a name.
    DuplicateService(String),
    /// A required parameter follows an optional one.
    RequiredAfterOptional {
        procedure: String,
        parameter: String,
    },
    /// A class-bound procedure whose first parameter is not an object
    /// reference.
    MissingReceiver(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::EmptyServiceName => write!(f, "service name cannot be empty"),
            RegistryError::BadProcedureName(name) => {
                write!(f, "procedure name {name:?} does not fit the naming grammar")
            }
            RegistryError::DuplicateProcedure(name) => {
                write!(f, "duplicate procedure {name}")
            }
            RegistryError::DuplicateService(name) => {
                write!(f, "duplicate service {name}")
            }
            RegistryError::RequiredAfterOptional {
                procedure,
                parameter,
            } => write!(
                f,
                "{procedure}: required parameter {parameter} follows an optional parameter"
            ),
            RegistryError::MissingReceiver(name) => write!(
                f,
                "{name}: class-bound procedures take an object reference as their first parameter"
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_service_renders_canonical_prefix() {
        let err = CallError::UnknownService("NonExistant".into());
        assert_eq!(err.to_string(), "UnknownService: NonExistant");
    }

    #[test]
    fn wrong_context_names_the_procedure() {
        let err = CallError::WrongContext {
            procedure: "TestService.Engage".into(),
            required: ContextSet::only([ActivityContext::Flight]),
            actual: ActivityContext::TrackingStation,
        };
        let rendered = err.to_string();
        assert!(rendered.starts_with("WrongContext:"));
        assert!(rendered.contains("TestService.Engage"));
        assert!(rendered.contains("TrackingStation"));
    }

    #[test]
    fn every_kind_keeps_its_prefix() {
        let cases: Vec<(CallError, &str)> = vec![
            (CallError::UnknownService("X".into()), "UnknownService:"),
            (
                CallError::UnknownProcedure {
                    service: "S".into(),
                    procedure: "P".into(),
                },
                "UnknownProcedure:",
            ),
            (
                CallError::MissingArgument {
                    position: 1,
                    name: "x".into(),
                },
                "MissingArgument:",
            ),
            (CallError::InvalidArgument("bad".into()), "InvalidArgument:"),
            (CallError::UnknownHandle(7), "UnknownHandle:"),
            (CallError::NullReference("this".into()), "NullReference:"),
            (CallError::NullReturn("S.P".into()), "NullReturn:"),
            (CallError::ProcedureFailed("boom".into()), "ProcedureFailed:"),
        ];
        for (err, prefix) in cases {
            assert!(
                err.to_string().starts_with(prefix),
                "{err:?} should start with {prefix}"
            );
        }
    }
}
