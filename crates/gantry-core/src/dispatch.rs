//! Request dispatch.
//!
//! [`Dispatcher::execute`] takes one decoded request through the full
//! pipeline: signature lookup, activity-context check, argument binding,
//! invocation, and result encoding. A cooperative yield surfaces as
//! [`ExecOutcome::Suspended`] for the scheduler to park; everything else
//! finalizes into a [`Response`](wire::Response) on the spot. Errors are
//! never recovered here, only normalized.

use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, trace};

use gantry_wire as wire;

use crate::binder;
use crate::codec;
use crate::context::{ClientId, Host};
use crate::descriptor::{Continuation, Invocation, InvokeResult, ProcedureSignature};
use crate::error::CallError;
use crate::object_store::ObjectStore;
use crate::registry::Registry;
use crate::value::Value;

/// Running totals the introspection service reports.
#[derive(Default)]
pub struct ServerStats {
    requests_executed: Cell<u64>,
}

impl ServerStats {
    pub fn requests_executed(&self) -> u64 {
        self.requests_executed.get()
    }

    fn record_request(&self) {
        self.requests_executed
            .set(self.requests_executed.get() + 1);
    }
}

/// A call suspended by a cooperative yield, waiting for its next tick.
pub struct PendingCall {
    continuation: Continuation,
    signature: Rc<ProcedureSignature>,
}

/// What one execution step produced.
pub enum ExecOutcome {
    /// The call finished; `time` is still unstamped.
    Completed(wire::Response),
    /// The call yielded and must be re-run on a later tick.
    Suspended(PendingCall),
}

/// Executes requests against the registry.
pub struct Dispatcher {
    registry: Rc<Registry>,
    host: Rc<dyn Host>,
    stats: Rc<ServerStats>,
}

impl Dispatcher {
    pub fn new(registry: Rc<Registry>, host: Rc<dyn Host>, stats: Rc<ServerStats>) -> Self {
        Self {
            registry,
            host,
            stats,
        }
    }

    pub fn host(&self) -> &Rc<dyn Host> {
        &self.host
    }

    /// Run a fresh request up to its first completion or yield.
    pub fn execute(
        &self,
        client: ClientId,
        request: &wire::Request,
        store: &mut ObjectStore,
    ) -> ExecOutcome {
        self.stats.record_request();

        let signature = match self.registry.lookup(&request.service, &request.procedure) {
            Ok(signature) => signature,
            Err(err) => return fail(err),
        };

        let actual = self.host.activity_context();
        if !signature.required_context().permits(actual) {
            return fail(CallError::WrongContext {
                procedure: signature.fully_qualified_name(),
                required: signature.required_context().clone(),
                actual,
            });
        }

        let arguments = match binder::bind(&signature, &request.arguments, store, client) {
            Ok(arguments) => arguments,
            Err(err) => return fail(err),
        };

        debug!(procedure = %signature.fully_qualified_name(), %client, "dispatching");
        let result = signature.invoke(arguments);
        self.complete(signature, result, store, client)
    }

    /// Re-run a previously suspended call for one more step.
    pub fn resume(
        &self,
        pending: PendingCall,
        store: &mut ObjectStore,
        client: ClientId,
    ) -> ExecOutcome {
        let PendingCall {
            continuation,
            signature,
        } = pending;
        trace!(procedure = %signature.fully_qualified_name(), %client, "resuming");
        let result = continuation.run();
        self.complete(signature, result, store, client)
    }

    fn complete(
        &self,
        signature: Rc<ProcedureSignature>,
        result: InvokeResult,
        store: &mut ObjectStore,
        client: ClientId,
    ) -> ExecOutcome {
        match result {
            Err(err) => fail(CallError::ProcedureFailed(err.to_string())),
            Ok(Invocation::Yield(continuation)) => ExecOutcome::Suspended(PendingCall {
                continuation,
                signature,
            }),
            Ok(Invocation::Complete(value)) => {
                ExecOutcome::Completed(self.encode_result(&signature, value, store, client))
            }
        }
    }

    fn encode_result(
        &self,
        signature: &ProcedureSignature,
        value: Option<Value>,
        store: &mut ObjectStore,
        client: ClientId,
    ) -> wire::Response {
        let return_type = signature.return_type();

        if return_type.is_void() {
            // Void procedures carry no return value; a stray value from the
            // invoker is dropped.
            return wire::Response::returning(Vec::new());
        }

        let value = match value {
            Some(value) => value,
            // A null result is only encodable for object returns, where it
            // becomes handle zero.
            None if return_type.is_object() => Value::null(),
            None => return fail_response(CallError::NullReturn(signature.fully_qualified_name())),
        };

        match codec::encode(&value, return_type, store, client) {
            Ok(bytes) => wire::Response::returning(bytes),
            Err(err) => fail_response(CallError::ProcedureFailed(format!(
                "{} produced an unencodable return value: {err}",
                signature.fully_qualified_name()
            ))),
        }
    }
}

fn fail_response(err: CallError) -> wire::Response {
    wire::Response::failing(err.to_string())
}

fn fail(err: CallError) -> ExecOutcome {
    ExecOutcome::Completed(fail_response(err))
}
