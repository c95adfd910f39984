//! Argument binding.
//!
//! Materializes a request's sparse, unordered argument list into the dense
//! argument vector an invoker expects, filling omitted optional parameters
//! from their captured defaults. Binding is atomic with respect to the
//! request: it never suspends, and a binding failure fails the whole call.

use gantry_wire as wire;

use crate::codec;
use crate::context::ClientId;
use crate::descriptor::ProcedureSignature;
use crate::error::CallError;
use crate::object_store::ObjectStore;
use crate::value::Value;

/// Bind a request's arguments against a signature.
pub fn bind(
    signature: &ProcedureSignature,
    arguments: &[wire::Argument],
    store: &mut ObjectStore,
    client: ClientId,
) -> Result<Vec<Value>, CallError> {
    let parameters = signature.parameters();
    let arity = parameters.len();

    let mut slots: Vec<Option<&[u8]>> = vec![None; arity];
    for arg in arguments {
        let position = arg.position as usize;
        if position >= arity {
            return Err(CallError::InvalidArgument(format!(
                "argument position {position} out of range for {} (arity {arity})",
                signature.fully_qualified_name()
            )));
        }
        if slots[position].is_some() {
            return Err(CallError::InvalidArgument(format!(
                "duplicate argument position {position} for {}",
                signature.fully_qualified_name()
            )));
        }
        slots[position] = Some(&arg.value);
    }

    let mut values = Vec::with_capacity(arity);
    for (position, param) in parameters.iter().enumerate() {
        let bytes = match slots[position] {
            Some(provided) => provided,
            None => match &param.default {
                Some(default) => default.as_slice(),
                None => {
                    return Err(CallError::MissingArgument {
                        position,
                        name: param.name.clone(),
                    })
                }
            },
        };
        let value = codec::decode(bytes, &param.ty, store, client)
            .map_err(codec::CodecError::into_argument_error)?;
        values.push(value);
    }

    // For class-bound procedures position 0 is the receiver, and a receiver
    // is never nullable.
    if signature.kind().is_class_bound() {
        if let Some(Value::Object(None)) = values.first() {
            return Err(CallError::NullReference(format!(
                "{} called with a null receiver",
                signature.fully_qualified_name()
            )));
        }
    }

    Ok(values)
}
