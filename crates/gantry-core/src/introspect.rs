//! The built-in introspection service.
//!
//! Registered through the ordinary descriptor path; nothing in dispatch
//! special-cases it. `GetServices` answers from a catalog snapshot taken
//! when the server is built, which is sound because the registry is
//! immutable from then on.

use std::rc::Rc;

use prost::Message;

use gantry_wire as wire;

use crate::descriptor::{Invocation, ProcedureDef, ServiceDescriptor, TypeDescriptor};
use crate::dispatch::ServerStats;
use crate::error::RegistryError;
use crate::registry::{Registry, ServiceRecord};
use crate::value::Value;

/// Name the built-in service is registered under.
pub const SERVICE_NAME: &str = "Gantry";

/// Build the introspection descriptor over a finished registry.
pub fn service(
    registry: &Registry,
    stats: Rc<ServerStats>,
) -> Result<ServiceDescriptor, RegistryError> {
    let catalog_bytes = catalog_of(registry).encode_to_vec();

    let mut builder = ServiceDescriptor::builder(SERVICE_NAME);
    builder.procedure(
        ProcedureDef::new("GetStatus", move |_| {
            let status = wire::ServerStatus {
                version: env!("CARGO_PKG_VERSION").to_owned(),
                requests_executed: stats.requests_executed(),
            };
            Invocation::returning(Value::Message(status.encode_to_vec()))
        })
        .returns(TypeDescriptor::message("gantry.ServerStatus")),
    )?;
    builder.procedure(
        ProcedureDef::new("GetServices", move |_| {
            Invocation::returning(Value::Message(catalog_bytes.clone()))
        })
        .returns(TypeDescriptor::message("gantry.ServiceCatalog")),
    )?;
    builder.build()
}

fn catalog_of(registry: &Registry) -> wire::ServiceCatalog {
    let mut services: Vec<wire::ServiceEntry> =
        registry.services().map(service_entry).collect();
    services.push(self_entry());
    services.sort_by(|a, b| a.name.cmp(&b.name));
    wire::ServiceCatalog { services }
}

fn service_entry(record: &ServiceRecord) -> wire::ServiceEntry {
    wire::ServiceEntry {
        name: record.name().to_owned(),
        procedures: record
            .procedures()
            .map(|signature| wire::ProcedureEntry {
                name: signature.name().to_owned(),
                parameters: signature
                    .parameters()
                    .iter()
                    .map(|param| wire::ParameterEntry {
                        name: param.name.clone(),
                        type_name: param.ty.to_string(),
                        has_default: param.is_optional(),
                    })
                    .collect(),
                return_type: if signature.return_type().is_void() {
                    String::new()
                } else {
                    signature.return_type().to_string()
                },
            })
            .collect(),
    }
}

/// The catalog lists this service too; its two procedures are described
/// statically since the descriptor cannot observe itself being built.
fn self_entry() -> wire::ServiceEntry {
    wire::ServiceEntry {
        name: SERVICE_NAME.to_owned(),
        procedures: vec![
            wire::ProcedureEntry {
                name: "GetServices".to_owned(),
                parameters: vec![],
                return_type: "Message(gantry.ServiceCatalog)".to_owned(),
            },
            wire::ProcedureEntry {
                name: "GetStatus".to_owned(),
                parameters: vec![],
                return_type: "Message(gantry.ServerStatus)".to_owned(),
            },
        ],
    }
}
