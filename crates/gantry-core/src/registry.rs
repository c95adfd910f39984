//! The service registry.
//!
//! Ingests [`ServiceDescriptor`]s at startup and answers
//! `(service, procedure)` lookups with the registered signature. All
//! structural validation happens before the first request is served;
//! lookup misses are the only registry errors that can reach the wire.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::descriptor::{ClassId, ProcedureSignature, ServiceDescriptor};
use crate::error::{CallError, RegistryError};

/// One registered service.
pub struct ServiceRecord {
    name: String,
    procedures: BTreeMap<String, Rc<ProcedureSignature>>,
    classes: Vec<ClassId>,
}

impl ServiceRecord {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Procedures in name order.
    pub fn procedures(&self) -> impl Iterator<Item = &Rc<ProcedureSignature>> {
        self.procedures.values()
    }

    pub fn classes(&self) -> &[ClassId] {
        &self.classes
    }
}

/// Flat `(service, procedure)` → signature lookup.
pub struct Registry {
    services: BTreeMap<String, ServiceRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            services: BTreeMap::new(),
        }
    }

    /// Register a service descriptor.
    ///
    /// Duplicate service names are fatal; intra-service validation has
    /// already happened in the descriptor builder.
    pub fn register(&mut self, descriptor: ServiceDescriptor) -> Result<(), RegistryError> {
        if self.services.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateService(descriptor.name));
        }

        let mut procedures = BTreeMap::new();
        for signature in descriptor.procedures {
            procedures.insert(signature.name().to_owned(), Rc::new(signature));
        }

        debug!(
            service = %descriptor.name,
            procedures = procedures.len(),
            "registered service"
        );
        self.services.insert(
            descriptor.name.clone(),
            ServiceRecord {
                name: descriptor.name,
                procedures,
                classes: descriptor.classes,
            },
        );
        Ok(())
    }

    /// Resolve a procedure by service and procedure name.
    pub fn lookup(
        &self,
        service: &str,
        procedure: &str,
    ) -> Result<Rc<ProcedureSignature>, CallError> {
        let record = self
            .services
            .get(service)
            .ok_or_else(|| CallError::UnknownService(service.to_owned()))?;
        record
            .procedures
            .get(procedure)
            .cloned()
            .ok_or_else(|| CallError::UnknownProcedure {
                service: service.to_owned(),
                procedure: procedure.to_owned(),
            })
    }

    /// Registered services in name order.
    pub fn services(&self) -> impl Iterator<Item = &ServiceRecord> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
