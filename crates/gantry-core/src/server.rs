//! The embeddable server core.
//!
//! [`Server`] wires the registry, object store, dispatcher and scheduler
//! together behind the four operations a transport needs: submit a request,
//! tick, drain responses, disconnect a client. The host game loop owns the
//! server and drives [`Server::tick`] once per frame; transport threads
//! stay on the far side of plain-data queues.

use std::rc::Rc;

use gantry_wire as wire;

use crate::context::{ClientId, Host};
use crate::descriptor::ServiceDescriptor;
use crate::dispatch::{Dispatcher, ServerStats};
use crate::error::RegistryError;
use crate::introspect;
use crate::object_store::ObjectStore;
use crate::registry::Registry;
use crate::scheduler::Scheduler;

/// Builder collecting service descriptors before the server starts.
pub struct ServerBuilder {
    registry: Registry,
    host: Rc<dyn Host>,
}

impl ServerBuilder {
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self {
            registry: Registry::new(),
            host,
        }
    }

    /// Register a service. Registration problems are fatal: they surface
    /// here, at startup, never on the wire.
    pub fn service(mut self, descriptor: ServiceDescriptor) -> Result<Self, RegistryError> {
        self.registry.register(descriptor)?;
        Ok(self)
    }

    /// Finish the server. The built-in introspection service is registered
    /// last so its catalog covers everything else.
    pub fn build(mut self) -> Result<Server, RegistryError> {
        let stats = Rc::new(ServerStats::default());
        let builtin = introspect::service(&self.registry, Rc::clone(&stats))?;
        self.registry.register(builtin)?;

        let registry = Rc::new(self.registry);
        let dispatcher = Dispatcher::new(Rc::clone(&registry), self.host, Rc::clone(&stats));
        Ok(Server {
            registry,
            dispatcher,
            scheduler: Scheduler::new(),
            store: ObjectStore::new(),
            stats,
        })
    }
}

/// The assembled RPC core.
pub struct Server {
    registry: Rc<Registry>,
    dispatcher: Dispatcher,
    scheduler: Scheduler,
    store: ObjectStore,
    stats: Rc<ServerStats>,
}

impl Server {
    pub fn builder(host: Rc<dyn Host>) -> ServerBuilder {
        ServerBuilder::new(host)
    }

    /// Queue a request behind everything `client` already has pending.
    pub fn submit(&mut self, client: ClientId, request: wire::Request) {
        self.scheduler.submit(client, request);
    }

    /// Decode one transport frame straight into the queue.
    pub fn submit_frame(
        &mut self,
        client: ClientId,
        frame: &[u8],
    ) -> Result<(), prost::DecodeError> {
        let request: wire::Request = wire::frame::decode(frame)?;
        self.submit(client, request);
        Ok(())
    }

    /// Run one scheduler tick. Returns the number of calls finalized.
    pub fn tick(&mut self) -> usize {
        self.scheduler.tick(&self.dispatcher, &mut self.store)
    }

    /// Take every finalized response, per-client in request-arrival order.
    pub fn drain_responses(&mut self) -> Vec<(ClientId, wire::Response)> {
        self.scheduler.drain_responses()
    }

    /// Like [`drain_responses`](Self::drain_responses), pre-framed for a
    /// stream transport.
    pub fn drain_response_frames(&mut self) -> Vec<(ClientId, Vec<u8>)> {
        self.scheduler
            .drain_responses()
            .into_iter()
            .map(|(client, response)| (client, wire::frame::encode(&response)))
            .collect()
    }

    /// Drop a disconnected client: pending work is discarded unanswered and
    /// its exclusively held handles are evicted.
    pub fn disconnect(&mut self, client: ClientId) {
        self.scheduler.disconnect(client, &mut self.store);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn object_store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}
