//! The cooperative continuation scheduler.
//!
//! Every client has a FIFO of work: fresh requests and calls suspended by a
//! yield. One [`tick`](Scheduler::tick), driven by the host game loop,
//! drains each client's queue until it empties or its head yields again. A
//! yielding head parks the whole queue for the tick, which is what gives a
//! client strict arrival-order responses and backpressure behind a slow
//! call. Clients never block each other.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use gantry_wire as wire;

use crate::context::ClientId;
use crate::dispatch::{Dispatcher, ExecOutcome, PendingCall};
use crate::object_store::ObjectStore;

enum QueueEntry {
    Fresh(wire::Request),
    Suspended(PendingCall),
}

/// Per-client FIFOs of pending work plus the outbound response queue.
pub struct Scheduler {
    queues: BTreeMap<ClientId, VecDeque<QueueEntry>>,
    outbound: VecDeque<(ClientId, wire::Response)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            queues: BTreeMap::new(),
            outbound: VecDeque::new(),
        }
    }

    /// Enqueue a request behind everything the client already has pending.
    pub fn submit(&mut self, client: ClientId, request: wire::Request) {
        self.queues
            .entry(client)
            .or_default()
            .push_back(QueueEntry::Fresh(request));
    }

    /// Pending work items for one client.
    pub fn pending(&self, client: ClientId) -> usize {
        self.queues.get(&client).map_or(0, VecDeque::len)
    }

    /// Run one tick. Returns the number of calls finalized.
    pub fn tick(&mut self, dispatcher: &Dispatcher, store: &mut ObjectStore) -> usize {
        let mut finalized = 0;
        let clients: Vec<ClientId> = self.queues.keys().copied().collect();

        for client in clients {
            loop {
                let Some(entry) = self.queues.get_mut(&client).and_then(VecDeque::pop_front)
                else {
                    break;
                };

                let outcome = match entry {
                    QueueEntry::Fresh(request) => dispatcher.execute(client, &request, store),
                    QueueEntry::Suspended(pending) => dispatcher.resume(pending, store, client),
                };

                match outcome {
                    ExecOutcome::Completed(mut response) => {
                        response.time = dispatcher.host().universal_time();
                        self.outbound.push_back((client, response));
                        finalized += 1;
                    }
                    ExecOutcome::Suspended(pending) => {
                        // The head yielded: put its replacement back and
                        // park this client until the next tick.
                        if let Some(queue) = self.queues.get_mut(&client) {
                            queue.push_front(QueueEntry::Suspended(pending));
                        }
                        break;
                    }
                }
            }

            if self
                .queues
                .get(&client)
                .is_some_and(VecDeque::is_empty)
            {
                self.queues.remove(&client);
            }
        }

        finalized
    }

    /// Take every finalized response, per-client in request-arrival order.
    pub fn drain_responses(&mut self) -> Vec<(ClientId, wire::Response)> {
        self.outbound.drain(..).collect()
    }

    /// Drop everything a disconnected client left behind.
    ///
    /// Queued and suspended continuations are discarded without responses,
    /// and the client's exclusively held object handles are evicted.
    pub fn disconnect(&mut self, client: ClientId, store: &mut ObjectStore) {
        if let Some(queue) = self.queues.remove(&client) {
            debug!(%client, dropped = queue.len(), "dropped pending work on disconnect");
        }
        self.outbound.retain(|(c, _)| *c != client);
        store.remove_client(client);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
