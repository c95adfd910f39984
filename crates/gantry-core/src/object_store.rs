//! The process-wide object handle store.
//!
//! Host objects cross the RPC boundary as opaque `u64` handles. The store
//! keeps the bijection between handles and live objects; handle `0` is the
//! null reference and is never allocated. Allocation is monotonic, so a
//! handle is never reused within a process lifetime, even across
//! disconnects.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use crate::context::ClientId;
use crate::descriptor::ClassId;
use crate::error::CallError;
use crate::value::ObjectValue;

/// An opaque object handle. `0` is the null reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle(pub u64);

impl Handle {
    /// The reserved null handle.
    pub const NULL: Self = Self(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Handle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handle:{}", self.0)
    }
}

struct Entry {
    class: ClassId,
    target: Rc<dyn Any>,
    /// Clients that have exchanged this handle; used for eviction on
    /// disconnect.
    clients: HashSet<ClientId>,
}

/// Handle ↔ host object bijection.
///
/// Identity is reference identity, never structural equality: adding the
/// same `Rc` twice yields the same handle. All operations run on the host
/// thread; the store is not `Send` by construction.
pub struct ObjectStore {
    next: u64,
    entries: HashMap<u64, Entry>,
    by_identity: HashMap<*const (), u64>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self {
            next: 1,
            entries: HashMap::new(),
            by_identity: HashMap::new(),
        }
    }

    fn identity(target: &Rc<dyn Any>) -> *const () {
        Rc::as_ptr(target) as *const ()
    }

    /// Register an object, returning its handle.
    ///
    /// Idempotent per identity: an object that already has a handle keeps
    /// it.
    pub fn add(&mut self, class: ClassId, target: Rc<dyn Any>) -> Handle {
        let key = Self::identity(&target);
        if let Some(&existing) = self.by_identity.get(&key) {
            return Handle(existing);
        }

        let handle = self.next;
        self.next += 1;
        self.by_identity.insert(key, handle);
        self.entries.insert(
            handle,
            Entry {
                class,
                target,
                clients: HashSet::new(),
            },
        );
        Handle(handle)
    }

    /// Resolve a handle back to its object.
    ///
    /// The null handle and unknown handles are protocol errors.
    pub fn get(&self, handle: Handle) -> Result<ObjectValue, CallError> {
        if handle.is_null() {
            return Err(CallError::UnknownHandle(0));
        }
        self.entries
            .get(&handle.raw())
            .map(|entry| ObjectValue::new(entry.class.clone(), Rc::clone(&entry.target)))
            .ok_or(CallError::UnknownHandle(handle.raw()))
    }

    /// Drop a handle. Unknown handles are ignored.
    pub fn remove(&mut self, handle: Handle) {
        if let Some(entry) = self.entries.remove(&handle.raw()) {
            self.by_identity.remove(&Self::identity(&entry.target));
        }
    }

    /// Record that `client` has exchanged `handle`.
    pub fn claim(&mut self, handle: Handle, client: ClientId) {
        if let Some(entry) = self.entries.get_mut(&handle.raw()) {
            entry.clients.insert(client);
        }
    }

    /// Evict every handle exclusively associated with `client`.
    ///
    /// Handles other clients have also exchanged survive. Returns the
    /// number of handles dropped.
    pub fn remove_client(&mut self, client: ClientId) -> usize {
        let doomed: Vec<u64> = self
            .entries
            .iter_mut()
            .filter_map(|(&handle, entry)| {
                (entry.clients.remove(&client) && entry.clients.is_empty()).then_some(handle)
            })
            .collect();

        for handle in &doomed {
            if let Some(entry) = self.entries.remove(handle) {
                self.by_identity.remove(&Self::identity(&entry.target));
            }
        }

        if !doomed.is_empty() {
            debug!(%client, evicted = doomed.len(), "evicted handles on disconnect");
        }
        doomed.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle.raw())
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}
