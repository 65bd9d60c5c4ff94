// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared registry state behind a bus.
//!
//! One [`Scope`] exists per [`Bus`](crate::Bus). Every context, handle and
//! deleter vended by the bus refers back to it. It holds:
//!
//! - `handlers`: path → ordered handler entries. Order is dispatch order.
//! - `owners`: owner key → cleanups to run when that owner fires.
//! - `handler_count`: source of default `h<n>` names.
//! - the object-keyed handler table.
//!
//! Every [`Cleanup`] names exactly one entry, and running it twice is a no-op.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::defer::DeferQueue;
use crate::object::{ObjectEntry, ObjectKey, ObjectRef, ObjectTable};
use crate::options::HandlerOptions;
use crate::types::HandlerFn;

/// Key under which owner cleanups are filed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OwnerKey {
    /// Fires when this exact path is raised.
    Path(String),
    /// Fires when this object receives an object-keyed event.
    Object(ObjectRef),
}

impl From<&str> for OwnerKey {
    fn from(path: &str) -> Self {
        Self::Path(path.into())
    }
}

impl From<String> for OwnerKey {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl OwnerKey {
    /// Whether the owner can still fire. Paths always can.
    pub fn is_alive(&self) -> bool {
        match self {
            Self::Path(_) => true,
            Self::Object(object) => object.is_alive(),
        }
    }
}

/// Removal of a single handler entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Cleanup {
    Path { path: String, name: String },
    Object { key: ObjectKey, id: u64 },
}

pub(crate) struct Entry<A, R> {
    pub(crate) name: String,
    // Shared with the registering context so options are read at fire time.
    pub(crate) options: Rc<RefCell<HandlerOptions>>,
    pub(crate) function: HandlerFn<A, R>,
}

impl<A, R> Clone for Entry<A, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            options: self.options.clone(),
            function: self.function.clone(),
        }
    }
}

/// Entries captured before a path is dispatched.
pub(crate) type Snapshot<A, R> = SmallVec<[Entry<A, R>; 8]>;

pub(crate) struct Scope<A, R> {
    pub(crate) handlers: HashMap<String, Vec<Entry<A, R>>>,
    pub(crate) owners: HashMap<OwnerKey, Vec<Cleanup>>,
    pub(crate) handler_count: u64,
    pub(crate) objects: ObjectTable<A, R>,
}

impl<A, R> Scope<A, R> {
    fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            owners: HashMap::new(),
            handler_count: 0,
            objects: ObjectTable::new(),
        }
    }

    /// Bump the counter and return the default name for it.
    pub(crate) fn next_name(&mut self) -> String {
        self.handler_count += 1;
        format!("h{}", self.handler_count)
    }

    /// Store an entry; an existing entry with the same name is replaced in place.
    pub(crate) fn insert(&mut self, path: &str, entry: Entry<A, R>) {
        let list = self.handlers.entry_ref(path).or_default();
        match list.iter_mut().find(|e| e.name == entry.name) {
            Some(slot) => *slot = entry,
            None => list.push(entry),
        }
    }

    pub(crate) fn remove(&mut self, path: &str, name: &str) -> bool {
        let Some(list) = self.handlers.get_mut(path) else {
            return false;
        };
        let before = list.len();
        list.retain(|e| e.name != name);
        list.len() != before
    }

    /// Drop every handler at `path`, keeping the (now empty) path registered.
    pub(crate) fn clear_path(&mut self, path: &str) {
        self.handlers.entry_ref(path).or_default().clear();
    }

    /// `None` when nothing was ever registered at `path`.
    pub(crate) fn snapshot(&self, path: &str) -> Option<Snapshot<A, R>> {
        self.handlers
            .get(path)
            .map(|list| list.iter().cloned().collect())
    }

    pub(crate) fn names_at(&self, path: &str) -> Vec<String> {
        self.handlers
            .get(path)
            .map(|list| list.iter().map(|e| e.name.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn add_cleanup(&mut self, owner: OwnerKey, cleanup: Cleanup) {
        self.owners.entry(owner).or_default().push(cleanup);
    }

    /// Returns `true` if an entry was actually removed.
    pub(crate) fn run_cleanup(&mut self, cleanup: &Cleanup) -> bool {
        match cleanup {
            Cleanup::Path { path, name } => self.remove(path, name),
            Cleanup::Object { key, id } => self.objects.remove(*key, *id),
        }
    }

    /// The live object at `key` and a snapshot of its handlers.
    ///
    /// A dead slot is dropped, together with cleanups waiting on dead owners.
    pub(crate) fn live_object(
        &mut self,
        key: ObjectKey,
    ) -> Option<(Rc<dyn core::any::Any>, SmallVec<[ObjectEntry<A, R>; 4]>)> {
        let tracked = self.objects.contains(key);
        let live = self.objects.live(key);
        if tracked && live.is_none() {
            self.prune_owners();
        }
        live
    }

    /// Forget the cleanups filed under owners that no longer exist.
    pub(crate) fn prune_owners(&mut self) -> usize {
        let before = self.owners.len();
        self.owners.retain(|owner, _| owner.is_alive());
        before - self.owners.len()
    }

    /// Run and forget every cleanup filed under `owner`.
    ///
    /// Cleanups filed under an object run only when `owner` is that same
    /// object, still alive.
    pub(crate) fn fire_owner(&mut self, owner: &OwnerKey) -> usize {
        let Some((filed, cleanups)) = self.owners.remove_entry(owner) else {
            return 0;
        };
        if let (OwnerKey::Object(filed), OwnerKey::Object(firing)) = (&filed, owner)
            && !filed.same_live(firing)
        {
            tracing::debug!(key = ?filed.key(), "dropped cleanups of a dead owner");
            return 0;
        }
        let mut removed = 0;
        for cleanup in &cleanups {
            if self.run_cleanup(cleanup) {
                removed += 1;
            }
        }
        if !cleanups.is_empty() {
            tracing::trace!(owner = ?owner, cleanups = cleanups.len(), removed, "owner fired");
        }
        removed
    }
}

/// State shared by a bus and everything it vends.
pub(crate) struct Shared<A, R> {
    pub(crate) scope: RefCell<Scope<A, R>>,
    pub(crate) deferred: RefCell<DeferQueue<A, R>>,
}

impl<A, R> Shared<A, R> {
    pub(crate) fn new() -> Self {
        Self {
            scope: RefCell::new(Scope::new()),
            deferred: RefCell::new(DeferQueue::new()),
        }
    }
}
