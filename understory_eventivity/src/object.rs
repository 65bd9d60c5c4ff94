// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Object-keyed handlers.
//!
//! [`Objects`] binds handlers to objects instead of named paths. Objects are
//! held by weak reference only: binding a handler never keeps an object alive,
//! and once the object is dropped its handlers stop firing and its slot is
//! pruned on the next access (or by [`Objects::prune`]).
//!
//! The ownership idiom is shared with path handlers: a handler bound with
//! [`ObjectOptions::owned_by`] is removed when its owner fires, whether the
//! owner is a path or another object.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use understory_eventivity::{Bus, ObjectOptions, Outcome};
//!
//! let bus: Bus<u32> = Bus::new();
//! let objects = bus.object();
//! let row = Rc::new("row-1");
//!
//! let total = Rc::new(Cell::new(0));
//! let t = total.clone();
//! let deleters = objects.handler(
//!     move |call| {
//!         t.set(t.get() + call.args[0]);
//!         Outcome::Value(())
//!     },
//!     [&row],
//! );
//!
//! objects.event(&[5], [&row]).unwrap();
//! assert_eq!(total.get(), 5);
//!
//! deleters[0].delete();
//! objects.event(&[5], [&row]).unwrap();
//! assert_eq!(total.get(), 5);
//! ```

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::any::Any;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::error::{BoxError, Error};
use crate::options::ObjectOptions;
use crate::scope::{Cleanup, OwnerKey, Shared};
use crate::types::{IntoOutcome, Outcome};

/// Identity of a bound object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(usize);

impl ObjectKey {
    /// The identity of the object behind `object`.
    pub fn of<T: ?Sized>(object: &Rc<T>) -> Self {
        Self(Rc::as_ptr(object).cast::<()>().addr())
    }
}

/// A weak handle to an object acting as an owner.
///
/// Compares and hashes by [`ObjectKey`]. The weak reference keeps the
/// allocation reserved, so no other object can take over the identity while
/// the handle exists.
#[derive(Clone)]
pub struct ObjectRef {
    key: ObjectKey,
    object: Weak<dyn Any>,
}

impl ObjectRef {
    /// A handle to `object`.
    pub fn new<T: Any>(object: &Rc<T>) -> Self {
        let weak: Weak<T> = Rc::downgrade(object);
        Self {
            key: ObjectKey::of(object),
            object: weak,
        }
    }

    /// Identity of the object.
    pub fn key(&self) -> ObjectKey {
        self.key
    }

    /// Whether the object still exists.
    pub fn is_alive(&self) -> bool {
        self.object.strong_count() > 0
    }

    /// Whether both handles refer to the same live object.
    pub(crate) fn same_live(&self, other: &Self) -> bool {
        self.is_alive() && Weak::ptr_eq(&self.object, &other.object)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ObjectRef {}

impl core::hash::Hash for ObjectRef {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl core::fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjectRef")
            .field("key", &self.key)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

impl<T: Any> From<&Rc<T>> for OwnerKey {
    fn from(object: &Rc<T>) -> Self {
        Self::Object(ObjectRef::new(object))
    }
}

/// The argument every object handler receives.
pub struct ObjectCall<'a, A> {
    /// Event arguments.
    pub args: &'a [A],
    /// The object the event was raised on.
    pub object: &'a Rc<dyn Any>,
    /// Id allocated when the handler was bound.
    pub id: u64,
}

impl<A> core::fmt::Debug for ObjectCall<'_, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjectCall")
            .field("args", &self.args.len())
            .field("object", &ObjectKey::of(self.object))
            .field("id", &self.id)
            .finish()
    }
}

type ObjectFn<A, R> = Rc<dyn Fn(&ObjectCall<'_, A>) -> Result<Outcome<R>, BoxError>>;

pub(crate) struct ObjectEntry<A, R> {
    id: u64,
    function: ObjectFn<A, R>,
    esc: bool,
}

impl<A, R> Clone for ObjectEntry<A, R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            function: self.function.clone(),
            esc: self.esc,
        }
    }
}

struct Slot<A, R> {
    object: Weak<dyn Any>,
    entries: Vec<ObjectEntry<A, R>>,
}

pub(crate) struct ObjectTable<A, R> {
    slots: HashMap<ObjectKey, Slot<A, R>>,
    count: u64,
}

impl<A, R> ObjectTable<A, R> {
    pub(crate) fn new() -> Self {
        Self {
            slots: HashMap::new(),
            count: 0,
        }
    }

    fn insert(&mut self, key: ObjectKey, object: Weak<dyn Any>, entry: ObjectEntry<A, R>) {
        let slot = self.slots.entry(key).or_insert_with(|| Slot {
            object: object.clone(),
            entries: Vec::new(),
        });
        // Same address, new object: the old one is gone.
        if slot.object.strong_count() == 0 {
            slot.object = object;
            slot.entries.clear();
        }
        slot.entries.push(entry);
    }

    pub(crate) fn contains(&self, key: ObjectKey) -> bool {
        self.slots.contains_key(&key)
    }

    pub(crate) fn remove(&mut self, key: ObjectKey, id: u64) -> bool {
        let Some(slot) = self.slots.get_mut(&key) else {
            return false;
        };
        let before = slot.entries.len();
        slot.entries.retain(|e| e.id != id);
        slot.entries.len() != before
    }

    /// The live object and a snapshot of its handlers; drops a dead slot.
    pub(crate) fn live(
        &mut self,
        key: ObjectKey,
    ) -> Option<(Rc<dyn Any>, SmallVec<[ObjectEntry<A, R>; 4]>)> {
        let object = self.slots.get(&key)?.object.upgrade();
        match object {
            Some(object) => {
                let entries = self.slots.get(&key)?.entries.iter().cloned().collect();
                Some((object, entries))
            }
            None => {
                self.slots.remove(&key);
                tracing::debug!(?key, "pruned dead object slot");
                None
            }
        }
    }

    fn prune(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.object.strong_count() > 0);
        before - self.slots.len()
    }

    fn len(&self, key: ObjectKey) -> usize {
        self.slots
            .get(&key)
            .filter(|slot| slot.object.strong_count() > 0)
            .map_or(0, |slot| slot.entries.len())
    }
}

/// Removes one object-keyed handler.
///
/// Holds only a weak reference to the bus; deleting twice, or after the bus is
/// gone, is a no-op.
pub struct Deleter<A, R = ()> {
    shared: Weak<Shared<A, R>>,
    cleanup: Cleanup,
}

impl<A, R> core::fmt::Debug for Deleter<A, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Deleter")
            .field("cleanup", &self.cleanup)
            .finish_non_exhaustive()
    }
}

impl<A, R> Deleter<A, R> {
    /// Remove the handler. Returns `true` if it was still registered.
    pub fn delete(&self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let removed = shared.scope.borrow_mut().run_cleanup(&self.cleanup);
        tracing::debug!(cleanup = ?self.cleanup, removed, "object handler deleted");
        removed
    }
}

/// Object-keyed binding surface of a bus.
pub struct Objects<A, R = ()> {
    shared: Rc<Shared<A, R>>,
}

impl<A, R> Clone for Objects<A, R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<A, R> core::fmt::Debug for Objects<A, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let scope = self.shared.scope.borrow();
        f.debug_struct("Objects")
            .field("slots", &scope.objects.slots.len())
            .field("count", &scope.objects.count)
            .finish()
    }
}

impl<A, R> Objects<A, R> {
    pub(crate) fn new(shared: Rc<Shared<A, R>>) -> Self {
        Self { shared }
    }

    /// Bind `f` to each of `objects`.
    pub fn handler<'o, T, F, O>(
        &self,
        f: F,
        objects: impl IntoIterator<Item = &'o Rc<T>>,
    ) -> Vec<Deleter<A, R>>
    where
        T: Any,
        F: Fn(&ObjectCall<'_, A>) -> O + 'static,
        O: IntoOutcome<R>,
    {
        self.handler_with(f, ObjectOptions::new(), objects)
    }

    /// Bind `f` to each of `objects` with options.
    ///
    /// Returns one deleter per object.
    pub fn handler_with<'o, T, F, O>(
        &self,
        f: F,
        options: ObjectOptions,
        objects: impl IntoIterator<Item = &'o Rc<T>>,
    ) -> Vec<Deleter<A, R>>
    where
        T: Any,
        F: Fn(&ObjectCall<'_, A>) -> O + 'static,
        O: IntoOutcome<R>,
    {
        let function: ObjectFn<A, R> =
            Rc::new(move |call: &ObjectCall<'_, A>| f(call).into_outcome());
        let mut scope = self.shared.scope.borrow_mut();
        let mut deleters = Vec::new();
        for object in objects {
            let key = ObjectKey::of(object);
            let weak: Weak<T> = Rc::downgrade(object);
            scope.objects.count += 1;
            let id = scope.objects.count;
            scope.objects.insert(
                key,
                weak,
                ObjectEntry {
                    id,
                    function: function.clone(),
                    esc: options.esc,
                },
            );
            let cleanup = Cleanup::Object { key, id };
            if let Some(owner) = &options.own {
                scope.add_cleanup(owner.clone(), cleanup.clone());
            }
            tracing::trace!(?key, id, "object handler registered");
            deleters.push(Deleter {
                shared: Rc::downgrade(&self.shared),
                cleanup,
            });
        }
        deleters
    }

    /// Invoke the handlers of each live object in `objects`.
    ///
    /// Handlers of one object run in binding order; an escalating handler
    /// bound with [`ObjectOptions::esc`] stops the rest of that object's
    /// handlers. Afterwards the cleanups owned by the object run, whether or
    /// not it had handlers of its own.
    pub fn event<'o, T>(
        &self,
        args: &[A],
        objects: impl IntoIterator<Item = &'o Rc<T>>,
    ) -> Result<(), Error>
    where
        T: Any,
    {
        for object in objects {
            let owner = OwnerKey::from(object);
            let key = ObjectKey::of(object);
            let live = self.shared.scope.borrow_mut().live_object(key);
            if let Some((object, entries)) = live {
                for entry in &entries {
                    let call = ObjectCall {
                        args,
                        object: &object,
                        id: entry.id,
                    };
                    let outcome =
                        (entry.function)(&call).map_err(|source| Error::ObjectHandler {
                            id: entry.id,
                            source,
                        })?;
                    if entry.esc && outcome.is_esc() {
                        tracing::debug!(?key, id = entry.id, "object handler escalated");
                        break;
                    }
                }
            }
            self.shared.scope.borrow_mut().fire_owner(&owner);
        }
        Ok(())
    }

    /// Number of handlers bound to `object`.
    pub fn count<T: ?Sized>(&self, object: &Rc<T>) -> usize {
        self.shared.scope.borrow().objects.len(ObjectKey::of(object))
    }

    /// Drop the slots of objects that no longer exist, and the cleanups
    /// waiting for such objects to fire. Returns how many slots were dropped.
    pub fn prune(&self) -> usize {
        let mut scope = self.shared.scope.borrow_mut();
        let pruned = scope.objects.prune();
        let owners = scope.prune_owners();
        if pruned > 0 || owners > 0 {
            tracing::debug!(pruned, owners, "pruned dead objects");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bus, EventOptions, HandlerOptions, PathContext};
    use alloc::string::String;
    use core::cell::RefCell;

    fn logger(
        log: &Rc<RefCell<Vec<u64>>>,
        outcome: Outcome<()>,
    ) -> impl Fn(&ObjectCall<'_, u32>) -> Outcome<()> + 'static {
        let log = log.clone();
        move |call| {
            log.borrow_mut().push(call.id);
            outcome.clone()
        }
    }

    #[test]
    fn handlers_run_in_binding_order_per_object() {
        let bus: Bus<u32> = Bus::new();
        let objects = bus.object();
        let a = Rc::new(1_u8);
        let b = Rc::new(2_u8);
        let log = Rc::new(RefCell::new(Vec::new()));
        let _ = objects.handler(logger(&log, Outcome::Value(())), [&a, &b]);
        let _ = objects.handler(logger(&log, Outcome::Value(())), [&a]);
        objects.event(&[0], [&a]).unwrap();
        assert_eq!(*log.borrow(), [1, 3]);
        objects.event(&[0], [&b]).unwrap();
        assert_eq!(*log.borrow(), [1, 3, 2]);
    }

    #[test]
    fn esc_stops_remaining_handlers_of_the_object() {
        let bus: Bus<u32> = Bus::new();
        let objects = bus.object();
        let a = Rc::new(());
        let log = Rc::new(RefCell::new(Vec::new()));
        let _ = objects.handler_with(
            logger(&log, Outcome::Esc),
            ObjectOptions::new().esc(),
            [&a],
        );
        let _ = objects.handler(logger(&log, Outcome::Value(())), [&a]);
        objects.event(&[0], [&a]).unwrap();
        assert_eq!(*log.borrow(), [1]);
    }

    #[test]
    fn esc_without_opt_in_keeps_going() {
        let bus: Bus<u32> = Bus::new();
        let objects = bus.object();
        let a = Rc::new(());
        let log = Rc::new(RefCell::new(Vec::new()));
        let _ = objects.handler(logger(&log, Outcome::Esc), [&a]);
        let _ = objects.handler(logger(&log, Outcome::Value(())), [&a]);
        objects.event(&[0], [&a]).unwrap();
        assert_eq!(*log.borrow(), [1, 2]);
    }

    #[test]
    fn dropped_objects_stop_receiving_and_are_pruned() {
        let bus: Bus<u32> = Bus::new();
        let objects = bus.object();
        let keep = Rc::new(String::from("keep"));
        let gone = Rc::new(String::from("gone"));
        let _ = objects.handler(|_| Outcome::Value(()), [&keep, &gone]);
        assert_eq!(objects.count(&gone), 1);
        drop(gone);
        assert_eq!(objects.prune(), 1);
        assert_eq!(objects.count(&keep), 1);
    }

    #[test]
    fn deleters_are_idempotent_and_weak() {
        let bus: Bus<u32> = Bus::new();
        let objects = bus.object();
        let a = Rc::new(());
        let deleters = objects.handler(|_| Outcome::Value(()), [&a]);
        assert!(deleters[0].delete());
        assert!(!deleters[0].delete());
        assert_eq!(objects.count(&a), 0);

        let deleters = objects.handler(|_| Outcome::Value(()), [&a]);
        drop(objects);
        drop(bus);
        assert!(!deleters[0].delete());
    }

    #[test]
    fn object_owned_by_path_is_removed_when_path_fires() {
        let bus: Bus<u32> = Bus::new();
        let objects = bus.object();
        let a = Rc::new(());
        let _ = objects.handler_with(
            |_| Outcome::Value(()),
            ObjectOptions::new().owned_by("logout"),
            [&a],
        );
        assert_eq!(bus.owners_of(&OwnerKey::from("logout")), 1);
        let _ = bus.event(EventOptions::new()).on("login").raise(0).unwrap();
        assert_eq!(objects.count(&a), 1);
        let _ = bus.event(EventOptions::new()).on("logout").raise(0).unwrap();
        assert_eq!(objects.count(&a), 0);
        assert_eq!(bus.owners_of(&OwnerKey::from("logout")), 0);
    }

    #[test]
    fn path_handler_owned_by_object_is_removed_when_object_fires() {
        let bus: Bus<u32> = Bus::new();
        let objects = bus.object();
        let dialog = Rc::new(());
        let _ = bus
            .handler(HandlerOptions::new().owned_by(OwnerKey::from(&dialog)))
            .on("resize")
            .bind(|_| Outcome::Value(()));
        assert_eq!(bus.handlers_at("resize").len(), 1);
        objects.event(&[], [&dialog]).unwrap();
        assert!(bus.handlers_at("resize").is_empty());
    }

    #[test]
    fn dead_owner_identity_is_not_reused() {
        let bus: Bus<u32> = Bus::new();
        let objects = bus.object();
        let dialog = Rc::new(0_u64);
        let owner = OwnerKey::from(&dialog);
        let old = ObjectKey::of(&dialog);
        let _ = bus
            .handler(HandlerOptions::new().owned_by(owner.clone()))
            .on("resize")
            .bind(|_| Outcome::Value(()));
        drop(dialog);
        assert!(!owner.is_alive());

        // The filed owner keeps the allocation reserved.
        let others: Vec<Rc<u64>> = (0..256).map(Rc::new).collect();
        assert!(others.iter().all(|o| ObjectKey::of(o) != old));
        objects.event(&[], &others).unwrap();
        assert_eq!(bus.handlers_at("resize").len(), 1);

        objects.prune();
        assert_eq!(bus.owners_of(&owner), 0);
        assert_eq!(bus.handlers_at("resize").len(), 1);
    }

    #[test]
    fn dead_object_slot_takes_its_owner_cleanups_along() {
        let bus: Bus<u32> = Bus::new();
        let objects = bus.object();
        let row = Rc::new(1_u8);
        let popup = Rc::new(2_u8);
        let popup_owner = OwnerKey::from(&popup);
        let _ = objects.handler(|_| Outcome::Value(()), [&row]);
        let _ = objects.handler_with(
            |_| Outcome::Value(()),
            ObjectOptions::new().owned_by(popup_owner.clone()),
            [&row],
        );
        assert_eq!(bus.owners_of(&popup_owner), 1);
        drop(popup);
        drop(row);
        let ghost = Rc::new(3_u8);
        // Dispatch to an unrelated object finds nothing.
        objects.event(&[], [&ghost]).unwrap();
        assert_eq!(objects.prune(), 1);
        assert_eq!(bus.owners_of(&popup_owner), 0);
    }

    #[test]
    fn errors_abort_and_propagate() {
        let bus: Bus<u32> = Bus::new();
        let objects = bus.object();
        let a = Rc::new(());
        let log = Rc::new(RefCell::new(Vec::new()));
        let _ = objects.handler(
            |_: &ObjectCall<'_, u32>| -> Result<Outcome<()>, &'static str> { Err("broken") },
            [&a],
        );
        let _ = objects.handler(logger(&log, Outcome::Value(())), [&a]);
        let err = objects.event(&[0], [&a]).unwrap_err();
        assert!(matches!(err, Error::ObjectHandler { id: 1, .. }));
        assert!(log.borrow().is_empty());
    }
}
