// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Handler registration.
//!
//! A [`HandlerContext`] walks to a path and registers a function there with
//! [`create`](HandlerContext::create) or one of its shorthands. Registration
//! returns a [`Bound`] handle which can register the same function again,
//! start a fresh path, or delete what it registered.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use understory_eventivity::{Bus, EventOptions, HandlerOptions, Outcome, PathContext};
//!
//! let bus: Bus<u32> = Bus::new();
//! let handler = bus.handler(HandlerOptions::new());
//! let event = bus.event(EventOptions::new());
//!
//! let sum = Rc::new(Cell::new(0));
//! let s = sum.clone();
//! let bound = handler.on("add").bind(move |call| {
//!     s.set(s.get() + call.args.iter().sum::<u32>());
//!     Outcome::Value(())
//! });
//!
//! // The same function, bound under a second path.
//! let _also = bound.on("plus").rebind();
//!
//! event.on("add").raise_all(vec![1, 2]).unwrap();
//! event.on("plus").raise(3).unwrap();
//! assert_eq!(sum.get(), 6);
//! ```

use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;

use crate::defer::deferred;
use crate::options::{HandlerOptions, Owner};
use crate::path::{PathContext, PathState};
use crate::scope::{Cleanup, Entry, OwnerKey, Shared};
use crate::types::{Call, HandlerFn, IntoOutcome, handler_fn};

/// Builder that registers handlers under a path.
pub struct HandlerContext<A, R = ()> {
    shared: Rc<Shared<A, R>>,
    options: Rc<RefCell<HandlerOptions>>,
    path: PathState,
    event_name: String,
    handler_function: Option<HandlerFn<A, R>>,
    handler_name: Option<String>,
}

impl<A, R> core::fmt::Debug for HandlerContext<A, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("prefix", &self.path.prefix())
            .field("event_name", &self.event_name)
            .field("handler_name", &self.handler_name)
            .field("options", &self.options.borrow())
            .finish_non_exhaustive()
    }
}

impl<A, R> HandlerContext<A, R> {
    pub(crate) fn new(shared: Rc<Shared<A, R>>, options: HandlerOptions) -> Self {
        Self {
            shared,
            options: Rc::new(RefCell::new(options)),
            path: PathState::virgin(),
            event_name: String::new(),
            handler_function: None,
            handler_name: None,
        }
    }

    /// Path the next registration goes to.
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Name of the most recent registration, if any.
    pub fn handler_name(&self) -> Option<&str> {
        self.handler_name.as_deref()
    }

    /// Current options.
    ///
    /// Entries registered by this context read these at fire time.
    pub fn options(&self) -> HandlerOptions {
        self.options.borrow().clone()
    }

    /// Remove every handler registered at the current path.
    pub fn clear_all(self) {
        tracing::debug!(path = %self.event_name, "clearing handlers");
        self.shared.scope.borrow_mut().clear_path(&self.event_name);
    }

    /// Remove the most recently registered entry.
    pub fn delete(&mut self) {
        if self.event_name.is_empty() {
            return;
        }
        let Some(name) = self.handler_name.take() else {
            return;
        };
        let removed = self
            .shared
            .scope
            .borrow_mut()
            .remove(&self.event_name, &name);
        tracing::debug!(path = %self.event_name, name = %name, removed, "handler deleted");
        self.event_name.clear();
    }
}

impl<A, R> HandlerContext<A, R>
where
    A: Clone + 'static,
    R: 'static,
{
    /// Register `function` (or the previously used one) at the current path.
    ///
    /// `options` are merged into this context's options first. When neither a
    /// new nor a remembered function exists, nothing is registered.
    ///
    /// ```
    /// use understory_eventivity::{Bus, HandlerFn, HandlerOptions, Outcome, PathContext, handler_fn};
    ///
    /// let bus: Bus<u8> = Bus::new();
    /// let ping: HandlerFn<u8, ()> = handler_fn(|_| Outcome::Value(()));
    /// let bound = bus
    ///     .handler(HandlerOptions::new())
    ///     .on("ping")
    ///     .create(Some(ping), Some(HandlerOptions::new().named("pong")));
    /// assert_eq!(bound.name(), Some("pong"));
    /// assert_eq!(bus.handlers_at("ping"), ["pong"]);
    /// ```
    pub fn create(
        mut self,
        function: Option<HandlerFn<A, R>>,
        options: Option<HandlerOptions>,
    ) -> Bound<A, R> {
        if let Some(options) = options {
            self.options.borrow_mut().merge(&options);
        }
        if function.is_some() {
            self.handler_function = function;
        }
        if let Some(function) = self.handler_function.clone() {
            self.register(function);
        }
        Bound { context: self }
    }

    /// Register `f` at the current path.
    pub fn bind<F, O>(self, f: F) -> Bound<A, R>
    where
        F: Fn(&Call<'_, A, R>) -> O + 'static,
        O: IntoOutcome<R>,
    {
        self.create(Some(handler_fn(f)), None)
    }

    /// Register `f` at the current path with extra options.
    pub fn bind_with<F, O>(self, f: F, options: HandlerOptions) -> Bound<A, R>
    where
        F: Fn(&Call<'_, A, R>) -> O + 'static,
        O: IntoOutcome<R>,
    {
        self.create(Some(handler_fn(f)), Some(options))
    }

    /// Register the previously used function at the current path.
    pub fn rebind(self) -> Bound<A, R> {
        self.create(None, None)
    }

    fn register(&mut self, function: HandlerFn<A, R>) {
        let options = self.options.borrow().clone();
        let function = match options.defer() {
            Some(kind) => deferred(Rc::downgrade(&self.shared), kind, function),
            None => function,
        };

        let mut scope = self.shared.scope.borrow_mut();
        let default_name = scope.next_name();
        let name = options.name.clone().unwrap_or(default_name);

        if let Some(owner) = &options.own {
            let key = match owner {
                Owner::This => OwnerKey::Path(self.event_name.clone()),
                Owner::Key(key) => key.clone(),
            };
            scope.add_cleanup(
                key,
                Cleanup::Path {
                    path: self.event_name.clone(),
                    name: name.clone(),
                },
            );
        }

        scope.insert(
            &self.event_name,
            Entry {
                name: name.clone(),
                options: self.options.clone(),
                function,
            },
        );
        tracing::trace!(path = %self.event_name, name = %name, "handler registered");
        self.handler_name = Some(name);
    }
}

impl<A, R> PathContext for HandlerContext<A, R> {
    fn path(&self) -> &PathState {
        &self.path
    }

    fn path_mut(&mut self) -> &mut PathState {
        &mut self.path
    }

    fn fork(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            options: Rc::new(RefCell::new(self.options.borrow().clone())),
            path: self.path.forked(),
            event_name: self.event_name.clone(),
            handler_function: self.handler_function.clone(),
            handler_name: self.handler_name.clone(),
        }
    }

    fn update(&mut self) {
        self.event_name = self.path.prefix().unwrap_or_default().into();
    }
}

impl<A, R> From<&HandlerContext<A, R>> for Owner {
    fn from(context: &HandlerContext<A, R>) -> Self {
        Self::Key(OwnerKey::Path(context.prefix().unwrap_or_default().into()))
    }
}

/// Handle returned by a registration.
pub struct Bound<A, R = ()> {
    context: HandlerContext<A, R>,
}

impl<A, R> core::fmt::Debug for Bound<A, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Bound").field(&self.context).finish()
    }
}

impl<A, R> Bound<A, R> {
    /// A fresh context with an empty path, carrying this one's function and
    /// options.
    pub fn next(&self) -> HandlerContext<A, R> {
        let mut context = self.context.fork();
        context.path.reset();
        context.event_name.clear();
        context
    }

    /// [`next`](Self::next), then append `segment`.
    pub fn on(&self, segment: &str) -> HandlerContext<A, R> {
        self.next().seg(segment)
    }

    /// Remove the entry this handle registered last.
    pub fn delete(&mut self) {
        self.context.delete();
    }

    /// Path of the last registration.
    pub fn event_name(&self) -> &str {
        self.context.event_name()
    }

    /// Name of the last registration.
    pub fn name(&self) -> Option<&str> {
        self.context.handler_name()
    }

    /// The registering context.
    pub fn context(&self) -> &HandlerContext<A, R> {
        &self.context
    }

    /// Take back the registering context.
    pub fn into_context(self) -> HandlerContext<A, R> {
        self.context
    }
}

impl<A, R> Bound<A, R>
where
    A: Clone + 'static,
    R: 'static,
{
    /// Register the same function again at the same path, merging `options`.
    pub fn again(self, options: HandlerOptions) -> Self {
        let function = self.context.handler_function.clone();
        self.context.create(function, Some(options))
    }
}
