// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Raising events.
//!
//! An [`EventContext`] records every path its chain touches, so
//! `event.on("first").seg("fifth")` raises both `first` and `first.fifth`, in
//! that order. Binding to a compound segment is still a single literal path:
//! `seg("first.fifth")` touches only `first.fifth`.
//!
//! Arguments carry over: a raise without arguments reuses the ones the
//! context last dispatched, including across [`Raised::next`].
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use understory_eventivity::{Bus, EventOptions, HandlerOptions, Outcome, PathContext};
//!
//! let bus: Bus<&'static str> = Bus::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let handler = bus.handler(HandlerOptions::new());
//! for path in ["first", "first.fifth"] {
//!     let seen = seen.clone();
//!     let _ = handler.on(path).bind(move |call| {
//!         seen.borrow_mut().push((call.handler.path.clone(), call.args.to_vec()));
//!         Outcome::Value(())
//!     });
//! }
//!
//! let raised = bus.event(EventOptions::new()).on("first").seg("fifth").raise("hi").unwrap();
//! assert_eq!(seen.borrow().len(), 2);
//!
//! // Same arguments, unrelated path.
//! raised.on("first").recall().unwrap();
//! assert_eq!(seen.borrow()[2], ("first".to_string(), vec!["hi"]));
//! ```

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use smallvec::SmallVec;

use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::options::{EventOptions, Owner};
use crate::path::{PathContext, PathState};
use crate::scope::{OwnerKey, Shared};
use crate::types::{Results, Target};

/// Builder that raises events along the paths it walks.
pub struct EventContext<A, R = ()> {
    shared: Rc<Shared<A, R>>,
    options: EventOptions,
    path: PathState,
    events: SmallVec<[String; 4]>,
    args: Option<Vec<A>>,
    dispatcher: Rc<dyn Dispatcher<A, R>>,
}

impl<A: Clone, R> Clone for EventContext<A, R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            options: self.options,
            path: self.path.clone(),
            events: self.events.clone(),
            args: self.args.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<A, R> core::fmt::Debug for EventContext<A, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventContext")
            .field("prefix", &self.path.prefix())
            .field("events", &self.events)
            .field("options", &self.options)
            .field("args", &self.args.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

impl<A, R> EventContext<A, R> {
    pub(crate) fn new(
        shared: Rc<Shared<A, R>>,
        options: EventOptions,
        dispatcher: Rc<dyn Dispatcher<A, R>>,
    ) -> Self {
        Self {
            shared,
            options,
            path: PathState::virgin(),
            events: SmallVec::new(),
            args: None,
            dispatcher,
        }
    }

    pub(crate) fn shared(&self) -> &Rc<Shared<A, R>> {
        &self.shared
    }

    /// Paths touched by the chain, in order.
    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// Arguments of the last dispatch.
    pub fn args(&self) -> Option<&[A]> {
        self.args.as_deref()
    }

    /// Current options.
    pub fn options(&self) -> EventOptions {
        self.options
    }
}

impl<A, R> EventContext<A, R>
where
    A: Clone + 'static,
    R: 'static,
{
    /// Dispatch along every touched path.
    ///
    /// `args` that are `None` or empty reuse the previously dispatched ones.
    /// `options` are merged into this context's options first.
    pub fn create(
        mut self,
        args: Option<Vec<A>>,
        options: Option<EventOptions>,
        target: Option<Target>,
    ) -> Result<Raised<A, R>, Error> {
        if let Some(options) = options {
            self.options.merge(&options);
        }
        let initial_args = args.clone().unwrap_or_default();
        let args = match args {
            Some(args) if !args.is_empty() => args,
            _ => self.args.take().unwrap_or_default(),
        };
        self.args = Some(args);

        tracing::trace!(events = ?self.events, "raising");
        let dispatcher = self.dispatcher.clone();
        let results = dispatcher.dispatch(
            &self,
            self.args.as_deref().unwrap_or_default(),
            target.as_ref(),
        )?;

        Ok(Raised {
            context: self,
            initial_args,
            results,
        })
    }

    /// Raise with a single argument.
    pub fn raise(self, arg: A) -> Result<Raised<A, R>, Error> {
        self.create(Some(vec![arg]), None, None)
    }

    /// Raise with a list of arguments.
    pub fn raise_all(self, args: Vec<A>) -> Result<Raised<A, R>, Error> {
        self.create(Some(args), None, None)
    }

    /// Raise with a list of arguments and a target.
    pub fn raise_at(self, args: Vec<A>, target: Target) -> Result<Raised<A, R>, Error> {
        self.create(Some(args), None, Some(target))
    }

    /// Raise with a list of arguments and extra options.
    pub fn raise_with(self, args: Vec<A>, options: EventOptions) -> Result<Raised<A, R>, Error> {
        self.create(Some(args), Some(options), None)
    }

    /// Raise again with the previously dispatched arguments.
    pub fn recall(self) -> Result<Raised<A, R>, Error> {
        self.create(None, None, None)
    }
}

impl<A: Clone, R> PathContext for EventContext<A, R> {
    fn path(&self) -> &PathState {
        &self.path
    }

    fn path_mut(&mut self) -> &mut PathState {
        &mut self.path
    }

    fn fork(&self) -> Self {
        Self {
            path: self.path.forked(),
            events: SmallVec::new(),
            ..self.clone()
        }
    }

    fn update(&mut self) {
        let prefix = self.path.prefix().unwrap_or_default().into();
        self.events.push(prefix);
    }
}

impl<A, R> From<&EventContext<A, R>> for Owner {
    fn from(context: &EventContext<A, R>) -> Self {
        Self::Key(OwnerKey::Path(context.path.prefix().unwrap_or_default().into()))
    }
}

/// Arguments and results of a completed raise.
#[derive(Debug)]
pub struct Passthrough<'a, A, R> {
    /// Arguments as supplied to the raise (empty when reused).
    pub args: &'a [A],
    /// Named results, `None` if the raise escalated.
    pub results: Option<&'a Results<R>>,
}

/// Handle returned by a raise.
pub struct Raised<A, R = ()> {
    context: EventContext<A, R>,
    initial_args: Vec<A>,
    results: Option<Results<R>>,
}

impl<A, R> core::fmt::Debug for Raised<A, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Raised")
            .field("context", &self.context)
            .field("escalated", &self.results.is_none())
            .finish_non_exhaustive()
    }
}

impl<A, R> Raised<A, R> {
    /// Named results, `None` if a handler escalated.
    pub fn results(&self) -> Option<&Results<R>> {
        self.results.as_ref()
    }

    /// Whether a handler aborted the raise.
    pub fn escalated(&self) -> bool {
        self.results.is_none()
    }

    /// Supplied arguments and results, for passing a raise through
    /// transparently.
    pub fn passthrough(&self) -> Passthrough<'_, A, R> {
        Passthrough {
            args: &self.initial_args,
            results: self.results.as_ref(),
        }
    }

    /// The raising context.
    pub fn context(&self) -> &EventContext<A, R> {
        &self.context
    }

    /// Take back the raising context.
    pub fn into_context(self) -> EventContext<A, R> {
        self.context
    }
}

impl<A: Clone, R> Raised<A, R> {
    /// A fresh context with an empty path and no touched events, carrying the
    /// arguments and options of this raise.
    pub fn next(&self) -> EventContext<A, R> {
        let mut context = self.context.fork();
        context.path.reset();
        context
    }

    /// [`next`](Self::next), then append `segment`.
    pub fn on(&self, segment: &str) -> EventContext<A, R> {
        self.next().seg(segment)
    }
}

impl<A, R> Raised<A, R>
where
    A: Clone + 'static,
    R: 'static,
{
    /// Raise the same paths again with the same arguments, merging `options`.
    pub fn again(self, options: EventOptions) -> Result<Self, Error> {
        let args = self.context.args.clone();
        self.context.create(args, Some(options), None)
    }
}
