// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The bus: entry point vending contexts over one shared scope.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use crate::defer::{self, Defer, Pending};
use crate::dispatcher::{DefaultDispatcher, Dispatcher};
use crate::error::Error;
use crate::event::EventContext;
use crate::handler::HandlerContext;
use crate::object::Objects;
use crate::options::{EventOptions, HandlerOptions};
use crate::scope::{OwnerKey, Shared};

/// A hierarchical event bus.
///
/// `A` is the argument type handlers receive, `R` the value they report.
/// Cloning a bus is cheap and yields another handle to the same registry.
pub struct Bus<A, R = ()> {
    shared: Rc<Shared<A, R>>,
}

impl<A, R> Clone for Bus<A, R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<A, R> Default for Bus<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> core::fmt::Debug for Bus<A, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut s = f.debug_struct("Bus");
        if let Ok(scope) = self.shared.scope.try_borrow() {
            s.field("paths", &scope.handlers.len())
                .field("owners", &scope.owners.len())
                .field("handler_count", &scope.handler_count);
        }
        if let Ok(deferred) = self.shared.deferred.try_borrow() {
            s.field("pending", &deferred.pending());
        }
        s.finish()
    }
}

impl<A, R> Bus<A, R> {
    /// An empty bus.
    pub fn new() -> Self {
        Self {
            shared: Rc::new(Shared::new()),
        }
    }

    /// A virgin handler context with default `options`.
    pub fn handler(&self, options: HandlerOptions) -> HandlerContext<A, R> {
        HandlerContext::new(self.shared.clone(), options)
    }

    /// The object-keyed surface of this bus.
    pub fn object(&self) -> Objects<A, R> {
        Objects::new(self.shared.clone())
    }

    /// Drop every pending deferred call. Returns how many were dropped.
    pub fn cancel_deferred(&self) -> usize {
        let cancelled = self.shared.deferred.borrow_mut().cancel();
        if cancelled > 0 {
            tracing::debug!(cancelled, "deferred calls cancelled");
        }
        cancelled
    }

    /// Number of deferred calls waiting.
    pub fn pending(&self) -> Pending {
        self.shared.deferred.borrow().pending()
    }

    /// Handler names at `path`, in dispatch order.
    pub fn handlers_at(&self, path: &str) -> Vec<String> {
        self.shared.scope.borrow().names_at(path)
    }

    /// Number of cleanups waiting for `owner` to fire.
    pub fn owners_of(&self, owner: &OwnerKey) -> usize {
        self.shared
            .scope
            .borrow()
            .owners
            .get(owner)
            .map_or(0, Vec::len)
    }

    /// Run the calls deferred to the next frame, passing them `frame_time`.
    ///
    /// Returns how many ran.
    pub fn run_frame(&self, frame_time: f64) -> Result<usize, Error> {
        let ran = defer::pump(&self.shared, Defer::Frame, Some(frame_time))?;
        tracing::trace!(ran, frame_time, "frame pumped");
        Ok(ran)
    }

    /// Run the calls deferred to the next tick. Returns how many ran.
    pub fn run_ticks(&self) -> Result<usize, Error> {
        let ran = defer::pump(&self.shared, Defer::Tick, None)?;
        tracing::trace!(ran, "ticks pumped");
        Ok(ran)
    }
}

impl<A: 'static, R: 'static> Bus<A, R> {
    /// A virgin event context with default `options`.
    pub fn event(&self, options: EventOptions) -> EventContext<A, R> {
        self.event_with(options, Rc::new(DefaultDispatcher))
    }

    /// A virgin event context dispatching through `dispatcher`.
    pub fn event_with(
        &self,
        options: EventOptions,
        dispatcher: Rc<dyn Dispatcher<A, R>>,
    ) -> EventContext<A, R> {
        EventContext::new(self.shared.clone(), options, dispatcher)
    }
}
