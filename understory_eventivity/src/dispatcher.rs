// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dispatch strategies: walk the paths of a raise and invoke their handlers.
//!
//! The default strategy ([`DefaultDispatcher`]) implements these rules:
//!
//! - Paths are visited in the order the raise chain touched them.
//! - A path nothing was ever registered at has no handlers to run, but its
//!   owner cleanups still run.
//! - Handlers of a path are snapshotted before the first one runs, so handlers
//!   added or removed while the path is being dispatched do not affect it.
//! - Handlers run in registration order and receive a [`Call`].
//! - A handler flagged [`HandlerFlags::ONCE`], or any handler of a raise
//!   flagged [`EventFlags::CLEAR`], is removed right after it runs.
//! - [`Outcome::Esc`] aborts the whole raise (not only the current path) when
//!   the raise has [`EventFlags::ESC`] or the handler has
//!   [`HandlerFlags::ESC`]. An aborted raise reports no results.
//! - Otherwise a named handler's outcome is recorded in the results.
//! - After a path's handlers ran, the owner cleanups filed under that path
//!   run and are forgotten.
//! - A handler error aborts the raise and is returned as-is.
//!
//! Implement [`Dispatcher`] to change how a single handler is invoked or how
//! the whole raise is walked, and pass it to
//! [`Bus::event_with`](crate::Bus::event_with).
//!
//! ## Minimal example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use understory_eventivity::dispatcher::Dispatcher;
//! use understory_eventivity::{Bus, BoxError, Call, EventOptions, HandlerOptions, Outcome, PathContext};
//!
//! // Count every handler invocation going through this strategy.
//! #[derive(Default)]
//! struct Counting(RefCell<u32>);
//!
//! impl Dispatcher<u8, ()> for Counting {
//!     fn handle(
//!         &self,
//!         function: &dyn Fn(&Call<'_, u8, ()>) -> Result<Outcome<()>, BoxError>,
//!         call: &Call<'_, u8, ()>,
//!     ) -> Result<Outcome<()>, BoxError> {
//!         *self.0.borrow_mut() += 1;
//!         function(call)
//!     }
//! }
//!
//! let bus: Bus<u8> = Bus::new();
//! bus.handler(HandlerOptions::new()).on("tick").bind(|_| Outcome::Value(()));
//! let counting = Rc::new(Counting::default());
//! bus.event_with(EventOptions::new(), counting.clone())
//!     .on("tick")
//!     .raise(1)
//!     .unwrap();
//! assert_eq!(*counting.0.borrow(), 1);
//! ```

use crate::error::{BoxError, Error};
use crate::event::EventContext;
use crate::options::{EventFlags, HandlerFlags};
use crate::scope::OwnerKey;
use crate::types::{Call, HandlerInfo, Outcome, Results, Target};

/// Whether to keep walking a handler sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Keep going.
    Continue,
    /// Abort immediately.
    Stop,
}

/// Walk `seq` in order, honoring [`Flow::Stop`] and errors.
///
/// Returns `Some(entry)` for the entry that stopped the walk, or `None` if the
/// whole sequence was visited.
pub fn walk<'a, T, E>(
    seq: &'a [T],
    mut step: impl FnMut(&'a T) -> Result<Flow, E>,
) -> Result<Option<&'a T>, E> {
    for item in seq {
        match step(item)? {
            Flow::Continue => {}
            Flow::Stop => return Ok(Some(item)),
        }
    }
    Ok(None)
}

/// A dispatch strategy.
pub trait Dispatcher<A, R> {
    /// Invoke a single handler.
    fn handle(
        &self,
        function: &dyn Fn(&Call<'_, A, R>) -> Result<Outcome<R>, BoxError>,
        call: &Call<'_, A, R>,
    ) -> Result<Outcome<R>, BoxError> {
        function(call)
    }

    /// Dispatch `args` along every path of `event`.
    ///
    /// Returns `None` if a handler escalated.
    fn dispatch(
        &self,
        event: &EventContext<A, R>,
        args: &[A],
        target: Option<&Target>,
    ) -> Result<Option<Results<R>>, Error> {
        run(self, event, args, target)
    }
}

/// The standard strategy; see the [module docs](self).
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultDispatcher;

impl<A, R> Dispatcher<A, R> for DefaultDispatcher {}

/// The standard dispatch walk, invoking handlers through `dispatcher`.
pub fn run<A, R, D>(
    dispatcher: &D,
    event: &EventContext<A, R>,
    args: &[A],
    target: Option<&Target>,
) -> Result<Option<Results<R>>, Error>
where
    D: Dispatcher<A, R> + ?Sized,
{
    let shared = event.shared();
    let raise_flags = event.options().flags;
    let mut results = Results::new();

    for path in event.events() {
        let snapshot = shared.scope.borrow().snapshot(path).unwrap_or_default();

        let stopped = walk(&snapshot[..], |entry| -> Result<Flow, Error> {
            let handler = HandlerInfo {
                path: path.clone(),
                name: entry.name.clone(),
                options: entry.options.borrow().clone(),
            };
            let call = Call {
                args,
                event,
                target,
                handler: &handler,
                frame_time: None,
            };
            tracing::trace!(path = %path, name = %handler.name, "dispatching");
            let outcome = dispatcher
                .handle(&*entry.function, &call)
                .map_err(|source| Error::Handler {
                    path: path.clone(),
                    name: handler.name.clone(),
                    source,
                })?;

            let flags = handler.options.flags;
            if flags.contains(HandlerFlags::ONCE) || raise_flags.contains(EventFlags::CLEAR) {
                shared.scope.borrow_mut().remove(path, &handler.name);
            }
            if outcome.is_esc()
                && (raise_flags.contains(EventFlags::ESC) || flags.contains(HandlerFlags::ESC))
            {
                tracing::debug!(path = %path, name = %handler.name, "escalated");
                return Ok(Flow::Stop);
            }
            if let Some(name) = handler.options.name {
                results.insert(name, outcome);
            }
            Ok(Flow::Continue)
        })?;

        if stopped.is_some() {
            return Ok(None);
        }

        // Handlers owned by this path, not bound to it.
        shared
            .scope
            .borrow_mut()
            .fire_owner(&OwnerKey::Path(path.clone()));
    }

    Ok(Some(results))
}
