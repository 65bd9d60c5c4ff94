// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_eventivity --heading-base-level=0

//! Understory Eventivity: a hierarchical, `no_std` event bus for UI glue code.
//!
//! ## Overview
//!
//! Handlers are registered under dot-paths such as `login.success` and events
//! are raised along those paths. A path is a literal channel name: binding to
//! `a.b` and raising `a` never reach each other. A raise chain, however,
//! touches every prefix it walks, so `event.on("a").seg("b")` raises `a` and
//! then `a.b`.
//!
//! Everything lives in a [`Bus`]. The bus vends builder contexts:
//!
//! - [`HandlerContext`] walks to a path and registers a function there,
//!   returning a [`Bound`] handle.
//! - [`EventContext`] walks one or more paths and raises them, returning a
//!   [`Raised`] handle with the recorded results.
//! - [`Objects`] binds handlers to objects instead of paths, holding the
//!   objects weakly.
//!
//! Contexts share the [`PathContext`] segment API: [`seg`](PathContext::seg)
//! extends the path, [`on`](PathContext::on) starts a new one from a shared
//! handle, and [`branch`](PathContext::branch) (the reserved segment `"$"`)
//! forks keeping the current prefix.
//!
//! ## Dispatch
//!
//! Handlers at a path run in registration order. Each receives a [`Call`]
//! carrying the arguments, the raising context, an optional target and the
//! handler's own identity. A handler returns an [`Outcome`]:
//! [`Outcome::Value`] is recorded under the handler's name when it has one;
//! [`Outcome::Esc`] aborts the whole raise when either the raise or the
//! handler opted in with an `esc` flag.
//!
//! Handler errors abort the raise and surface as [`Error`]. The bus never
//! swallows them.
//!
//! ## Ownership
//!
//! A handler registered with an owner is removed when its owner fires. The
//! owner is a path ([`HandlerOptions::owned_by`]) or an object. This is how a
//! handler bound during `login` is torn down by `logout` without the login
//! code tracking it.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use understory_eventivity::{Bus, EventOptions, HandlerOptions, Outcome, PathContext};
//!
//! let bus: Bus<()> = Bus::new();
//! let hits = Rc::new(Cell::new(0));
//! let h = hits.clone();
//! bus.handler(HandlerOptions::new().owned_by("logout"))
//!     .on("tick")
//!     .bind(move |_| {
//!         h.set(h.get() + 1);
//!         Outcome::Value(())
//!     });
//!
//! let event = bus.event(EventOptions::new());
//! event.on("tick").raise(()).unwrap();
//! event.on("logout").raise(()).unwrap();
//! event.on("tick").raise(()).unwrap();
//! assert_eq!(hits.get(), 1);
//! ```
//!
//! ## Deferred handlers
//!
//! Handlers flagged [`HandlerFlags::FRAME`] or [`HandlerFlags::TICK`] queue
//! their call instead of running it. The host pumps the queues with
//! [`Bus::run_frame`] and [`Bus::run_ticks`].
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `trace` for registration, dispatch and
//! deferral; `debug` for escalation, deletion and pruning. It never installs a
//! subscriber.
//!
//! This crate is `no_std` and uses `alloc`. The `std` feature forwards to
//! `std` support in `tracing` and `thiserror`.

#![no_std]

extern crate alloc;

mod bus;
pub mod compose;
mod defer;
pub mod dispatcher;
mod error;
mod event;
mod handler;
mod object;
mod options;
mod path;
mod scope;
mod types;

pub use bus::Bus;
pub use defer::{Defer, Pending};
pub use error::{BoxError, Error};
pub use event::{EventContext, Passthrough, Raised};
pub use handler::{Bound, HandlerContext};
pub use object::{Deleter, ObjectCall, ObjectKey, ObjectRef, Objects};
pub use options::{EventFlags, EventOptions, HandlerFlags, HandlerOptions, ObjectOptions, Owner};
pub use path::{BRANCH, PathContext, PathState};
pub use scope::OwnerKey;
pub use types::{Call, HandlerFn, HandlerInfo, IntoOutcome, Outcome, Results, Target, handler_fn};

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::{Cell, RefCell};

    type Log = Rc<RefCell<Vec<(&'static str, Vec<u32>)>>>;

    /// A handler that logs `tag` with its arguments and returns `outcome`.
    fn tagged(
        log: &Log,
        tag: &'static str,
        outcome: Outcome<()>,
    ) -> impl Fn(&Call<'_, u32, ()>) -> Outcome<()> + 'static {
        let log = log.clone();
        move |call| {
            log.borrow_mut().push((tag, call.args.to_vec()));
            outcome.clone()
        }
    }

    fn tags(log: &Log) -> Vec<&'static str> {
        log.borrow().iter().map(|(t, _)| *t).collect()
    }

    fn setup() -> (Bus<u32>, HandlerContext<u32>, EventContext<u32>, Log) {
        let bus = Bus::new();
        let handler = bus.handler(HandlerOptions::new());
        let event = bus.event(EventOptions::new());
        (bus, handler, event, Log::default())
    }

    #[test]
    fn registered_handler_fires_once_with_the_raised_args() {
        let (_bus, handler, event, log) = setup();
        let _ = handler.on("p").bind(tagged(&log, "f", Outcome::Value(())));
        let _ = event.on("p").raise_all(vec![4, 2]).unwrap();
        assert_eq!(*log.borrow(), [("f", vec![4, 2])]);
    }

    #[test]
    fn paths_are_literal() {
        let (_bus, handler, event, log) = setup();
        let _ = handler.on("a.b").bind(tagged(&log, "ab", Outcome::Value(())));
        let _ = handler.on("a").bind(tagged(&log, "a", Outcome::Value(())));
        let _ = event.on("a").raise(1).unwrap();
        assert_eq!(tags(&log), ["a"]);
        let _ = event.on("a.b").raise(1).unwrap();
        assert_eq!(tags(&log), ["a", "ab"]);
        // Walking both segments reaches both.
        let _ = event.on("a").seg("b").raise(1).unwrap();
        assert_eq!(tags(&log), ["a", "ab", "a", "ab"]);
    }

    #[test]
    fn owner_firing_removes_the_owned_handler() {
        let (bus, _, event, log) = setup();
        let _ = bus
            .handler(HandlerOptions::new().owned_by("B"))
            .on("A")
            .bind(tagged(&log, "f", Outcome::Value(())));
        let _ = event.on("A").raise(0).unwrap();
        let _ = event.on("B").raise(0).unwrap();
        let _ = event.on("A").raise(0).unwrap();
        assert_eq!(tags(&log), ["f"]);
        assert!(bus.handlers_at("A").is_empty());
    }

    #[test]
    fn escalation_short_circuits_later_handlers() {
        let (bus, handler, _, log) = setup();
        let _ = bus
            .handler(HandlerOptions::new().esc())
            .on("P")
            .bind(tagged(&log, "h1", Outcome::Esc));
        let _ = handler.on("P").bind(tagged(&log, "h2", Outcome::Value(())));
        let raised = bus.event(EventOptions::new().esc()).on("P").raise(0).unwrap();
        assert_eq!(tags(&log), ["h1"]);
        assert!(raised.escalated());
        assert!(raised.results().is_none());
    }

    #[test]
    fn esc_without_any_opt_in_is_an_ordinary_result() {
        let (_bus, handler, event, log) = setup();
        let _ = handler.on("P").bind(tagged(&log, "h1", Outcome::Esc));
        let _ = handler.on("P").bind(tagged(&log, "h2", Outcome::Value(())));
        let raised = event.on("P").raise(0).unwrap();
        assert_eq!(tags(&log), ["h1", "h2"]);
        assert!(!raised.escalated());
    }

    #[test]
    fn escalation_skips_owner_cleanups_of_the_aborted_path() {
        let (bus, handler, _, log) = setup();
        let _ = bus
            .handler(HandlerOptions::new().owned_by("P"))
            .on("Q")
            .bind(tagged(&log, "owned", Outcome::Value(())));
        let _ = bus
            .handler(HandlerOptions::new().esc())
            .on("P")
            .bind(tagged(&log, "stop", Outcome::Esc));
        let _ = handler.on("Q").bind(tagged(&log, "q", Outcome::Value(())));
        let _ = bus.event(EventOptions::new()).on("P").raise(0).unwrap();
        assert_eq!(bus.handlers_at("Q").len(), 2);
        assert_eq!(bus.owners_of(&OwnerKey::from("P")), 1);
    }

    #[test]
    fn one_shot_fires_once() {
        let (bus, _, event, log) = setup();
        let _ = bus
            .handler(HandlerOptions::new().once())
            .on("p")
            .bind(tagged(&log, "once", Outcome::Value(())));
        for _ in 0..3 {
            let _ = event.on("p").raise(0).unwrap();
        }
        assert_eq!(tags(&log), ["once"]);
    }

    #[test]
    fn empty_raise_reuses_previous_args() {
        let (_bus, handler, event, log) = setup();
        let _ = handler.on("p").bind(tagged(&log, "f", Outcome::Value(())));
        let raised = event.on("p").raise_all(vec![7, 8]).unwrap();
        let raised = raised.into_context().recall().unwrap();
        let _ = raised.into_context().raise_all(Vec::new()).unwrap();
        assert_eq!(
            *log.borrow(),
            [("f", vec![7, 8]), ("f", vec![7, 8]), ("f", vec![7, 8])]
        );
    }

    #[test]
    fn handlers_added_during_dispatch_wait_for_the_next_raise() {
        let (bus, handler, event, log) = setup();
        let added = Rc::new(Cell::new(false));
        let (l, a, h) = (log.clone(), added.clone(), bus.handler(HandlerOptions::new()));
        let _ = handler.on("p").bind(move |call: &Call<'_, u32, ()>| {
            l.borrow_mut().push(("outer", call.args.to_vec()));
            if !a.replace(true) {
                let _ = h.on("p").bind(tagged(&l, "inner", Outcome::Value(())));
            }
            Outcome::Value(())
        });
        let _ = event.on("p").raise(1).unwrap();
        assert_eq!(tags(&log), ["outer"]);
        assert_eq!(bus.handlers_at("p").len(), 2);
        let _ = event.on("p").raise(2).unwrap();
        assert_eq!(tags(&log), ["outer", "outer", "inner"]);
    }

    #[test]
    fn handlers_may_raise_reentrantly() {
        let (_bus, handler, event, log) = setup();
        let inner = event.clone();
        let _ = handler.on("inner").bind(tagged(&log, "inner", Outcome::Value(())));
        let _ = handler.on("outer").bind(move |call: &Call<'_, u32, ()>| {
            inner.on("inner").raise(call.args[0] + 1).map(|_| Outcome::Value(()))
        });
        let _ = event.on("outer").raise(1).unwrap();
        assert_eq!(*log.borrow(), [("inner", vec![2])]);
    }

    #[test]
    fn chain_raises_every_walked_segment_in_order() {
        let (_bus, handler, event, log) = setup();
        let _ = handler.on("first").bind(tagged(&log, "h1", Outcome::Value(())));
        let _ = handler
            .on("first.fifth")
            .bind(tagged(&log, "h2", Outcome::Value(())));
        let _ = event.on("first").seg("fifth").raise(1).unwrap();
        assert_eq!(*log.borrow(), [("h1", vec![1]), ("h2", vec![1])]);
    }

    #[test]
    fn login_handler_owned_by_profile() {
        let (bus, _, event, log) = setup();
        let _ = bus
            .handler(HandlerOptions::new().owned_by("profile"))
            .on("login")
            .bind(tagged(&log, "h", Outcome::Value(())));
        let _ = event.on("login").raise(0).unwrap();
        let _ = event.on("profile").raise(0).unwrap();
        assert_eq!(tags(&log), ["h"]);
        assert!(bus.handlers_at("login").is_empty());
    }

    #[test]
    fn escalating_handler_hides_later_registrations() {
        let (bus, handler, _, log) = setup();
        let _ = handler.on("x").bind(tagged(&log, "h1", Outcome::Value(())));
        let _ = bus
            .handler(HandlerOptions::new().esc())
            .on("x")
            .bind(tagged(&log, "h2", Outcome::Esc));
        let _ = handler.on("x").bind(tagged(&log, "h3", Outcome::Value(())));
        let _ = bus.event(EventOptions::new().esc()).on("x").raise(0).unwrap();
        assert_eq!(tags(&log), ["h1", "h2"]);
    }

    #[test]
    fn frame_handlers_run_on_the_next_frame() {
        let (bus, _, event, _) = setup();
        let frames: Rc<RefCell<Vec<(Option<f64>, Vec<u32>)>>> = Rc::default();
        let f = frames.clone();
        let _ = bus
            .handler(HandlerOptions::new().on_frame().named("paint"))
            .on("resize")
            .bind(move |call: &Call<'_, u32, ()>| {
                f.borrow_mut().push((call.frame_time, call.args.to_vec()));
                Outcome::Value(())
            });
        let raised = event.on("resize").raise(3).unwrap();
        assert_eq!(raised.results().unwrap()["paint"], Outcome::Deferred);
        assert!(frames.borrow().is_empty());
        assert_eq!(bus.pending(), Pending { frame: 1, tick: 0 });

        assert_eq!(bus.run_ticks().unwrap(), 0);
        assert_eq!(bus.run_frame(16.0).unwrap(), 1);
        assert_eq!(*frames.borrow(), [(Some(16.0), vec![3])]);
        assert_eq!(bus.run_frame(32.0).unwrap(), 0);
    }

    #[test]
    fn tick_handlers_can_be_cancelled() {
        let (bus, _, event, log) = setup();
        let _ = bus
            .handler(HandlerOptions::new().on_tick())
            .on("save")
            .bind(tagged(&log, "save", Outcome::Value(())));
        let _ = event.on("save").raise(1).unwrap();
        let _ = event.on("save").raise(2).unwrap();
        assert_eq!(bus.pending().tick, 2);
        assert_eq!(bus.cancel_deferred(), 2);
        assert_eq!(bus.run_ticks().unwrap(), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn failing_deferred_call_keeps_the_rest_queued() {
        let (bus, _, event, log) = setup();
        let _ = bus
            .handler(HandlerOptions::new().on_tick())
            .on("job")
            .bind(|call: &Call<'_, u32, ()>| -> Result<Outcome<()>, &'static str> {
                if call.args[0] == 1 {
                    Err("first job fails")
                } else {
                    Ok(Outcome::Value(()))
                }
            });
        let _ = bus
            .handler(HandlerOptions::new().on_tick())
            .on("job")
            .bind(tagged(&log, "after", Outcome::Value(())));
        let _ = event.on("job").raise(1).unwrap();
        assert_eq!(bus.pending().tick, 2);
        assert!(bus.run_ticks().is_err());
        assert_eq!(bus.pending().tick, 1);
        assert_eq!(bus.run_ticks().unwrap(), 1);
        assert_eq!(tags(&log), ["after"]);
    }

    #[test]
    fn dropped_objects_stop_firing() {
        let bus: Bus<u32> = Bus::new();
        let objects = bus.object();
        let hits = Rc::new(Cell::new(0));
        let row = Rc::new(String::from("row"));
        let h = hits.clone();
        let deleters = objects.handler(
            move |_| {
                h.set(h.get() + 1);
                Outcome::Value(())
            },
            [&row],
        );
        objects.event(&[1], [&row]).unwrap();
        let weak = Rc::downgrade(&row);
        drop(row);
        assert!(weak.upgrade().is_none());
        assert_eq!(objects.prune(), 1);
        assert!(!deleters[0].delete());
        assert!(!deleters[0].delete());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn clear_raise_removes_what_it_invoked() {
        let (bus, handler, event, log) = setup();
        let _ = handler.on("a").bind(tagged(&log, "a", Outcome::Value(())));
        let _ = handler.on("a").bind(tagged(&log, "a2", Outcome::Value(())));
        let _ = handler.on("b").bind(tagged(&log, "b", Outcome::Value(())));
        let _ = bus
            .event(EventOptions::new().clear())
            .on("a")
            .raise(0)
            .unwrap();
        assert!(bus.handlers_at("a").is_empty());
        assert_eq!(bus.handlers_at("b").len(), 1);
        let _ = event.on("a").raise(0).unwrap();
        assert_eq!(tags(&log), ["a", "a2"]);
    }

    #[test]
    fn handler_errors_abort_the_raise() {
        let (bus, handler, event, log) = setup();
        let _ = bus
            .handler(HandlerOptions::new().named("bad"))
            .on("p")
            .bind(|_: &Call<'_, u32, ()>| -> Result<Outcome<()>, &'static str> {
                Err("nope")
            });
        let _ = handler.on("p").bind(tagged(&log, "later", Outcome::Value(())));
        let err = event.on("p").raise(0).unwrap_err();
        match err {
            Error::Handler { path, name, .. } => {
                assert_eq!(path, "p");
                assert_eq!(name, "bad");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn named_results_and_passthrough() {
        let bus: Bus<u32, u32> = Bus::new();
        let _ = bus
            .handler(HandlerOptions::new().named("double"))
            .on("n")
            .bind(|call: &Call<'_, u32, u32>| Outcome::Value(call.args[0] * 2));
        let _ = bus
            .handler(HandlerOptions::new())
            .on("n")
            .bind(|_: &Call<'_, u32, u32>| Outcome::Value(0));
        let raised = bus.event(EventOptions::new()).on("n").raise(21).unwrap();
        let through = raised.passthrough();
        assert_eq!(through.args, [21]);
        let results = through.results.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results["double"].value(), Some(&42));
    }

    #[test]
    fn compose_fans_out_raised_args() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let reactions = [compose::Reaction::new(move |x: &u32| s.borrow_mut().push(*x))];
        assert_eq!(compose::call(&reactions, 9), 9);
        assert_eq!(*seen.borrow(), [9]);
    }
}
