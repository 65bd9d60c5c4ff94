// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deferred handler calls.
//!
//! A handler registered with [`HandlerFlags::FRAME`](crate::HandlerFlags::FRAME)
//! or [`HandlerFlags::TICK`](crate::HandlerFlags::TICK) does not run when the
//! event is raised. Instead the call (arguments, raising context, target and
//! handler identity) is queued and the raise sees [`Outcome::Deferred`].
//!
//! The host decides when queued calls run by pumping the bus:
//! [`Bus::run_frame`](crate::Bus::run_frame) once per rendered frame and
//! [`Bus::run_ticks`](crate::Bus::run_ticks) once per turn of its loop.
//! A pump only runs calls queued before it started; calls queued while it runs
//! wait for the next pump.
//!
//! Pending calls keep the bus alive until they run or are cancelled with
//! [`Bus::cancel_deferred`](crate::Bus::cancel_deferred).

use alloc::collections::VecDeque;
use alloc::rc::{Rc, Weak};

use crate::error::Error;
use crate::event::EventContext;
use crate::scope::Shared;
use crate::types::{Call, HandlerFn, HandlerInfo, Outcome, Target};

/// When a deferred handler runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Defer {
    /// On the next [`Bus::run_frame`](crate::Bus::run_frame).
    Frame,
    /// On the next [`Bus::run_ticks`](crate::Bus::run_ticks).
    Tick,
}

/// Number of calls waiting in each queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pending {
    /// Calls waiting for a frame.
    pub frame: usize,
    /// Calls waiting for a tick.
    pub tick: usize,
}

pub(crate) struct Job<A, R> {
    function: HandlerFn<A, R>,
    args: alloc::vec::Vec<A>,
    event: EventContext<A, R>,
    target: Option<Target>,
    handler: HandlerInfo,
}

impl<A, R> Job<A, R> {
    fn run(self, frame_time: Option<f64>) -> Result<(), Error> {
        let call = Call {
            args: &self.args,
            event: &self.event,
            target: self.target.as_ref(),
            handler: &self.handler,
            frame_time,
        };
        tracing::trace!(path = %self.handler.path, name = %self.handler.name, "running deferred handler");
        match (self.function)(&call) {
            Ok(_) => Ok(()),
            Err(source) => Err(Error::Handler {
                path: self.handler.path.clone(),
                name: self.handler.name.clone(),
                source,
            }),
        }
    }
}

pub(crate) struct DeferQueue<A, R> {
    frame: VecDeque<Job<A, R>>,
    tick: VecDeque<Job<A, R>>,
}

impl<A, R> DeferQueue<A, R> {
    pub(crate) fn new() -> Self {
        Self {
            frame: VecDeque::new(),
            tick: VecDeque::new(),
        }
    }

    fn queue_mut(&mut self, kind: Defer) -> &mut VecDeque<Job<A, R>> {
        match kind {
            Defer::Frame => &mut self.frame,
            Defer::Tick => &mut self.tick,
        }
    }

    pub(crate) fn pending(&self) -> Pending {
        Pending {
            frame: self.frame.len(),
            tick: self.tick.len(),
        }
    }

    pub(crate) fn cancel(&mut self) -> usize {
        let n = self.frame.len() + self.tick.len();
        self.frame.clear();
        self.tick.clear();
        n
    }
}

/// Wrap `inner` so that invoking it queues the call instead of running it.
pub(crate) fn deferred<A, R>(
    shared: Weak<Shared<A, R>>,
    kind: Defer,
    inner: HandlerFn<A, R>,
) -> HandlerFn<A, R>
where
    A: Clone + 'static,
    R: 'static,
{
    Rc::new(move |call: &Call<'_, A, R>| {
        if let Some(shared) = shared.upgrade() {
            let job = Job {
                function: inner.clone(),
                args: call.args.to_vec(),
                event: call.event.clone(),
                target: call.target.cloned(),
                handler: call.handler.clone(),
            };
            shared.deferred.borrow_mut().queue_mut(kind).push_back(job);
            tracing::trace!(path = %call.handler.path, name = %call.handler.name, ?kind, "handler deferred");
        }
        Ok(Outcome::Deferred)
    })
}

/// Run the calls queued for `kind` before this pump started.
///
/// Stops at the first failing call; the calls it did not reach stay queued
/// ahead of anything queued in the meantime.
pub(crate) fn pump<A, R>(
    shared: &Shared<A, R>,
    kind: Defer,
    frame_time: Option<f64>,
) -> Result<usize, Error> {
    let mut jobs = core::mem::take(shared.deferred.borrow_mut().queue_mut(kind));
    let mut ran = 0;
    while let Some(job) = jobs.pop_front() {
        if let Err(err) = job.run(frame_time) {
            let mut queue = shared.deferred.borrow_mut();
            let queue = queue.queue_mut(kind);
            jobs.append(queue);
            *queue = jobs;
            return Err(err);
        }
        ran += 1;
    }
    Ok(ran)
}
