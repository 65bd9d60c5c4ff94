// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types: handler calls, outcomes, and results.

use alloc::rc::Rc;
use alloc::string::String;
use core::any::Any;

use hashbrown::HashMap;

use crate::error::BoxError;
use crate::event::EventContext;
use crate::options::HandlerOptions;

/// Opaque value passed alongside event arguments, typically the object that
/// caused the event.
pub type Target = Rc<dyn Any>;

/// Stored handler function.
pub type HandlerFn<A, R> = Rc<dyn Fn(&Call<'_, A, R>) -> Result<Outcome<R>, BoxError>>;

/// Named handler results collected during one raise.
///
/// Only handlers registered with [`HandlerOptions::named`] record a result.
pub type Results<R> = HashMap<String, Outcome<R>>;

/// What a handler returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<R> {
    /// Ordinary return value.
    Value(R),
    /// Escalation sentinel: aborts the rest of the raise when either the
    /// raise or the handler opted in.
    Esc,
    /// The call was queued for a later frame or tick.
    Deferred,
}

impl<R> Outcome<R> {
    /// Returns the value, if this is [`Outcome::Value`].
    pub fn value(&self) -> Option<&R> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Returns `true` for [`Outcome::Esc`].
    pub fn is_esc(&self) -> bool {
        matches!(self, Self::Esc)
    }
}

/// Conversion from a handler's return value into an [`Outcome`].
///
/// Handlers may return an [`Outcome`] directly, or a `Result` whose error
/// converts into [`BoxError`] when they can fail.
pub trait IntoOutcome<R> {
    /// Convert into an outcome or a handler error.
    fn into_outcome(self) -> Result<Outcome<R>, BoxError>;
}

impl<R> IntoOutcome<R> for Outcome<R> {
    fn into_outcome(self) -> Result<Outcome<R>, BoxError> {
        Ok(self)
    }
}

impl<R, E: Into<BoxError>> IntoOutcome<R> for Result<Outcome<R>, E> {
    fn into_outcome(self) -> Result<Outcome<R>, BoxError> {
        self.map_err(Into::into)
    }
}

/// Wrap a closure into a stored [`HandlerFn`].
pub fn handler_fn<A, R, F, O>(f: F) -> HandlerFn<A, R>
where
    F: Fn(&Call<'_, A, R>) -> O + 'static,
    O: IntoOutcome<R>,
{
    Rc::new(move |call: &Call<'_, A, R>| f(call).into_outcome())
}

/// Identity of the handler being invoked, with its options as of fire time.
#[derive(Clone, Debug)]
pub struct HandlerInfo {
    /// Path the handler is bound to.
    pub path: String,
    /// Registered name (explicit or `h<n>`).
    pub name: String,
    /// Options read from the registering context when the handler fired.
    pub options: HandlerOptions,
}

/// The argument every path handler receives.
pub struct Call<'a, A, R> {
    /// Event arguments.
    pub args: &'a [A],
    /// The raising context.
    pub event: &'a EventContext<A, R>,
    /// Optional target passed with the raise.
    pub target: Option<&'a Target>,
    /// The handler being invoked.
    pub handler: &'a HandlerInfo,
    /// Frame timestamp for calls deferred to a frame.
    pub frame_time: Option<f64>,
}

impl<A, R> core::fmt::Debug for Call<'_, A, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Call")
            .field("args", &self.args.len())
            .field("events", &self.event.events())
            .field("has_target", &self.target.is_some())
            .field("handler", self.handler)
            .field("frame_time", &self.frame_time)
            .finish()
    }
}
