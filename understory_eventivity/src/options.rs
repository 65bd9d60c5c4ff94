// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-binding and per-raise configuration.
//!
//! Options are plain value records. Contexts merge newly supplied options into
//! the ones they already carry: explicit fields (`name`, `own`) replace the
//! old value when set, and flags are unioned.

use alloc::string::String;

use bitflags::bitflags;

use crate::defer::Defer;
use crate::scope::OwnerKey;

bitflags! {
    /// Behaviour flags for a handler registration.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct HandlerFlags: u8 {
        /// Returning [`Outcome::Esc`](crate::Outcome::Esc) aborts the raise
        /// even if the raiser did not ask for escalation.
        const ESC = 1 << 0;
        /// Remove the handler right after its first invocation.
        const ONCE = 1 << 1;
        /// Run the handler on the next frame pump instead of inline.
        const FRAME = 1 << 2;
        /// Run the handler on the next tick pump instead of inline.
        const TICK = 1 << 3;
    }
}

bitflags! {
    /// Behaviour flags for a raise.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EventFlags: u8 {
        /// Honor [`Outcome::Esc`](crate::Outcome::Esc) from any handler.
        const ESC = 1 << 0;
        /// Remove every handler this raise invokes.
        const CLEAR = 1 << 1;
    }
}

/// Which firing tears a handler down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Owner {
    /// The path the handler itself is bound to.
    This,
    /// An explicit owner path or object.
    Key(OwnerKey),
}

impl From<&str> for Owner {
    fn from(path: &str) -> Self {
        Self::Key(OwnerKey::Path(path.into()))
    }
}

impl From<String> for Owner {
    fn from(path: String) -> Self {
        Self::Key(OwnerKey::Path(path))
    }
}

impl From<OwnerKey> for Owner {
    fn from(key: OwnerKey) -> Self {
        Self::Key(key)
    }
}

/// Options for a handler registration.
///
/// ```
/// use understory_eventivity::{HandlerFlags, HandlerOptions};
///
/// let opts = HandlerOptions::new().named("render").owned_by("logout").once();
/// assert_eq!(opts.name.as_deref(), Some("render"));
/// assert!(opts.flags.contains(HandlerFlags::ONCE));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HandlerOptions {
    /// Explicit handler name; otherwise `h<n>` is allocated.
    ///
    /// Named handlers also record their return value in the raise results.
    pub name: Option<String>,
    /// Owner whose firing unregisters the handler.
    pub own: Option<Owner>,
    /// Behaviour flags.
    pub flags: HandlerFlags,
}

impl HandlerOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Unregister the handler when `owner` fires.
    pub fn owned_by(mut self, owner: impl Into<Owner>) -> Self {
        self.own = Some(owner.into());
        self
    }

    /// Unregister the handler when its own path fires.
    pub fn owned_by_self(mut self) -> Self {
        self.own = Some(Owner::This);
        self
    }

    /// Honor [`Outcome::Esc`](crate::Outcome::Esc) from this handler.
    pub fn esc(mut self) -> Self {
        self.flags |= HandlerFlags::ESC;
        self
    }

    /// Fire at most once.
    pub fn once(mut self) -> Self {
        self.flags |= HandlerFlags::ONCE;
        self
    }

    /// Defer invocation to the next frame pump.
    pub fn on_frame(mut self) -> Self {
        self.flags |= HandlerFlags::FRAME;
        self
    }

    /// Defer invocation to the next tick pump.
    pub fn on_tick(mut self) -> Self {
        self.flags |= HandlerFlags::TICK;
        self
    }

    /// Merge `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        if other.name.is_some() {
            self.name.clone_from(&other.name);
        }
        if other.own.is_some() {
            self.own.clone_from(&other.own);
        }
        self.flags |= other.flags;
    }

    /// The deferral requested by the flags; frames win over ticks.
    pub fn defer(&self) -> Option<Defer> {
        if self.flags.contains(HandlerFlags::FRAME) {
            Some(Defer::Frame)
        } else if self.flags.contains(HandlerFlags::TICK) {
            Some(Defer::Tick)
        } else {
            None
        }
    }
}

/// Options for a raise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventOptions {
    /// Behaviour flags.
    pub flags: EventFlags,
}

impl EventOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Honor escalation from every handler.
    pub fn esc(mut self) -> Self {
        self.flags |= EventFlags::ESC;
        self
    }

    /// Remove every handler the raise invokes.
    pub fn clear(mut self) -> Self {
        self.flags |= EventFlags::CLEAR;
        self
    }

    /// Merge `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        self.flags |= other.flags;
    }
}

/// Options for an object-keyed handler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectOptions {
    /// Returning [`Outcome::Esc`](crate::Outcome::Esc) stops the remaining
    /// handlers of the same object.
    pub esc: bool,
    /// Owner whose firing unregisters the handler.
    pub own: Option<OwnerKey>,
}

impl ObjectOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Honor escalation from this handler.
    pub fn esc(mut self) -> Self {
        self.esc = true;
        self
    }

    /// Unregister the handler when `owner` fires.
    pub fn owned_by(mut self, owner: impl Into<OwnerKey>) -> Self {
        self.own = Some(owner.into());
        self
    }
}
