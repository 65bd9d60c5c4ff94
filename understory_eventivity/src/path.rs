// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Path accumulation shared by handler and event contexts.
//!
//! A context builds a dot-path one segment at a time and completes it with a
//! terminal call (`bind`, `raise`, ...). Contexts are single-path and mutable:
//! [`seg`](PathContext::seg) extends the prefix in place. To address several
//! unrelated paths from one starting point, fork it.
//!
//! ## Virgin contexts
//!
//! A context vended by [`Bus::handler`](crate::Bus::handler) or
//! [`Bus::event`](crate::Bus::event) has not been walked yet; its prefix is
//! `None`, which is distinct from the empty live prefix `Some("")`. The first
//! segment on a virgin context always forks first, so a root handle can be
//! kept around and reused by many call sites:
//!
//! ```
//! use understory_eventivity::{Bus, HandlerOptions, PathContext};
//!
//! let bus: Bus<u32> = Bus::new();
//! let handler = bus.handler(HandlerOptions::new());
//! let a = handler.on("a").seg("b");
//! let c = handler.on("c");
//! assert_eq!(a.prefix(), Some("a.b"));
//! assert_eq!(c.prefix(), Some("c"));
//! assert_eq!(handler.prefix(), None);
//! ```
//!
//! ## Branching
//!
//! [`branch`](PathContext::branch) (also reachable as the reserved segment
//! `"$"`) forks a live context keeping its prefix, so a partially built path
//! can be aliased and extended in several directions.

use alloc::string::String;

/// Reserved segment that branches instead of extending the path.
pub const BRANCH: &str = "$";

/// Prefix state of a context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathState {
    prefix: Option<String>,
}

impl PathState {
    /// A virgin state: no segment yet.
    pub fn virgin() -> Self {
        Self { prefix: None }
    }

    /// The accumulated prefix, `None` when virgin.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Copy for a fork: a forked state is always live.
    pub fn forked(&self) -> Self {
        Self {
            prefix: Some(self.prefix.clone().unwrap_or_default()),
        }
    }

    /// Reset to the empty live prefix.
    pub fn reset(&mut self) {
        self.prefix = Some(String::new());
    }

    fn extend(&mut self, segment: &str) {
        let prefix = self.prefix.get_or_insert_with(String::new);
        if !prefix.is_empty() {
            prefix.push('.');
        }
        prefix.push_str(segment);
    }
}

/// A context that accumulates a dot-path.
///
/// Implementors supply access to their [`PathState`], a [`fork`](Self::fork)
/// and optionally an [`update`](Self::update) hook; segment handling is
/// provided.
pub trait PathContext: Sized {
    /// The prefix state.
    fn path(&self) -> &PathState;

    /// Mutable prefix state.
    fn path_mut(&mut self) -> &mut PathState;

    /// A new, independent context sharing the same scope and copying this
    /// one's fields. The fork's prefix is live even if this one is virgin.
    fn fork(&self) -> Self;

    /// Called after each segment is appended.
    fn update(&mut self) {}

    /// The accumulated prefix, `None` when virgin.
    fn prefix(&self) -> Option<&str> {
        self.path().prefix()
    }

    /// Append `segment` to the path.
    ///
    /// On a virgin context this forks first. The reserved segment
    /// [`BRANCH`] branches instead.
    fn seg(mut self, segment: &str) -> Self {
        if self.prefix().is_none() {
            return self.fork().seg(segment);
        }
        if segment == BRANCH {
            return self.branch();
        }
        self.path_mut().extend(segment);
        self.update();
        self
    }

    /// Append each segment in turn.
    fn segs<'s>(self, segments: impl IntoIterator<Item = &'s str>) -> Self {
        segments.into_iter().fold(self, Self::seg)
    }

    /// Fork, keeping the current prefix.
    fn branch(&self) -> Self {
        self.fork()
    }

    /// Branch and append `segment` without consuming this context.
    fn on(&self, segment: &str) -> Self {
        self.branch().seg(segment)
    }
}
