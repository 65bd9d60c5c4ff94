// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Nested reaction lists.
//!
//! A small helper for fanning one argument out to a tree of callbacks, e.g. a
//! list of reactions built up from several components, some of which
//! contribute lists of their own.

use alloc::boxed::Box;
use alloc::vec::Vec;

/// A callback or a nested list of callbacks.
pub enum Reaction<A> {
    /// A single callback.
    Fn(Box<dyn Fn(&A)>),
    /// A nested list, invoked in order.
    Nested(Vec<Reaction<A>>),
}

impl<A> Reaction<A> {
    /// Wrap a callback.
    pub fn new(f: impl Fn(&A) + 'static) -> Self {
        Self::Fn(Box::new(f))
    }

    fn invoke(&self, args: &A) {
        match self {
            Self::Fn(f) => f(args),
            Self::Nested(list) => list.iter().for_each(|r| r.invoke(args)),
        }
    }
}

impl<A> From<Vec<Self>> for Reaction<A> {
    fn from(list: Vec<Self>) -> Self {
        Self::Nested(list)
    }
}

impl<A> core::fmt::Debug for Reaction<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Fn(_) => f.write_str("Fn"),
            Self::Nested(list) => f.debug_list().entries(list).finish(),
        }
    }
}

/// Invoke `reactions` depth-first in order, then hand `args` back.
pub fn call<A>(reactions: &[Reaction<A>], args: A) -> A {
    for reaction in reactions {
        reaction.invoke(&args);
    }
    args
}
