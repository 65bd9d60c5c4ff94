// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for handler faults surfaced by dispatch.

use alloc::boxed::Box;
use alloc::string::String;

/// Boxed error returned by a failing handler.
pub type BoxError = Box<dyn core::error::Error + 'static>;

/// Errors surfaced by raising events or pumping deferred calls.
///
/// The bus never isolates handlers from each other: the first failing handler
/// aborts the rest of the raise and its error is returned to the raiser.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A path handler returned an error.
    #[error("handler `{name}` at `{path}` failed")]
    Handler {
        /// Path the handler is bound to.
        path: String,
        /// Name of the failing handler.
        name: String,
        /// Error returned by the handler.
        #[source]
        source: BoxError,
    },
    /// An object-keyed handler returned an error.
    #[error("object handler {id} failed")]
    ObjectHandler {
        /// Id allocated when the handler was bound.
        id: u64,
        /// Error returned by the handler.
        #[source]
        source: BoxError,
    },
}
