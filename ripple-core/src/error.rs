//! Errors and development warnings.
//!
//! Misuse of the reactive API (writing through a readonly view, using an
//! invalid key, running a stopped scope) never panics. The operation is
//! refused or ignored and a `ReactiveError` is reported through `warn`,
//! which logs it under the `ripple::reactivity` target and forwards it to
//! the configured warn handler. Warnings are only emitted in debug builds.

use thiserror::Error;

use crate::reactive::runtime::try_with_runtime;

/// Diagnostics reported by the reactive layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    #[error("set operation on key \"{key}\" failed: target is readonly")]
    ReadonlyWrite { key: String },

    #[error("delete operation on key \"{key}\" failed: target is readonly")]
    ReadonlyDelete { key: String },

    #[error("{op} operation failed: target is readonly")]
    ReadonlyCollection { op: &'static str },

    #[error("value cannot be made reactive: {type_name}")]
    NotObservable { type_name: &'static str },

    #[error("invalid key {key} for {kind}")]
    InvalidKey { key: String, kind: &'static str },

    #[error("{op} is not supported on {kind}")]
    UnsupportedOperation {
        op: &'static str,
        kind: &'static str,
    },

    #[error(
        "reactive {kind} contains both the raw and reactive versions of the same object as keys, \
         which can lead to inconsistencies"
    )]
    DuplicateIdentityKey { kind: &'static str },

    #[error("write operation failed: computed value is readonly")]
    ReadonlyComputed,

    #[error("cannot run an inactive effect scope")]
    InactiveScope,

    #[error("on_scope_dispose() was called with no active effect scope to attach to")]
    NoActiveScope,

    #[error("computed value was read during its own first evaluation")]
    CyclicComputed,
}

/// Result type for fallible reactive reads.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Report a development warning.
pub(crate) fn warn(error: ReactiveError) {
    if !cfg!(debug_assertions) {
        return;
    }
    tracing::warn!(target: "ripple::reactivity", %error, "reactivity warning");

    let handler = try_with_runtime(|rt| rt.config.warn_handler.clone()).flatten();
    if let Some(handler) = handler {
        handler(&error);
    }
}
