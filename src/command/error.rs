//! Errors raised while building a [`CommandProcessor`](super::CommandProcessor).

use thiserror::Error;

/// Registration-time errors for the handler registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// A handler for this key was already registered.
    #[error("handler for key `{0}` was already registered")]
    DuplicateRoute(String),
    /// Keys are trimmed before lookup, so a blank key could never match.
    #[error("handler keys must not be blank")]
    EmptyKey,
    /// Lookup uses the trimmed text before the first `=`, so a key with
    /// surrounding whitespace or an `=` could never match.
    #[error("handler key `{0}` has surrounding whitespace or contains `=`")]
    UnreachableKey(String),
}
