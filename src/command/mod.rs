//! Key/value command parsing and dispatch.
//!
//! Each reassembled line is a command of the form `KEY` or `KEY=VALUE`.
//! [`parse`] splits a line into a [`Command`]; [`CommandProcessor`] looks the
//! key up in a registry built once at construction and invokes either the
//! matching [`CommandHandler`] or the catch-all [`FallbackHandler`].

use std::fmt;

mod error;
mod handler;
mod processor;

pub use error::CommandError;
pub use handler::{CommandHandler, FallbackHandler, HandlerError, HandlerResult};
pub use processor::{CommandProcessor, CommandProcessorBuilder};

/// Transport a message arrived on.
///
/// Carried alongside each command for observability only; it never affects
/// routing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    /// Connectionless datagram transport (UDP).
    Datagram,
    /// Persistent stream transport (TCP).
    Stream,
}

impl Source {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Datagram => "UDP",
            Self::Stream => "TCP",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A parsed `KEY` or `KEY=VALUE` message.
///
/// `key` is never empty; both parts are trimmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command<'a> {
    /// Command name.
    pub key: &'a str,
    /// Value following the first `=`, if any.
    pub value: Option<&'a str>,
}

/// Parse one message into a [`Command`].
///
/// Returns `None` when the message is blank or its key trims to empty.
///
/// ```
/// use netoutput::command::{Command, parse};
///
/// assert_eq!(
///     parse(" mame_start = 1 "),
///     Some(Command {
///         key: "mame_start",
///         value: Some("1")
///     })
/// );
/// assert_eq!(parse("pause").map(|c| c.value), Some(None));
/// assert_eq!(parse("=onlyvalue"), None);
/// assert_eq!(parse("   "), None);
/// ```
#[must_use]
pub fn parse(message: &str) -> Option<Command<'_>> {
    let message = message.trim();
    if message.is_empty() {
        return None;
    }
    let (key, value) = match message.split_once('=') {
        Some((key, value)) => (key.trim(), Some(value.trim())),
        None => (message, None),
    };
    if key.is_empty() {
        return None;
    }
    Some(Command { key, value })
}
