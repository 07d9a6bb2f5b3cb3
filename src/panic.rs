//! Panic payload formatting.
//!
//! Command handlers run inside `catch_unwind`; a caught payload is turned
//! into text once so it can be logged by both `log` and `tracing`.

use std::{any::Any, borrow::Cow, fmt};

/// Text extracted from a panic payload.
///
/// `panic!` with a literal produces a `&'static str` payload and a formatted
/// `panic!` produces a `String`; anything else is reported as opaque.
///
/// ```
/// use netoutput::panic::format_panic;
///
/// assert_eq!(format_panic(Box::new("boom")).as_str(), "boom");
/// assert_eq!(format_panic(Box::new(String::from("bang"))).as_str(), "bang");
/// assert_eq!(format_panic(Box::new(5_u32)).as_str(), "<non-string panic payload>");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct PanicMessage(Cow<'static, str>);

impl PanicMessage {
    /// Extract the message carried by `payload`.
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        if let Some(s) = payload.downcast_ref::<&'static str>() {
            Self(Cow::Borrowed(*s))
        } else if let Some(s) = payload.downcast_ref::<String>() {
            Self(Cow::Owned(s.clone()))
        } else {
            Self(Cow::Borrowed("<non-string panic payload>"))
        }
    }

    /// The extracted text.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Create a [`PanicMessage`] from an owned payload returned by `catch_unwind`.
pub fn format_panic(panic: Box<dyn Any + Send>) -> PanicMessage {
    PanicMessage::from_payload(&*panic)
}
