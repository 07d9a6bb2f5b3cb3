//! Handler traits invoked by the command processor.

use super::Source;

/// Error type returned by handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Handler bound to one specific key.
///
/// Implemented for any `Fn(Option<&str>, Source) -> HandlerResult` closure.
pub trait CommandHandler: Send + Sync + 'static {
    /// Handle a command whose key matched this handler's registration.
    ///
    /// # Errors
    ///
    /// Errors are logged by the processor and never reach the transport.
    fn handle(&self, value: Option<&str>, source: Source) -> HandlerResult;
}

impl<F> CommandHandler for F
where
    F: Fn(Option<&str>, Source) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, value: Option<&str>, source: Source) -> HandlerResult { self(value, source) }
}

/// Catch-all handler for keys with no dedicated registration.
///
/// Implemented for any `Fn(&str, Option<&str>, Source) -> HandlerResult`
/// closure.
pub trait FallbackHandler: Send + Sync + 'static {
    /// Handle a command with an unregistered key.
    ///
    /// # Errors
    ///
    /// Errors are logged by the processor and never reach the transport.
    fn handle(&self, key: &str, value: Option<&str>, source: Source) -> HandlerResult;
}

impl<F> FallbackHandler for F
where
    F: Fn(&str, Option<&str>, Source) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, key: &str, value: Option<&str>, source: Source) -> HandlerResult {
        self(key, value, source)
    }
}
