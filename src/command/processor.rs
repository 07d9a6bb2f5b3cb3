//! Registry-backed dispatch of parsed commands.

use std::{
    collections::HashMap,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use log::{debug, error};

use super::{
    CommandError,
    CommandHandler,
    FallbackHandler,
    HandlerResult,
    Source,
    parse,
};
use crate::{
    metrics::{self, FailureKind},
    panic::format_panic,
};

/// Dispatches messages to the handler registered for their key.
///
/// The registry is fixed once [`CommandProcessorBuilder::build`] returns, so a
/// processor can be shared behind an [`Arc`] and called from both transports
/// concurrently without locking.
///
/// ```
/// use std::sync::{
///     Arc,
///     atomic::{AtomicUsize, Ordering},
/// };
///
/// use netoutput::command::{CommandProcessor, HandlerResult, Source};
///
/// let pauses = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&pauses);
/// let processor = CommandProcessor::builder()
///     .route("pause", move |_: Option<&str>, _: Source| -> HandlerResult {
///         counter.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     })
///     .expect("unique key")
///     .build();
///
/// processor.process("pause=1\r", Source::Datagram);
/// processor.process("   ", Source::Datagram);
/// assert_eq!(pauses.load(Ordering::SeqCst), 1);
/// ```
pub struct CommandProcessor {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
    fallback: Arc<dyn FallbackHandler>,
}

impl CommandProcessor {
    /// Start building a processor.
    #[must_use]
    pub fn builder() -> CommandProcessorBuilder { CommandProcessorBuilder::new() }

    /// Parse `message` and invoke exactly one handler for it.
    ///
    /// Blank messages and messages with an empty key are skipped silently.
    /// Handler errors and panics are logged and swallowed so one bad message
    /// cannot stop the transport that delivered it.
    pub fn process(&self, message: &str, source: Source) {
        let Some(command) = parse(message) else {
            return;
        };
        metrics::inc_messages(source);

        let (key, value) = (command.key, command.value);
        if let Some(handler) = self.handlers.get(key) {
            debug!("Processing static key from {source}: {key} = {value:?}");
            invoke(key, source, || handler.handle(value, source));
        } else {
            debug!("Processing dynamic key from {source}: {key} = {value:?}");
            invoke(key, source, || self.fallback.handle(key, value, source));
        }
    }

    /// Returns `true` if a dedicated handler is registered for `key`.
    #[must_use]
    pub fn has_handler(&self, key: &str) -> bool { self.handlers.contains_key(key) }

    /// Keys with a dedicated handler, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> { self.handlers.keys().map(String::as_str) }
}

impl fmt::Debug for CommandProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("CommandProcessor")
            .field("handlers", &keys)
            .field("fallback", &"<handler>")
            .finish()
    }
}

fn invoke<F>(key: &str, source: Source, call: F)
where
    F: FnOnce() -> HandlerResult,
{
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            metrics::inc_handler_failures(FailureKind::Error);
            error!("command handler failed: key={key}, source={source}, error={e}");
        }
        Err(panic) => {
            metrics::inc_handler_failures(FailureKind::Panic);
            let panic_msg = format_panic(panic);
            // Emit via both `log` and `tracing` for tests that capture either.
            error!("command handler panicked: key={key}, source={source}, panic={panic_msg}");
            tracing::error!(panic = %panic_msg, key, %source, "command handler panicked");
        }
    }
}

/// Builder for [`CommandProcessor`].
pub struct CommandProcessorBuilder {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
    fallback: Option<Arc<dyn FallbackHandler>>,
}

impl CommandProcessorBuilder {
    /// Create a builder with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: None,
        }
    }

    /// Register `handler` for messages whose key equals `key` exactly.
    ///
    /// Closures need their argument types spelled out, for example
    /// `|value: Option<&str>, source: Source| -> HandlerResult { .. }`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::DuplicateRoute`] if `key` is already
    /// registered, [`CommandError::EmptyKey`] if it is blank and
    /// [`CommandError::UnreachableKey`] if it has surrounding whitespace or
    /// contains `=`.
    pub fn route<H>(mut self, key: impl Into<String>, handler: H) -> Result<Self, CommandError>
    where
        H: CommandHandler,
    {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(CommandError::EmptyKey);
        }
        if key.trim() != key || key.contains('=') {
            return Err(CommandError::UnreachableKey(key));
        }
        if self.handlers.contains_key(&key) {
            return Err(CommandError::DuplicateRoute(key));
        }
        self.handlers.insert(key, Arc::new(handler));
        Ok(self)
    }

    /// Set the handler used for keys without a dedicated registration.
    ///
    /// Without one, unknown keys are logged at debug level and dropped.
    #[must_use]
    pub fn fallback<H>(mut self, handler: H) -> Self
    where
        H: FallbackHandler,
    {
        self.fallback = Some(Arc::new(handler));
        self
    }

    /// Freeze the registry.
    #[must_use]
    pub fn build(self) -> CommandProcessor {
        CommandProcessor {
            handlers: self.handlers,
            fallback: self
                .fallback
                .unwrap_or_else(|| Arc::new(ignore_unknown) as Arc<dyn FallbackHandler>),
        }
    }
}

impl Default for CommandProcessorBuilder {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for CommandProcessorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandProcessorBuilder")
            .field("handlers", &self.handlers.len())
            .field("fallback", &self.fallback.as_ref().map(|_| "Some(<handler>)"))
            .finish()
    }
}

fn ignore_unknown(key: &str, _value: Option<&str>, source: Source) -> HandlerResult {
    debug!("no handler for key: key={key}, source={source}");
    Ok(())
}
