//! Metric helpers for `netoutput`.
//!
//! This module defines metric names and thin helpers wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to no-ops.

use crate::command::Source;

/// Name of the counter tracking dispatched messages.
pub const MESSAGES_TOTAL: &str = "netoutput_messages_total";
/// Name of the counter tracking handler errors and panics.
pub const HANDLER_FAILURES_TOTAL: &str = "netoutput_handler_failures_total";
/// Name of the counter tracking outbound connection attempts.
pub const CONNECT_ATTEMPTS_TOTAL: &str = "netoutput_connect_attempts_total";
/// Name of the gauge that is `1` while the stream transport is connected.
pub const STREAM_CONNECTED: &str = "netoutput_stream_connected";
/// Name of the counter tracking socket errors that ended a receive loop.
pub const SOCKET_ERRORS_TOTAL: &str = "netoutput_socket_errors_total";

/// How a command handler failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The handler returned an error.
    Error,
    /// The handler panicked.
    Panic,
}

impl FailureKind {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            FailureKind::Error => "error",
            FailureKind::Panic => "panic",
        }
    }
}

/// Record a message dispatched from `source`.
pub fn inc_messages(source: Source) {
    #[cfg(feature = "metrics")]
    metrics::counter!(MESSAGES_TOTAL, "source" => source.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = source;
}

/// Record a handler failure.
pub fn inc_handler_failures(kind: FailureKind) {
    #[cfg(feature = "metrics")]
    metrics::counter!(HANDLER_FAILURES_TOTAL, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record an outbound connection attempt.
pub fn inc_connect_attempts() {
    #[cfg(feature = "metrics")]
    metrics::counter!(CONNECT_ATTEMPTS_TOTAL).increment(1);
}

/// Mark the stream transport as connected or disconnected.
pub fn set_stream_connected(connected: bool) {
    #[cfg(feature = "metrics")]
    metrics::gauge!(STREAM_CONNECTED).set(if connected { 1.0 } else { 0.0 });
    #[cfg(not(feature = "metrics"))]
    let _ = connected;
}

/// Record a socket error that ended the receive loop for `source`.
pub fn inc_socket_errors(source: Source) {
    #[cfg(feature = "metrics")]
    metrics::counter!(SOCKET_ERRORS_TOTAL, "source" => source.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = source;
}
