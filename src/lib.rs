//! Public API for the `netoutput` library.
//!
//! Receives newline-delimited `KEY` / `KEY=VALUE` commands from two
//! transports at once: a UDP listener and a persistent outbound TCP
//! connection. Both feed a shared [`CommandProcessor`] that dispatches each
//! command to a registered handler or a fallback.

pub mod command;
pub mod config;
pub mod datagram;
pub mod error;
pub mod framer;
pub mod handlers;
pub mod metrics;
pub mod panic;
pub mod receiver;
pub mod stream;
mod worker;

#[cfg(test)]
mod test_util;

pub use command::{
    Command,
    CommandError,
    CommandHandler,
    CommandProcessor,
    CommandProcessorBuilder,
    FallbackHandler,
    HandlerError,
    HandlerResult,
    Source,
};
pub use config::ReceiverConfig;
pub use datagram::{DatagramListener, ListenerState};
pub use error::{ReceiverError, Result};
pub use framer::{Framer, LineCodec};
pub use receiver::Receiver;
pub use stream::{ConnectorState, Dialer, StreamConnector, TcpDialer};
