//! Errors surfaced to the code driving the receiver.
//!
//! Only startup can fail from the caller's point of view. Everything that
//! goes wrong after a worker is running is logged and handled inside the
//! worker, so runtime failures never reach this type.

use std::{io, net::SocketAddr};

use thiserror::Error;

use crate::command::Source;

/// Errors returned by receiver lifecycle operations.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// Binding the local socket failed at startup.
    #[error("failed to bind {transport} socket on {addr}: {source}")]
    Bind {
        /// Transport whose socket failed to bind.
        transport: Source,
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Installing the shutdown signal handler failed.
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[source] io::Error),
}

/// Result type for receiver lifecycle operations.
pub type Result<T, E = ReceiverError> = std::result::Result<T, E>;
