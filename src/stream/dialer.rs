//! Outbound connection attempts for the stream connector.

use std::{io, time::Duration};

use async_trait::async_trait;
use tokio::{io::AsyncRead, net::TcpStream, time::timeout};

/// Opens one outbound stream per call.
///
/// The connector calls [`Dialer::dial`] once per attempt and retries on
/// error. Implementations must be cancellation-safe: dropping a pending
/// `dial()` future must not leak a half-open connection.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Byte stream produced by a successful dial.
    type Stream: AsyncRead + Unpin + Send + 'static;

    /// Make a single connection attempt.
    async fn dial(&self) -> io::Result<Self::Stream>;

    /// Human-readable description of the remote end, used in logs.
    fn target(&self) -> String;
}

/// Dials a TCP host and port with a bounded connect timeout.
///
/// The host is resolved on every attempt, so a peer that changes address
/// while the connector is retrying is still found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcpDialer {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpDialer {
    /// Create a dialer for `host:port` with a five second connect timeout.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Set the per-attempt connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, limit: Duration) -> Self {
        self.connect_timeout = limit;
        self
    }

    /// Remote host.
    #[must_use]
    pub fn host(&self) -> &str { &self.host }

    /// Remote port.
    #[must_use]
    pub const fn port(&self) -> u16 { self.port }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self) -> io::Result<TcpStream> {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match timeout(self.connect_timeout, connect).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect timed out after {:?}", self.connect_timeout),
            )),
        }
    }

    fn target(&self) -> String { format!("{}:{}", self.host, self.port) }
}
