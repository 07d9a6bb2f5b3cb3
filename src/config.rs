//! Receiver configuration.
//!
//! [`ReceiverConfig`] collects the knobs for both transports. Defaults match
//! the emulator's stock network output settings: datagrams on UDP port 8001
//! and a stream server on `localhost:8000`.

use std::time::Duration;

/// Default local UDP port.
pub const DEFAULT_UDP_PORT: u16 = 8001;
/// Default TCP host to dial.
pub const DEFAULT_TCP_HOST: &str = "localhost";
/// Default TCP port to dial.
pub const DEFAULT_TCP_PORT: u16 = 8000;
/// Default receive buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
/// Largest receive buffer accepted; no UDP payload can exceed it.
pub const MAX_BUFFER_SIZE: usize = 65_535;

/// Configuration shared by the datagram listener and stream connector.
///
/// # Default Values
/// - `udp_port`: 8001
/// - `tcp_host`: `localhost`
/// - `tcp_port`: 8000
/// - `buffer_size`: 4096 bytes
/// - `retry_interval`: 100 milliseconds
/// - `connect_timeout`: 5 seconds
/// - `stop_timeout`: 5 seconds
///
/// # Invariants
/// After [`ReceiverConfig::normalized`], `buffer_size` lies in
/// `1..=MAX_BUFFER_SIZE` and every duration is at least 1 millisecond.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Local port the datagram listener binds.
    pub udp_port: u16,
    /// Host the stream connector dials.
    pub tcp_host: String,
    /// Port the stream connector dials.
    pub tcp_port: u16,
    /// Bytes read per receive call on either transport.
    pub buffer_size: usize,
    /// Pause between failed connection attempts.
    pub retry_interval: Duration,
    /// Upper bound on a single connection attempt.
    pub connect_timeout: Duration,
    /// Upper bound on waiting for a worker to exit during `stop()`.
    pub stop_timeout: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            udp_port: DEFAULT_UDP_PORT,
            tcp_host: DEFAULT_TCP_HOST.to_owned(),
            tcp_port: DEFAULT_TCP_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            retry_interval: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl ReceiverConfig {
    /// Set the local UDP port. Port `0` picks an ephemeral port.
    #[must_use]
    pub fn with_udp_port(mut self, port: u16) -> Self {
        self.udp_port = port;
        self
    }

    /// Set the TCP host and port to dial.
    #[must_use]
    pub fn with_tcp_target(mut self, host: impl Into<String>, port: u16) -> Self {
        self.tcp_host = host.into();
        self.tcp_port = port;
        self
    }

    /// Set the receive buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set the pause between failed connection attempts.
    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the per-attempt connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, limit: Duration) -> Self {
        self.connect_timeout = limit;
        self
    }

    /// Set how long `stop()` waits for a worker before aborting it.
    #[must_use]
    pub fn with_stop_timeout(mut self, limit: Duration) -> Self {
        self.stop_timeout = limit;
        self
    }

    /// Clamp values to workable bounds.
    ///
    /// Prevents accidental misconfiguration, such as a zero-sized buffer or a
    /// zero retry interval that would spin the connect loop.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use netoutput::config::ReceiverConfig;
    ///
    /// let cfg = ReceiverConfig::default()
    ///     .with_buffer_size(0)
    ///     .with_retry_interval(Duration::ZERO)
    ///     .normalized();
    /// assert_eq!(cfg.buffer_size, 1);
    /// assert_eq!(cfg.retry_interval, Duration::from_millis(1));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let floor = Duration::from_millis(1);
        self.buffer_size = self.buffer_size.clamp(1, MAX_BUFFER_SIZE);
        self.retry_interval = self.retry_interval.max(floor);
        self.connect_timeout = self.connect_timeout.max(floor);
        self.stop_timeout = self.stop_timeout.max(floor);
        self
    }
}
