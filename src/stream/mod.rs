//! Persistent outbound stream (TCP) transport.
//!
//! [`StreamConnector`] keeps dialing a fixed remote endpoint for as long as it
//! runs. While connected it reads through a [`LineCodec`] and hands each line
//! to the shared [`CommandProcessor`]. When the remote closes the connection
//! or a read fails, the connector goes straight back to dialing; failed
//! attempts are retried after a fixed interval, indefinitely.

use std::{convert::Infallible, io, sync::Arc, time::Duration};

use futures::StreamExt;
use log::{debug, error, info};
use tokio::{select, sync::watch, time::sleep};
use tokio_util::{codec::FramedRead, sync::CancellationToken};

use crate::{
    command::{CommandProcessor, Source},
    config::ReceiverConfig,
    framer::LineCodec,
    metrics,
    worker::{Lifecycle, StatePublisher, dispatch_line},
};

mod dialer;

pub use dialer::{Dialer, TcpDialer};

/// Lifecycle states of a [`StreamConnector`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectorState {
    /// No worker is running.
    Idle,
    /// Dialing, or waiting to dial again.
    Connecting,
    /// A connection is open and being read.
    Connected,
}

/// Receives newline-delimited commands from a remote stream server.
///
/// ```no_run
/// use std::sync::Arc;
///
/// use netoutput::{command::CommandProcessor, stream::StreamConnector};
///
/// # #[tokio::main]
/// # async fn main() {
/// let processor = Arc::new(CommandProcessor::builder().build());
/// let connector = StreamConnector::new(processor, "localhost", 8000);
/// connector.start();
/// // ...
/// connector.stop().await;
/// # }
/// ```
#[derive(Debug)]
pub struct StreamConnector<D = TcpDialer> {
    processor: Arc<CommandProcessor>,
    dialer: Arc<D>,
    retry_interval: Duration,
    buffer_size: usize,
    stop_timeout: Duration,
    lifecycle: Lifecycle<ConnectorState>,
}

impl StreamConnector<TcpDialer> {
    /// Create an idle connector for `host:port`.
    #[must_use]
    pub fn new(processor: Arc<CommandProcessor>, host: impl Into<String>, port: u16) -> Self {
        Self::with_dialer(processor, TcpDialer::new(host, port))
    }

    /// Create an idle connector from the shared configuration.
    #[must_use]
    pub fn from_config(processor: Arc<CommandProcessor>, config: &ReceiverConfig) -> Self {
        let config = config.clone().normalized();
        let dialer = TcpDialer::new(config.tcp_host, config.tcp_port)
            .connect_timeout(config.connect_timeout);
        Self::with_dialer(processor, dialer)
            .retry_interval(config.retry_interval)
            .buffer_size(config.buffer_size)
            .stop_timeout(config.stop_timeout)
    }
}

impl<D: Dialer> StreamConnector<D> {
    /// Create an idle connector that opens connections through `dialer`.
    #[must_use]
    pub fn with_dialer(processor: Arc<CommandProcessor>, dialer: D) -> Self {
        let defaults = ReceiverConfig::default();
        Self {
            processor,
            dialer: Arc::new(dialer),
            retry_interval: defaults.retry_interval,
            buffer_size: defaults.buffer_size,
            stop_timeout: defaults.stop_timeout,
            lifecycle: Lifecycle::new("TCP connector", ConnectorState::Idle),
        }
    }

    /// Set the pause between failed connection attempts.
    #[must_use]
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set the initial read buffer capacity.
    #[must_use]
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Set how long [`stop`](Self::stop) waits for the worker.
    #[must_use]
    pub fn stop_timeout(mut self, limit: Duration) -> Self {
        self.stop_timeout = limit;
        self
    }

    /// Start dialing in a background task.
    ///
    /// Never fails: every connection error is retried by the worker. Calling
    /// `start` while the connector is running logs a warning and does
    /// nothing else.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) {
        let options = LoopOptions {
            processor: Arc::clone(&self.processor),
            dialer: Arc::clone(&self.dialer),
            retry_interval: self.retry_interval,
            buffer_size: self.buffer_size,
        };
        let started = self
            .lifecycle
            .start(|token, publisher| Ok::<_, Infallible>(connect_loop(options, token, publisher)));
        if matches!(started, Ok(true)) {
            info!(
                "TCP connector started, will connect to {}.",
                self.dialer.target()
            );
        }
    }

    /// Stop the worker, closing any open connection.
    ///
    /// Returns promptly even while the worker is waiting to retry. Does
    /// nothing if the connector is idle.
    pub async fn stop(&self) {
        if self.lifecycle.stop(None, self.stop_timeout).await {
            metrics::set_stream_connected(false);
            info!("TCP connector stopped.");
        }
    }

    /// Returns `true` while the worker is running.
    #[must_use]
    pub fn is_running(&self) -> bool { self.lifecycle.is_running() }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectorState { self.lifecycle.state() }

    /// Watch lifecycle state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectorState> { self.lifecycle.subscribe() }

    /// Description of the remote endpoint.
    #[must_use]
    pub fn target(&self) -> String { self.dialer.target() }
}

struct LoopOptions<D> {
    processor: Arc<CommandProcessor>,
    dialer: Arc<D>,
    retry_interval: Duration,
    buffer_size: usize,
}

/// Why a connected session ended.
enum Disconnect {
    Remote,
    Failed(io::Error),
    Shutdown,
}

async fn connect_loop<D: Dialer>(
    options: LoopOptions<D>,
    shutdown: CancellationToken,
    publisher: StatePublisher<ConnectorState>,
) {
    let LoopOptions {
        processor,
        dialer,
        retry_interval,
        buffer_size,
    } = options;
    let target = dialer.target();
    info!("Attempting to connect to {target}.");

    while !shutdown.is_cancelled() {
        publisher.publish(ConnectorState::Connecting);
        metrics::inc_connect_attempts();
        let dialed = select! {
            biased;

            () = shutdown.cancelled() => break,
            res = dialer.dial() => res,
        };

        match dialed {
            Ok(stream) => {
                info!("Connected to {target}.");
                publisher.publish(ConnectorState::Connected);
                metrics::set_stream_connected(true);
                let outcome = read_lines(stream, &processor, buffer_size, &shutdown).await;
                metrics::set_stream_connected(false);
                match outcome {
                    Disconnect::Remote => info!("TCP connection closed by server."),
                    Disconnect::Failed(e) => {
                        metrics::inc_socket_errors(Source::Stream);
                        error!("TCP socket error: {e}");
                    }
                    Disconnect::Shutdown => break,
                }
            }
            Err(e) => {
                if is_peer_unavailable(&e) {
                    debug!("connection attempt failed: target={target}, error={e}");
                } else {
                    error!("TCP connection error: {e}");
                    info!("Retrying in {retry_interval:?}...");
                }
                select! {
                    biased;

                    () = shutdown.cancelled() => break,
                    () = sleep(retry_interval) => {}
                }
            }
        }
    }
}

async fn read_lines<S>(
    stream: S,
    processor: &Arc<CommandProcessor>,
    buffer_size: usize,
    shutdown: &CancellationToken,
) -> Disconnect
where
    S: tokio::io::AsyncRead + Unpin,
{
    let mut lines = FramedRead::with_capacity(stream, LineCodec::new(), buffer_size);
    loop {
        let next = select! {
            biased;

            () = shutdown.cancelled() => return Disconnect::Shutdown,
            next = lines.next() => next,
        };
        match next {
            Some(Ok(line)) => {
                debug!("TCP received: {line}.");
                if !dispatch_line(processor, line, Source::Stream, shutdown).await {
                    return Disconnect::Shutdown;
                }
            }
            Some(Err(e)) => return Disconnect::Failed(e),
            None => return Disconnect::Remote,
        }
    }
}

/// Failures expected while the remote end is down or unreachable.
fn is_peer_unavailable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}
