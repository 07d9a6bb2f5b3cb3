//! Connectionless datagram (UDP) transport.
//!
//! [`DatagramListener`] binds a local UDP port and runs a background task that
//! receives datagrams, reassembles them into lines with one [`Framer`] per
//! sending peer, and hands each line to the shared [`CommandProcessor`].
//!
//! Reassembly is keyed by peer address so that two senders whose partial
//! lines interleave can never corrupt each other's messages. A peer's framer
//! is dropped as soon as it holds no partial line, so one-message-per-packet
//! senders leave no state behind. At most [`MAX_PEERS`] partial lines are
//! kept; beyond that the least recently heard peer loses its partial line.

use std::{
    collections::HashMap,
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket as StdUdpSocket},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use log::{debug, error, info};
use tokio::{net::UdpSocket, select, sync::watch};
use tokio_util::sync::CancellationToken;

use crate::{
    command::{CommandProcessor, Source},
    config::ReceiverConfig,
    error::{ReceiverError, Result},
    framer::Framer,
    metrics,
    worker::{Lifecycle, dispatch_line},
};


/// Most peers whose partial lines are kept at once.
pub const MAX_PEERS: usize = 1024;

/// Lifecycle states of a [`DatagramListener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerState {
    /// No worker is running.
    Idle,
    /// The socket is bound and datagrams are being received.
    Running,
    /// `stop()` was called and the worker is winding down.
    Stopping,
}

/// Receives newline-delimited commands over UDP.
///
/// ```no_run
/// use std::sync::Arc;
///
/// use netoutput::{command::CommandProcessor, datagram::DatagramListener};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), netoutput::ReceiverError> {
/// let processor = Arc::new(CommandProcessor::builder().build());
/// let listener = DatagramListener::new(processor, 8001);
/// listener.start()?;
/// // ...
/// listener.stop().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DatagramListener {
    processor: Arc<CommandProcessor>,
    bind_ip: IpAddr,
    port: u16,
    buffer_size: usize,
    stop_timeout: Duration,
    local_addr: Mutex<Option<SocketAddr>>,
    lifecycle: Lifecycle<ListenerState>,
}

impl DatagramListener {
    /// Create an idle listener for `port` on all interfaces.
    #[must_use]
    pub fn new(processor: Arc<CommandProcessor>, port: u16) -> Self {
        let defaults = ReceiverConfig::default();
        Self {
            processor,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port,
            buffer_size: defaults.buffer_size,
            stop_timeout: defaults.stop_timeout,
            local_addr: Mutex::new(None),
            lifecycle: Lifecycle::new("UDP receiver", ListenerState::Idle),
        }
    }

    /// Create an idle listener from the shared configuration.
    #[must_use]
    pub fn from_config(processor: Arc<CommandProcessor>, config: &ReceiverConfig) -> Self {
        let config = config.clone().normalized();
        Self::new(processor, config.udp_port)
            .buffer_size(config.buffer_size)
            .stop_timeout(config.stop_timeout)
    }

    /// Bind to `ip` instead of all interfaces.
    #[must_use]
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Set the receive buffer size. Longer datagrams are truncated.
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

    /// Bind the socket and start receiving in a background task.
    ///
    /// Calling `start` while the listener is running logs a warning and does
    /// nothing else. A listener whose worker ended after a socket error may be
    /// started again.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::Bind`] if the port cannot be bound.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let addr = SocketAddr::new(self.bind_ip, self.port);
        let started = self.lifecycle.start(|token, publisher| {
            let socket = bind_socket(addr).map_err(|source| ReceiverError::Bind {
                transport: Source::Datagram,
                addr,
                source,
            })?;
            let local = socket.local_addr().ok();
            *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = local;
            info!("UDP socket bound to {}.", local.unwrap_or(addr));
            publisher.publish(ListenerState::Running);
            Ok::<_, ReceiverError>(receive_loop(
                socket,
                Arc::clone(&self.processor),
                self.buffer_size,
                token,
            ))
        })?;
        if started {
            info!("UDP receiver started on port {}.", self.port);
        }
        Ok(())
    }

    /// Stop the worker and close the socket.
    ///
    /// Returns once the worker has exited, or after the stop timeout when the
    /// worker is aborted instead. Does nothing if the listener is idle.
    pub async fn stop(&self) {
        if self
            .lifecycle
            .stop(Some(ListenerState::Stopping), self.stop_timeout)
            .await
        {
            *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = None;
            info!("UDP receiver stopped.");
        }
    }

    /// Returns `true` while the worker is receiving.
    #[must_use]
    pub fn is_running(&self) -> bool { self.lifecycle.is_running() }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ListenerState { self.lifecycle.state() }

    /// Watch lifecycle state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ListenerState> { self.lifecycle.subscribe() }

    /// Address the socket is bound to, while running.
    ///
    /// Returns `None` once the worker has exited, including after a fatal
    /// socket error.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        if !self.lifecycle.is_running() {
            return None;
        }
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configured port.
    #[must_use]
    pub const fn port(&self) -> u16 { self.port }
}

fn bind_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let std_socket = StdUdpSocket::bind(addr)?;
    std_socket.set_nonblocking(true)?;
    UdpSocket::from_std(std_socket)
}

async fn receive_loop(
    socket: UdpSocket,
    processor: Arc<CommandProcessor>,
    buffer_size: usize,
    shutdown: CancellationToken,
) {
    let mut buf = vec![0_u8; buffer_size];
    let mut framers = PeerFramers::new(MAX_PEERS);

    loop {
        let received = select! {
            biased;

            () = shutdown.cancelled() => break,
            res = socket.recv_from(&mut buf) => res,
        };
        match received {
            Ok((0, _)) => {}
            Ok((len, peer)) => {
                for line in framers.feed(peer, &buf[..len]) {
                    debug!("UDP received from {peer}: {line}.");
                    if !dispatch_line(&processor, line, Source::Datagram, &shutdown).await {
                        return;
                    }
                }
            }
            Err(_) if shutdown.is_cancelled() => break,
            Err(e) if is_transient(&e) => debug!("UDP receive interrupted: error={e}"),
            Err(e) => {
                metrics::inc_socket_errors(Source::Datagram);
                error!("UDP socket error: {e}");
                break;
            }
        }
    }
}

/// One [`Framer`] per peer that has sent a partial line.
#[derive(Debug)]
struct PeerFramers {
    peers: HashMap<SocketAddr, PeerFramer>,
    capacity: usize,
    tick: u64,
}

#[derive(Debug, Default)]
struct PeerFramer {
    framer: Framer,
    last_seen: u64,
}

impl PeerFramers {
    fn new(capacity: usize) -> Self {
        Self {
            peers: HashMap::new(),
            capacity: capacity.max(1),
            tick: 0,
        }
    }

    /// Reassemble `payload` from `peer`, returning the lines it completes.
    ///
    /// The peer's framer is dropped once no partial line is pending. A `\n`
    /// that would have completed a `\r\n` split across datagrams then
    /// arrives as a blank line, which the processor skips anyway.
    fn feed(&mut self, peer: SocketAddr, payload: &[u8]) -> Vec<String> {
        self.tick += 1;
        if !self.peers.contains_key(&peer) && self.peers.len() >= self.capacity {
            self.evict_least_recent();
        }
        let entry = self.peers.entry(peer).or_default();
        entry.last_seen = self.tick;
        let lines: Vec<String> = entry.framer.feed(payload).collect();
        if entry.framer.buffered().is_empty() {
            self.peers.remove(&peer);
        }
        lines
    }

    fn evict_least_recent(&mut self) {
        let Some(oldest) = self
            .peers
            .iter()
            .min_by_key(|(_, entry)| entry.last_seen)
            .map(|(addr, _)| *addr)
        else {
            return;
        };
        if let Some(stale) = self.peers.remove(&oldest) {
            debug!(
                "dropping partial line from UDP peer: peer={oldest}, bytes={}",
                stale.framer.buffered().len()
            );
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize { self.peers.len() }
}

/// Errors that do not indicate a broken socket.
///
/// Windows reports an ICMP port-unreachable for an earlier send as
/// `ConnectionReset` on the next receive.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::ConnectionReset
    )
}
