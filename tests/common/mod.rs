//! Shared utilities for integration tests.
//!
//! Provides a processor that records every dispatched command and helpers
//! for binding loopback sockets on unused ports.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
    time::Duration,
};

use netoutput::{CommandProcessor, HandlerResult, Source};
use rstest::fixture;
use tokio::net::{TcpListener, UdpSocket};

/// One dispatched command as seen by a handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seen {
    pub key: String,
    pub value: Option<String>,
    pub source: Source,
}

impl Seen {
    pub fn new(key: &str, value: Option<&str>, source: Source) -> Self {
        Self {
            key: key.to_owned(),
            value: value.map(str::to_owned),
            source,
        }
    }
}

/// Collects every command routed through [`Collector::processor`].
#[derive(Clone, Debug, Default)]
pub struct Collector {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Collector {
    /// Processor with a `pause` route and a fallback, both recording here.
    pub fn processor(&self) -> CommandProcessor {
        let routed = Arc::clone(&self.seen);
        let fallback = Arc::clone(&self.seen);
        CommandProcessor::builder()
            .route(
                "pause",
                move |value: Option<&str>, source: Source| -> HandlerResult {
                    routed
                        .lock()
                        .expect("lock")
                        .push(Seen::new("pause", value, source));
                    Ok(())
                },
            )
            .expect("route pause")
            .fallback(
                move |key: &str, value: Option<&str>, source: Source| -> HandlerResult {
                    fallback
                        .lock()
                        .expect("lock")
                        .push(Seen::new(key, value, source));
                    Ok(())
                },
            )
            .build()
    }

    pub fn seen(&self) -> Vec<Seen> { self.seen.lock().expect("lock").clone() }

    /// Poll until at least `count` commands arrived or two seconds pass.
    pub async fn wait_for(&self, count: usize) -> Vec<Seen> {
        let _ = tokio::time::timeout(Duration::from_secs(2), async {
            while self.seen.lock().expect("lock").len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        self.seen()
    }
}

#[fixture]
pub fn collector() -> Collector { Collector::default() }

/// Bind a TCP server on an unused loopback port.
pub async fn loopback_server() -> TcpListener {
    TcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
        .await
        .expect("failed to bind server")
}

/// Bind a UDP sender on an unused loopback port.
pub async fn loopback_sender() -> UdpSocket {
    UdpSocket::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
        .await
        .expect("failed to bind sender")
}
