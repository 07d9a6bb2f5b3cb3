//! Test helpers shared across modules.

use std::{
    net::{Ipv4Addr, SocketAddr, UdpSocket as StdUdpSocket},
    sync::{Arc, Mutex, MutexGuard, OnceLock},
    time::Duration,
};

use logtest::Logger;
use rstest::fixture;

pub use crate::handlers::STATIC_KEYS;
use crate::command::{CommandProcessor, HandlerResult, Source};

/// One handler invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    /// `true` when the dedicated handler ran, `false` for the fallback.
    pub registered: bool,
    pub key: String,
    pub value: Option<String>,
    pub source: Source,
}

impl Call {
    pub fn registered(key: &str, value: Option<&str>, source: Source) -> Self {
        Self {
            registered: true,
            key: key.to_owned(),
            value: value.map(str::to_owned),
            source,
        }
    }

    pub fn fallback(key: &str, value: Option<&str>, source: Source) -> Self {
        Self {
            registered: false,
            ..Self::registered(key, value, source)
        }
    }
}

/// Records every handler invocation for later assertions.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
    /// Build a processor routing [`STATIC_KEYS`] and the fallback into this
    /// recorder.
    pub fn processor(&self) -> CommandProcessor {
        let mut builder = CommandProcessor::builder();
        for key in STATIC_KEYS {
            let calls = Arc::clone(&self.calls);
            builder = builder
                .route(
                    key,
                    move |value: Option<&str>, source: Source| -> HandlerResult {
                        calls
                            .lock()
                            .expect("lock")
                            .push(Call::registered(key, value, source));
                        Ok(())
                    },
                )
                .expect("static keys are unique");
        }
        let calls = Arc::clone(&self.calls);
        builder
            .fallback(
                move |key: &str, value: Option<&str>, source: Source| -> HandlerResult {
                    calls
                        .lock()
                        .expect("lock")
                        .push(Call::fallback(key, value, source));
                    Ok(())
                },
            )
            .build()
    }

    pub fn calls(&self) -> Vec<Call> { self.calls.lock().expect("lock").clone() }

    /// Poll until at least `count` calls were recorded or `limit` elapses.
    pub async fn wait_for(&self, count: usize, limit: Duration) -> Vec<Call> {
        let _ = tokio::time::timeout(limit, async {
            while self.calls.lock().expect("lock").len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        self.calls()
    }
}

#[fixture]
pub fn recorder() -> Recorder { Recorder::default() }

/// Address of a UDP port that was free a moment ago.
///
/// The reserving socket is dropped before returning, so another process could
/// claim the port in between; only use in tests.
pub fn free_udp_port() -> u16 {
    let reserved = StdUdpSocket::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
        .expect("bind reserving socket");
    reserved.local_addr().expect("reserved address").port()
}

/// Handle to the global logger with exclusive access.
///
/// Serialises access to a [`logtest::Logger`] so tests capturing log records
/// do not interfere with each other.
pub struct LoggerHandle {
    guard: MutexGuard<'static, Logger>,
}

impl LoggerHandle {
    pub fn new() -> Self {
        static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

        let logger = LOGGER.get_or_init(|| Mutex::new(Logger::start()));
        let guard = logger
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut handle = Self { guard };
        while handle.guard.pop().is_some() {}
        handle
    }

    /// Drain captured records and return their messages at `level`.
    pub fn messages_at(&mut self, level: log::Level) -> Vec<String> {
        let mut messages = Vec::new();
        while let Some(record) = self.guard.pop() {
            if record.level() == level {
                messages.push(record.args().to_string());
            }
        }
        messages
    }
}

#[fixture]
pub fn logger() -> LoggerHandle { LoggerHandle::new() }
