//! Drives both transports as one unit.
//!
//! [`Receiver`] owns a [`DatagramListener`] and a [`StreamConnector`] sharing
//! one [`CommandProcessor`], starts them together and stops them together.

use std::{future::Future, sync::Arc, time::Duration};

use log::info;
use tokio::{select, time::sleep};

use crate::{
    command::CommandProcessor,
    config::ReceiverConfig,
    datagram::DatagramListener,
    error::{ReceiverError, Result},
    stream::StreamConnector,
};

/// Runs the datagram listener and the stream connector side by side.
///
/// ```no_run
/// use std::{sync::Arc, time::Duration};
///
/// use netoutput::{Receiver, ReceiverConfig, handlers::logging_processor};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let receiver = Receiver::new(ReceiverConfig::default(), Arc::new(logging_processor()?));
/// receiver.run(Some(Duration::from_secs(30))).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Receiver {
    config: ReceiverConfig,
    listener: DatagramListener,
    connector: StreamConnector,
}

impl Receiver {
    /// Build both transports from `config`. Nothing is bound until
    /// [`start`](Self::start).
    #[must_use]
    pub fn new(config: ReceiverConfig, processor: Arc<CommandProcessor>) -> Self {
        let config = config.normalized();
        Self {
            listener: DatagramListener::from_config(Arc::clone(&processor), &config),
            connector: StreamConnector::from_config(processor, &config),
            config,
        }
    }

    /// Start the listener, then the connector.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::Bind`] if the datagram socket cannot be
    /// bound. The connector is not started in that case.
    pub fn start(&self) -> Result<()> {
        self.listener.start()?;
        self.connector.start();
        Ok(())
    }

    /// Stop both transports concurrently.
    pub async fn stop(&self) {
        tokio::join!(self.listener.stop(), self.connector.stop());
        info!("Shutdown complete.");
    }

    /// Start, wait for `shutdown` to resolve, then stop.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::Bind`] if startup fails.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start()?;
        shutdown.await;
        self.stop().await;
        Ok(())
    }

    /// Start and run until Ctrl+C or until `max_runtime` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::Bind`] if startup fails, or
    /// [`ReceiverError::Signal`] if the Ctrl+C handler cannot be installed.
    /// Both transports are stopped before a signal error is returned.
    pub async fn run(&self, max_runtime: Option<Duration>) -> Result<()> {
        self.start()?;
        match max_runtime {
            Some(limit) => info!(
                "Network output tester is running for {} seconds. Press Ctrl+C to stop.",
                limit.as_secs()
            ),
            None => info!("Network output tester is running. Press Ctrl+C to stop."),
        }

        let outcome = select! {
            res = tokio::signal::ctrl_c() => {
                if res.is_ok() {
                    info!("Shutting down...");
                }
                res
            }
            () = deadline(max_runtime) => {
                info!(
                    "Maximum runtime of {} seconds reached. Shutting down...",
                    max_runtime.unwrap_or_default().as_secs()
                );
                Ok(())
            }
        };
        self.stop().await;
        outcome.map_err(ReceiverError::Signal)
    }

    /// Normalised configuration in use.
    #[must_use]
    pub fn config(&self) -> &ReceiverConfig { &self.config }

    /// The datagram transport.
    #[must_use]
    pub fn listener(&self) -> &DatagramListener { &self.listener }

    /// The stream transport.
    #[must_use]
    pub fn connector(&self) -> &StreamConnector { &self.connector }
}

async fn deadline(limit: Option<Duration>) {
    match limit {
        Some(limit) => sleep(limit).await,
        None => std::future::pending().await,
    }
}
