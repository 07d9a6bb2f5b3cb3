//! `netoutput` binary: logs every message an emulator sends over its network
//! outputs.
//!
//! Listens for datagrams and keeps a stream connection open at the same time,
//! reporting each command at info level until Ctrl+C or the optional maximum
//! runtime.

mod cli;

use std::{process::ExitCode, sync::Arc, time::Duration};

use clap::Parser;
use netoutput::{Receiver, ReceiverConfig, handlers::logging_processor};
use tracing_subscriber::EnvFilter;

const BANNER: &str = r"  ####                                                      ###           ###
 ##  ##                                                      ##            ##
 ###     ##  ##  ## ###   ####   ## ###  ##  ##   ####       ##   ####     ##
  ###    ##  ##   ##  ## ##  ##   ### ## ####### ##  ##   #####  ##  ##    ##
    ###  ##  ##   ##  ## ######   ##  ## ####### ##  ##  ##  ##  ######    ##
 ##  ##  ##  ##   #####  ##       ##     ## # ## ##  ##  ##  ##  ##        ##
  ####    ### ##  ##      ####   ####    ##   ##  ####    ### ##  ####    ####
                 ####
";

#[tokio::main]
async fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("{BANNER}");
    println!("Network Output Tester v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let cli = cli::Cli::parse();
    let config = ReceiverConfig::default()
        .with_udp_port(cli.udp_port)
        .with_tcp_target(cli.tcp_host, cli.tcp_port)
        .with_retry_interval(Duration::from_millis(cli.retry_interval_ms))
        .with_buffer_size(cli.buffer_size);

    let processor = match logging_processor() {
        Ok(processor) => Arc::new(processor),
        Err(e) => {
            tracing::error!(error = %e, "failed to register command handlers");
            return ExitCode::FAILURE;
        }
    };

    let receiver = Receiver::new(config, processor);
    match receiver
        .run(cli.max_runtime.map(Duration::from_secs))
        .await
    {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "receiver failed");
            ExitCode::FAILURE
        }
    }
}
