//! Command line interface for the `netoutput` binary.
//!
//! Shared with `build.rs` for man page generation, so this file depends on
//! nothing but `clap` and `std`.

use clap::Parser;

/// Command line arguments for the `netoutput` binary.
#[derive(Debug, Parser)]
#[command(
    name = "netoutput",
    version,
    about = "Network output tester: receives emulator output messages via UDP and TCP."
)]
pub struct Cli {
    /// UDP port to listen on.
    #[arg(long, default_value_t = 8001)]
    pub udp_port: u16,

    /// TCP host to connect to.
    #[arg(long, default_value = "localhost")]
    pub tcp_host: String,

    /// TCP port to connect to.
    #[arg(long, default_value_t = 8000)]
    pub tcp_port: u16,

    /// Maximum runtime in seconds (default: run until Ctrl+C).
    #[arg(long, value_name = "SECONDS")]
    pub max_runtime: Option<u64>,

    /// Pause between failed TCP connection attempts, in milliseconds.
    #[arg(long, value_name = "MILLIS", default_value_t = 100)]
    pub retry_interval_ms: u64,

    /// Receive buffer size in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = 4096)]
    pub buffer_size: usize,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use rstest::rstest;

    use super::Cli;

    #[test]
    fn defaults_match_stock_ports() {
        let cli = Cli::parse_from(["netoutput"]);
        assert_eq!(cli.udp_port, 8001);
        assert_eq!(cli.tcp_host, "localhost");
        assert_eq!(cli.tcp_port, 8000);
        assert_eq!(cli.max_runtime, None);
        assert_eq!(cli.retry_interval_ms, 100);
        assert_eq!(cli.buffer_size, 4096);
    }

    #[test]
    fn parses_every_option() {
        let cli = Cli::parse_from([
            "netoutput",
            "--udp-port",
            "9001",
            "--tcp-host",
            "cabinet.local",
            "--tcp-port",
            "9000",
            "--max-runtime",
            "30",
            "--retry-interval-ms",
            "250",
            "--buffer-size",
            "1024",
        ]);
        assert_eq!(cli.udp_port, 9001);
        assert_eq!(cli.tcp_host, "cabinet.local");
        assert_eq!(cli.tcp_port, 9000);
        assert_eq!(cli.max_runtime, Some(30));
        assert_eq!(cli.retry_interval_ms, 250);
        assert_eq!(cli.buffer_size, 1024);
    }

    #[rstest]
    #[case(&["netoutput", "--udp-port", "70000"])]
    #[case(&["netoutput", "--max-runtime", "soon"])]
    #[case(&["netoutput", "--tcp-port"])]
    fn rejects_invalid_arguments(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn command_definition_is_consistent() { Cli::command().debug_assert(); }

    #[test]
    fn man_page_renders_from_the_command() {
        let mut page = Vec::new();
        clap_mangen::Man::new(Cli::command())
            .render(&mut page)
            .expect("render man page");
        let page = String::from_utf8(page).expect("man page is UTF-8");
        assert!(page.contains("netoutput"));
        assert!(page.contains("udp"), "options missing: {page}");
    }
}
