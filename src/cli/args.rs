//! Command-line argument structures for the alarm binaries.

use clap::Parser;
use std::time::Duration;

use crate::client::{Backoff, Retry};
use crate::message::DEFAULT_COMMUNITY;

/// Arguments shared by both binaries.
#[derive(Debug, Parser)]
pub struct CommonArgs {
    /// Community string.
    #[arg(short = 'c', long = "community", default_value_t = String::from_utf8_lossy(DEFAULT_COMMUNITY).into_owned())]
    pub community: String,
}

/// GET tuning for the manager.
#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// GET timeout in seconds.
    #[arg(short = 't', long = "timeout", default_value = "10")]
    pub timeout: f64,

    /// Retries after a GET timeout.
    #[arg(short = 'r', long = "retries", default_value = "2")]
    pub retries: u32,

    /// Fixed delay between retries in milliseconds (0 = immediate).
    #[arg(long = "backoff-delay", default_value = "0")]
    pub backoff_delay: u64,
}

impl QueryArgs {
    /// The timeout as a Duration, rejecting negative or non-finite input.
    pub fn timeout_duration(&self) -> Result<Duration, String> {
        Duration::try_from_secs_f64(self.timeout)
            .map_err(|e| format!("invalid timeout {}: {}", self.timeout, e))
    }

    /// Build a Retry configuration from the CLI arguments.
    pub fn retry_config(&self) -> Retry {
        let backoff = match self.backoff_delay {
            0 => Backoff::None,
            ms => Backoff::Fixed {
                delay: Duration::from_millis(ms),
            },
        };
        Retry {
            max_attempts: self.retries,
            backoff,
        }
    }
}

/// Logging control arguments.
#[derive(Debug, Parser)]
pub struct LogArgs {
    /// Enable debug logging (snmp_alarm=debug).
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Enable trace logging (snmp_alarm=trace).
    #[arg(short = 'D', long = "trace")]
    pub trace: bool,
}

impl LogArgs {
    /// Initialize tracing based on debug/trace flags.
    ///
    /// `RUST_LOG`, when set, wins over the flags.
    pub fn init_tracing(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = if self.trace {
            "snmp_alarm=trace"
        } else if self.debug {
            "snmp_alarm=debug"
        } else {
            "snmp_alarm=warn"
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
            .with_writer(std::io::stderr)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Parser)]
    struct TestArgs {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        log: LogArgs,
    }

    #[test]
    fn defaults() {
        let args = TestArgs::parse_from(["test"]);
        assert_eq!(args.common.community, "public");
        assert_eq!(args.query.timeout_duration().unwrap(), Duration::from_secs(10));
        assert_eq!(args.query.retry_config(), Retry::default());
        assert!(!args.log.debug && !args.log.trace);
    }

    #[test]
    fn retry_and_timeout_flags() {
        let args = TestArgs::parse_from(["test", "-c", "private", "-t", "0.5", "-r", "4", "--backoff-delay", "250", "-d"]);
        assert_eq!(args.common.community, "private");
        assert_eq!(args.query.timeout_duration().unwrap(), Duration::from_millis(500));
        assert_eq!(args.query.retry_config(), Retry::fixed(4, Duration::from_millis(250)));
        assert!(args.log.debug);

        let negative = QueryArgs {
            timeout: -1.0,
            retries: 0,
            backoff_delay: 0,
        };
        assert!(negative.timeout_duration().is_err());
    }
}
