//! Application configuration.

use std::time::Duration;

use clap::{Parser, Subcommand};
use types_rs::registration::PaymentId;

use crate::payment::PollConfig;

pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub(crate) const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about)]
pub(crate) struct Config {
    /// URL of the registration backend, e.g. `https://register.example.com/`.
    #[arg(long, env = "CHECKIN_API_URL", default_value = "http://localhost:3300")]
    pub(crate) api_url: reqwest::Url,

    /// Where unregistered attendees are sent to sign up.
    #[arg(
        long,
        env = "REGISTRATION_URL",
        default_value = "https://youthfest.harekrishnavizag.org/"
    )]
    pub(crate) registration_url: reqwest::Url,

    /// Log level.
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub(crate) log_level: tracing::Level,

    /// Seconds between payment status checks.
    #[arg(
        long,
        env = "POLL_INTERVAL_SECS",
        default_value_t = DEFAULT_POLL_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub(crate) poll_interval_secs: u64,

    /// Maximum number of payment status checks.
    #[arg(
        long,
        env = "MAX_POLL_ATTEMPTS",
        default_value_t = DEFAULT_MAX_POLL_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub(crate) max_poll_attempts: u32,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum Command {
    /// Mark attendance for one phone number.
    Attend {
        /// WhatsApp number used at registration. Formatting is ignored.
        number: String,
    },

    /// Read phone numbers from stdin, one per line, and mark attendance for
    /// each. An empty line ends the session.
    Kiosk,

    /// Follow the payment status of a registration until it resolves.
    Payment {
        /// Payment ID from the payment redirect URL.
        payment_id: PaymentId,
    },
}

impl Config {
    pub(crate) fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: self.max_poll_attempts,
        }
    }
}
