// ⚙️ Configuration - CLI flags, each also readable from the environment
// `.env` is loaded by the binaries before parsing, so deployments can keep
// using plain environment variables.

use crate::error::{Error, Result};
use crate::scheduler::parse_time_of_day;
use crate::telegram::DEFAULT_API_BASE;
use chrono::NaiveTime;
use chrono_tz::Tz;
use clap::Args;

/// Provenance label of the payment submissions sheet
pub const PAYMENT_SOURCE_NAME: &str = "payments";
/// Provenance label of the application submissions sheet
pub const APPLICATION_SOURCE_NAME: &str = "applications";

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// IANA time zone used for every date computation (e.g. Asia/Yangon)
    #[arg(long, env = "TIMEZONE", default_value = "UTC", value_parser = parse_timezone)]
    pub timezone: Tz,

    /// Telegram bot token
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Chat id that receives expiry notifications
    #[arg(long, env = "USER_ID")]
    pub notify_chat: Option<String>,

    /// Payment submissions: CSV file path or sheet CSV-export URL
    #[arg(long, env = "PAYMENT_SOURCE")]
    pub payment_source: String,

    /// Application submissions: CSV file path or sheet CSV-export URL
    #[arg(long, env = "APPLICATION_SOURCE")]
    pub application_source: Option<String>,

    /// Bearer credential sent to HTTP sources
    #[arg(long, env = "SHEETS_ACCESS_TOKEN", hide_env_values = true)]
    pub sheets_token: Option<String>,

    /// Daily scan times (HH:MM, comma separated) in the configured zone
    #[arg(
        long,
        env = "CHECK_TIMES",
        default_value = "00:00",
        value_delimiter = ',',
        value_parser = parse_time_of_day
    )]
    pub check_times: Vec<NaiveTime>,

    /// Telegram Bot API base URL
    #[arg(long = "telegram-api", env = "TELEGRAM_API_BASE", default_value = DEFAULT_API_BASE)]
    pub telegram_api_base: String,

    /// Long-poll timeout in seconds
    #[arg(long, env = "POLL_TIMEOUT_SECS", default_value_t = 30)]
    pub poll_timeout: u64,
}

impl Config {
    /// Bot token, or a configuration error naming the variable
    pub fn require_bot_token(&self) -> Result<&str> {
        self.bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Config("BOT_TOKEN is not set".to_string()))
    }

    pub fn require_notify_chat(&self) -> Result<&str> {
        self.notify_chat
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::Config("USER_ID (notification chat) is not set".to_string()))
    }

    /// `(name, location)` pairs in scan order: payments, then applications
    pub fn source_locations(&self) -> Vec<(&str, &str)> {
        let mut locations = vec![(PAYMENT_SOURCE_NAME, self.payment_source.as_str())];
        if let Some(application) = self.application_source.as_deref() {
            locations.push((APPLICATION_SOURCE_NAME, application));
        }
        locations
    }
}

/// Parse an IANA zone identifier
pub fn parse_timezone(text: &str) -> std::result::Result<Tz, String> {
    text.trim()
        .parse::<Tz>()
        .map_err(|_| format!("unknown time zone '{}'", text))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        config: Config,
    }

    fn parse(args: &[&str]) -> std::result::Result<Config, clap::Error> {
        let mut argv = vec!["test"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).map(|cli| cli.config)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--payment-source", "payments.csv"]).unwrap();

        assert_eq!(config.timezone, Tz::UTC);
        assert_eq!(config.check_times, vec![NaiveTime::from_hms_opt(0, 0, 0).unwrap()]);
        assert_eq!(config.telegram_api_base, DEFAULT_API_BASE);
        assert_eq!(config.poll_timeout, 30);
        assert_eq!(config.source_locations(), vec![("payments", "payments.csv")]);
    }

    #[test]
    fn test_multiple_check_times_and_zone() {
        let config = parse(&[
            "--payment-source",
            "p.csv",
            "--application-source",
            "https://example.com/a.csv",
            "--timezone",
            "Asia/Yangon",
            "--check-times",
            "08:00,12:00",
        ])
        .unwrap();

        assert_eq!(config.timezone, chrono_tz::Asia::Yangon);
        assert_eq!(config.check_times.len(), 2);
        assert_eq!(
            config.source_locations(),
            vec![("payments", "p.csv"), ("applications", "https://example.com/a.csv")]
        );
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        assert!(parse(&["--payment-source", "p.csv", "--timezone", "Mars/Olympus"]).is_err());
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let config = parse(&["--payment-source", "p.csv"]).unwrap();

        assert!(matches!(config.require_bot_token(), Err(Error::Config(_))));
        assert!(matches!(config.require_notify_chat(), Err(Error::Config(_))));
    }
}
