//! Provisioner configuration
use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use url::Url;

/// Default number of seconds to wait for the monitoring service to come up.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 60;
/// Default number of seconds between readiness probes.
pub const DEFAULT_READY_INTERVAL_SECS: u64 = 2;
/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Monitoring service connection options
#[derive(Debug, Clone, Parser)]
pub struct ServiceOpts {
    /// Base URL of the monitoring service, e.g. `http://uptime:3001`
    #[clap(long, env = "MONITOR_BASE_URL")]
    pub base_url: Url,
    /// Bearer token; no `Authorization` header is sent when empty
    #[clap(long, env = "MONITOR_API_TOKEN", default_value = "", hide_env_values = true)]
    pub token: String,
    /// Timeout applied to every HTTP request, in seconds
    #[clap(
        long,
        env = "MONITOR_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    pub request_timeout: u64,
}

impl ServiceOpts {
    /// Per-request timeout as a [`Duration`].
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Readiness gate options
#[derive(Debug, Clone, Parser)]
pub struct ReadinessOpts {
    /// How long to wait for the service to accept connections, in seconds
    #[clap(long, env = "MONITOR_READY_TIMEOUT_SECS", default_value_t = DEFAULT_READY_TIMEOUT_SECS)]
    pub ready_timeout: u64,
    /// Delay between readiness probes, in seconds
    #[clap(
        long,
        env = "MONITOR_READY_INTERVAL_SECS",
        default_value_t = DEFAULT_READY_INTERVAL_SECS
    )]
    pub ready_interval: u64,
}

impl ReadinessOpts {
    /// Delay between probes. A zero interval is bumped to one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.ready_interval.max(1))
    }

    /// Number of probes that fit in the readiness timeout, never less than one.
    pub fn max_attempts(&self) -> u32 {
        let interval = self.ready_interval.max(1);
        let attempts = self.ready_timeout.div_ceil(interval).max(1);
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// One line per monitor followed by a totals line
    #[default]
    Text,
    /// A single JSON document
    Json,
}

/// Options for the `apply` subcommand
#[derive(Debug, Clone, Parser)]
pub struct ApplyOpts {
    /// Monitoring service connection configuration
    #[clap(flatten)]
    pub service: ServiceOpts,

    /// Readiness gate configuration
    #[clap(flatten)]
    pub readiness: ReadinessOpts,

    /// Path to the desired monitors file (`.yaml`, `.yml` or `.json`)
    #[clap(long, env = "MONITOR_CONFIG")]
    pub config: PathBuf,

    /// Stop submitting monitors after this many seconds
    #[clap(long, env = "MONITOR_DEADLINE_SECS")]
    pub deadline: Option<u64>,

    /// Log the payloads that would be sent without contacting the service
    #[clap(long, env = "MONITOR_DRY_RUN")]
    pub dry_run: bool,

    /// Report output format
    #[clap(long, env = "MONITOR_REPORT_FORMAT", value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

impl ApplyOpts {
    /// Overall run deadline, if one was configured.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline.map(Duration::from_secs)
    }
}

/// Provisioner subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Register the desired monitors with the monitoring service
    Apply(ApplyOpts),
}

/// CLI options for the provisioner
#[derive(Debug, Clone, Parser)]
#[clap(name = "provisioner", about = "Declarative monitor provisioning")]
pub struct Opts {
    /// Subcommand to run
    #[clap(subcommand)]
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Opts::command().debug_assert()
    }

    #[test]
    fn parses_apply_flags() {
        let opts = Opts::try_parse_from([
            "provisioner",
            "apply",
            "--base-url",
            "http://uptime:3001",
            "--token",
            "secret",
            "--config",
            "monitors.yaml",
            "--ready-timeout",
            "30",
            "--format",
            "json",
        ])
        .unwrap();

        let Command::Apply(apply) = opts.command;
        assert_eq!(apply.service.base_url.as_str(), "http://uptime:3001/");
        assert_eq!(apply.service.token, "secret");
        assert_eq!(apply.config, PathBuf::from("monitors.yaml"));
        assert_eq!(apply.readiness.ready_timeout, 30);
        assert_eq!(apply.format, ReportFormat::Json);
        assert!(!apply.dry_run);
        assert_eq!(apply.deadline(), None);
    }

    #[test]
    fn readiness_attempts_cover_the_timeout() {
        let opts = ReadinessOpts { ready_timeout: 60, ready_interval: 2 };
        assert_eq!(opts.max_attempts(), 30);

        let opts = ReadinessOpts { ready_timeout: 5, ready_interval: 2 };
        assert_eq!(opts.max_attempts(), 3);

        let opts = ReadinessOpts { ready_timeout: 0, ready_interval: 0 };
        assert_eq!(opts.max_attempts(), 1);
        assert_eq!(opts.interval(), Duration::from_secs(1));
    }
}
