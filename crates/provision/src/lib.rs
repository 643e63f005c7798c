//! Declarative monitor provisioning against an uptime monitoring service.
#![allow(missing_docs)]
#![allow(clippy::uninlined_format_args)]
/// Monitoring service API client
pub mod client;
/// Error types and exit codes
pub mod error;
/// Typed request bodies per monitor kind
pub mod payload;
/// Readiness gate
pub mod readiness;
/// Submission and outcome classification
pub mod reconciler;
/// Run summary and rendering
pub mod report;
/// Desired monitor definitions and loader
pub mod spec;

use std::{
    future::{Future, ready},
    pin::pin,
    time::Duration,
};

use primitives::retries::{Sleeper, TokioSleeper};
use tracing::{info, warn};
use url::Url;

pub use client::{ApiResponse, Client, MonitorApi};
pub use error::{ApiError, ConfigError, ProvisionError, TimeoutError};
pub use readiness::{HttpProbe, Probe, ReadinessGate};
pub use reconciler::{ApplyResult, Outcome, Reconciler};
pub use report::{RunSummary, summarize};
pub use spec::{DesiredState, MonitorKind, MonitorSpec};

/// Everything a provisioning run needs to know about the monitoring service.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Service base URL
    pub base_url: Url,
    /// Bearer token, empty for none
    pub token: String,
    /// Timeout for each API request and readiness probe
    pub request_timeout: Duration,
    /// Readiness probes before giving up
    pub ready_max_attempts: u32,
    /// Delay between readiness probes
    pub ready_interval: Duration,
    /// Log payloads instead of sending them; also skips the readiness gate
    pub dry_run: bool,
}

/// Readiness gate followed by reconciliation.
#[derive(Debug)]
pub struct Provisioner<A, P, Z> {
    gate: ReadinessGate<P, Z>,
    reconciler: Reconciler<A>,
    ready_max_attempts: u32,
    ready_interval: Duration,
    dry_run: bool,
}

impl Provisioner<Client, HttpProbe, TokioSleeper> {
    /// Build a provisioner talking HTTP to `settings.base_url`.
    pub fn from_settings(settings: Settings) -> Result<Self, ProvisionError> {
        let client =
            Client::new(settings.base_url.clone(), &settings.token, settings.request_timeout)?;
        let probe = HttpProbe::new(settings.base_url.clone(), settings.request_timeout)
            .map_err(ApiError::Network)?;
        Ok(Self::new(ReadinessGate::new(probe), Reconciler::new(client), &settings))
    }
}

impl<A: MonitorApi, P: Probe, Z: Sleeper> Provisioner<A, P, Z> {
    /// Assemble a provisioner from its parts.
    pub fn new(gate: ReadinessGate<P, Z>, reconciler: Reconciler<A>, settings: &Settings) -> Self {
        Self {
            gate,
            reconciler: reconciler.with_dry_run(settings.dry_run),
            ready_max_attempts: settings.ready_max_attempts,
            ready_interval: settings.ready_interval,
            dry_run: settings.dry_run,
        }
    }

    /// Wait for the service, then apply `desired` until done or `shutdown` resolves.
    ///
    /// Only a readiness timeout aborts the run; per-monitor failures are part of the returned
    /// results. When `shutdown` resolves while waiting for the service, nothing is submitted and
    /// every monitor is reported as cancelled.
    pub async fn run<F>(
        &self,
        desired: &DesiredState,
        shutdown: F,
    ) -> Result<Vec<ApplyResult>, ProvisionError>
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = pin!(shutdown);

        if self.dry_run {
            info!("Dry run, skipping readiness gate");
        } else {
            let gate = self.gate.await_ready(self.ready_max_attempts, self.ready_interval);
            tokio::select! {
                biased;
                () = shutdown.as_mut() => {
                    warn!("Run cancelled while waiting for the monitoring service");
                    return Ok(self.reconciler.apply_until(desired, ready(())).await);
                }
                result = gate => result?,
            }
        }

        info!(monitors = desired.len(), "Applying desired monitors");
        Ok(self.reconciler.apply_until(desired, shutdown).await)
    }
}
