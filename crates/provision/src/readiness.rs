//! Readiness gate: wait for the monitoring service to accept connections.
use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use primitives::retries::{Sleeper, TokioSleeper, fixed_attempts, retry_with_strategy};
use reqwest::Client as HttpClient;
use tracing::{debug, error, info};
use url::Url;

use crate::error::TimeoutError;

/// Timeout for a single probe when none is configured.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A lightweight reachability check.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Succeeds when the target answered at all. Only transport failures are errors.
    async fn probe(&self) -> Result<()>;

    /// Human readable description of what is probed.
    fn target(&self) -> &str;
}

/// Probes a URL with `GET`. Any HTTP status counts as reachable.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    http: HttpClient,
    url: Url,
    target: String,
}

impl HttpProbe {
    /// Create a probe for `url` whose requests give up after `timeout`.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        let target = url.to_string();
        Ok(Self { http, url, target })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self) -> Result<()> {
        let resp = self.http.get(self.url.clone()).send().await?;
        debug!(url = %self.url, status = %resp.status(), "Readiness probe answered");
        Ok(())
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// Polls a [`Probe`] on a fixed cadence until it succeeds or the attempt budget runs out.
#[derive(Debug)]
pub struct ReadinessGate<P, Z = TokioSleeper> {
    probe: P,
    sleeper: Z,
}

impl<P: Probe> ReadinessGate<P> {
    /// Create a gate sleeping on the Tokio timer.
    pub const fn new(probe: P) -> Self {
        Self { probe, sleeper: TokioSleeper }
    }
}

impl<P: Probe, Z: Sleeper> ReadinessGate<P, Z> {
    /// Create a gate with a custom [`Sleeper`].
    pub const fn with_sleeper(probe: P, sleeper: Z) -> Self {
        Self { probe, sleeper }
    }

    /// Probe up to `max_attempts` times, `interval` apart. Returns on the first reachable answer.
    pub async fn await_ready(
        &self,
        max_attempts: u32,
        interval: Duration,
    ) -> Result<(), TimeoutError> {
        info!(
            target_url = self.probe.target(),
            max_attempts,
            interval_secs = interval.as_secs(),
            "Waiting for monitoring service"
        );

        let mut attempt = 0u32;
        let probe = &self.probe;
        let result = retry_with_strategy(fixed_attempts(interval, max_attempts), &self.sleeper, || {
            attempt += 1;
            let n = attempt;
            async move { probe.probe().await.map(|()| n) }
        })
        .await;

        match result {
            Ok(attempts) => {
                info!(target_url = probe.target(), attempts, "Monitoring service is ready");
                Ok(())
            }
            Err(exhausted) => {
                let err = TimeoutError {
                    target: probe.target().to_owned(),
                    attempts: exhausted.attempts,
                    last_error: format!("{:#}", exhausted.last_error),
                };
                error!(error = %err, "Monitoring service never became ready");
                Err(err)
            }
        }
    }
}

/// Probe `base_url` until it is reachable, using the Tokio timer and [`DEFAULT_PROBE_TIMEOUT`].
pub async fn await_ready(
    base_url: &Url,
    max_attempts: u32,
    interval: Duration,
) -> Result<(), TimeoutError> {
    let probe = HttpProbe::new(base_url.clone(), DEFAULT_PROBE_TIMEOUT).map_err(|e| TimeoutError {
        target: base_url.to_string(),
        attempts: 0,
        last_error: e.to_string(),
    })?;
    ReadinessGate::new(probe).await_ready(max_attempts, interval).await
}
