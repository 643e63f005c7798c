//! Applies a [`DesiredState`] to the monitoring service one monitor at a time.
use std::{future::Future, pin::pin};

use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    client::MonitorApi,
    payload::MonitorPayload,
    spec::{DesiredState, MonitorSpec},
};

/// Detail recorded for monitors skipped because the run was cancelled.
pub const CANCELLED_DETAIL: &str = "not submitted: run cancelled";
/// Detail recorded for monitors accepted during a dry run.
pub const DRY_RUN_DETAIL: &str = "dry run";

/// What happened to one desired monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The service created the monitor.
    Created,
    /// The service reported the monitor as already present.
    AlreadyExists,
    /// Submission failed or was never attempted.
    Failed,
}

impl Outcome {
    /// Fixed-width code used in text reports.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::AlreadyExists => "EXISTS",
            Self::Failed => "FAILED",
        }
    }
}

/// Result of applying one [`MonitorSpec`]. Produced once per spec and run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyResult {
    spec: MonitorSpec,
    outcome: Outcome,
    detail: String,
}

impl ApplyResult {
    pub(crate) fn new(spec: &MonitorSpec, outcome: Outcome, detail: impl Into<String>) -> Self {
        Self { spec: spec.clone(), outcome, detail: detail.into() }
    }

    /// The monitor this result belongs to.
    pub const fn spec(&self) -> &MonitorSpec {
        &self.spec
    }

    /// What happened.
    pub const fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Service message or error detail.
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

/// Submits desired monitors through a [`MonitorApi`] and classifies each answer.
#[derive(Debug)]
pub struct Reconciler<A> {
    api: A,
    dry_run: bool,
}

impl<A: MonitorApi> Reconciler<A> {
    /// Create a reconciler submitting through `api`.
    pub const fn new(api: A) -> Self {
        Self { api, dry_run: false }
    }

    /// When enabled, log payloads instead of sending them.
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The API the reconciler submits through.
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Apply every spec in order. One spec failing never stops the others.
    pub async fn apply(&self, desired: &DesiredState) -> Vec<ApplyResult> {
        self.apply_until(desired, std::future::pending()).await
    }

    /// Like [`Self::apply`], but stops submitting once `shutdown` resolves.
    ///
    /// The signal is checked before each submission; a request already in flight is allowed to
    /// finish. Specs that were never submitted are reported as failed.
    pub async fn apply_until<F>(&self, desired: &DesiredState, shutdown: F) -> Vec<ApplyResult>
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = pin!(shutdown);
        let mut cancelled = false;
        let mut results = Vec::with_capacity(desired.len());

        for (index, spec) in desired.iter().enumerate() {
            if !cancelled && shutdown.as_mut().now_or_never().is_some() {
                warn!(
                    remaining = desired.len() - index,
                    "Run cancelled, not submitting remaining monitors"
                );
                cancelled = true;
            }

            let result = if cancelled {
                ApplyResult::new(spec, Outcome::Failed, CANCELLED_DETAIL)
            } else {
                self.apply_one(spec).await
            };
            results.push(result);
        }

        results
    }

    async fn apply_one(&self, spec: &MonitorSpec) -> ApplyResult {
        let payload = match MonitorPayload::from_spec(spec) {
            Ok(payload) => payload,
            Err(e) => {
                error!(name = %spec.name, error = %e, "Invalid monitor definition");
                return ApplyResult::new(spec, Outcome::Failed, e.to_string());
            }
        };

        if self.dry_run {
            let body = serde_json::to_string(&payload).unwrap_or_default();
            warn!(
                name = %spec.name,
                kind = %spec.kind,
                payload = %body,
                "Dry run - would create monitor"
            );
            return ApplyResult::new(spec, Outcome::Created, DRY_RUN_DETAIL);
        }

        debug!(name = %spec.name, kind = %spec.kind, "Submitting monitor");
        match self.api.create_monitor(&payload).await {
            Ok(resp) => {
                info!(
                    name = %spec.name,
                    kind = %spec.kind,
                    detail = %resp.detail(),
                    "Created monitor"
                );
                ApplyResult::new(spec, Outcome::Created, resp.detail())
            }
            Err(e) if e.is_conflict() => {
                info!(name = %spec.name, kind = %spec.kind, "Monitor already exists");
                ApplyResult::new(spec, Outcome::AlreadyExists, e.to_string())
            }
            Err(e) => {
                error!(
                    name = %spec.name,
                    kind = %spec.kind,
                    error = %e,
                    "Failed to create monitor"
                );
                ApplyResult::new(spec, Outcome::Failed, e.to_string())
            }
        }
    }
}
