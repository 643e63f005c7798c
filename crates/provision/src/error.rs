//! Error types for loading, gating and submitting monitors.
use std::{io, path::PathBuf};

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Process exit code when every monitor was applied or already present.
pub const EXIT_OK: i32 = 0;
/// Process exit code when at least one monitor failed, or the configuration was rejected.
pub const EXIT_FAILURE: i32 = 1;
/// Process exit code when the monitoring service never became reachable.
pub const EXIT_NOT_READY: i32 = 2;

/// The desired state could not be loaded or is invalid. Raised before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error(
        "unsupported configuration format for {}, expected .yaml, .yml or .json",
        path.display()
    )]
    UnsupportedFormat { path: PathBuf },

    #[error("duplicate monitor name `{name}`")]
    DuplicateName { name: String },

    #[error("monitor `{name}`: {reason}")]
    InvalidSpec { name: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSpec { name: name.to_owned(), reason: reason.into() }
    }
}

/// The monitoring service never answered a readiness probe.
#[derive(Debug, Error)]
#[error("{target} not reachable after {attempts} attempts: {last_error}")]
pub struct TimeoutError {
    /// Probed endpoint
    pub target: String,
    /// Number of probes issued
    pub attempts: u32,
    /// Transport error reported by the final probe
    pub last_error: String,
}

/// A single request to the monitoring service failed.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure: connect error, timeout, broken body.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The service answered 2xx but the body lacks `"ok": true`.
    #[error("request rejected (HTTP {status}): {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("invalid endpoint `{endpoint}`: {source}")]
    Endpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
}

impl ApiError {
    /// Raw response body, when the service answered.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } | Self::Rejected { body, .. } => Some(body),
            Self::Network(_) | Self::Endpoint { .. } => None,
        }
    }

    /// Whether the service reported that the monitor already exists.
    ///
    /// A `409 Conflict` always counts. Otherwise a 2xx or 4xx answer counts when the `msg` field
    /// of its JSON body mentions "already exists" or "duplicate". Server errors and non-JSON
    /// bodies never do.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Status { status, .. } if *status == StatusCode::CONFLICT => true,
            Self::Status { status, body } => {
                status.is_client_error() && msg_mentions_duplicate(body)
            }
            Self::Rejected { body, .. } => msg_mentions_duplicate(body),
            Self::Network(_) | Self::Endpoint { .. } => false,
        }
    }
}

fn msg_mentions_duplicate(body: &str) -> bool {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    map.get("msg").and_then(Value::as_str).is_some_and(|msg| {
        let msg = msg.to_lowercase();
        msg.contains("already exists") || msg.contains("duplicate")
    })
}

/// Errors that abort a whole provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("monitoring service not ready: {0}")]
    Timeout(#[from] TimeoutError),

    #[error("failed to build API client: {0}")]
    Client(#[from] ApiError),
}

impl ProvisionError {
    /// Exit code the process should terminate with.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Timeout(_) => EXIT_NOT_READY,
            Self::Configuration(_) | Self::Client(_) => EXIT_FAILURE,
        }
    }
}
