use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{error::ApiError, payload::MonitorPayload};

/// Monitor creation endpoint, relative to the service base URL.
pub const MONITORS_ENDPOINT: &str = "api/monitors";

/// Successful answer from the monitoring service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Decoded JSON body, guaranteed to contain `"ok": true`
    pub body: Value,
}

impl ApiResponse {
    /// The service's human readable message, if any.
    pub fn message(&self) -> Option<&str> {
        self.body.get("msg").and_then(Value::as_str)
    }

    /// Identifier assigned to a newly created monitor, if reported.
    pub fn monitor_id(&self) -> Option<u64> {
        self.body.get("monitorID").and_then(Value::as_u64)
    }

    /// Short description for reports.
    pub fn detail(&self) -> String {
        match (self.monitor_id(), self.message()) {
            (Some(id), Some(msg)) => format!("{msg} (id {id})"),
            (Some(id), None) => format!("id {id}"),
            (None, Some(msg)) => msg.to_owned(),
            (None, None) => "ok".to_owned(),
        }
    }
}

/// Operations the reconciler needs from the monitoring service.
#[async_trait]
pub trait MonitorApi: Send + Sync {
    /// Create one monitor. Called exactly once per desired monitor and run.
    async fn create_monitor(&self, payload: &MonitorPayload) -> Result<ApiResponse, ApiError>;
}

/// Client for the monitoring service HTTP API.
#[derive(Debug, Clone)]
pub struct Client {
    http: HttpClient,
    base_url: Url,
    token: Option<String>,
}

impl Client {
    /// Create a new API client. An empty `token` disables the `Authorization` header.
    pub fn new(base_url: Url, token: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self::with_http_client(http, base_url, token))
    }

    /// Create a client around an existing [`reqwest::Client`].
    pub fn with_http_client(http: HttpClient, base_url: Url, token: &str) -> Self {
        let token = (!token.is_empty()).then(|| token.to_owned());
        Self { http, base_url, token }
    }

    /// Base URL of the monitoring service.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Authenticate the request.
    fn auth(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    /// Resolve `endpoint` below the base URL, keeping any path prefix the base URL carries.
    fn endpoint_url(&self, endpoint: &str) -> Result<Url, ApiError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(endpoint.trim_start_matches('/'))
            .map_err(|source| ApiError::Endpoint { endpoint: endpoint.to_owned(), source })
    }

    /// POST `payload` as JSON to `endpoint` and decode the service's result envelope.
    ///
    /// Never retries. Non-2xx answers and bodies without `"ok": true` are returned as errors with
    /// the raw body attached.
    pub async fn submit<P>(&self, endpoint: &str, payload: &P) -> Result<ApiResponse, ApiError>
    where
        P: Serialize + Sync + ?Sized,
    {
        let url = self.endpoint_url(endpoint)?;
        let resp = self.auth(self.http.post(url.clone())).json(payload).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!(%url, %status, body = %body, "Monitoring service responded");

        if !status.is_success() {
            return Err(ApiError::Status { status, body });
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(value) if value.get("ok").and_then(Value::as_bool) == Some(true) => {
                Ok(ApiResponse { status, body: value })
            }
            _ => Err(ApiError::Rejected { status, body }),
        }
    }
}

#[async_trait]
impl MonitorApi for Client {
    async fn create_monitor(&self, payload: &MonitorPayload) -> Result<ApiResponse, ApiError> {
        self.submit(MONITORS_ENDPOINT, payload).await
    }
}
