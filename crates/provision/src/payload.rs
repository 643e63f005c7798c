//! Request bodies for the monitor creation endpoint, one variant per monitor kind.
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use url::Url;

use crate::{
    error::ConfigError,
    spec::{MonitorKind, MonitorSpec},
};

/// Status code ranges accepted by HTTP monitors unless configured otherwise.
pub const DEFAULT_ACCEPTED_STATUS_CODES: &str = "200-299";
/// Redirects followed by HTTP monitors unless configured otherwise.
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Body of `POST /api/monitors`. The `type` field carries the kind tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum MonitorPayload {
    /// `type = "http"`
    #[serde(rename = "http")]
    Http(HttpMonitor),
    /// `type = "tcp"`
    #[serde(rename = "tcp")]
    Tcp(TcpMonitor),
    /// `type = "tcp-port"`
    #[serde(rename = "tcp-port")]
    Port(PortMonitor),
}

/// Options read from `extra` for HTTP monitors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HttpOptions {
    /// Seconds between repeated down notifications, 0 disables
    #[serde(default)]
    pub resend_interval: u64,
    /// Keyword the response body must contain; empty disables the check
    #[serde(default)]
    pub keyword: String,
    /// Fail when the keyword is present instead of absent
    #[serde(default)]
    pub invert_keyword: bool,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub ignore_tls: bool,
    /// Maximum redirects to follow
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
    /// Accepted status code ranges, e.g. `"200-299"`
    #[serde(default = "default_accepted_status_codes")]
    pub accepted_statuscodes: Vec<String>,
}

const fn default_max_redirects() -> u32 {
    DEFAULT_MAX_REDIRECTS
}

fn default_accepted_status_codes() -> Vec<String> {
    vec![DEFAULT_ACCEPTED_STATUS_CODES.to_owned()]
}

/// Options read from `extra` for TCP and port monitors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SocketOptions {
    /// Seconds between repeated down notifications, 0 disables
    #[serde(default)]
    pub resend_interval: u64,
}

/// HTTP monitor request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpMonitor {
    pub name: String,
    pub url: String,
    pub interval: u64,
    pub timeout: u64,
    pub max_retries: u32,
    #[serde(flatten)]
    pub options: HttpOptions,
}

/// TCP monitor request body, addressed as `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpMonitor {
    pub name: String,
    pub url: String,
    pub interval: u64,
    pub timeout: u64,
    pub max_retries: u32,
    pub resend_interval: u64,
}

/// Port monitor request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMonitor {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub interval: u64,
    pub timeout: u64,
    pub max_retries: u32,
    pub resend_interval: u64,
}

impl MonitorPayload {
    /// Build the request body for `spec`, rejecting anything the service could not accept.
    pub fn from_spec(spec: &MonitorSpec) -> Result<Self, ConfigError> {
        match spec.kind {
            MonitorKind::Http => {
                if spec.port.is_some() {
                    return Err(ConfigError::invalid(
                        &spec.name,
                        "port is only valid for tcp and port monitors, put it in the URL",
                    ));
                }
                let url = Url::parse(&spec.target).map_err(|e| {
                    ConfigError::invalid(&spec.name, format!("invalid URL `{}`: {e}", spec.target))
                })?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(ConfigError::invalid(
                        &spec.name,
                        format!("unsupported URL scheme `{}`", url.scheme()),
                    ));
                }
                Ok(Self::Http(HttpMonitor {
                    name: spec.name.clone(),
                    url: spec.target.clone(),
                    interval: spec.interval_seconds,
                    timeout: spec.timeout_seconds,
                    max_retries: spec.max_retries,
                    options: decode_extra(spec)?,
                }))
            }
            MonitorKind::Tcp => {
                let (host, port) = socket_address(spec)?;
                let options: SocketOptions = decode_extra(spec)?;
                Ok(Self::Tcp(TcpMonitor {
                    name: spec.name.clone(),
                    url: format!("{host}:{port}"),
                    interval: spec.interval_seconds,
                    timeout: spec.timeout_seconds,
                    max_retries: spec.max_retries,
                    resend_interval: options.resend_interval,
                }))
            }
            MonitorKind::Port => {
                let (host, port) = socket_address(spec)?;
                let options: SocketOptions = decode_extra(spec)?;
                Ok(Self::Port(PortMonitor {
                    name: spec.name.clone(),
                    host: host.to_owned(),
                    port,
                    interval: spec.interval_seconds,
                    timeout: spec.timeout_seconds,
                    max_retries: spec.max_retries,
                    resend_interval: options.resend_interval,
                }))
            }
        }
    }

    /// Monitor name carried by the payload.
    pub fn name(&self) -> &str {
        match self {
            Self::Http(m) => &m.name,
            Self::Tcp(m) => &m.name,
            Self::Port(m) => &m.name,
        }
    }
}

fn socket_address(spec: &MonitorSpec) -> Result<(&str, u16), ConfigError> {
    let host = spec.target.trim();
    if host.is_empty() || host.contains(char::is_whitespace) || host.contains("://") {
        return Err(ConfigError::invalid(
            &spec.name,
            format!("target `{}` must be a bare host name or address", spec.target),
        ));
    }
    match spec.port {
        Some(0) => Err(ConfigError::invalid(&spec.name, "port must be between 1 and 65535")),
        Some(port) => Ok((host, port)),
        None => {
            Err(ConfigError::invalid(&spec.name, format!("{} monitors need a port", spec.kind)))
        }
    }
}

fn decode_extra<T: DeserializeOwned>(spec: &MonitorSpec) -> Result<T, ConfigError> {
    serde_json::from_value(Value::Object(spec.extra.clone()))
        .map_err(|e| ConfigError::invalid(&spec.name, format!("invalid extra options: {e}")))
}

/// Convenience for building `extra` maps in code.
pub fn extra<I, K>(entries: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
