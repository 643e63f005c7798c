//! Desired monitor definitions and the file loader that produces them.
use std::{collections::HashSet, fmt, fs, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{error::ConfigError, payload::MonitorPayload};

/// Kind of health check a monitor performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorKind {
    /// HTTP(S) request against a URL
    #[serde(alias = "HTTP", alias = "Http")]
    Http,
    /// TCP connect check addressed as `host:port`
    #[serde(alias = "TCP", alias = "Tcp")]
    Tcp,
    /// TCP port check addressed by separate host and port fields
    #[serde(alias = "PORT", alias = "Port")]
    Port,
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Tcp => "tcp",
            Self::Port => "port",
        })
    }
}

/// One desired monitor, as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MonitorSpec {
    /// Unique monitor name
    pub name: String,
    /// Health check kind
    pub kind: MonitorKind,
    /// URL for HTTP monitors, host for TCP and port monitors
    pub target: String,
    /// Port for TCP and port monitors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Seconds between checks
    pub interval_seconds: u64,
    /// Seconds before a check is considered failed
    pub timeout_seconds: u64,
    /// Retries before the monitor reports down
    #[serde(default)]
    pub max_retries: u32,
    /// Kind-specific options, passed through to the payload
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl MonitorSpec {
    /// Check the fields shared by every kind, then the kind-specific ones by building the payload.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid(&self.name, "name must not be empty"));
        }
        if self.interval_seconds == 0 {
            return Err(ConfigError::invalid(&self.name, "intervalSeconds must be greater than 0"));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::invalid(&self.name, "timeoutSeconds must be greater than 0"));
        }
        MonitorPayload::from_spec(self).map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MonitorsFile {
    monitors: Vec<MonitorSpec>,
}

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Some(Self::Yaml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// The ordered, validated set of monitors a run should apply.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredState {
    specs: Vec<MonitorSpec>,
}

impl DesiredState {
    /// Validate `specs` and wrap them. Names must be unique.
    pub fn new(specs: Vec<MonitorSpec>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::with_capacity(specs.len());
        for spec in &specs {
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::DuplicateName { name: spec.name.clone() });
            }
            spec.validate()?;
        }
        Ok(Self { specs })
    }

    /// Load and validate the monitors listed under the top-level `monitors` key of a YAML or
    /// JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat { path: path.to_owned() })?;
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;

        let file: MonitorsFile = match format {
            FileFormat::Yaml => {
                serde_yaml::from_str::<MonitorsFile>(&raw).map_err(|e| e.to_string())
            }
            FileFormat::Json => {
                serde_json::from_str::<MonitorsFile>(&raw).map_err(|e| e.to_string())
            }
        }
        .map_err(|reason| ConfigError::Parse { path: path.to_owned(), reason })?;

        debug!(path = %path.display(), monitors = file.monitors.len(), "Loaded desired monitors");
        Self::new(file.monitors)
    }

    /// Specs in configuration order.
    pub fn specs(&self) -> &[MonitorSpec] {
        &self.specs
    }

    /// Iterate over the specs in configuration order.
    pub fn iter(&self) -> std::slice::Iter<'_, MonitorSpec> {
        self.specs.iter()
    }

    /// Number of desired monitors.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether no monitors are desired.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl<'a> IntoIterator for &'a DesiredState {
    type Item = &'a MonitorSpec;
    type IntoIter = std::slice::Iter<'a, MonitorSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
