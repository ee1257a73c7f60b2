//! Client configuration.
//!
//! # Design
//! Everything the dispatcher needs (retry budget, user-agent override,
//! persistent headers, endpoint) lives in an explicit `ClientConfig` passed to
//! `Client::new`. [`ClientConfig::from_env`] is the only place the process
//! environment is consulted, so tests build configs directly instead of
//! mutating the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

#[cfg(unix)]
pub const DEFAULT_HOST: &str = "unix:///var/run/docker.sock";
#[cfg(not(unix))]
pub const DEFAULT_HOST: &str = "tcp://127.0.0.1:2375";

pub const DEFAULT_API_VERSION: &str = "1.24";

#[cfg(unix)]
pub const DEFAULT_CERTS_DIR: &str = "/etc/docker/certs.d";
#[cfg(not(unix))]
pub const DEFAULT_CERTS_DIR: &str = "C:\\ProgramData\\docker\\certs.d";

pub const ENV_HOST: &str = "DOCKER_HOST";
pub const ENV_API_VERSION: &str = "DOCKER_API_VERSION";
pub const ENV_HTTP_RETRY: &str = "DOCKER_HTTP_RETRY";
pub const ENV_USER_AGENT: &str = "DOCKER_USER_AGENT";
pub const ENV_CERT_PATH: &str = "DOCKER_CERT_PATH";
pub const ENV_REGISTRY_CERTS_PATH: &str = "DOCKER_REGISTRY_CERTS_PATH";

/// PEM files used for TLS connections to the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TlsOptions {
    pub ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
}

impl TlsOptions {
    /// The `ca.pem` / `cert.pem` / `key.pem` layout of a client cert directory.
    pub fn from_dir(dir: &Path) -> Self {
        Self {
            ca_file: Some(dir.join("ca.pem")),
            cert_file: Some(dir.join("cert.pem")),
            key_file: Some(dir.join("key.pem")),
        }
    }
}

/// Where the daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { address: String, tls: bool },
    Unix { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// `tcp://`, `http://`, `https://` or `unix://` daemon address.
    pub host: String,
    pub api_version: String,
    /// Headers sent on every request, applied before per-call headers.
    pub http_headers: Vec<(String, String)>,
    /// Extra attempts for proxy-intercepted failures.
    pub retries: u32,
    pub retry_backoff_ms: u64,
    /// Upper bound on one attempt, from connect to response head. `None`
    /// leaves attempts unbounded.
    pub request_timeout_ms: Option<u64>,
    /// `None` keeps the client default, `Some("")` removes the header.
    pub user_agent: Option<String>,
    pub tls: Option<TlsOptions>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            http_headers: Vec::new(),
            retries: 0,
            retry_backoff_ms: crate::retry::DEFAULT_BACKOFF.as_millis() as u64,
            request_timeout_ms: None,
            user_agent: None,
            tls: None,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by the `DOCKER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(host) = lookup(ENV_HOST).filter(|h| !h.is_empty()) {
            config.host = host;
        }
        if let Some(version) = lookup(ENV_API_VERSION).filter(|v| !v.is_empty()) {
            config.api_version = version;
        }
        config.retries = lookup(ENV_HTTP_RETRY)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0);
        config.user_agent = lookup(ENV_USER_AGENT);
        if let Some(dir) = lookup(ENV_CERT_PATH).filter(|d| !d.is_empty()) {
            config.tls = Some(TlsOptions::from_dir(Path::new(&dir)));
        }
        config
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_millis(self.retry_backoff_ms))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidHost {
            host: self.host.clone(),
            reason: reason.to_string(),
        };
        let (proto, rest) = self
            .host
            .split_once("://")
            .ok_or_else(|| invalid("missing protocol"))?;
        if rest.is_empty() {
            return Err(invalid("missing address"));
        }
        match proto {
            "unix" => Ok(Endpoint::Unix {
                path: PathBuf::from(rest),
            }),
            "tcp" | "http" | "https" => {
                let address = rest.trim_end_matches('/');
                if address.contains('/') {
                    return Err(invalid("address must not contain a path"));
                }
                Ok(Endpoint::Tcp {
                    address: address.to_string(),
                    tls: proto == "https" || self.tls.is_some(),
                })
            }
            _ => Err(invalid("unsupported protocol")),
        }
    }

    /// Persistent headers as a validated map. Repeated names keep every value.
    pub fn header_map(&self) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.http_headers {
            let invalid = |reason: String| ConfigError::InvalidHeader {
                name: name.clone(),
                reason,
            };
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            headers.append(header_name, header_value);
        }
        Ok(headers)
    }
}

/// Directory holding per-registry trust material.
pub fn certs_dir() -> PathBuf {
    certs_dir_from(|key| std::env::var(key).ok())
}

pub fn certs_dir_from(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup(ENV_REGISTRY_CERTS_PATH)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CERTS_DIR))
}
