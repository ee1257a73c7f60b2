//! Best-effort unlock of an intercepting captive proxy.
//!
//! Some proxies sitting in front of the daemon answer with 403/407 (or drop
//! the connection) until a browser-style "continue" link has been followed.
//! The unlocker requests the daemon's `/info` endpoint through the client's own
//! transport, scrapes that link out of the proxy's 403 page, and requests it
//! once so the proxy lets traffic through. The scrape is a regex over the
//! page text, so the whole step is optional: the dispatcher only logs a
//! failed unlock.

use std::io::Read;
use std::sync::LazyLock;

use http::HeaderMap;
use regex::Regex;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::request::{HttpMethod, HttpRequest};
use crate::transport::{from_ureq_error, RawResponse, Transport};

/// The unlock link embeds a second URL (the page the proxy would redirect to).
static UNLOCK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#".*"(http://.*http://.*)".*"#).expect("unlock pattern is a valid regex")
});

/// The daemon an unlock is aimed at, reached through the client's transport.
#[derive(Clone, Copy)]
pub struct UnlockTarget<'a> {
    pub transport: &'a dyn Transport,
    pub api_version: &'a str,
}

impl UnlockTarget<'_> {
    pub fn info_url(&self) -> String {
        format!(
            "{}://{}/v{}/info",
            self.transport.scheme().as_str(),
            self.transport.address(),
            self.api_version.trim_start_matches('v')
        )
    }

    /// Whether `url` names the daemon's own scheme and authority, so it can
    /// be requested through the transport.
    pub fn serves(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let authority = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        parsed.scheme() == self.transport.scheme().as_str()
            && authority == self.transport.address()
    }

    fn get(&self, url: String) -> Result<RawResponse, UnlockError> {
        let request = HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: HeaderMap::new(),
            body: None,
        };
        self.transport
            .send(&request)
            .map_err(|e| UnlockError::Request(e.message))
    }
}

#[derive(Debug, Error)]
pub enum UnlockError {
    #[error("unlock request failed: {0}")]
    Request(String),

    #[error("can not handle status code {0}")]
    NotIntercepted(u16),

    #[error("no unlock link in proxy response")]
    NoUnlockUrl,
}

pub trait ProxyUnlocker: Send + Sync {
    fn unlock(&self, target: &UnlockTarget<'_>) -> Result<(), UnlockError>;
}

/// Sends nothing. For daemons known to be reachable without a proxy.
pub struct NoopUnlocker;

impl ProxyUnlocker for NoopUnlocker {
    fn unlock(&self, _target: &UnlockTarget<'_>) -> Result<(), UnlockError> {
        Ok(())
    }
}

/// Requests the daemon's `/info` through its transport. Unlock links pointing anywhere
/// else are followed over plain HTTP with a separate agent.
pub struct HttpProxyUnlocker {
    agent: ureq::Agent,
}

impl Default for HttpProxyUnlocker {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpProxyUnlocker {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl ProxyUnlocker for HttpProxyUnlocker {
    fn unlock(&self, target: &UnlockTarget<'_>) -> Result<(), UnlockError> {
        let url = target.info_url();
        debug!(%url, "proxy workaround check");

        let response = target.get(url)?;
        debug!(status = response.status, "proxy workaround check answered");
        if response.status != 403 {
            return Err(UnlockError::NotIntercepted(response.status));
        }

        let mut page = String::new();
        let mut body = response.body;
        body.read_to_string(&mut page)
            .map_err(|e| UnlockError::Request(e.to_string()))?;
        drop(body);
        let unlock_url = extract_unlock_url(&page).ok_or(UnlockError::NoUnlockUrl)?;

        debug!(url = %unlock_url, "making proxy auth call");
        let status = if target.serves(&unlock_url) {
            target.get(unlock_url)?.status
        } else {
            self.agent
                .get(&unlock_url)
                .call()
                .map_err(|e| UnlockError::Request(from_ureq_error(e).message))?
                .status()
                .as_u16()
        };
        debug!(status, "proxy auth call answered");
        Ok(())
    }
}

/// Pull the doubly-embedded unlock URL out of a proxy's 403 page.
pub fn extract_unlock_url(page: &str) -> Option<String> {
    UNLOCK_URL
        .captures(page)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}
