//! Request dispatch against the daemon's REST API.
//!
//! # Design
//! A dispatch is one logical call. It runs up to `retries + 1` attempts, each
//! of which builds a fresh [`HttpRequest`], sends it through the configured
//! [`Transport`] and classifies the outcome. Only failures an intercepting
//! proxy causes (403, 407, no response) are retried; before each retry the
//! [`ProxyUnlocker`] gets a chance to unstick the proxy. Everything else
//! returns after the first attempt.
//!
//! Request bodies are [`Bytes`], so every attempt resends the same payload.

use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE, USER_AGENT};
use http::HeaderMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::classify::{classify_status, classify_transport, is_success};
use crate::config::{ClientConfig, Endpoint};
use crate::error::{ApiError, ConfigError};
use crate::path::api_path;
use crate::proxy::{HttpProxyUnlocker, UnlockTarget, ProxyUnlocker};
use crate::request::{HttpMethod, HttpRequest, Query};
use crate::response::{ResponseBody, ServerResponse};
use crate::retry::RetryPolicy;
use crate::transport::{Scheme, Transport, UreqTransport};

pub const DEFAULT_USER_AGENT: &str = concat!("dispatch-core/", env!("CARGO_PKG_VERSION"));

/// What to do with the `User-Agent` header right before sending.
#[derive(Debug, Clone)]
enum UserAgentOverride {
    Keep,
    Remove,
    Set(HeaderValue),
}

/// Blocking client for one daemon.
///
/// Holds no per-call state, so a single `Client` can serve concurrent
/// dispatches from several threads.
pub struct Client {
    transport: Arc<dyn Transport>,
    unlocker: Arc<dyn ProxyUnlocker>,
    api_version: String,
    headers: HeaderMap,
    user_agent: UserAgentOverride,
    retry: RetryPolicy,
}

impl Client {
    /// Connect according to `config`, picking the TCP/TLS or Unix socket
    /// transport from its host.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let timeout = config.request_timeout();
        let transport: Arc<dyn Transport> = match config.endpoint()? {
            Endpoint::Tcp { address, tls } => {
                let scheme = if tls { Scheme::Https } else { Scheme::Http };
                Arc::new(UreqTransport::new(
                    scheme,
                    address,
                    config.tls.as_ref(),
                    timeout,
                )?)
            }
            #[cfg(unix)]
            Endpoint::Unix { path } => {
                Arc::new(crate::unix::UnixSocketTransport::new(path, timeout)?)
            }
            #[cfg(not(unix))]
            Endpoint::Unix { .. } => {
                return Err(ConfigError::InvalidHost {
                    host: config.host.clone(),
                    reason: "unix sockets are not supported on this platform".to_string(),
                })
            }
        };
        Self::with_transport(config, transport)
    }

    /// Like [`new`](Self::new) but over a caller-supplied transport. The
    /// config's host and TLS settings are ignored.
    pub fn with_transport(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        overlay_headers(&mut headers, &config.header_map()?);

        let user_agent = match config.user_agent.as_deref() {
            None => UserAgentOverride::Keep,
            Some("") => UserAgentOverride::Remove,
            Some(value) => UserAgentOverride::Set(HeaderValue::from_str(value).map_err(|e| {
                ConfigError::InvalidHeader {
                    name: USER_AGENT.to_string(),
                    reason: e.to_string(),
                }
            })?),
        };

        Ok(Self {
            transport,
            unlocker: Arc::new(HttpProxyUnlocker::new()),
            api_version: config.api_version.clone(),
            headers,
            user_agent,
            retry: config.retry_policy(),
        })
    }

    pub fn with_proxy_unlocker(mut self, unlocker: Arc<dyn ProxyUnlocker>) -> Self {
        self.unlocker = unlocker;
        self
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn scheme(&self) -> Scheme {
        self.transport.scheme()
    }

    pub fn address(&self) -> &str {
        self.transport.address()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    // -----------------------------------------------------------------------
    // Verb wrappers
    // -----------------------------------------------------------------------

    pub fn head(
        &self,
        path: &str,
        query: &Query,
        headers: &HeaderMap,
    ) -> Result<ServerResponse, ApiError> {
        self.dispatch(HttpMethod::Head, path, query, None, headers)
    }

    pub fn get(
        &self,
        path: &str,
        query: &Query,
        headers: &HeaderMap,
    ) -> Result<ServerResponse, ApiError> {
        self.dispatch(HttpMethod::Get, path, query, None, headers)
    }

    pub fn delete(
        &self,
        path: &str,
        query: &Query,
        headers: &HeaderMap,
    ) -> Result<ServerResponse, ApiError> {
        self.dispatch(HttpMethod::Delete, path, query, None, headers)
    }

    /// POST `body` encoded as JSON.
    pub fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Query,
        body: Option<&T>,
        headers: &HeaderMap,
    ) -> Result<ServerResponse, ApiError> {
        self.send_json(HttpMethod::Post, path, query, body, headers)
    }

    /// PUT `body` encoded as JSON.
    pub fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Query,
        body: Option<&T>,
        headers: &HeaderMap,
    ) -> Result<ServerResponse, ApiError> {
        self.send_json(HttpMethod::Put, path, query, body, headers)
    }

    pub fn post_raw(
        &self,
        path: &str,
        query: &Query,
        body: Option<Bytes>,
        headers: &HeaderMap,
    ) -> Result<ServerResponse, ApiError> {
        self.dispatch(HttpMethod::Post, path, query, body, headers)
    }

    pub fn put_raw(
        &self,
        path: &str,
        query: &Query,
        body: Option<Bytes>,
        headers: &HeaderMap,
    ) -> Result<ServerResponse, ApiError> {
        self.dispatch(HttpMethod::Put, path, query, body, headers)
    }

    fn send_json<T: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        query: &Query,
        body: Option<&T>,
        headers: &HeaderMap,
    ) -> Result<ServerResponse, ApiError> {
        let Some(value) = body else {
            return self.dispatch(method, path, query, None, headers);
        };
        let encoded =
            serde_json::to_vec(value).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut headers = headers.clone();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.dispatch(method, path, query, Some(Bytes::from(encoded)), &headers)
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Run one logical call, retrying proxy-intercepted failures.
    pub fn dispatch(
        &self,
        method: HttpMethod,
        path: &str,
        query: &Query,
        body: Option<Bytes>,
        headers: &HeaderMap,
    ) -> Result<ServerResponse, ApiError> {
        self.dispatch_with_cancel(method, path, query, body, headers, &CancelToken::new())
    }

    /// [`dispatch`](Self::dispatch) that gives up with [`ApiError::Cancelled`]
    /// once `cancel` fires. The token is checked before every attempt and
    /// interrupts the backoff; an attempt already in flight is not aborted.
    pub fn dispatch_with_cancel(
        &self,
        method: HttpMethod,
        path: &str,
        query: &Query,
        body: Option<Bytes>,
        headers: &HeaderMap,
        cancel: &CancelToken,
    ) -> Result<ServerResponse, ApiError> {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let error = match self.send_once(method, path, query, body.clone(), headers) {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };
            if error.is_pre_flight() {
                return Err(error);
            }

            let status = error.status_code();
            debug!(status, attempt, "request failed");
            if !RetryPolicy::is_retryable(error.status()) {
                debug!(status, "not-retryable error");
                return Err(error);
            }

            if let Err(unlock_error) = self.unlocker.unlock(&self.unlock_target()) {
                debug!(error = %unlock_error, "proxy workaround did not apply");
            }

            if attempt >= max_attempts {
                warn!(attempts = attempt, status, "retry budget exhausted");
                return Err(error);
            }
            if cancel.wait(self.retry.backoff) {
                return Err(ApiError::Cancelled);
            }
            attempt += 1;
        }
    }

    /// One attempt: build, send, classify.
    pub fn send_once(
        &self,
        method: HttpMethod,
        path: &str,
        query: &Query,
        body: Option<Bytes>,
        headers: &HeaderMap,
    ) -> Result<ServerResponse, ApiError> {
        let body = match body {
            None if method.expects_payload() => Some(Bytes::new()),
            other => other,
        };
        let mut request = self.build_request(method, path, query, body, headers)?;

        if method.expects_payload() && !request.headers.contains_key(CONTENT_TYPE) {
            request
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        }
        match &self.user_agent {
            UserAgentOverride::Keep => {}
            UserAgentOverride::Remove => {
                request.headers.remove(USER_AGENT);
            }
            UserAgentOverride::Set(value) => {
                request.headers.insert(USER_AGENT, value.clone());
            }
        }

        debug!(%method, url = %request.url, "calling daemon");
        let raw = self
            .transport
            .send(&request)
            .map_err(|e| classify_transport(self.transport.scheme(), &e))?;

        if !is_success(raw.status) {
            let status = raw.status;
            let mut error_body = Vec::new();
            let mut reader = raw.body;
            reader
                .read_to_end(&mut error_body)
                .map_err(|e| ApiError::ReadBody {
                    status,
                    detail: e.to_string(),
                })?;
            return Err(classify_status(status, &error_body, &request.url));
        }

        Ok(ServerResponse::new(
            raw.status,
            raw.headers,
            ResponseBody::new(raw.body),
        ))
    }

    /// Qualify `path` with scheme, address and API version, and layer the
    /// per-call `headers` over the client's persistent ones.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &Query,
        body: Option<Bytes>,
        headers: &HeaderMap,
    ) -> Result<HttpRequest, ApiError> {
        let target = api_path(&self.api_version, path, query);
        let url = format!(
            "{}://{}{}",
            self.transport.scheme().as_str(),
            self.transport.address(),
            target
        );
        http::Uri::try_from(url.as_str())
            .map_err(|e| ApiError::RequestBuild(format!("{url}: {e}")))?;

        let mut request_headers = self.headers.clone();
        overlay_headers(&mut request_headers, headers);

        Ok(HttpRequest {
            method,
            url,
            headers: request_headers,
            body,
        })
    }

    fn unlock_target(&self) -> UnlockTarget<'_> {
        UnlockTarget {
            transport: self.transport.as_ref(),
            api_version: &self.api_version,
        }
    }
}

/// Replace every header named in `top`, keeping all of its values.
fn overlay_headers(base: &mut HeaderMap, top: &HeaderMap) {
    for name in top.keys() {
        base.remove(name);
        for value in top.get_all(name) {
            base.append(name.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use crate::error::{ErrorKind, TransportError, TransportErrorKind};
    use crate::proxy::UnlockError;
    use crate::transport::RawResponse;

    type Step = Result<(u16, &'static str), TransportError>;

    /// Answers from a script; 200 with an empty body once it runs out.
    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<Step>>,
        sent: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(steps.into()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn statuses(statuses: &[u16]) -> Arc<Self> {
            Self::new(statuses.iter().map(|s| Ok((*s, ""))).collect())
        }

        fn attempts(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        fn last(&self) -> HttpRequest {
            self.sent.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl Transport for ScriptedTransport {
        fn scheme(&self) -> Scheme {
            Scheme::Http
        }

        fn address(&self) -> &str {
            "daemon.test:2375"
        }

        fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
            self.sent.lock().unwrap().push(request.clone());
            let (status, body) = self.script.lock().unwrap().pop_front().unwrap_or(Ok((200, "")))?;
            Ok(RawResponse {
                status,
                headers: HeaderMap::new(),
                body: Box::new(Cursor::new(body.as_bytes().to_vec())),
            })
        }
    }

    #[derive(Default)]
    struct CountingUnlocker {
        calls: AtomicUsize,
    }

    impl ProxyUnlocker for CountingUnlocker {
        fn unlock(&self, target: &UnlockTarget<'_>) -> Result<(), UnlockError> {
            assert_eq!(target.info_url(), "http://daemon.test:2375/v1.24/info");
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(UnlockError::NotIntercepted(200))
        }
    }

    fn config(retries: u32) -> ClientConfig {
        ClientConfig {
            host: "tcp://daemon.test:2375".to_string(),
            retries,
            retry_backoff_ms: 10,
            ..ClientConfig::default()
        }
    }

    fn client_with(
        config: &ClientConfig,
        transport: Arc<ScriptedTransport>,
    ) -> (Client, Arc<CountingUnlocker>) {
        let unlocker = Arc::new(CountingUnlocker::default());
        let client = Client::with_transport(config, transport)
            .unwrap()
            .with_proxy_unlocker(unlocker.clone());
        (client, unlocker)
    }

    fn get(client: &Client) -> Result<ServerResponse, ApiError> {
        client.get("/info", &Query::new(), &HeaderMap::new())
    }

    // --- retry loop ---

    #[test]
    fn success_returns_on_first_attempt_without_unlock() {
        let transport = ScriptedTransport::statuses(&[200]);
        let (client, unlocker) = client_with(&config(3), transport.clone());
        let response = get(&client).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(transport.attempts(), 1);
        assert_eq!(unlocker.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn proxy_statuses_are_retried_until_success() {
        let transport = ScriptedTransport::statuses(&[403, 407, 200]);
        let (client, unlocker) = client_with(&config(2), transport.clone());
        let response = get(&client).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(transport.attempts(), 3);
        assert_eq!(unlocker.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn server_error_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok((500, "boom")), Ok((500, "boom"))]);
        let (client, unlocker) = client_with(&config(1), transport.clone());
        let err = get(&client).unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(transport.attempts(), 1);
        assert_eq!(unlocker.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn exhausted_budget_returns_last_error_after_backoff() {
        let transport = ScriptedTransport::statuses(&[403, 407, 407]);
        let mut cfg = config(2);
        cfg.retry_backoff_ms = 25;
        let (client, unlocker) = client_with(&cfg, transport.clone());

        let start = Instant::now();
        let err = get(&client).unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(err.status(), Some(407));
        assert_eq!(err.kind(), ErrorKind::EmptyErrorStatus);
        assert_eq!(transport.attempts(), 3);
        assert_eq!(unlocker.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn zero_budget_makes_exactly_one_attempt() {
        let transport = ScriptedTransport::statuses(&[403, 200]);
        let (client, _) = client_with(&config(0), transport.clone());
        assert_eq!(get(&client).unwrap_err().status(), Some(403));
        assert_eq!(transport.attempts(), 1);
    }

    #[test]
    fn missing_response_is_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::new(TransportErrorKind::Other, "unexpected EOF")),
            Ok((200, "")),
        ]);
        let (client, unlocker) = client_with(&config(1), transport.clone());
        assert!(get(&client).is_ok());
        assert_eq!(transport.attempts(), 2);
        assert_eq!(unlocker.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retries_resend_the_same_body() {
        let transport = ScriptedTransport::statuses(&[407, 201]);
        let (client, _) = client_with(&config(1), transport.clone());
        let response = client
            .post_raw(
                "/build",
                &Query::new(),
                Some(Bytes::from_static(b"FROM alpine")),
                &HeaderMap::new(),
            )
            .unwrap();
        assert_eq!(response.status(), 201);
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        for request in sent.iter() {
            assert_eq!(request.body.as_deref(), Some(&b"FROM alpine"[..]));
        }
    }

    #[test]
    fn cancelled_token_stops_before_any_attempt() {
        let transport = ScriptedTransport::statuses(&[200]);
        let (client, _) = client_with(&config(1), transport.clone());
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = client
            .dispatch_with_cancel(
                HttpMethod::Get,
                "/info",
                &Query::new(),
                None,
                &HeaderMap::new(),
                &cancel,
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert_eq!(transport.attempts(), 0);
    }

    #[test]
    fn cancel_interrupts_backoff() {
        let transport = ScriptedTransport::statuses(&[403, 200]);
        let mut cfg = config(1);
        cfg.retry_backoff_ms = 60_000;
        let (client, _) = client_with(&cfg, transport.clone());

        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });
        let start = Instant::now();
        let err = client
            .dispatch_with_cancel(
                HttpMethod::Get,
                "/info",
                &Query::new(),
                None,
                &HeaderMap::new(),
                &cancel,
            )
            .unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, ApiError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(30));
        assert_eq!(transport.attempts(), 1);
    }

    // --- request building ---

    #[test]
    fn request_is_qualified_with_scheme_address_and_version() {
        let transport = ScriptedTransport::statuses(&[200]);
        let (client, _) = client_with(&config(0), transport.clone());
        client
            .get("/containers/json", &Query::new().with("all", "1"), &HeaderMap::new())
            .unwrap();
        let request = transport.last();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "http://daemon.test:2375/v1.24/containers/json?all=1");
        assert!(request.body.is_none());
    }

    #[test]
    fn malformed_path_fails_without_sending() {
        let transport = ScriptedTransport::statuses(&[200]);
        let (client, unlocker) = client_with(&config(2), transport.clone());
        let err = client
            .get("/containers/bad name", &Query::new(), &HeaderMap::new())
            .unwrap_err();
        assert!(matches!(err, ApiError::RequestBuild(_)));
        assert_eq!(transport.attempts(), 0);
        assert_eq!(unlocker.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn call_headers_override_persistent_headers() {
        let mut cfg = config(0);
        cfg.http_headers = vec![
            ("X-Team".to_string(), "infra".to_string()),
            ("X-Keep".to_string(), "1".to_string()),
        ];
        let transport = ScriptedTransport::statuses(&[200]);
        let (client, _) = client_with(&cfg, transport.clone());

        let mut overlay = HeaderMap::new();
        overlay.append("x-team", HeaderValue::from_static("a"));
        overlay.append("x-team", HeaderValue::from_static("b"));
        client.get("/info", &Query::new(), &overlay).unwrap();

        let request = transport.last();
        let teams: Vec<_> = request.headers.get_all("x-team").iter().collect();
        assert_eq!(teams, vec!["a", "b"]);
        assert_eq!(request.headers.get("x-keep").unwrap(), "1");
    }

    #[test]
    fn user_agent_defaults_to_client_value() {
        let transport = ScriptedTransport::statuses(&[200]);
        let (client, _) = client_with(&config(0), transport.clone());
        get(&client).unwrap();
        assert_eq!(transport.last().headers.get(USER_AGENT).unwrap(), DEFAULT_USER_AGENT);
    }

    #[test]
    fn empty_user_agent_override_removes_header() {
        let mut cfg = config(0);
        cfg.user_agent = Some(String::new());
        let transport = ScriptedTransport::statuses(&[200]);
        let (client, _) = client_with(&cfg, transport.clone());
        get(&client).unwrap();
        assert!(transport.last().headers.get(USER_AGENT).is_none());
    }

    #[test]
    fn user_agent_override_replaces_header() {
        let mut cfg = config(0);
        cfg.user_agent = Some("X".to_string());
        cfg.http_headers = vec![("User-Agent".to_string(), "persistent".to_string())];
        let transport = ScriptedTransport::statuses(&[200]);
        let (client, _) = client_with(&cfg, transport.clone());
        get(&client).unwrap();
        let request = transport.last();
        let agents: Vec<_> = request.headers.get_all(USER_AGENT).iter().collect();
        assert_eq!(agents, vec!["X"]);
    }

    #[test]
    fn invalid_user_agent_override_is_rejected() {
        let mut cfg = config(0);
        cfg.user_agent = Some("bad\nagent".to_string());
        let result = Client::with_transport(&cfg, ScriptedTransport::statuses(&[]));
        assert!(matches!(result.err().unwrap(), ConfigError::InvalidHeader { .. }));
    }

    #[test]
    fn bodiless_post_sends_empty_plain_text() {
        let transport = ScriptedTransport::statuses(&[204]);
        let (client, _) = client_with(&config(0), transport.clone());
        client
            .post_raw("/containers/abc/start", &Query::new(), None, &HeaderMap::new())
            .unwrap();
        let request = transport.last();
        assert_eq!(request.body.as_deref(), Some(&b""[..]));
        assert_eq!(request.headers.get(CONTENT_TYPE).unwrap(), "text/plain");
    }

    #[test]
    fn caller_content_type_is_kept() {
        let transport = ScriptedTransport::statuses(&[200]);
        let (client, _) = client_with(&config(0), transport.clone());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-tar"));
        client
            .put_raw(
                "/containers/abc/archive",
                &Query::new(),
                Some(Bytes::from_static(b"tar")),
                &headers,
            )
            .unwrap();
        assert_eq!(transport.last().headers.get(CONTENT_TYPE).unwrap(), "application/x-tar");
    }

    #[test]
    fn json_body_is_encoded() {
        let transport = ScriptedTransport::statuses(&[201]);
        let (client, _) = client_with(&config(0), transport.clone());
        let body = serde_json::json!({"Image": "alpine"});
        client
            .post_json(
                "/containers/create",
                &Query::new().with("name", "web"),
                Some(&body),
                &HeaderMap::new(),
            )
            .unwrap();
        let request = transport.last();
        assert_eq!(request.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        let sent: serde_json::Value =
            serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(sent, body);
    }

    // --- classification ---

    #[test]
    fn empty_error_body_names_status_and_route() {
        let transport = ScriptedTransport::statuses(&[404]);
        let (client, _) = client_with(&config(0), transport);
        let message = get(&client).unwrap_err().to_string();
        assert!(message.contains("Not Found"), "{message}");
        assert!(message.contains("http://daemon.test:2375/v1.24/info"), "{message}");
    }

    #[test]
    fn daemon_error_body_is_trimmed() {
        let transport = ScriptedTransport::new(vec![Ok((409, "  name already in use \n"))]);
        let (client, _) = client_with(&config(0), transport);
        match get(&client).unwrap_err() {
            ApiError::Daemon { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "name already in use");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_response_hints_at_tls() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::new(
            TransportErrorKind::Malformed,
            "malformed HTTP response",
        ))]);
        let (client, _) = client_with(&config(0), transport);
        assert_eq!(get(&client).unwrap_err().kind(), ErrorKind::TlsMismatch);
    }

    #[test]
    fn redirect_status_is_success() {
        let transport = ScriptedTransport::new(vec![Ok((304, ""))]);
        let (client, _) = client_with(&config(0), transport);
        assert_eq!(get(&client).unwrap().status(), 304);
    }
}
