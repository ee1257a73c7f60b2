//! Resilient request dispatcher for a container daemon's REST API.
//!
//! # Overview
//! [`Client`] turns a logical call (method, API path, query, body, headers)
//! into one or more HTTP attempts against the daemon, retries the narrow set
//! of failures an intercepting proxy produces, and hands back either a
//! [`ServerResponse`] with an open body or an [`ApiError`] whose message tells
//! an operator what to check.
//!
//! # Design
//! - Network I/O lives behind the [`Transport`] trait: [`UreqTransport`] for
//!   TCP/TLS, `UnixSocketTransport` for local sockets, scripted doubles in
//!   tests.
//! - Retry budget, backoff, user-agent override and persistent headers come
//!   from an explicit [`ClientConfig`]; the environment is only read by
//!   [`ClientConfig::from_env`].
//! - The proxy unlock step is a swappable [`ProxyUnlocker`]; its failures are
//!   logged and never replace the dispatch error.

pub mod cancel;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod path;
pub mod proxy;
pub mod request;
pub mod response;
pub mod retry;
pub mod transport;
#[cfg(unix)]
pub mod unix;

pub use cancel::CancelToken;
pub use client::{Client, DEFAULT_USER_AGENT};
pub use config::{ClientConfig, Endpoint, TlsOptions};
pub use error::{ApiError, ConfigError, ErrorKind, TransportError, TransportErrorKind};
pub use proxy::{HttpProxyUnlocker, NoopUnlocker, ProxyUnlocker, UnlockError, UnlockTarget};
pub use request::{HttpMethod, HttpRequest, Query};
pub use response::{ResponseBody, ServerResponse};
pub use retry::RetryPolicy;
pub use transport::{RawResponse, Scheme, Transport, UreqTransport};
#[cfg(unix)]
pub use unix::UnixSocketTransport;
