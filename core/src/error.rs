//! Error types for the daemon client.
//!
//! # Design
//! `ApiError` is what every dispatch returns on failure. Its messages are
//! written for an operator debugging a daemon connection, so the variants that
//! come out of the classifier carry hints (TLS mismatch, client certificates,
//! API version) rather than the bare transport text.
//!
//! The retry decision only looks at [`ApiError::status`], never at the
//! message, which keeps the policy mechanical.

use std::fmt;

use thiserror::Error;

/// The error taxonomy, independent of message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConnectionFailed,
    TlsMismatch,
    ClientCertRejected,
    DaemonErrorBody,
    EmptyErrorStatus,
    GenericTransport,
    InvalidRequest,
    Cancelled,
}

/// Errors returned by `Client` dispatches.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Timeout, refused connection, or failed local-socket dial.
    #[error("Cannot connect to the daemon. Is the daemon running on this host?")]
    ConnectionFailed { detail: String },

    /// A plaintext client got a response that does not parse as HTTP.
    #[error("{detail}.\n* Are you trying to connect to a TLS-enabled daemon without TLS?")]
    TlsMismatch { detail: String },

    /// The daemon refused the TLS handshake because of our client certificate.
    #[error(
        "The server probably has client authentication (--tlsverify) enabled. \
         Please check your TLS client certification settings: {detail}"
    )]
    ClientCertRejected { detail: String },

    #[error("An error occurred trying to connect: {detail}")]
    Transport { detail: String },

    /// Non-success status with an empty body, usually an API version mismatch.
    #[error(
        "Error: request returned {reason} for API route and version {route}, \
         check if the server supports the requested API version"
    )]
    EmptyErrorStatus {
        status: u16,
        reason: String,
        route: String,
    },

    /// Non-success status with the daemon's own error text, already trimmed.
    #[error("Error response from daemon: {message}")]
    Daemon { status: u16, message: String },

    /// The error body of a non-success response could not be read.
    #[error("failed to read error response (status {status}): {detail}")]
    ReadBody { status: u16, detail: String },

    #[error("invalid request: {0}")]
    RequestBuild(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// HTTP status of the attempt that failed; `None` when no response was
    /// received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::EmptyErrorStatus { status, .. }
            | ApiError::Daemon { status, .. }
            | ApiError::ReadBody { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// [`status`](Self::status) with `-1` standing in for "no response".
    pub fn status_code(&self) -> i32 {
        self.status().map_or(-1, i32::from)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            ApiError::TlsMismatch { .. } => ErrorKind::TlsMismatch,
            ApiError::ClientCertRejected { .. } => ErrorKind::ClientCertRejected,
            ApiError::Transport { .. } | ApiError::ReadBody { .. } => ErrorKind::GenericTransport,
            ApiError::EmptyErrorStatus { .. } => ErrorKind::EmptyErrorStatus,
            ApiError::Daemon { .. } => ErrorKind::DaemonErrorBody,
            ApiError::RequestBuild(_) | ApiError::Serialization(_) => ErrorKind::InvalidRequest,
            ApiError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Raised before anything reached the wire, so there is no attempt
    /// outcome to retry on.
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            ApiError::RequestBuild(_) | ApiError::Serialization(_) | ApiError::Cancelled
        )
    }
}

/// Coarse category a transport assigns to its own failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    ConnectionRefused,
    Malformed,
    Tls,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Timeout => "timeout",
            Self::ConnectionRefused => "connection refused",
            Self::Malformed => "malformed response",
            Self::Tls => "tls",
            Self::Other => "other",
        };
        f.write_str(text)
    }
}

/// A failure below HTTP: no status code was received.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors raised while turning a `ClientConfig` into a working client.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid host {host:?}: {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TLS material in {path}: {reason}")]
    Tls { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Parse(String),

    #[error("failed to start the socket I/O runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
