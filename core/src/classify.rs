//! Maps transport failures and non-success statuses onto [`ApiError`].
//!
//! Rules are evaluated in order and are purely a function of their inputs;
//! nothing here retries or performs I/O.

use crate::error::{ApiError, TransportError, TransportErrorKind};
use crate::transport::Scheme;

/// Classify a failure that happened before any status code was received.
pub fn classify_transport(scheme: Scheme, error: &TransportError) -> ApiError {
    let message = error.message.to_ascii_lowercase();
    let detail = error.message.clone();

    if error.kind == TransportErrorKind::Timeout
        || error.kind == TransportErrorKind::ConnectionRefused
        || message.contains("connection refused")
        || message.contains("dial unix")
    {
        return ApiError::ConnectionFailed { detail };
    }

    if scheme == Scheme::Http
        && (error.kind == TransportErrorKind::Malformed
            || message.contains("malformed http response"))
    {
        return ApiError::TlsMismatch { detail };
    }

    if scheme == Scheme::Https && is_bad_certificate(&message) {
        return ApiError::ClientCertRejected { detail };
    }

    ApiError::Transport { detail }
}

// rustls spells alerts in CamelCase, OpenSSL-style stacks with spaces.
fn is_bad_certificate(message: &str) -> bool {
    ["bad certificate", "badcertificate", "certificate required", "certificaterequired"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Classify a response whose status is outside `[200, 400)`.
///
/// `route` is the request URL, quoted back to the operator when the daemon
/// gave no explanation.
pub fn classify_status(status: u16, body: &[u8], route: &str) -> ApiError {
    let text = String::from_utf8_lossy(body);
    let message = text.trim();
    if body.is_empty() {
        return ApiError::EmptyErrorStatus {
            status,
            reason: status_text(status).to_string(),
            route: route.to_string(),
        };
    }
    ApiError::Daemon {
        status,
        message: message.to_string(),
    }
}

pub fn is_success(status: u16) -> bool {
    (200..400).contains(&status)
}

fn status_text(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("")
}
