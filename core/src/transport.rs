//! Transports: the only code that touches the network.
//!
//! # Design
//! The client describes each attempt as an [`HttpRequest`] and hands it to a
//! `Transport`. Keeping I/O behind this trait lets tests script daemon
//! responses and lets the client switch between TCP/TLS and a local socket
//! without the dispatcher knowing.
//!
//! Transports report failures as [`TransportError`] only. Status codes are
//! never errors at this layer; interpreting them is the classifier's job.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use http::HeaderMap;

use crate::config::TlsOptions;
use crate::error::{ConfigError, TransportError, TransportErrorKind};
use crate::request::HttpRequest;

/// URL scheme the client speaks on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// A response as delivered by the transport, body still unread.
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Box<dyn Read + Send>,
}

pub trait Transport: Send + Sync {
    fn scheme(&self) -> Scheme;

    /// Host (and port) placed in request URLs.
    fn address(&self) -> &str;

    /// Perform one round-trip. Must not fail on non-success statuses.
    fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError>;
}

/// TCP and TLS transport backed by a ureq agent.
pub struct UreqTransport {
    scheme: Scheme,
    address: String,
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(
        scheme: Scheme,
        address: impl Into<String>,
        tls: Option<&TlsOptions>,
        timeout: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .user_agent(ureq::config::AutoHeaderValue::None)
            .timeout_global(timeout);
        if let Some(options) = tls {
            builder = builder.tls_config(build_tls_config(options)?);
        }
        Ok(Self {
            scheme,
            address: address.into(),
            agent: builder.build().new_agent(),
        })
    }
}

impl Transport for UreqTransport {
    fn scheme(&self) -> Scheme {
        self.scheme
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        let build_error =
            |e: ureq::http::Error| TransportError::new(TransportErrorKind::Other, e.to_string());

        let result = match &request.body {
            Some(body) => self.agent.run(builder.body(body.to_vec()).map_err(build_error)?),
            None => self.agent.run(builder.body(()).map_err(build_error)?),
        };
        let response = result.map_err(from_ureq_error)?;

        let (parts, body) = response.into_parts();
        Ok(RawResponse {
            status: parts.status.as_u16(),
            headers: parts.headers,
            body: Box::new(body.into_reader()),
        })
    }
}

pub(crate) fn from_ureq_error(error: ureq::Error) -> TransportError {
    let kind = match &error {
        ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
        ureq::Error::ConnectionFailed => TransportErrorKind::ConnectionRefused,
        ureq::Error::Io(source) => match source.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                TransportErrorKind::Timeout
            }
            std::io::ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
            _ => TransportErrorKind::Other,
        },
        ureq::Error::Protocol(_) => TransportErrorKind::Malformed,
        ureq::Error::Tls(_) | ureq::Error::Rustls(_) => TransportErrorKind::Tls,
        _ => TransportErrorKind::Other,
    };
    TransportError::new(kind, error.to_string())
}

fn build_tls_config(options: &TlsOptions) -> Result<ureq::tls::TlsConfig, ConfigError> {
    let mut builder = ureq::tls::TlsConfig::builder();

    if let Some(ca_file) = &options.ca_file {
        let roots = read_certificates(ca_file)?;
        builder = builder.root_certs(ureq::tls::RootCerts::new_with_certs(&roots));
    }

    if let (Some(cert_file), Some(key_file)) = (&options.cert_file, &options.key_file) {
        let chain = read_certificates(cert_file)?;
        let key_pem = read_file(key_file)?;
        let key = ureq::tls::PrivateKey::from_pem(&key_pem).map_err(|e| ConfigError::Tls {
            path: key_file.display().to_string(),
            reason: e.to_string(),
        })?;
        builder = builder.client_cert(Some(ureq::tls::ClientCert::new_with_certs(&chain, key)));
    }

    Ok(builder.build())
}

fn read_certificates(path: &Path) -> Result<Vec<ureq::tls::Certificate<'static>>, ConfigError> {
    let pem = read_file(path)?;
    let tls_error = |reason: String| ConfigError::Tls {
        path: path.display().to_string(),
        reason,
    };
    let mut certificates = Vec::new();
    for item in ureq::tls::parse_pem(&pem) {
        let item = item.map_err(|e| tls_error(e.to_string()))?;
        if let ureq::tls::PemItem::Certificate(certificate) = item {
            certificates.push(certificate);
        }
    }
    if certificates.is_empty() {
        return Err(tls_error("no certificate blocks found".to_string()));
    }
    Ok(certificates)
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_names() {
        assert_eq!(Scheme::Http.as_str(), "http");
        assert_eq!(Scheme::Https.as_str(), "https");
    }

    #[test]
    fn missing_ca_file_is_a_config_error() {
        let options = TlsOptions {
            ca_file: Some("/nonexistent/dispatch-core/ca.pem".into()),
            ..TlsOptions::default()
        };
        let err = UreqTransport::new(Scheme::Https, "127.0.0.1:2376", Some(&options), None)
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn ca_file_without_certificates_is_rejected() {
        let path = std::env::temp_dir()
            .join(format!("dispatch-core-empty-{}.pem", std::process::id()));
        fs::write(&path, b"not a certificate\n").unwrap();
        let options = TlsOptions {
            ca_file: Some(path.clone()),
            ..TlsOptions::default()
        };
        let result = UreqTransport::new(Scheme::Https, "127.0.0.1:2376", Some(&options), None);
        fs::remove_file(&path).unwrap();
        assert!(matches!(result.err().unwrap(), ConfigError::Tls { .. }));
    }

    #[test]
    fn io_refusal_maps_to_connection_refused() {
        let error = ureq::Error::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert_eq!(from_ureq_error(error).kind, TransportErrorKind::ConnectionRefused);
    }

    #[test]
    fn silent_daemon_hits_the_attempt_timeout() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let transport = UreqTransport::new(
            Scheme::Http,
            address.clone(),
            None,
            Some(Duration::from_millis(200)),
        )
        .unwrap();
        let request = HttpRequest {
            method: crate::request::HttpMethod::Get,
            url: format!("http://{address}/v1.24/info"),
            headers: HeaderMap::new(),
            body: None,
        };
        let err = transport.send(&request).err().unwrap();
        assert_eq!(err.kind, TransportErrorKind::Timeout);
        drop(listener);
    }
}
