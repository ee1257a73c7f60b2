//! HTTP/1.1 over a local Unix socket.
//!
//! # Design
//! Each attempt dials the socket, runs a hyper HTTP/1 handshake on it and
//! sends one request. hyper owns the wire format; this module only bridges
//! it to the blocking [`Transport`] interface by driving the futures on a
//! small runtime owned by the transport. The response body stays streamed:
//! reading it polls the next frame on that runtime.

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, Bytes};
use http::header::HOST;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::http1::SendRequest;
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::error::{ConfigError, TransportError, TransportErrorKind};
use crate::request::HttpRequest;
use crate::transport::{RawResponse, Scheme, Transport};

/// Authority written into request URLs and the `Host` header.
const SOCKET_AUTHORITY: &str = "localhost";

type Sender = SendRequest<Full<Bytes>>;

pub struct UnixSocketTransport {
    socket_path: PathBuf,
    timeout: Option<Duration>,
    runtime: Arc<Runtime>,
}

impl UnixSocketTransport {
    /// `timeout` bounds each attempt from dial to response head.
    pub fn new(
        socket_path: impl Into<PathBuf>,
        timeout: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("dispatch-unix-socket")
            .enable_all()
            .build()
            .map_err(ConfigError::Runtime)?;
        Ok(Self {
            socket_path: socket_path.into(),
            timeout,
            runtime: Arc::new(runtime),
        })
    }

    async fn exchange(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<(Sender, Response<Incoming>), TransportError> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            TransportError::new(
                TransportErrorKind::ConnectionRefused,
                format!("dial unix {}: {e}", self.socket_path.display()),
            )
        })?;

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(hyper_error)?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "unix socket connection failed");
            }
        });

        let response = sender.send_request(request).await.map_err(hyper_error)?;
        Ok((sender, response))
    }
}

impl Transport for UnixSocketTransport {
    fn scheme(&self) -> Scheme {
        Scheme::Http
    }

    fn address(&self) -> &str {
        SOCKET_AUTHORITY
    }

    fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        let exchange = self.exchange(to_hyper_request(request)?);
        let (sender, response) = self.runtime.block_on(async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, exchange).await.map_err(|_| {
                    TransportError::new(
                        TransportErrorKind::Timeout,
                        format!(
                            "no response from unix {} within {}ms",
                            self.socket_path.display(),
                            limit.as_millis()
                        ),
                    )
                })?,
                None => exchange.await,
            }
        })?;

        let (parts, body) = response.into_parts();
        Ok(RawResponse {
            status: parts.status.as_u16(),
            headers: parts.headers,
            body: Box::new(BodyReader {
                runtime: Arc::clone(&self.runtime),
                body,
                chunk: Bytes::new(),
                _sender: sender,
            }),
        })
    }
}

/// Origin-form request for the socket: the URL's host is replaced by
/// [`SOCKET_AUTHORITY`].
fn to_hyper_request(request: &HttpRequest) -> Result<Request<Full<Bytes>>, TransportError> {
    let invalid = |detail: String| TransportError::new(TransportErrorKind::Other, detail);
    let uri: http::Uri = request
        .url
        .parse()
        .map_err(|e| invalid(format!("{}: {e}", request.url)))?;
    let target = uri.path_and_query().map_or("/", |pq| pq.as_str());

    let mut builder = Request::builder()
        .method(request.method.as_str())
        .uri(target)
        .header(HOST, SOCKET_AUTHORITY);
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }
    builder
        .body(Full::new(request.body.clone().unwrap_or_default()))
        .map_err(|e| invalid(e.to_string()))
}

fn hyper_error(e: hyper::Error) -> TransportError {
    if e.is_parse() || e.is_parse_status() {
        TransportError::new(
            TransportErrorKind::Malformed,
            format!("malformed HTTP response: {e}"),
        )
    } else if e.is_timeout() {
        TransportError::new(TransportErrorKind::Timeout, e.to_string())
    } else {
        TransportError::new(TransportErrorKind::Other, e.to_string())
    }
}

/// Blocking view of a hyper response body. Holds the request sender so the
/// connection stays up until the body is dropped.
struct BodyReader {
    runtime: Arc<Runtime>,
    body: Incoming,
    chunk: Bytes,
    _sender: Sender,
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.chunk.is_empty() {
            let Some(frame) = self.runtime.block_on(self.body.frame()) else {
                return Ok(0);
            };
            // trailers carry no data
            if let Ok(data) = frame.map_err(io::Error::other)?.into_data() {
                self.chunk = data;
            }
        }
        let n = self.chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&self.chunk[..n]);
        self.chunk.advance(n);
        Ok(n)
    }
}
