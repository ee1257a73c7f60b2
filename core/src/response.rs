//! The normalized result of a successful dispatch.
//!
//! # Design
//! A `ServerResponse` only exists for statuses in `[200, 400)`; failures come
//! back as [`ApiError`] instead. The body is left open so large or streaming
//! responses are never buffered by the client. Dropping the response (or
//! calling [`ServerResponse::close`]) releases the underlying connection.

use std::fmt;
use std::io::{self, Read};

use http::HeaderMap;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Owned, readable response body stream.
pub struct ResponseBody {
    reader: Box<dyn Read + Send>,
}

impl ResponseBody {
    pub fn new(reader: Box<dyn Read + Send>) -> Self {
        Self { reader }
    }

    pub fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.reader.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody").finish_non_exhaustive()
    }
}

/// Envelope returned to the caller: status, headers and the open body.
#[derive(Debug)]
pub struct ServerResponse {
    status: u16,
    headers: HeaderMap,
    body: ResponseBody,
}

impl ServerResponse {
    pub fn new(status: u16, headers: HeaderMap, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_mut(&mut self) -> &mut ResponseBody {
        &mut self.body
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Read the remaining body as UTF-8 text and release the stream.
    pub fn text(mut self) -> Result<String, ApiError> {
        let status = self.status;
        let bytes = self.body.read_to_vec().map_err(|e| ApiError::ReadBody {
            status,
            detail: e.to_string(),
        })?;
        String::from_utf8(bytes).map_err(|e| ApiError::ReadBody {
            status,
            detail: e.to_string(),
        })
    }

    /// Decode the remaining body as JSON and release the stream.
    pub fn json<T: DeserializeOwned>(mut self) -> Result<T, ApiError> {
        let status = self.status;
        let bytes = self.body.read_to_vec().map_err(|e| ApiError::ReadBody {
            status,
            detail: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Serialization(e.to_string()))
    }

    /// Release the body without reading it.
    pub fn close(self) {
        drop(self);
    }
}
