//! HTTP transport abstraction.
//!
//! [`TapConn`](super::TapConn) never talks to the network directly: it hands
//! fully built [`HttpRequest`]s to an [`HttpTransport`]. The production
//! implementation is [`ReqwestTransport`](super::ReqwestTransport); tests use
//! [`MockTransport`](super::MockTransport).

use std::io::Read;

use async_trait::async_trait;
use flate2::read::GzDecoder;

use crate::error::{TapError, TapResult};

/// HTTP method used by the TAP protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully built request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Request body as text (lossy).
    pub fn body_text(&self) -> String {
        self.body
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }
}

/// A response as returned by the server, body fully read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup (first occurrence).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// All values of a repeated header, such as `Set-Cookie`.
    pub fn headers_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the payload is gzip compressed.
    pub fn is_gzipped(&self) -> bool {
        let declared = self
            .header("Content-Encoding")
            .map(|ce| ce.to_ascii_lowercase().contains("gzip"))
            .unwrap_or(false);
        declared || self.body.starts_with(&[0x1f, 0x8b])
    }

    /// Body with any gzip content encoding removed.
    pub fn decoded_body(&self) -> TapResult<Vec<u8>> {
        if !self.is_gzipped() {
            return Ok(self.body.clone());
        }
        let mut decoder = GzDecoder::new(self.body.as_slice());
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| TapError::parse(format!("Cannot decompress gzip response: {}", e)))?;
        Ok(out)
    }

    /// Body as text (lossy, decompressed when needed).
    pub fn text(&self) -> String {
        match self.decoded_body() {
            Ok(body) => String::from_utf8_lossy(&body).into_owned(),
            Err(_) => String::from_utf8_lossy(&self.body).into_owned(),
        }
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Sends requests to a TAP server.
///
/// Implementations must not follow redirects: the TAP job protocol relies on
/// seeing `303 See Other` responses.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute a request and return the complete response.
    ///
    /// Non-2xx statuses are returned as responses, not errors. Only failures
    /// that prevent obtaining a response are reported as `Err`.
    async fn execute(&self, request: HttpRequest) -> TapResult<HttpResponse>;
}
