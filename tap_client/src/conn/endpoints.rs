//! Service URL layout of a TAP/TAP+ server.
//!
//! A TAP+ server exposes several services under one *server context*:
//!
//! ```text
//! https://host:port/<server>/<tap>/{sync,async,tables,...}
//!                  /<server>/<upload>
//!                  /<server>/<table_edit>
//!                  /<server>/<data>?...
//!                  /<server>/<datalink>/links
//!                  /<server>/<share>?action=...
//!                  /<server>/login         (always over https)
//! ```

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ErrorContext, TapError, TapResult};

pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Result of splitting a TAP base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTapUrl {
    pub https: bool,
    pub host: String,
    pub port: u16,
    pub server_context: String,
    pub tap_context: String,
}

/// Split a TAP base URL into protocol, host, port, server and tap contexts.
///
/// The last path segment is the TAP context, everything before it is the
/// server context. A single segment is treated as the server context.
pub fn parse_tap_url(url: &str) -> TapResult<ParsedTapUrl> {
    if !url.contains("://") {
        return Err(TapError::invalid_argument("Invalid URL format"));
    }
    let parsed = Url::parse(url)
        .map_err(|e| TapError::invalid_argument(format!("Invalid URL format: {}", e)))?;

    let https = match parsed.scheme() {
        "https" => true,
        "http" => false,
        other => {
            return Err(TapError::invalid_argument(format!(
                "Unsupported URL scheme: {}",
                other
            )))
        }
    };
    let host = parsed
        .host_str()
        .ok_or_else(|| TapError::invalid_argument(format!("No host found in URL: {}", url)))?
        .to_string();
    let port = parsed.port().unwrap_or(if https {
        DEFAULT_HTTPS_PORT
    } else {
        DEFAULT_HTTP_PORT
    });

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let (server_context, tap_context) = match segments.len() {
        0 => (String::new(), String::new()),
        1 => (format!("/{}", segments[0]), String::new()),
        n => {
            let server: String = segments[..n - 1]
                .iter()
                .map(|s| format!("/{}", s))
                .collect();
            (server, format!("/{}", segments[n - 1]))
        }
    };

    Ok(ParsedTapUrl {
        https,
        host,
        port,
        server_context,
        tap_context,
    })
}

/// Context names of the services hosted next to the TAP service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceContexts {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub tap: Option<String>,
    #[serde(default)]
    pub upload: Option<String>,
    #[serde(default)]
    pub table_edit: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub datalink: Option<String>,
    #[serde(default)]
    pub share: Option<String>,
    #[serde(default)]
    pub users: Option<String>,
}

impl ServiceContexts {
    /// Contexts used by ESA TAP+ servers for the user space services.
    pub fn tap_plus_defaults() -> Self {
        Self {
            upload: Some("Upload".to_string()),
            table_edit: Some("TableTool".to_string()),
            share: Some("share".to_string()),
            users: Some("users".to_string()),
            ..Default::default()
        }
    }
}

/// Fully resolved endpoints of a TAP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    https: bool,
    host: String,
    port: u16,
    ssl_port: u16,
    server_context: String,
    tap_context: String,
    upload_context: String,
    table_edit_context: String,
    share_context: String,
    users_context: String,
    data_context: Option<String>,
    datalink_context: Option<String>,
}

impl Endpoints {
    /// Build endpoints from a TAP base URL.
    ///
    /// Explicit contexts in `contexts` take precedence over the ones derived
    /// from the URL path.
    pub fn from_url(url: &str, contexts: &ServiceContexts) -> TapResult<Self> {
        let parsed = parse_tap_url(url)?;
        let server = contexts
            .server
            .clone()
            .unwrap_or(parsed.server_context);
        let tap = contexts.tap.clone().unwrap_or(parsed.tap_context);
        // An https URL carries its own port for both plain and secure requests
        let ssl_port = if parsed.https {
            parsed.port
        } else {
            DEFAULT_HTTPS_PORT
        };
        Ok(Self::build(
            parsed.https,
            parsed.host,
            parsed.port,
            ssl_port,
            &server,
            &tap,
            contexts,
        ))
    }

    /// Build endpoints from explicit host information.
    pub fn from_host(
        https: bool,
        host: impl Into<String>,
        port: u16,
        ssl_port: u16,
        contexts: &ServiceContexts,
    ) -> Self {
        let server = contexts.server.clone().unwrap_or_default();
        let tap = contexts.tap.clone().unwrap_or_default();
        Self::build(https, host.into(), port, ssl_port, &server, &tap, contexts)
    }

    fn build(
        https: bool,
        host: String,
        port: u16,
        ssl_port: u16,
        server: &str,
        tap: &str,
        contexts: &ServiceContexts,
    ) -> Self {
        let server_context = normalize_server_context(server);
        let sub = |ctx: Option<&str>| create_context(&server_context, ctx);
        Self {
            https,
            host,
            port,
            ssl_port,
            tap_context: sub(Some(tap)),
            upload_context: sub(contexts.upload.as_deref()),
            table_edit_context: sub(contexts.table_edit.as_deref()),
            share_context: sub(contexts.share.as_deref()),
            users_context: sub(contexts.users.as_deref()),
            data_context: contexts
                .data
                .as_deref()
                .filter(|c| !c.is_empty())
                .map(|c| sub(Some(c))),
            datalink_context: contexts
                .datalink
                .as_deref()
                .filter(|c| !c.is_empty())
                .map(|c| sub(Some(c))),
            server_context,
        }
    }

    pub fn is_https(&self) -> bool {
        self.https
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn ssl_port(&self) -> u16 {
        self.ssl_port
    }

    pub fn server_context(&self) -> &str {
        &self.server_context
    }

    pub fn tap_context(&self) -> &str {
        &self.tap_context
    }

    /// `scheme://host[:port]` for plain requests.
    pub fn base_url(&self) -> String {
        origin(self.https, &self.host, self.port)
    }

    /// `https://host[:ssl_port]` for login and logout.
    pub fn secure_base_url(&self) -> String {
        origin(true, &self.host, self.ssl_port)
    }

    /// URL of a TAP resource (`sync`, `async/<id>/phase`, `tables?...`).
    ///
    /// Absolute URLs (as found in `Location` headers) are returned unchanged.
    pub fn tap_url(&self, subcontext: &str) -> String {
        if subcontext.starts_with("http://") || subcontext.starts_with("https://") {
            return subcontext.to_string();
        }
        format!(
            "{}{}/{}",
            self.base_url(),
            self.tap_context,
            subcontext.trim_start_matches('/')
        )
    }

    /// Absolute URL of a `Location` header value.
    pub fn resolve_location(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else if location.starts_with('/') {
            format!("{}{}", self.base_url(), location)
        } else {
            self.tap_url(location)
        }
    }

    pub fn upload_url(&self) -> String {
        format!("{}{}", self.base_url(), self.upload_context)
    }

    pub fn table_edit_url(&self) -> String {
        format!("{}{}", self.base_url(), self.table_edit_context)
    }

    /// URL of the sharing service, with an optional query string.
    pub fn share_url(&self, query: Option<&str>) -> String {
        with_query(format!("{}{}", self.base_url(), self.share_context), query)
    }

    /// URL of the user lookup service, with an optional query string.
    pub fn users_url(&self, query: Option<&str>) -> String {
        with_query(format!("{}{}", self.base_url(), self.users_context), query)
    }

    /// URL of the data retrieval service.
    pub fn data_url(&self, query: Option<&str>) -> TapResult<String> {
        let context = self.data_context.as_ref().ok_or_else(|| {
            TapError::configuration_with_context(
                "data_context must be specified at TAP object creation for this action to be performed",
                ErrorContext::new("data_url"),
            )
        })?;
        Ok(with_query(format!("{}{}", self.base_url(), context), query))
    }

    /// URL of a datalink resource (`links`).
    pub fn datalink_url(&self, subcontext: &str, query: Option<&str>) -> TapResult<String> {
        let context = self.datalink_context.as_ref().ok_or_else(|| {
            TapError::configuration_with_context(
                "datalink_context must be specified at TAP object creation for this action to be performed",
                ErrorContext::new("datalink_url"),
            )
        })?;
        Ok(with_query(
            format!("{}{}/{}", self.base_url(), context, subcontext),
            query,
        ))
    }

    /// URL of a server level resource reached over https (`login`, `logout`).
    pub fn secure_url(&self, subcontext: &str) -> String {
        format!(
            "{}{}/{}",
            self.secure_base_url(),
            self.server_context,
            subcontext.trim_start_matches('/')
        )
    }
}

impl std::fmt::Display for Endpoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\tHost: {}", self.host)?;
        writeln!(f, "\tUse HTTPS: {}", self.https)?;
        writeln!(f, "\tPort: {}", self.port)?;
        writeln!(f, "\tSSL Port: {}", self.ssl_port)?;
        write!(f, "\tTAP context: {}", self.tap_context)
    }
}

fn normalize_server_context(server: &str) -> String {
    let trimmed = server.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn create_context(server_context: &str, context: Option<&str>) -> String {
    match context.map(|c| c.trim_matches('/')) {
        Some(c) if !c.is_empty() => format!("{}/{}", server_context, c),
        _ => server_context.to_string(),
    }
}

fn origin(https: bool, host: &str, port: u16) -> String {
    let (scheme, default_port) = if https {
        ("https", DEFAULT_HTTPS_PORT)
    } else {
        ("http", DEFAULT_HTTP_PORT)
    };
    if port == default_port {
        format!("{}://{}", scheme, host)
    } else {
        format!("{}://{}:{}", scheme, host, port)
    }
}

fn with_query(url: String, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{}?{}", url, q),
        _ => url,
    }
}
