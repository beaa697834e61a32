//! Connection handler shared by the TAP client and its jobs.

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Context;
use log::debug;

use super::endpoints::Endpoints;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{ErrorContext, TapError, TapResult};
use crate::xmlparser;

pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const ACCEPT_TEXT_PLAIN: &str = "text/plain";

/// Default delay between two phase polls of an asynchronous job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Default limit of result redirects followed for an asynchronous job.
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// Connection level settings used by jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnSettings {
    pub poll_interval: Duration,
    pub max_redirects: usize,
}

impl Default for ConnSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

/// Builds and sends the requests of every TAP/TAP+ service.
///
/// The session cookie is the only mutable state; it is attached to every
/// request once [`set_cookie`](Self::set_cookie) has been called.
pub struct TapConn {
    endpoints: Endpoints,
    transport: Arc<dyn HttpTransport>,
    cookie: RwLock<Option<String>>,
    settings: ConnSettings,
}

impl TapConn {
    pub fn new(endpoints: Endpoints, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            endpoints,
            transport,
            cookie: RwLock::new(None),
            settings: ConnSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ConnSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn settings(&self) -> &ConnSettings {
        &self.settings
    }

    pub fn set_cookie(&self, cookie: impl Into<String>) {
        *self.cookie.write().unwrap_or_else(|e| e.into_inner()) = Some(cookie.into());
    }

    pub fn unset_cookie(&self) {
        *self.cookie.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn cookie(&self) -> Option<String> {
        self.cookie.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// GET a TAP resource.
    pub async fn execute_tapget(&self, subcontext: &str) -> TapResult<HttpResponse> {
        self.get(self.endpoints.tap_url(subcontext)).await
    }

    /// POST a form-encoded body to a TAP resource.
    pub async fn execute_tappost(&self, subcontext: &str, data: &str) -> TapResult<HttpResponse> {
        self.post(self.endpoints.tap_url(subcontext), CONTENT_TYPE_FORM, data)
            .await
    }

    /// POST a multipart body to a TAP resource.
    pub async fn execute_tappost_multipart(
        &self,
        subcontext: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> TapResult<HttpResponse> {
        self.post(self.endpoints.tap_url(subcontext), content_type, body)
            .await
    }

    pub async fn execute_dataget(&self, query: &str) -> TapResult<HttpResponse> {
        self.get(self.endpoints.data_url(Some(query))?).await
    }

    pub async fn execute_datapost(&self, data: &str) -> TapResult<HttpResponse> {
        self.post(self.endpoints.data_url(None)?, CONTENT_TYPE_FORM, data)
            .await
    }

    pub async fn execute_datalinkpost(
        &self,
        subcontext: &str,
        data: &str,
    ) -> TapResult<HttpResponse> {
        self.post(
            self.endpoints.datalink_url(subcontext, None)?,
            CONTENT_TYPE_FORM,
            data,
        )
        .await
    }

    /// POST a multipart body to the upload service.
    pub async fn execute_upload(&self, content_type: &str, body: Vec<u8>) -> TapResult<HttpResponse> {
        self.post(self.endpoints.upload_url(), content_type, body)
            .await
    }

    pub async fn execute_table_edit(&self, data: &str) -> TapResult<HttpResponse> {
        self.post(self.endpoints.table_edit_url(), CONTENT_TYPE_FORM, data)
            .await
    }

    pub async fn execute_share_get(&self, query: &str) -> TapResult<HttpResponse> {
        self.get(self.endpoints.share_url(Some(query))).await
    }

    pub async fn execute_share_post(&self, data: &str) -> TapResult<HttpResponse> {
        self.post(self.endpoints.share_url(None), CONTENT_TYPE_FORM, data)
            .await
    }

    pub async fn execute_users_get(&self, query: &str) -> TapResult<HttpResponse> {
        self.get(self.endpoints.users_url(Some(query))).await
    }

    /// POST to a server level resource over https (`login`, `logout`).
    pub async fn execute_secure(&self, subcontext: &str, data: &str) -> TapResult<HttpResponse> {
        self.post(self.endpoints.secure_url(subcontext), CONTENT_TYPE_FORM, data)
            .await
    }

    async fn get(&self, url: String) -> TapResult<HttpResponse> {
        debug!("GET {}", url);
        let request = self.with_cookie(HttpRequest::get(url));
        self.send(request).await
    }

    async fn post(
        &self,
        url: String,
        content_type: &str,
        body: impl Into<Vec<u8>>,
    ) -> TapResult<HttpResponse> {
        debug!("POST {} ({})", url, content_type);
        let request = self.with_cookie(
            HttpRequest::post(url, body)
                .with_header("Content-Type", content_type)
                .with_header("Accept", ACCEPT_TEXT_PLAIN),
        );
        self.send(request).await
    }

    async fn send(&self, request: HttpRequest) -> TapResult<HttpResponse> {
        let response = self.transport.execute(request).await?;
        debug!("Response: {} {}", response.status, response.reason);
        Ok(response)
    }

    fn with_cookie(&self, request: HttpRequest) -> HttpRequest {
        match self.cookie() {
            Some(cookie) => request.with_header("Cookie", cookie),
            None => request,
        }
    }
}

impl std::fmt::Debug for TapConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapConn")
            .field("endpoints", &self.endpoints)
            .field("logged_in", &self.cookie().is_some())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for TapConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoints)
    }
}

/// Fail with [`TapError::Http`] unless the response has the expected status.
pub fn check_response_status(
    response: &HttpResponse,
    expected: u16,
    context: ErrorContext,
) -> TapResult<()> {
    if response.status == expected {
        return Ok(());
    }
    Err(TapError::http_with_context(
        response.status,
        error_message(response),
        context,
    ))
}

/// Best effort extraction of the error message carried by a response.
///
/// Looks for a VOTable `QUERY_STATUS` message or a UWS error summary, then
/// short plain text bodies, then the reason phrase.
pub fn error_message(response: &HttpResponse) -> String {
    let body = response.decoded_body().unwrap_or_else(|_| response.body.clone());
    if let Some(message) = xmlparser::extract_error_message(&body) {
        return message;
    }
    let text = String::from_utf8_lossy(&body);
    let text = text.trim();
    if !text.is_empty() && text.len() <= 512 && !text.starts_with('<') {
        return text.to_string();
    }
    if response.reason.is_empty() {
        format!("HTTP status {}", response.status)
    } else {
        response.reason.clone()
    }
}

/// File extension matching the response content type, `.gz` appended when
/// the payload is compressed.
pub fn suitable_extension(response: &HttpResponse) -> String {
    let content_type = response
        .header("Content-Type")
        .map(|ct| ct.to_ascii_lowercase())
        .unwrap_or_default();
    let mut ext = if content_type.contains("vot") {
        ".vot"
    } else if content_type.contains("xml") {
        ".xml"
    } else if content_type.contains("json") {
        ".json"
    } else if content_type.contains("plain") {
        ".txt"
    } else if content_type.contains("csv") {
        ".csv"
    } else if content_type.contains("ascii") {
        ".txt"
    } else if content_type.contains("fits") {
        ".fits"
    } else {
        ""
    }
    .to_string();
    let gzipped = response
        .header("Content-Encoding")
        .map(|ce| ce.to_ascii_lowercase().contains("gzip"))
        .unwrap_or(false);
    if gzipped {
        ext.push_str(".gz");
    }
    ext
}

/// Write the raw response body to `path`.
pub async fn dump_to_file(path: &Path, response: &HttpResponse) -> TapResult<()> {
    debug!("Saving {} bytes to {}", response.body.len(), path.display());
    tokio::fs::write(path, &response.body)
        .await
        .with_context(|| format!("Failed to write response to {}", path.display()))?;
    Ok(())
}

/// `application/x-www-form-urlencoded` serialization, keeping pair order.
pub fn url_encode<K, V>(pairs: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
        .finish()
}

/// `JSESSIONID=...` item of the `Set-Cookie` headers, if any.
pub fn find_session_cookie(response: &HttpResponse) -> Option<String> {
    response
        .headers_named("Set-Cookie")
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .find(|item| item.starts_with("JSESSIONID="))
        .map(str::to_string)
}
