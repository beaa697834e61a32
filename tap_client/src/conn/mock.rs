//! In-memory transport for tests.
//!
//! Responses are registered against a URL suffix (`"async"`, `"async/1/phase"`,
//! `"share?action=GetGroups"`). A suffix matches on a path boundary, so
//! `"sync"` never answers a request to `.../async`. When several suffixes
//! match, the longest one wins.
//!
//! Each suffix holds a queue of responses; the last one keeps being served once
//! the queue is drained, which makes polling loops easy to script:
//!
//! ```
//! use tap_client::conn::{HttpResponse, MockTransport};
//!
//! let mock = MockTransport::new();
//! mock.respond("async/1/phase", HttpResponse::new(200, "OK").with_body("EXECUTING"));
//! mock.respond("async/1/phase", HttpResponse::new(200, "OK").with_body("COMPLETED"));
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::transport::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::error::{ErrorContext, TapError, TapResult};

struct Route {
    method: Option<Method>,
    suffix: String,
    responses: VecDeque<HttpResponse>,
}

impl Route {
    fn next_response(&mut self) -> Option<HttpResponse> {
        if self.responses.len() > 1 {
            self.responses.pop_front()
        } else {
            self.responses.front().cloned()
        }
    }
}

#[derive(Default)]
struct MockState {
    routes: Vec<Route>,
    default_response: Option<HttpResponse>,
    requests: Vec<HttpRequest>,
}

/// Scripted [`HttpTransport`] recording every request it receives.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<RwLock<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for any request without a matching route.
    pub fn with_default(self, response: HttpResponse) -> Self {
        self.write().default_response = Some(response);
        self
    }

    /// Queue a response for any method on URLs ending with `suffix`.
    pub fn respond(&self, suffix: &str, response: HttpResponse) {
        self.push_route(None, suffix, response);
    }

    /// Queue a response for one method on URLs ending with `suffix`.
    pub fn respond_to(&self, method: Method, suffix: &str, response: HttpResponse) {
        self.push_route(Some(method), suffix, response);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.read().requests.clone()
    }

    /// Most recent request.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.read().requests.last().cloned()
    }

    /// Requests whose URL matches `suffix`.
    pub fn requests_to(&self, suffix: &str) -> Vec<HttpRequest> {
        self.read()
            .requests
            .iter()
            .filter(|r| suffix_matches(&r.url, suffix))
            .cloned()
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.read().requests.len()
    }

    pub fn clear_requests(&self) {
        self.write().requests.clear();
    }

    fn push_route(&self, method: Option<Method>, suffix: &str, response: HttpResponse) {
        let mut state = self.write();
        let suffix = suffix.trim_start_matches('/');
        match state
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.suffix == suffix)
        {
            Some(route) => route.responses.push_back(response),
            None => state.routes.push(Route {
                method,
                suffix: suffix.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn suffix_matches(url: &str, suffix: &str) -> bool {
    let suffix = suffix.trim_start_matches('/');
    let path_only = url.split('?').next().unwrap_or(url);
    [url, path_only]
        .iter()
        .any(|candidate| *candidate == suffix || candidate.ends_with(&format!("/{}", suffix)))
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> TapResult<HttpResponse> {
        let mut state = self.write();
        state.requests.push(request.clone());

        let best = state
            .routes
            .iter_mut()
            .filter(|r| r.method.map_or(true, |m| m == request.method))
            .filter(|r| suffix_matches(&request.url, &r.suffix))
            .max_by_key(|r| (r.suffix.len(), r.method.is_some()));

        if let Some(response) = best.and_then(Route::next_response) {
            return Ok(response);
        }
        state.default_response.clone().ok_or_else(|| {
            TapError::transport_with_context(
                "No mock response registered",
                ErrorContext::new("mock_transport")
                    .with_details(format!("{} {}", request.method, request.url)),
            )
        })
    }
}
