use serde::{Deserialize, Serialize};

use super::phase::JobPhase;
use crate::conn::url_encode;

/// Criteria of a TAP+ job search (`jobs/async`).
///
/// Time bounds are passed through verbatim; servers accept ISO-8601 dates or
/// milliseconds since the epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phases: Vec<JobPhase>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub start_time_init: Option<String>,
    #[serde(default)]
    pub start_time_end: Option<String>,
    #[serde(default)]
    pub end_time_init: Option<String>,
    #[serde(default)]
    pub end_time_end: Option<String>,
    #[serde(default)]
    pub metadata_only: Option<bool>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    /// Ordering expression such as `start_time desc`.
    #[serde(default)]
    pub order: Option<String>,
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_phase(mut self, phase: JobPhase) -> Self {
        self.phases.push(phase);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn metadata_only(mut self, metadata_only: bool) -> Self {
        self.metadata_only = Some(metadata_only);
        self
    }

    /// Query parameters in a stable order. Unset criteria are omitted.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(v) = value {
                params.push((key.to_string(), v));
            }
        };
        push("name", self.name.clone());
        push(
            "phase",
            (!self.phases.is_empty()).then(|| {
                self.phases
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            }),
        );
        push("query", self.query.clone());
        push("start_time_init", self.start_time_init.clone());
        push("start_time_end", self.start_time_end.clone());
        push("end_time_init", self.end_time_init.clone());
        push("end_time_end", self.end_time_end.clone());
        push("metadata_only", self.metadata_only.map(|b| b.to_string()));
        push("limit", self.limit.map(|v| v.to_string()));
        push("offset", self.offset.map(|v| v.to_string()));
        push("order", self.order.clone());
        params
    }

    /// URL-encoded query string, `None` when no criterion is set.
    pub fn to_query_string(&self) -> Option<String> {
        let params = self.to_params();
        if params.is_empty() {
            None
        } else {
            Some(url_encode(&params))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter() {
        assert!(JobFilter::new().to_params().is_empty());
        assert_eq!(JobFilter::new().to_query_string(), None);
    }

    #[test]
    fn test_filter_params() {
        let filter = JobFilter::new()
            .with_name("my job")
            .with_phase(JobPhase::Completed)
            .with_phase(JobPhase::Error)
            .metadata_only(true)
            .with_limit(10)
            .with_order("start_time desc");
        assert_eq!(
            filter.to_query_string().unwrap(),
            "name=my+job&phase=COMPLETED%2CERROR&metadata_only=true&limit=10&order=start_time+desc"
        );
    }
}
