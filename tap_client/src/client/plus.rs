//! TAP+ client: the ESA extensions on top of standard TAP.

use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use qtty::Arcseconds;

use super::options::JobOptions;
use super::tap::Tap;
use crate::adql::cross_match_query;
use crate::config::{Credentials, TapConfig};
use crate::conn::{
    check_response_status, dump_to_file, find_session_cookie, url_encode, HttpTransport,
};
use crate::error::{ErrorContext, TapError, TapResult};
use crate::model::{Job, JobFilter, TapTable};
use crate::results::{read_http_response, OutputFormat, QueryResults};
use crate::xmlparser;

/// Client of a TAP+ service.
///
/// Dereferences to [`Tap`] for the standard operations.
#[derive(Debug, Clone)]
pub struct TapPlus {
    tap: Tap,
}

impl TapPlus {
    /// Client for a TAP+ URL with default settings.
    pub fn new(url: &str) -> TapResult<Self> {
        Self::from_config(&TapConfig::for_url(url))
    }

    pub fn from_config(config: &TapConfig) -> TapResult<Self> {
        Ok(Self {
            tap: Tap::from_config(&plus_config(config))?,
        })
    }

    pub fn with_transport(config: &TapConfig, transport: Arc<dyn HttpTransport>) -> TapResult<Self> {
        Ok(Self {
            tap: Tap::with_transport(&plus_config(config), transport)?,
        })
    }

    pub fn tap(&self) -> &Tap {
        &self.tap
    }

    /// Load tables, optionally names only and including tables shared with
    /// the current user.
    pub async fn load_tables_with(
        &self,
        only_names: bool,
        include_shared_tables: bool,
    ) -> TapResult<Vec<TapTable>> {
        let mut flags = Vec::new();
        if only_names {
            flags.push(("only_tables", "true"));
        }
        if include_shared_tables {
            flags.push(("share_accessible", "true"));
        }
        let subcontext = if flags.is_empty() {
            "tables".to_string()
        } else {
            format!("tables?{}", url_encode(&flags))
        };
        info!("Retrieving tables...");
        self.fetch_tables(&subcontext, ErrorContext::new("load_tables"))
            .await
    }

    /// Retrieve products from the data service.
    ///
    /// `extra_args` is appended verbatim and must already be url encoded. When
    /// `output_file` is given the raw response is written there as well.
    pub async fn load_data(
        &self,
        ids: &[&str],
        retrieval_type: &str,
        format: &str,
        extra_args: Option<&str>,
        output_file: Option<&Path>,
    ) -> TapResult<QueryResults> {
        if retrieval_type.trim().is_empty() {
            return Err(TapError::invalid_argument(
                "Missing mandatory argument 'retrieval_type'",
            ));
        }
        if ids.is_empty() {
            return Err(TapError::invalid_argument("Missing mandatory argument 'ids'"));
        }
        let ids = ids.join(",");
        let mut data = url_encode(&[
            ("RETRIEVAL_TYPE", retrieval_type),
            ("ID", ids.as_str()),
            ("FORMAT", format),
        ]);
        if let Some(extra) = extra_args.map(|e| e.trim_start_matches('&')).filter(|e| !e.is_empty()) {
            data.push('&');
            data.push_str(extra);
        }
        debug!("Data request: {}", data);

        let response = self.conn().execute_datapost(&data).await?;
        check_response_status(&response, 200, ErrorContext::new("load_data"))?;
        if let Some(path) = output_file {
            let path = self.output_path(path);
            dump_to_file(&path, &response).await?;
            info!("Data saved to {}", path.display());
        }
        read_http_response(&response, &OutputFormat::from(format))
    }

    /// Retrieve the DataLink links of the given identifiers.
    pub async fn load_datalinks(&self, ids: &[&str]) -> TapResult<QueryResults> {
        if ids.is_empty() {
            return Err(TapError::invalid_argument("Missing mandatory argument 'ids'"));
        }
        let data = url_encode(&[("ID", ids.join(","))]);
        let response = self.conn().execute_datalinkpost("links", &data).await?;
        check_response_status(&response, 200, ErrorContext::new("load_datalinks"))?;
        read_http_response(&response, &OutputFormat::Votable)
    }

    /// Search the asynchronous jobs of the current user.
    pub async fn search_async_jobs(&self, filter: Option<&JobFilter>) -> TapResult<Vec<Job>> {
        let context = ErrorContext::new("search_async_jobs");
        let subcontext = match filter.and_then(JobFilter::to_query_string) {
            Some(query) => format!("jobs/async?{}", query),
            None => "jobs/async".to_string(),
        };
        let response = self.conn().execute_tapget(&subcontext).await?;
        check_response_status(&response, 200, context.clone())?;
        let body = response.decoded_body()?;
        let descriptors = xmlparser::parse_jobs(&body).map_err(|e| e.with_context(context))?;
        Ok(descriptors
            .into_iter()
            .map(|d| Job::from_descriptor(Arc::clone(self.conn()), d))
            .collect())
    }

    /// Load the most recent asynchronous job with the given name.
    pub async fn load_async_job_by_name(&self, name: &str) -> TapResult<Job> {
        let filter = JobFilter::new().with_name(name);
        let jobs = self.search_async_jobs(Some(&filter)).await?;
        let jobid = jobs
            .iter()
            .find_map(|j| j.jobid())
            .ok_or_else(|| TapError::invalid_argument(format!("Job with name '{}' not found", name)))?
            .to_string();
        self.load_async_job(&jobid).await
    }

    /// Remove jobs from the server. An empty list is a no-op.
    pub async fn remove_jobs(&self, job_ids: &[&str]) -> TapResult<()> {
        if job_ids.is_empty() {
            return Ok(());
        }
        let data = url_encode(&[("JOB_IDS", job_ids.join(","))]);
        let response = self.conn().execute_tappost("deletejobs", &data).await?;
        check_response_status(
            &response,
            200,
            ErrorContext::new("remove_jobs").with_details(job_ids.join(",")),
        )?;
        info!("Removed jobs: {}", job_ids.join(","));
        Ok(())
    }

    /// Open a session. The `JSESSIONID` cookie is sent with every following
    /// request.
    pub async fn login(&self, credentials: &Credentials) -> TapResult<()> {
        let context = ErrorContext::new("login").with_entity_id(&credentials.user);
        let data = url_encode(&[
            ("username", credentials.user.as_str()),
            ("password", credentials.password.as_str()),
        ]);
        let response = self.conn().execute_secure("login", &data).await?;
        check_response_status(&response, 200, context.clone())?;
        match find_session_cookie(&response) {
            Some(cookie) => {
                self.conn().set_cookie(cookie);
                info!("Logged in as {}", credentials.user);
            }
            None => warn!(
                "Login of {} accepted without a session cookie; still logged out",
                credentials.user
            ),
        }
        Ok(())
    }

    /// Open a session with credentials read from a file.
    pub async fn login_from_file<P: AsRef<Path>>(&self, path: P) -> TapResult<()> {
        let credentials = Credentials::from_file(path)?;
        self.login(&credentials).await
    }

    pub async fn logout(&self) -> TapResult<()> {
        let response = self.conn().execute_secure("logout", "").await?;
        check_response_status(&response, 200, ErrorContext::new("logout"))?;
        self.conn().unset_cookie();
        info!("Logged out");
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.conn().cookie().is_some()
    }

    /// Positional cross-match of two user tables, run as an asynchronous job
    /// named after the results table.
    pub async fn cross_match(
        &self,
        table_a: &str,
        table_b: &str,
        results_table: &str,
        radius: Arcseconds,
        options: JobOptions,
    ) -> TapResult<Job> {
        let query = cross_match_query(table_a, table_b, results_table, radius)?;
        let options = JobOptions {
            name: Some(results_table.to_string()),
            ..options
        };
        self.launch_job_async(&query, options).await
    }
}

impl Deref for TapPlus {
    type Target = Tap;

    fn deref(&self) -> &Tap {
        &self.tap
    }
}

impl std::fmt::Display for TapPlus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TAP+ service: {}", self.conn())
    }
}

fn plus_config(config: &TapConfig) -> TapConfig {
    let mut config = config.clone();
    config.server.tap_plus = true;
    config
}
