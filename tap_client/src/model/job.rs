//! Jobs: UWS metadata and the client side job handle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::phase::{JobPhase, PhaseAction};
use crate::conn::{check_response_status, dump_to_file, url_encode, HttpResponse, TapConn};
use crate::error::{ErrorContext, TapError, TapResult};
use crate::results::{read_http_response, OutputFormat, QueryResults};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParameter {
    pub id: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResultRef {
    pub id: String,
    pub href: Option<String>,
    pub size: Option<u64>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    /// `transient` or `fatal`.
    pub kind: Option<String>,
    pub has_detail: bool,
    pub message: Option<String>,
}

/// UWS job metadata as returned by `async/<id>` or a job search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: String,
    pub run_id: Option<String>,
    pub owner_id: Option<String>,
    pub phase: JobPhase,
    pub quote: Option<String>,
    pub creation_time: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub execution_duration: Option<u64>,
    pub destruction: Option<String>,
    pub parameters: Vec<JobParameter>,
    pub results: Vec<JobResultRef>,
    pub error_summary: Option<ErrorSummary>,
}

impl JobDescriptor {
    /// Value of a job parameter, case-insensitive on the name.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }

    pub fn query(&self) -> Option<&str> {
        self.parameter("query")
    }

    pub fn format(&self) -> Option<&str> {
        self.parameter("format")
    }

    /// The job name given at submission time.
    pub fn name(&self) -> Option<&str> {
        self.parameter("jobname").or(self.run_id.as_deref())
    }
}

/// Handle over a TAP job.
///
/// A synchronous job is complete as soon as it is returned. An asynchronous
/// job keeps its connection so it can poll its phase and download results;
/// fetched results are cached.
#[derive(Debug, Clone)]
pub struct Job {
    conn: Arc<TapConn>,
    is_async: bool,
    jobid: Option<String>,
    remote_location: Option<String>,
    query: Option<String>,
    name: Option<String>,
    phase: JobPhase,
    failed: bool,
    output_file: Option<PathBuf>,
    output_format: OutputFormat,
    response_status: Option<u16>,
    response_msg: Option<String>,
    results: Option<QueryResults>,
    descriptor: Option<JobDescriptor>,
}

impl Job {
    pub fn new(conn: Arc<TapConn>, is_async: bool, query: Option<String>) -> Self {
        Self {
            conn,
            is_async,
            jobid: None,
            remote_location: None,
            query,
            name: None,
            phase: JobPhase::Pending,
            failed: false,
            output_file: None,
            output_format: OutputFormat::default(),
            response_status: None,
            response_msg: None,
            results: None,
            descriptor: None,
        }
    }

    /// Asynchronous job rebuilt from server metadata.
    pub fn from_descriptor(conn: Arc<TapConn>, descriptor: JobDescriptor) -> Self {
        let mut job = Self::new(conn, true, descriptor.query().map(str::to_string));
        job.jobid = Some(descriptor.job_id.clone());
        job.phase = descriptor.phase;
        job.name = descriptor.name().map(str::to_string);
        job.failed = descriptor.phase.is_failure();
        if let Some(format) = descriptor.format() {
            job.output_format = OutputFormat::from(format);
        }
        job.descriptor = Some(descriptor);
        job
    }

    pub fn jobid(&self) -> Option<&str> {
        self.jobid.as_deref()
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn is_async(&self) -> bool {
        self.is_async
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_final()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn remote_location(&self) -> Option<&str> {
        self.remote_location.as_deref()
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }

    pub fn output_format(&self) -> &OutputFormat {
        &self.output_format
    }

    /// HTTP status and reason of the submission response.
    pub fn response_status(&self) -> Option<(u16, &str)> {
        self.response_status
            .map(|s| (s, self.response_msg.as_deref().unwrap_or("")))
    }

    pub fn descriptor(&self) -> Option<&JobDescriptor> {
        self.descriptor.as_ref()
    }

    /// Results already held in memory.
    pub fn results(&self) -> Option<&QueryResults> {
        self.results.as_ref()
    }

    pub(crate) fn set_jobid(&mut self, jobid: impl Into<String>) {
        self.jobid = Some(jobid.into());
    }

    pub(crate) fn set_remote_location(&mut self, location: impl Into<String>) {
        self.remote_location = Some(location.into());
    }

    pub(crate) fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub(crate) fn set_phase_local(&mut self, phase: JobPhase) {
        self.phase = phase;
    }

    pub(crate) fn set_output_file(&mut self, path: PathBuf) {
        self.output_file = Some(path);
    }

    pub(crate) fn set_output_format(&mut self, format: OutputFormat) {
        self.output_format = format;
    }

    pub(crate) fn set_response_status(&mut self, response: &HttpResponse) {
        self.response_status = Some(response.status);
        self.response_msg = Some(response.reason.clone());
    }

    pub(crate) fn set_results(&mut self, results: QueryResults) {
        self.results = Some(results);
    }

    fn require_id(&self, operation: &str) -> TapResult<String> {
        if !self.is_async {
            return Err(TapError::invalid_argument(format!(
                "'{}' is only available for asynchronous jobs",
                operation
            )));
        }
        self.jobid
            .clone()
            .ok_or_else(|| TapError::invalid_argument("Job has no identifier"))
    }

    fn context(&self, operation: &str) -> ErrorContext {
        let ctx = ErrorContext::new(operation).with_entity("job");
        match &self.jobid {
            Some(id) => ctx.with_entity_id(id),
            None => ctx,
        }
    }

    /// Ask the server for the current phase.
    pub async fn refresh_phase(&mut self) -> TapResult<JobPhase> {
        let jobid = self.require_id("refresh_phase")?;
        let response = self
            .conn
            .execute_tapget(&format!("async/{}/phase", jobid))
            .await?;
        check_response_status(&response, 200, self.context("refresh_phase"))?;
        let text = response.text();
        let phase = JobPhase::from_wire(&text);
        if phase == JobPhase::Unknown {
            warn!("Job {} reported unrecognized phase '{}'", jobid, text.trim());
        }
        debug!("Job {} phase: {}", jobid, phase);
        self.phase = phase;
        Ok(phase)
    }

    /// Poll the phase until the job reaches a final phase.
    pub async fn wait_for_job_end(&mut self) -> TapResult<JobPhase> {
        loop {
            let phase = self.refresh_phase().await?;
            if phase.is_final() {
                return Ok(phase);
            }
            tokio::time::sleep(self.conn.settings().poll_interval).await;
        }
    }

    /// Results of the job, downloading them on first access.
    ///
    /// Blocks until an asynchronous job ends. A job ending in `ERROR` or
    /// `ABORTED` yields [`TapError::JobFailed`]. Results of a synchronous job
    /// dumped to file are read back from its output file.
    pub async fn get_results(&mut self) -> TapResult<&QueryResults> {
        if self.results.is_none() {
            let results = if self.is_async {
                let response = self.fetch_result_response().await?;
                let results = read_http_response(&response, &self.output_format)?;
                info!("Job {} results retrieved ({} bytes)", self.jobid.as_deref().unwrap_or("?"), results.len());
                results
            } else {
                let path = self
                    .output_file
                    .clone()
                    .ok_or_else(|| TapError::invalid_argument("Job has no results"))?;
                debug!("Loading sync job results from {}", path.display());
                QueryResults::load(&path, self.output_format.clone()).await?
            };
            self.results = Some(results);
        }
        self.results
            .as_ref()
            .ok_or_else(|| TapError::parse("Job results unavailable"))
    }

    /// Write the results to the job output file and return its path.
    pub async fn save_results(&mut self) -> TapResult<PathBuf> {
        let path = match &self.output_file {
            Some(path) => path.clone(),
            None => {
                let path = PathBuf::from(format!(
                    "{}_{}{}",
                    if self.is_async { "async" } else { "sync" },
                    chrono::Local::now().format("%Y%m%d%H%M%S"),
                    self.output_format.extension()
                ));
                self.output_file = Some(path.clone());
                path
            }
        };

        if let Some(results) = &self.results {
            results.save(&path).await?;
        } else if self.is_async {
            let response = self.fetch_result_response().await?;
            dump_to_file(&path, &response).await?;
        } else if !path.exists() {
            return Err(TapError::invalid_argument("Job has no results to save"));
        }
        info!("Results saved to {}", path.display());
        Ok(path)
    }

    /// Error description of a failed job (`async/<id>/error`).
    pub async fn get_error(&self) -> TapResult<String> {
        let jobid = self.require_id("get_error")?;
        let response = self
            .conn
            .execute_tapget(&format!("async/{}/error", jobid))
            .await?;
        check_response_status(&response, 200, self.context("get_error"))?;
        let body = response.decoded_body()?;
        Ok(crate::xmlparser::extract_error_message(&body)
            .unwrap_or_else(|| String::from_utf8_lossy(&body).trim().to_string()))
    }

    /// Request a phase change.
    pub async fn set_phase(&mut self, action: PhaseAction) -> TapResult<()> {
        let jobid = self.require_id("set_phase")?;
        let data = url_encode(&[("PHASE", action.as_str())]);
        let response = self
            .conn
            .execute_tappost(&format!("async/{}/phase", jobid), &data)
            .await?;
        if response.status != 200 {
            check_response_status(&response, 303, self.context("set_phase"))?;
        }
        self.phase = action.resulting_phase();
        info!("Job {} phase set to {}", jobid, action);
        Ok(())
    }

    pub async fn abort(&mut self) -> TapResult<()> {
        self.set_phase(PhaseAction::Abort).await
    }

    /// Set a job parameter. The job must still be `PENDING`.
    pub async fn send_parameter(&mut self, name: &str, value: &str) -> TapResult<()> {
        if self.phase != JobPhase::Pending {
            return Err(TapError::invalid_argument(format!(
                "Job is not in PENDING phase (current phase: {})",
                self.phase
            )));
        }
        let jobid = self.require_id("send_parameter")?;
        let data = url_encode(&[(name, value)]);
        let response = self
            .conn
            .execute_tappost(&format!("async/{}/parameters", jobid), &data)
            .await?;
        if response.status != 200 {
            check_response_status(&response, 303, self.context("send_parameter"))?;
        }
        Ok(())
    }

    /// Wait for the job and download `results/result`, following redirects.
    async fn fetch_result_response(&mut self) -> TapResult<HttpResponse> {
        let jobid = self.require_id("get_results")?;
        let phase = if self.phase.is_final() {
            self.phase
        } else {
            self.wait_for_job_end().await?
        };
        if phase.is_failure() {
            self.failed = true;
            let message = match self.get_error().await {
                Ok(message) => message,
                Err(e) => {
                    warn!("Cannot retrieve error of job {}: {}", jobid, e);
                    format!("job ended in phase {}", phase)
                }
            };
            return Err(TapError::JobFailed {
                job_id: jobid,
                message,
            });
        }

        let max_redirects = self.conn.settings().max_redirects;
        let mut response = self
            .conn
            .execute_tapget(&format!("async/{}/results/result", jobid))
            .await?;
        let mut redirects = 0;
        while matches!(response.status, 302 | 303) {
            if redirects >= max_redirects {
                return Err(TapError::http_with_context(
                    response.status,
                    format!("Too many redirects ({})", max_redirects),
                    self.context("get_results"),
                ));
            }
            let location = response.header("Location").ok_or_else(|| {
                TapError::http_with_context(
                    response.status,
                    "Redirect without Location header",
                    self.context("get_results"),
                )
            })?;
            let url = self.conn.endpoints().resolve_location(location);
            debug!("Following result redirect to {}", url);
            response = self.conn.execute_tapget(&url).await?;
            redirects += 1;
        }
        check_response_status(&response, 200, self.context("get_results"))?;
        Ok(response)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Jobid: {}", self.jobid.as_deref().unwrap_or("None"))?;
        writeln!(f, "Phase: {}", self.phase)?;
        writeln!(f, "Owner: {}", self.descriptor.as_ref().and_then(|d| d.owner_id.as_deref()).unwrap_or("None"))?;
        writeln!(
            f,
            "Output file: {}",
            self.output_file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "None".to_string())
        )?;
        writeln!(f, "Results: {}", if self.results.is_some() { "yes" } else { "None" })?;
        write!(f, "Query: {}", self.query.as_deref().unwrap_or("None"))
    }
}
