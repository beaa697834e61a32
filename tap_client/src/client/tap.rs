//! Standard TAP client.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use log::{debug, info, warn};

use super::options::JobOptions;
use crate::adql::{set_top_in_query, ConeSearch};
use crate::config::TapConfig;
use crate::conn::{
    check_response_status, dump_to_file, encode_multipart, error_message, suitable_extension,
    url_encode, HttpResponse, HttpTransport, MultipartFile, ReqwestTransport, TapConn,
};
use crate::error::{ErrorContext, TapError, TapResult};
use crate::model::{Job, JobPhase, JobRef, TapTable};
use crate::results::read_http_response;
use crate::xmlparser;

/// Value sent as the `tapclient` request parameter.
pub const TAP_CLIENT_ID: &str = concat!("tap-client-rs-", env!("CARGO_PKG_VERSION"));

/// Client of a TAP service.
///
/// Synchronous queries return a finished [`Job`]; asynchronous ones return a
/// job that can be polled. All requests go through a shared [`TapConn`].
#[derive(Debug, Clone)]
pub struct Tap {
    conn: Arc<TapConn>,
    sync_row_limit: u64,
    output_dir: Option<PathBuf>,
}

impl Tap {
    /// Client for a TAP URL with default settings.
    pub fn new(url: &str) -> TapResult<Self> {
        Self::from_config(&TapConfig::for_url(url))
    }

    /// Client over HTTP, configured from `config`.
    pub fn from_config(config: &TapConfig) -> TapResult<Self> {
        let transport = ReqwestTransport::with_options(config.timeout(), &config.http.user_agent)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Client using a custom transport.
    pub fn with_transport(config: &TapConfig, transport: Arc<dyn HttpTransport>) -> TapResult<Self> {
        let endpoints = config.endpoints()?;
        let conn = TapConn::new(endpoints, transport).with_settings(config.conn_settings());
        Ok(Self {
            conn: Arc::new(conn),
            sync_row_limit: config.jobs.sync_row_limit,
            output_dir: config.jobs.output_dir.clone(),
        })
    }

    pub fn conn(&self) -> &Arc<TapConn> {
        &self.conn
    }

    pub fn sync_row_limit(&self) -> u64 {
        self.sync_row_limit
    }

    /// Load every public table of the service.
    pub async fn load_tables(&self) -> TapResult<Vec<TapTable>> {
        self.fetch_tables("tables", ErrorContext::new("load_tables"))
            .await
    }

    /// Load one table by its qualified name.
    pub async fn load_table(&self, table: &str) -> TapResult<TapTable> {
        info!("Retrieving table '{}'", table);
        let context = ErrorContext::new("load_table")
            .with_entity("table")
            .with_entity_id(table);
        let subcontext = format!("tables?{}", url_encode(&[("tables", table)]));
        self.fetch_tables(&subcontext, context.clone())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TapError::parse_with_context("Table not found in response", context))
    }

    pub(crate) async fn fetch_tables(
        &self,
        subcontext: &str,
        context: ErrorContext,
    ) -> TapResult<Vec<TapTable>> {
        let response = self.conn.execute_tapget(subcontext).await?;
        check_response_status(&response, 200, context.clone())?;
        let body = response.decoded_body()?;
        let tables = xmlparser::parse_tables(&body).map_err(|e| e.with_context(context))?;
        debug!("Parsed {} tables", tables.len());
        Ok(tables)
    }

    /// Run a synchronous query.
    ///
    /// The query is limited to the configured row limit unless it already has
    /// a `TOP` clause. With `dump_to_file` the results are written to the
    /// job output file, otherwise they are kept in the returned job.
    pub async fn launch_job(&self, query: &str, options: JobOptions) -> TapResult<Job> {
        let query = set_top_in_query(query, self.sync_row_limit);
        let context = ErrorContext::new("launch_job");
        let mut response = self.submit_query("sync", &query, &options).await?;

        if response.status == 303 {
            let location = response.header("Location").ok_or_else(|| {
                TapError::http_with_context(
                    303,
                    "No location found after redirection was received (303)",
                    context.clone(),
                )
            })?;
            let target = match location.find("sync") {
                Some(pos) => location[pos..].to_string(),
                None => self.conn.endpoints().resolve_location(location),
            };
            debug!("Following sync redirection to {}", target);
            response = self.conn.execute_tapget(&target).await?;
        }

        let output_file = match &options.output_file {
            Some(path) => self.output_path(path),
            None => self.output_path(&generated_file_name(
                "sync",
                &suitable_extension(&response),
            )),
        };

        if response.status != 200 {
            if options.dump_to_file {
                let path = with_error_suffix(&output_file);
                dump_to_file(&path, &response).await?;
                info!("Error response saved to {}", path.display());
            }
            return Err(TapError::http_with_context(
                response.status,
                error_message(&response),
                context,
            ));
        }

        let mut job = Job::new(Arc::clone(&self.conn), false, Some(query));
        job.set_name(options.name.clone());
        job.set_output_format(options.output_format.clone());
        job.set_response_status(&response);
        job.set_output_file(output_file.clone());
        job.set_phase_local(JobPhase::Completed);
        if options.dump_to_file {
            dump_to_file(&output_file, &response).await?;
            info!("Results saved to {}", output_file.display());
        } else {
            job.set_results(read_http_response(&response, &options.output_format)?);
        }
        Ok(job)
    }

    /// Submit an asynchronous query.
    ///
    /// Unless `background` is set, waits for the job to end and fetches (or,
    /// with `dump_to_file`, saves) its results.
    pub async fn launch_job_async(&self, query: &str, options: JobOptions) -> TapResult<Job> {
        let context = ErrorContext::new("launch_job_async");
        let response = self.submit_query("async", query, &options).await?;

        if response.status != 303 {
            if options.dump_to_file {
                let path = match &options.output_file {
                    Some(path) => self.output_path(path),
                    None => self.output_path(&generated_file_name(
                        "async",
                        &suitable_extension(&response),
                    )),
                };
                let path = with_error_suffix(&path);
                dump_to_file(&path, &response).await?;
                info!("Error response saved to {}", path.display());
            }
            check_response_status(&response, 303, context.clone())?;
        }

        let location = response.header("Location").ok_or_else(|| {
            TapError::http_with_context(
                303,
                "No location found after redirection was received (303)",
                context.clone(),
            )
        })?;
        let jobid = job_id_from_location(location).ok_or_else(|| {
            TapError::parse_with_context(
                format!("Cannot find job id in location '{}'", location),
                context.clone(),
            )
        })?;

        let mut job = Job::new(Arc::clone(&self.conn), true, Some(query.to_string()));
        job.set_jobid(jobid);
        job.set_remote_location(location);
        job.set_name(options.name.clone());
        job.set_output_format(options.output_format.clone());
        job.set_response_status(&response);
        job.set_phase_local(JobPhase::Queued);
        let output_file = match &options.output_file {
            Some(path) => self.output_path(path),
            None => self.output_path(&generated_file_name(
                "async",
                options.output_format.extension(),
            )),
        };
        job.set_output_file(output_file);
        info!("Launched query: '{}' (job {})", query, jobid);

        if !options.background {
            if options.dump_to_file {
                job.save_results().await?;
            } else {
                job.get_results().await?;
            }
        }
        Ok(job)
    }

    async fn submit_query(
        &self,
        subcontext: &str,
        query: &str,
        options: &JobOptions,
    ) -> TapResult<HttpResponse> {
        let format = options.output_format.as_str();
        let mut args: Vec<(&str, &str)> = vec![
            ("REQUEST", "doQuery"),
            ("LANG", "ADQL"),
            ("FORMAT", format),
            ("tapclient", TAP_CLIENT_ID),
            ("PHASE", "RUN"),
            ("QUERY", query),
        ];
        if let Some(name) = options.name.as_deref() {
            args.push(("jobname", name));
        }

        let Some(resource) = options.upload_resource.as_deref() else {
            let data = url_encode(&args);
            return self.conn.execute_tappost(subcontext, &data).await;
        };

        let table_name = options
            .upload_table_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| {
                TapError::invalid_argument("Table name is required when a resource is uploaded")
            })?;
        let content = tokio::fs::read(resource)
            .await
            .with_context(|| format!("Failed to read upload resource {}", resource.display()))?;
        let file_name = resource
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| table_name.to_string());
        let upload = format!("{},param:{}", table_name, table_name);
        args.push(("UPLOAD", &upload));

        let files = [MultipartFile::new(table_name, file_name, content)];
        let (content_type, body) = encode_multipart(&args, &files);
        self.conn
            .execute_tappost_multipart(subcontext, &content_type, body)
            .await
    }

    /// Load an asynchronous job by identifier. Results of a completed job are
    /// fetched as well.
    pub async fn load_async_job(&self, jobid: &str) -> TapResult<Job> {
        let context = ErrorContext::new("load_async_job")
            .with_entity("job")
            .with_entity_id(jobid);
        let response = self.conn.execute_tapget(&format!("async/{}", jobid)).await?;
        check_response_status(&response, 200, context.clone())?;
        let body = response.decoded_body()?;
        let descriptor = xmlparser::parse_job(&body).map_err(|e| e.with_context(context))?;

        let mut job = Job::from_descriptor(Arc::clone(&self.conn), descriptor);
        job.set_remote_location(self.conn.endpoints().tap_url(&format!("async/{}", jobid)));
        job.set_output_file(self.output_path(&generated_file_name(
            "async",
            job.output_format().extension(),
        )));
        if job.phase() == JobPhase::Completed {
            if let Err(e) = job.get_results().await {
                warn!("Cannot retrieve results of job {}: {}", jobid, e);
            }
        }
        Ok(job)
    }

    /// List the asynchronous jobs visible to the current session.
    pub async fn list_async_jobs(&self) -> TapResult<Vec<JobRef>> {
        let context = ErrorContext::new("list_async_jobs");
        let response = self.conn.execute_tapget("async").await?;
        check_response_status(&response, 200, context.clone())?;
        let body = response.decoded_body()?;
        xmlparser::parse_job_list(&body).map_err(|e| e.with_context(context))
    }

    /// Save the results of `job` to its output file.
    pub async fn save_results(&self, job: &mut Job) -> TapResult<PathBuf> {
        job.save_results().await
    }

    /// Run a cone search, synchronously or as an asynchronous job.
    pub async fn cone_search(
        &self,
        search: &ConeSearch,
        options: JobOptions,
        async_job: bool,
    ) -> TapResult<Job> {
        let query = search.to_adql()?;
        if async_job {
            self.launch_job_async(&query, options).await
        } else {
            self.launch_job(&query, options).await
        }
    }

    pub(crate) fn output_path(&self, path: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl std::fmt::Display for Tap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TAP service: {}", self.conn)
    }
}

/// `<prefix>_<YYYYmmddHHMMSS><ext>`.
pub(crate) fn generated_file_name(prefix: &str, extension: &str) -> PathBuf {
    PathBuf::from(format!(
        "{}_{}{}",
        prefix,
        chrono::Local::now().format("%Y%m%d%H%M%S"),
        extension
    ))
}

fn with_error_suffix(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".error");
    PathBuf::from(name)
}

/// Last path segment of a job location.
pub(crate) fn job_id_from_location(location: &str) -> Option<&str> {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
}
