use super::{non_empty, walk, Node};
use crate::error::{TapError, TapResult};
use crate::model::{ErrorSummary, JobDescriptor, JobParameter, JobPhase, JobRef, JobResultRef};

/// Parse every UWS `job` element of a document.
///
/// Accepts a single `job` document as well as a `jobs` container holding
/// complete job descriptions (TAP+ job search).
pub fn parse_jobs(data: &[u8]) -> TapResult<Vec<JobDescriptor>> {
    let mut jobs = Vec::new();
    let mut job: Option<JobDescriptor> = None;
    let mut parameter: Option<JobParameter> = None;
    let mut error_summary: Option<ErrorSummary> = None;

    walk(data, |node| {
        match node {
            Node::Open { name, attrs } => match name {
                "job" => job = Some(JobDescriptor::default()),
                "parameter" if job.is_some() => {
                    parameter = Some(JobParameter {
                        id: attrs.owned("id").unwrap_or_default(),
                        value: String::new(),
                    })
                }
                "result" => {
                    if let Some(j) = job.as_mut() {
                        j.results.push(JobResultRef {
                            id: attrs.owned("id").unwrap_or_default(),
                            href: attrs.owned("href"),
                            size: attrs.get("size").and_then(|s| s.parse().ok()),
                            mime_type: attrs.owned("mime-type"),
                        });
                    }
                }
                "errorSummary" if job.is_some() => {
                    error_summary = Some(ErrorSummary {
                        kind: attrs.owned("type"),
                        has_detail: attrs
                            .get("hasDetail")
                            .is_some_and(|v| v.eq_ignore_ascii_case("true")),
                        message: None,
                    })
                }
                _ => {}
            },
            Node::Close { name, text } => {
                let Some(j) = job.as_mut() else {
                    return Ok(());
                };
                match name {
                    "jobId" => j.job_id = text.to_string(),
                    "runId" => j.run_id = non_empty(text),
                    "ownerId" => j.owner_id = non_empty(text),
                    "phase" => j.phase = JobPhase::from_wire(text),
                    "quote" => j.quote = non_empty(text),
                    "creationTime" => j.creation_time = non_empty(text),
                    "startTime" => j.start_time = non_empty(text),
                    "endTime" => j.end_time = non_empty(text),
                    "executionDuration" => j.execution_duration = text.parse().ok(),
                    "destruction" => j.destruction = non_empty(text),
                    "parameter" => {
                        if let Some(mut p) = parameter.take() {
                            p.value = text.to_string();
                            j.parameters.push(p);
                        }
                    }
                    "message" => {
                        if let Some(summary) = error_summary.as_mut() {
                            summary.message = non_empty(text);
                        }
                    }
                    "errorSummary" => j.error_summary = error_summary.take(),
                    "job" => {
                        if let Some(done) = job.take() {
                            jobs.push(done);
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    })?;

    Ok(jobs)
}

/// Parse a document holding exactly one UWS job.
pub fn parse_job(data: &[u8]) -> TapResult<JobDescriptor> {
    parse_jobs(data)?
        .into_iter()
        .next()
        .ok_or_else(|| TapError::parse("No job found in response"))
}

/// Parse a UWS job list (`jobs/jobref`).
pub fn parse_job_list(data: &[u8]) -> TapResult<Vec<JobRef>> {
    let mut refs = Vec::new();
    let mut current: Option<JobRef> = None;

    walk(data, |node| {
        match node {
            Node::Open { name: "jobref", attrs } => {
                current = Some(JobRef {
                    id: attrs.owned("id").unwrap_or_default(),
                    phase: JobPhase::Unknown,
                    href: attrs.owned("href"),
                    ..Default::default()
                });
            }
            Node::Open { .. } => {}
            Node::Close { name, text } => {
                let Some(r) = current.as_mut() else {
                    return Ok(());
                };
                match name {
                    "phase" => r.phase = JobPhase::from_wire(text),
                    "runId" => r.run_id = non_empty(text),
                    "ownerId" => r.owner_id = non_empty(text),
                    "creationTime" => r.creation_time = non_empty(text),
                    "jobref" => {
                        if let Some(done) = current.take() {
                            refs.push(done);
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    })?;

    Ok(refs)
}
