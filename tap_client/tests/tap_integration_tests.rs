//! Integration tests of the TAP client against a scripted transport.

use std::sync::Arc;

use qtty::Degrees;
use tap_client::adql::ConeSearch;
use tap_client::conn::{HttpResponse, Method, MockTransport};
use tap_client::{JobOptions, JobPhase, OutputFormat, PhaseAction, Tap, TapConfig, TapError};

const VOTABLE: &str = include_str!("data/test_votable.xml");
const TABLES: &str = include_str!("data/test_tables.xml");
const TABLE1: &str = include_str!("data/test_table1.xml");
const JOB: &str = include_str!("data/test_job.xml");
const JOB_LIST: &str = include_str!("data/test_jobs_list.xml");

fn tap(mock: &MockTransport) -> Tap {
    let mut config = TapConfig::for_url("http://test:1111/tap");
    config.jobs.poll_interval_ms = 1;
    Tap::with_transport(&config, Arc::new(mock.clone())).unwrap()
}

fn ok(body: &str) -> HttpResponse {
    HttpResponse::new(200, "OK").with_body(body)
}

fn votable_response() -> HttpResponse {
    ok(VOTABLE).with_header("Content-Type", "application/x-votable+xml")
}

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::new(303, "See Other").with_header("Location", location)
}

#[tokio::test]
async fn test_load_tables() {
    let mock = MockTransport::new();
    mock.respond("tables", ok(TABLES));
    let tables = tap(&mock).load_tables().await.unwrap();

    assert_eq!(tables.len(), 3);
    assert_eq!(tables[0].name, "public.table1");
    assert_eq!(tables[0].columns.len(), 3);
    let request = mock.last_request().unwrap();
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.url, "http://test:1111/tap/tables");
}

#[tokio::test]
async fn test_load_table() {
    let mock = MockTransport::new();
    mock.respond("tables?tables=public.table1", ok(TABLE1));
    let table = tap(&mock).load_table("public.table1").await.unwrap();

    assert_eq!(table.qualified_name(), "public.table1");
    assert_eq!(
        mock.last_request().unwrap().url,
        "http://test:1111/tap/tables?tables=public.table1"
    );
}

#[tokio::test]
async fn test_load_tables_http_error() {
    let mock = MockTransport::new();
    mock.respond("tables", HttpResponse::new(500, "Internal Server Error"));
    let err = tap(&mock).load_tables().await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("operation=load_tables"));
}

#[tokio::test]
async fn test_launch_sync_job() {
    let mock = MockTransport::new();
    mock.respond_to(Method::Post, "sync", votable_response());
    let job = tap(&mock)
        .launch_job("SELECT * FROM public.table1", JobOptions::new().with_name("q1"))
        .await
        .unwrap();

    assert!(!job.is_async());
    assert!(!job.is_failed());
    assert_eq!(job.phase(), JobPhase::Completed);
    assert_eq!(job.query(), Some("SELECT TOP 2000 * FROM public.table1"));
    assert_eq!(job.response_status(), Some((200, "OK")));
    let output = job.output_file().unwrap().to_string_lossy().into_owned();
    assert!(output.starts_with("sync_") && output.ends_with(".vot"));

    let summary = job.results().unwrap().votable_summary().unwrap();
    assert_eq!(summary.row_count, Some(3));

    let request = mock.last_request().unwrap();
    assert_eq!(request.url, "http://test:1111/tap/sync");
    assert_eq!(
        request.header("Content-Type"),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(request.header("Accept"), Some("text/plain"));
    let body = request.body_text();
    assert!(body.starts_with("REQUEST=doQuery&LANG=ADQL&FORMAT=votable&tapclient="));
    assert!(body.contains("&PHASE=RUN&QUERY=SELECT+TOP+2000+*+FROM+public.table1"));
    assert!(body.ends_with("&jobname=q1"));
}

#[tokio::test]
async fn test_sync_job_keeps_existing_top() {
    let mock = MockTransport::new();
    mock.respond("sync", votable_response());
    let job = tap(&mock)
        .launch_job("SELECT TOP 5 * FROM t", JobOptions::new())
        .await
        .unwrap();
    assert_eq!(job.query(), Some("SELECT TOP 5 * FROM t"));
}

#[tokio::test]
async fn test_sync_job_follows_redirection() {
    let mock = MockTransport::new();
    mock.respond_to(
        Method::Post,
        "sync",
        see_other("http://test:1111/tap/sync/1234"),
    );
    mock.respond("sync/1234", votable_response());
    let job = tap(&mock)
        .launch_job("SELECT * FROM t", JobOptions::new())
        .await
        .unwrap();

    assert_eq!(job.response_status(), Some((200, "OK")));
    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method, Method::Get);
    assert_eq!(requests[1].url, "http://test:1111/tap/sync/1234");
}

#[tokio::test]
async fn test_sync_redirection_without_location() {
    let mock = MockTransport::new();
    mock.respond("sync", HttpResponse::new(303, "See Other"));
    let err = tap(&mock)
        .launch_job("SELECT * FROM t", JobOptions::new())
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("No location found after redirection was received (303)"));
}

#[tokio::test]
async fn test_sync_job_error_is_dumped() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("result.vot");
    let mock = MockTransport::new();
    mock.respond(
        "sync",
        HttpResponse::new(400, "Bad Request").with_body("Cannot parse query"),
    );
    let err = tap(&mock)
        .launch_job(
            "SELECT FROM",
            JobOptions::new().with_output_file(&output).dump_to_file(true),
        )
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("Cannot parse query"));
    let dumped = std::fs::read_to_string(dir.path().join("result.vot.error")).unwrap();
    assert_eq!(dumped, "Cannot parse query");
    assert!(!output.exists());
}

#[tokio::test]
async fn test_sync_job_dump_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("result.csv");
    let mock = MockTransport::new();
    mock.respond("sync", ok("a,b\n1,2\n").with_header("Content-Type", "text/csv"));
    let job = tap(&mock)
        .launch_job(
            "SELECT a, b FROM t",
            JobOptions::new()
                .with_format(OutputFormat::Csv)
                .with_output_file(&output)
                .dump_to_file(true),
        )
        .await
        .unwrap();

    assert!(job.results().is_none());
    assert_eq!(job.output_file(), Some(output.as_path()));
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "a,b\n1,2\n");
    assert!(mock.last_request().unwrap().body_text().contains("FORMAT=csv"));
}

#[tokio::test]
async fn test_sync_job_results_read_back_from_dump() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("stars.csv");
    let mock = MockTransport::new();
    mock.respond("sync", ok("a,b\n1,2\n").with_header("Content-Type", "text/csv"));
    let mut job = tap(&mock)
        .launch_job(
            "SELECT a, b FROM t",
            JobOptions::new()
                .with_format(OutputFormat::Csv)
                .with_output_file(&output)
                .dump_to_file(true),
        )
        .await
        .unwrap();

    let results = job.get_results().await.unwrap();
    assert_eq!(results.to_text().unwrap(), "a,b\n1,2\n");
    assert_eq!(results.format, OutputFormat::Csv);
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn test_sync_job_with_upload() {
    let dir = tempfile::tempdir().unwrap();
    let resource = dir.path().join("mine.vot");
    std::fs::write(&resource, VOTABLE).unwrap();
    let mock = MockTransport::new();
    mock.respond("sync", votable_response());
    tap(&mock)
        .launch_job(
            "SELECT * FROM TAP_UPLOAD.mine",
            JobOptions::new().with_upload(&resource, "mine"),
        )
        .await
        .unwrap();

    let request = mock.last_request().unwrap();
    assert!(request
        .header("Content-Type")
        .unwrap()
        .starts_with("multipart/form-data; boundary="));
    let body = request.body_text();
    assert!(body.contains("name=\"UPLOAD\"\r\n\r\nmine,param:mine\r\n"));
    assert!(body.contains("name=\"mine\"; filename=\"mine.vot\""));
    assert!(body.contains("<VOTABLE"));
}

#[tokio::test]
async fn test_upload_requires_table_name() {
    let mock = MockTransport::new();
    let options = JobOptions {
        upload_resource: Some("mine.vot".into()),
        ..JobOptions::new()
    };
    let err = tap(&mock)
        .launch_job("SELECT * FROM TAP_UPLOAD.mine", options)
        .await
        .unwrap_err();
    assert!(matches!(err, TapError::InvalidArgument(_)));
    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn test_launch_async_job() {
    let mock = MockTransport::new();
    mock.respond_to(
        Method::Post,
        "async",
        see_other("http://test:1111/tap/async/12345"),
    );
    mock.respond("async/12345/phase", ok("EXECUTING"));
    mock.respond("async/12345/phase", ok("COMPLETED"));
    mock.respond(
        "async/12345/results/result",
        see_other("http://test:1111/files/12345.vot"),
    );
    mock.respond("files/12345.vot", votable_response());

    let job = tap(&mock)
        .launch_job_async("SELECT * FROM public.table1", JobOptions::new())
        .await
        .unwrap();

    assert!(job.is_async());
    assert_eq!(job.jobid(), Some("12345"));
    assert_eq!(job.phase(), JobPhase::Completed);
    assert_eq!(
        job.remote_location(),
        Some("http://test:1111/tap/async/12345")
    );
    assert_eq!(job.query(), Some("SELECT * FROM public.table1"));
    assert_eq!(mock.requests_to("async/12345/phase").len(), 2);
    let results = job.results().unwrap();
    assert_eq!(
        results.votable_summary().unwrap().field_names(),
        vec!["alpha", "delta", "source_id"]
    );
}

#[tokio::test]
async fn test_async_job_in_background() {
    let mock = MockTransport::new();
    mock.respond("async", see_other("http://test:1111/tap/async/777"));
    let mut job = tap(&mock)
        .launch_job_async("SELECT * FROM t", JobOptions::new().background(true))
        .await
        .unwrap();

    assert_eq!(job.jobid(), Some("777"));
    assert!(job.results().is_none());
    assert_eq!(mock.request_count(), 1);

    mock.respond_to(Method::Post, "async/777/phase", see_other("http://test:1111/tap/async/777"));
    job.abort().await.unwrap();
    assert_eq!(job.phase(), JobPhase::Aborted);
    let request = mock.last_request().unwrap();
    assert_eq!(request.url, "http://test:1111/tap/async/777/phase");
    assert_eq!(request.body_text(), "PHASE=ABORT");
}

#[tokio::test]
async fn test_async_job_failure() {
    let mock = MockTransport::new();
    mock.respond("async", see_other("http://test:1111/tap/async/13579"));
    mock.respond("async/13579/phase", ok("ERROR"));
    mock.respond("async/13579/error", ok("Unknown table 'missing'"));

    let err = tap(&mock)
        .launch_job_async("SELECT * FROM missing", JobOptions::new())
        .await
        .unwrap_err();

    match err {
        TapError::JobFailed { job_id, message } => {
            assert_eq!(job_id, "13579");
            assert_eq!(message, "Unknown table 'missing'");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(mock.requests_to("async/13579/results/result").is_empty());
}

#[tokio::test]
async fn test_async_submission_rejected() {
    let mock = MockTransport::new();
    mock.respond("async", HttpResponse::new(401, "Unauthorized"));
    let err = tap(&mock)
        .launch_job_async("SELECT * FROM t", JobOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_async_job_saved_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("async.vot");
    let mock = MockTransport::new();
    mock.respond("async", see_other("/tap/async/42"));
    mock.respond("async/42/phase", ok("COMPLETED"));
    mock.respond("async/42/results/result", votable_response());

    let job = tap(&mock)
        .launch_job_async(
            "SELECT * FROM t",
            JobOptions::new().with_output_file(&output).dump_to_file(true),
        )
        .await
        .unwrap();

    assert_eq!(job.jobid(), Some("42"));
    assert_eq!(std::fs::read_to_string(&output).unwrap(), VOTABLE);
}

#[tokio::test]
async fn test_load_async_job() {
    let mock = MockTransport::new();
    mock.respond("async/1479386030738O", ok(JOB));
    mock.respond("async/1479386030738O/results/result", votable_response());

    let job = tap(&mock).load_async_job("1479386030738O").await.unwrap();

    assert_eq!(job.jobid(), Some("1479386030738O"));
    assert_eq!(job.phase(), JobPhase::Completed);
    assert_eq!(job.name(), Some("my_job"));
    assert_eq!(
        job.query(),
        Some("SELECT TOP 2000 * FROM public.table1 WHERE a < 3")
    );
    assert!(job.results().is_some());
}

#[tokio::test]
async fn test_list_async_jobs() {
    let mock = MockTransport::new();
    mock.respond("async", ok(JOB_LIST));
    let jobs = tap(&mock).list_async_jobs().await.unwrap();

    let summary: Vec<(&str, JobPhase)> = jobs.iter().map(|j| (j.id.as_str(), j.phase)).collect();
    assert_eq!(
        summary,
        vec![
            ("12345", JobPhase::Completed),
            ("67890", JobPhase::Executing),
            ("13579", JobPhase::Error),
        ]
    );
}

#[tokio::test]
async fn test_cone_search() {
    let mock = MockTransport::new();
    mock.respond("sync", votable_response());
    let search = ConeSearch::new(
        "gaiadr3.gaia_source",
        Degrees::new(10.5),
        Degrees::new(-20.0),
        Degrees::new(0.1),
    );
    let job = tap(&mock)
        .cone_search(&search, JobOptions::new(), false)
        .await
        .unwrap();

    let query = job.query().unwrap();
    assert!(query.starts_with("SELECT TOP 2000 "));
    assert!(query.contains("CONTAINS(POINT('ICRS',ra,dec),CIRCLE('ICRS',10.5,-20, 0.1))=1"));
}

async fn background_job(mock: &MockTransport, jobid: &str) -> tap_client::Job {
    mock.respond_to(
        Method::Post,
        "async",
        see_other(&format!("http://test:1111/tap/async/{}", jobid)),
    );
    tap(mock)
        .launch_job_async("SELECT * FROM t", JobOptions::new().background(true))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_async_job_polls_through_unrecognized_phase() {
    let mock = MockTransport::new();
    mock.respond("async", see_other("http://test:1111/tap/async/1"));
    mock.respond("async/1/phase", ok("SUBMITTED"));
    mock.respond("async/1/phase", ok("COMPLETED"));
    mock.respond("async/1/results/result", votable_response());

    let job = tap(&mock)
        .launch_job_async("SELECT * FROM t", JobOptions::new())
        .await
        .unwrap();

    assert_eq!(job.phase(), JobPhase::Completed);
    assert_eq!(mock.requests_to("async/1/phase").len(), 2);
    assert!(job.results().is_some());
}

#[tokio::test]
async fn test_send_parameter_while_pending() {
    let mock = MockTransport::new();
    let mut job = background_job(&mock, "5").await;
    mock.respond_to(Method::Get, "async/5/phase", ok("PENDING"));
    mock.respond_to(Method::Get, "async/5/phase", ok("EXECUTING"));
    mock.respond_to(
        Method::Post,
        "async/5/parameters",
        see_other("http://test:1111/tap/async/5"),
    );

    assert_eq!(job.refresh_phase().await.unwrap(), JobPhase::Pending);
    job.send_parameter("MAXREC", "100").await.unwrap();
    let request = mock.last_request().unwrap();
    assert_eq!(request.url, "http://test:1111/tap/async/5/parameters");
    assert_eq!(request.body_text(), "MAXREC=100");

    assert_eq!(job.refresh_phase().await.unwrap(), JobPhase::Executing);
    let err = job.send_parameter("MAXREC", "200").await.unwrap_err();
    assert!(matches!(err, TapError::InvalidArgument(_)));
    assert_eq!(mock.requests_to("async/5/parameters").len(), 1);
}

#[tokio::test]
async fn test_set_phase_run() {
    let mock = MockTransport::new();
    let mut job = background_job(&mock, "8").await;
    mock.respond_to(
        Method::Post,
        "async/8/phase",
        see_other("http://test:1111/tap/async/8"),
    );

    job.set_phase(PhaseAction::Run).await.unwrap();
    assert_eq!(job.phase(), JobPhase::Queued);
    let request = mock.last_request().unwrap();
    assert_eq!(request.url, "http://test:1111/tap/async/8/phase");
    assert_eq!(request.body_text(), "PHASE=RUN");
}

#[tokio::test]
async fn test_result_redirect_limit() {
    let mock = MockTransport::new();
    mock.respond("async", see_other("http://test:1111/tap/async/9"));
    mock.respond("async/9/phase", ok("COMPLETED"));
    mock.respond(
        "async/9/results/result",
        see_other("http://test:1111/files/loop.vot"),
    );
    mock.respond("files/loop.vot", see_other("http://test:1111/files/loop.vot"));
    let mut config = TapConfig::for_url("http://test:1111/tap");
    config.jobs.poll_interval_ms = 1;
    config.jobs.max_redirects = 2;
    let tap = Tap::with_transport(&config, Arc::new(mock.clone())).unwrap();

    let err = tap
        .launch_job_async("SELECT * FROM t", JobOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(303));
    assert!(err.to_string().contains("Too many redirects (2)"));
    assert_eq!(mock.requests_to("files/loop.vot").len(), 2);
}

#[tokio::test]
async fn test_result_redirect_without_location() {
    let mock = MockTransport::new();
    mock.respond("async", see_other("http://test:1111/tap/async/10"));
    mock.respond("async/10/phase", ok("COMPLETED"));
    mock.respond(
        "async/10/results/result",
        HttpResponse::new(303, "See Other"),
    );

    let err = tap(&mock)
        .launch_job_async("SELECT * FROM t", JobOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(303));
    assert!(err.to_string().contains("Redirect without Location header"));
}
