#[cfg(test)]
mod tests {
    use crate::model::JobPhase;
    use crate::xmlparser::{parse_job, parse_job_list, parse_jobs};

    const JOB: &str = include_str!("../../tests/data/test_job.xml");
    const JOBS_LIST: &str = include_str!("../../tests/data/test_jobs_list.xml");
    const JOBS_SEARCH: &str = include_str!("../../tests/data/test_jobs_search.xml");

    #[test]
    fn test_parse_single_job() {
        let job = parse_job(JOB.as_bytes()).unwrap();
        assert_eq!(job.job_id, "1479386030738O");
        assert_eq!(job.run_id, None);
        assert_eq!(job.owner_id.as_deref(), Some("anonymous"));
        assert_eq!(job.phase, JobPhase::Completed);
        assert_eq!(job.quote.as_deref(), Some("-1"));
        assert_eq!(job.execution_duration, Some(0));
        assert_eq!(
            job.start_time.as_deref(),
            Some("2016-11-17T13:33:50.755+0100")
        );
        assert_eq!(
            job.destruction.as_deref(),
            Some("2016-11-20T13:33:50.738+0100")
        );
    }

    #[test]
    fn test_job_parameters_and_results() {
        let job = parse_job(JOB.as_bytes()).unwrap();
        assert_eq!(job.parameters.len(), 4);
        assert_eq!(
            job.query(),
            Some("SELECT TOP 2000 * FROM public.table1 WHERE a < 3")
        );
        assert_eq!(job.format(), Some("votable"));
        assert_eq!(job.name(), Some("my_job"));
        assert_eq!(job.parameter("LANG"), Some("ADQL"));

        assert_eq!(job.results.len(), 1);
        let result = &job.results[0];
        assert_eq!(result.id, "result");
        assert_eq!(
            result.href.as_deref(),
            Some("http://test:1111/tap/async/1479386030738O/results/result")
        );
        assert_eq!(result.size, Some(1024));
        assert_eq!(
            result.mime_type.as_deref(),
            Some("application/x-votable+xml")
        );
        assert!(job.error_summary.is_none());
    }

    #[test]
    fn test_parse_job_search() {
        let jobs = parse_jobs(JOBS_SEARCH.as_bytes()).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_id, "111");
        assert_eq!(jobs[0].name(), Some("crossmatch_result"));
        assert_eq!(jobs[1].phase, JobPhase::Error);

        let summary = jobs[1].error_summary.as_ref().unwrap();
        assert_eq!(summary.kind.as_deref(), Some("fatal"));
        assert!(summary.has_detail);
        assert_eq!(
            summary.message.as_deref(),
            Some("Table \"missing\" does not exist")
        );
    }

    #[test]
    fn test_parse_job_without_job_element() {
        assert!(parse_job(b"<jobs/>").is_err());
    }

    #[test]
    fn test_parse_job_list() {
        let refs = parse_job_list(JOBS_LIST.as_bytes()).unwrap();
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].id, "12345");
        assert_eq!(refs[0].phase, JobPhase::Completed);
        assert_eq!(refs[0].run_id.as_deref(), Some("run_a"));
        assert_eq!(
            refs[0].href.as_deref(),
            Some("http://test:1111/tap/async/12345")
        );
        assert_eq!(refs[1].phase, JobPhase::Executing);
        assert_eq!(refs[2].phase, JobPhase::Error);
        assert_eq!(refs[2].href, None);
    }

    #[test]
    fn test_unknown_phase_is_tolerated() {
        let refs =
            parse_job_list(b"<jobs><jobref id=\"1\"><phase>WAITING</phase></jobref></jobs>")
                .unwrap();
        assert_eq!(refs[0].phase, JobPhase::Unknown);
    }
}
