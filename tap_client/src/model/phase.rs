use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TapError;

/// UWS execution phase of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobPhase {
    #[default]
    Pending,
    Queued,
    Executing,
    Completed,
    Error,
    Aborted,
    Unknown,
    Held,
    Suspended,
    Archived,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Pending => "PENDING",
            JobPhase::Queued => "QUEUED",
            JobPhase::Executing => "EXECUTING",
            JobPhase::Completed => "COMPLETED",
            JobPhase::Error => "ERROR",
            JobPhase::Aborted => "ABORTED",
            JobPhase::Unknown => "UNKNOWN",
            JobPhase::Held => "HELD",
            JobPhase::Suspended => "SUSPENDED",
            JobPhase::Archived => "ARCHIVED",
        }
    }

    /// No further phase change will happen on the server.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            JobPhase::Completed | JobPhase::Error | JobPhase::Aborted | JobPhase::Archived
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobPhase::Error | JobPhase::Aborted)
    }

    /// Phase as reported by a server. Unrecognized text maps to `Unknown`.
    pub fn from_wire(text: &str) -> Self {
        text.parse().unwrap_or(JobPhase::Unknown)
    }
}

/// Phase change a client may request on a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseAction {
    Run,
    Abort,
}

impl PhaseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseAction::Run => "RUN",
            PhaseAction::Abort => "ABORT",
        }
    }

    /// Local phase assumed once the server accepted the request.
    pub fn resulting_phase(&self) -> JobPhase {
        match self {
            PhaseAction::Run => JobPhase::Queued,
            PhaseAction::Abort => JobPhase::Aborted,
        }
    }
}

impl fmt::Display for PhaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobPhase {
    type Err = TapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let phase = match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => JobPhase::Pending,
            "QUEUED" => JobPhase::Queued,
            "EXECUTING" => JobPhase::Executing,
            "COMPLETED" => JobPhase::Completed,
            "ERROR" => JobPhase::Error,
            "ABORTED" => JobPhase::Aborted,
            "UNKNOWN" => JobPhase::Unknown,
            "HELD" => JobPhase::Held,
            "SUSPENDED" => JobPhase::Suspended,
            "ARCHIVED" => JobPhase::Archived,
            other => return Err(TapError::parse(format!("Unknown job phase '{}'", other))),
        };
        Ok(phase)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_phase() {
        assert_eq!(" completed\n".parse::<JobPhase>().unwrap(), JobPhase::Completed);
        assert_eq!("EXECUTING".parse::<JobPhase>().unwrap(), JobPhase::Executing);
        assert!("DONE".parse::<JobPhase>().is_err());
        assert!("RUN".parse::<JobPhase>().is_err());
    }

    #[test]
    fn test_from_wire_is_lenient() {
        assert_eq!(JobPhase::from_wire("SUBMITTED"), JobPhase::Unknown);
        assert_eq!(JobPhase::from_wire("queued\n"), JobPhase::Queued);
    }

    #[test]
    fn test_phase_actions() {
        assert_eq!(PhaseAction::Run.as_str(), "RUN");
        assert_eq!(PhaseAction::Abort.resulting_phase(), JobPhase::Aborted);
        assert_eq!(PhaseAction::Run.resulting_phase(), JobPhase::Queued);
    }

    #[test]
    fn test_final_phases() {
        let finals: Vec<JobPhase> = [
            JobPhase::Pending,
            JobPhase::Queued,
            JobPhase::Executing,
            JobPhase::Completed,
            JobPhase::Error,
            JobPhase::Aborted,
            JobPhase::Held,
            JobPhase::Suspended,
            JobPhase::Archived,
        ]
        .into_iter()
        .filter(JobPhase::is_final)
        .collect();
        assert_eq!(
            finals,
            vec![
                JobPhase::Completed,
                JobPhase::Error,
                JobPhase::Aborted,
                JobPhase::Archived
            ]
        );
    }

    #[test]
    fn test_serde_uppercase() {
        assert_eq!(serde_json::to_string(&JobPhase::Queued).unwrap(), "\"QUEUED\"");
    }
}
