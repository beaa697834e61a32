//! Domain model: tables, jobs, job filters and sharing entities.

pub mod filter;
pub mod job;
pub mod phase;
pub mod sharing;
pub mod table;

pub use filter::JobFilter;
pub use job::{ErrorSummary, Job, JobDescriptor, JobParameter, JobResultRef};
pub use phase::{JobPhase, PhaseAction};
pub use sharing::{TapGroup, TapSharedItem, TapSharedToItem, TapUser};
pub use table::{ColumnFlag, TapColumn, TapTable};

/// Entry of a UWS job list (`async`).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JobRef {
    pub id: String,
    pub phase: JobPhase,
    pub href: Option<String>,
    pub run_id: Option<String>,
    pub owner_id: Option<String>,
    pub creation_time: Option<String>,
}
