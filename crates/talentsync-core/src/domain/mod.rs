pub mod outcome;
pub mod records;
pub mod source_id;
pub mod timestamp;

pub use outcome::{OutcomeError, SyncOutcome, SyncReport, SyncStatus};
pub use records::{
    parse_candidates, parse_jobs, CandidateRecord, CandidateStatus, JobRecord, JobStatus,
    PayloadError,
};
pub use source_id::SourceId;
pub use timestamp::UtcDateTime;
