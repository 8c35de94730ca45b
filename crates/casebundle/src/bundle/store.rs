use crate::error::BundleError;

use super::job::{BundleJob, BundleStatus, JobStatusUpdate, NewBundleJob};
use super::source::{DocumentRow, DraftRow, ExhibitRow};

/// Durable job and case-material records.
///
/// Implementations enforce [`BundleStatus::can_transition_to`] atomically:
/// a status write only succeeds if the stored status is still a legal
/// predecessor at the moment of writing.
pub trait RecordStore: Send + Sync {
    /// Persists a new job in `Queued`.
    fn create_job(&self, job: NewBundleJob) -> Result<BundleJob, BundleError>;

    /// Moves a job to `status`, writing the set fields of `update`.
    ///
    /// Fails with [`BundleError::InvalidTransition`] when the move is not
    /// legal from the stored state, and [`BundleError::JobNotFound`] when
    /// the job does not exist.
    fn update_job_status(
        &self,
        id: &str,
        status: BundleStatus,
        update: JobStatusUpdate,
    ) -> Result<BundleJob, BundleError>;

    fn get_job(&self, id: &str) -> Result<Option<BundleJob>, BundleError>;

    /// Atomically claims up to `limit` queued jobs, oldest first. Each
    /// returned job is already `Processing` and belongs to the caller.
    fn claim_queued(&self, limit: usize) -> Result<Vec<BundleJob>, BundleError>;

    fn list_documents(&self, case_id: &str) -> Result<Vec<DocumentRow>, BundleError>;

    fn list_exhibits(&self, case_id: &str) -> Result<Vec<ExhibitRow>, BundleError>;

    fn list_drafts(&self, case_id: &str) -> Result<Vec<DraftRow>, BundleError>;
}
