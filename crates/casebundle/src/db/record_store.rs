use chrono::Utc;

use crate::bundle::{
    BundleJob, BundleStatus, DocumentRow, DraftRow, ExhibitRow, JobStatusUpdate, NewBundleJob,
    RecordStore,
};
use crate::error::BundleError;

use super::{bundle_repo, source_repo, Database};

/// [`RecordStore`] backed by the crate's SQLite schema.
#[derive(Clone)]
pub struct SqliteRecordStore {
    db: Database,
}

impl SqliteRecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn load(&self, id: &str) -> Result<BundleJob, BundleError> {
        match bundle_repo::find_by_id(&self.db, id)? {
            Some(row) => Ok(row.into_job()?),
            None => Err(BundleError::JobNotFound(id.to_string())),
        }
    }
}

impl RecordStore for SqliteRecordStore {
    fn create_job(&self, job: NewBundleJob) -> Result<BundleJob, BundleError> {
        bundle_repo::insert(&self.db, &job, Utc::now())?;
        self.load(&job.id)
    }

    fn update_job_status(
        &self,
        id: &str,
        status: BundleStatus,
        update: JobStatusUpdate,
    ) -> Result<BundleJob, BundleError> {
        let allowed = BundleStatus::predecessors(status);
        if bundle_repo::transition(&self.db, id, &allowed, status, &update, Utc::now())? {
            return self.load(id);
        }

        let current = self.load(id)?;
        Err(BundleError::InvalidTransition {
            from: current.status,
            to: status,
        })
    }

    fn get_job(&self, id: &str) -> Result<Option<BundleJob>, BundleError> {
        bundle_repo::find_by_id(&self.db, id)?
            .map(|row| row.into_job().map_err(BundleError::from))
            .transpose()
    }

    fn claim_queued(&self, limit: usize) -> Result<Vec<BundleJob>, BundleError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        bundle_repo::claim_queued(&self.db, limit, Utc::now())?
            .iter()
            .map(|id| self.load(id))
            .collect()
    }

    fn list_documents(&self, case_id: &str) -> Result<Vec<DocumentRow>, BundleError> {
        Ok(source_repo::list_documents(&self.db, case_id)?)
    }

    fn list_exhibits(&self, case_id: &str) -> Result<Vec<ExhibitRow>, BundleError> {
        Ok(source_repo::list_exhibits(&self.db, case_id)?)
    }

    fn list_drafts(&self, case_id: &str) -> Result<Vec<DraftRow>, BundleError> {
        Ok(source_repo::list_drafts(&self.db, case_id)?)
    }
}
