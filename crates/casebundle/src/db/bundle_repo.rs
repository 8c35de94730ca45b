//! Bundle job repository: rows of the `bundle_jobs` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::bundle::{BlobRef, BundleJob, BundleStatus, JobStatusUpdate, NewBundleJob};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};

const TABLE: &str = "bundle_jobs";

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct BundleJobRow {
    pub id: String,
    pub case_id: String,
    pub source_draft_id: Option<String>,
    pub status: String,
    pub options: String,
    pub manifest: String,
    pub output_bucket: Option<String>,
    pub output_path: Option<String>,
    pub output_byte_size: Option<i64>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl BundleJobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            case_id: row.get("case_id")?,
            source_draft_id: row.get("source_draft_id")?,
            status: row.get("status")?,
            options: row.get("options")?,
            manifest: row.get("manifest")?,
            output_bucket: row.get("output_bucket")?,
            output_path: row.get("output_path")?,
            output_byte_size: row.get("output_byte_size")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }

    fn invalid(&self, reason: impl Into<String>) -> DatabaseError {
        DatabaseError::InvalidRow {
            table: TABLE,
            id: self.id.clone(),
            reason: reason.into(),
        }
    }

    /// Parses a stored status.
    pub fn status(&self) -> Result<BundleStatus, DatabaseError> {
        BundleStatus::parse(&self.status)
            .ok_or_else(|| self.invalid(format!("unknown status '{}'", self.status)))
    }

    pub fn into_job(self) -> Result<BundleJob, DatabaseError> {
        let status = self.status()?;
        let output_location = match (&self.output_bucket, &self.output_path) {
            (Some(bucket), Some(path)) => Some(BlobRef::new(bucket.clone(), path.clone())),
            (None, None) => None,
            _ => return Err(self.invalid("output bucket and path must be set together")),
        };
        let output_byte_size = self
            .output_byte_size
            .map(|size| u64::try_from(size).map_err(|_| self.invalid("negative output size")))
            .transpose()?;
        let completed_at = self
            .completed_at
            .as_deref()
            .map(|value| parse_timestamp(TABLE, &self.id, value))
            .transpose()?;

        Ok(BundleJob {
            options: serde_json::from_str(&self.options)?,
            manifest: serde_json::from_str(&self.manifest)?,
            created_at: parse_timestamp(TABLE, &self.id, &self.created_at)?,
            updated_at: parse_timestamp(TABLE, &self.id, &self.updated_at)?,
            completed_at,
            status,
            output_location,
            output_byte_size,
            id: self.id,
            case_id: self.case_id,
            source_draft_id: self.source_draft_id,
            error: self.error,
        })
    }
}

/// Inserts a new job in `queued`.
pub fn insert(db: &Database, job: &NewBundleJob, now: DateTime<Utc>) -> Result<(), DatabaseError> {
    let options = serde_json::to_string(&job.options)?;
    let manifest = serde_json::to_string(&job.manifest)?;
    let now = format_timestamp(now);
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO bundle_jobs (id, case_id, source_draft_id, status, options, manifest,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                job.id,
                job.case_id,
                job.source_draft_id,
                BundleStatus::Queued.as_str(),
                options,
                manifest,
                now,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<BundleJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM bundle_jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], BundleJobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Moves a job to `to` if it is currently in one of `from`, writing the set
/// fields of `update`. Returns whether a row changed.
pub fn transition(
    db: &Database,
    id: &str,
    from: &[BundleStatus],
    to: BundleStatus,
    update: &JobStatusUpdate,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    if from.is_empty() {
        return Ok(false);
    }
    // Statuses come from a closed enum, so inlining them is safe.
    let allowed = from
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE bundle_jobs SET
            status = ?2,
            updated_at = ?3,
            completed_at = ?4,
            output_bucket = COALESCE(?5, output_bucket),
            output_path = COALESCE(?6, output_path),
            output_byte_size = COALESCE(?7, output_byte_size),
            error = COALESCE(?8, error)
         WHERE id = ?1 AND status IN ({})",
        allowed
    );

    let now = format_timestamp(now);
    let completed_at = to.is_terminal().then(|| now.clone());
    let output_byte_size = update
        .output_byte_size
        .map(|size| i64::try_from(size).unwrap_or(i64::MAX));

    db.with_conn(|conn| {
        let changed = conn.execute(
            &sql,
            params![
                id,
                to.as_str(),
                now,
                completed_at,
                update.output_location.as_ref().map(|l| l.bucket.as_str()),
                update.output_location.as_ref().map(|l| l.path.as_str()),
                output_byte_size,
                update.error,
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Claims up to `limit` queued jobs, oldest first.
///
/// Each claim is a conditional update, so a job already taken by another
/// connection is skipped rather than claimed twice.
pub fn claim_queued(
    db: &Database,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<Vec<String>, DatabaseError> {
    let now = format_timestamp(now);
    db.with_conn(|conn| {
        let candidates: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT id FROM bundle_jobs WHERE status = 'queued'
                 ORDER BY created_at, id LIMIT ?1",
            )?;
            let ids = stmt
                .query_map(params![limit as i64], |r| r.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            ids
        };

        let mut claimed = Vec::with_capacity(candidates.len());
        for id in candidates {
            let changed = conn.execute(
                "UPDATE bundle_jobs SET status = 'processing', updated_at = ?2
                 WHERE id = ?1 AND status = 'queued'",
                params![id, now],
            )?;
            if changed == 1 {
                claimed.push(id);
            }
        }
        Ok(claimed)
    })
}
