use std::time::Duration;

use crate::bundle::{BlobRef, BundleJob, BundleOutput, BundleStatus, BundleWarning};

/// Outcome of processing one claimed job.
#[derive(Debug)]
pub struct JobResult {
    pub job_id: String,
    pub case_id: String,
    /// Status the worker tried to record.
    pub status: BundleStatus,
    pub output_location: Option<BlobRef>,
    pub output_byte_size: Option<u64>,
    pub warnings: Vec<BundleWarning>,
    pub error: Option<String>,
    pub elapsed: Duration,
    /// False when the final status write failed.
    pub recorded: bool,
}

impl JobResult {
    pub fn success(job: &BundleJob, output: BundleOutput, elapsed: Duration) -> Self {
        Self {
            job_id: job.id.clone(),
            case_id: job.case_id.clone(),
            status: BundleStatus::Ready,
            output_location: Some(output.location),
            output_byte_size: Some(output.byte_size),
            warnings: output.warnings,
            error: None,
            elapsed,
            recorded: true,
        }
    }

    pub fn failure(job: &BundleJob, error: String, elapsed: Duration) -> Self {
        Self {
            job_id: job.id.clone(),
            case_id: job.case_id.clone(),
            status: BundleStatus::Error,
            output_location: None,
            output_byte_size: None,
            warnings: Vec::new(),
            error: Some(error),
            elapsed,
            recorded: true,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BundleStatus::Ready
    }
}
