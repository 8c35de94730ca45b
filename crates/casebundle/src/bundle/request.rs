//! Turns a client request into a queued job with a fixed manifest.
//!
//! The manifest is resolved once, here. Reordering a case's sources after
//! the job exists does not change the job's Bates numbering.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::BundleError;

use super::job::{BundleJob, BundleOptions, NewBundleJob, Section, SourceRef};
use super::store::RecordStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRequest {
    pub case_id: String,
    /// Restricts the drafts section to this one draft.
    #[serde(default)]
    pub source_draft_id: Option<String>,
    /// Explicit exhibit selection, in bundle order. All exhibits when unset.
    #[serde(default)]
    pub exhibit_ids: Option<Vec<String>>,
    #[serde(default)]
    pub options: BundleOptions,
}

/// Validates `request`, resolves its manifest and creates the job in
/// `Queued`.
///
/// Manifest order is documents, then exhibits, then drafts; within a
/// section it is the record store's list order, or the explicit exhibit
/// selection order.
pub fn create_bundle_job(
    records: &dyn RecordStore,
    request: BundleRequest,
) -> Result<BundleJob, BundleError> {
    request.options.validate()?;
    let case_id = request.case_id.as_str();
    let mut manifest = Vec::new();

    if request.options.includes(Section::Documents) {
        manifest.extend(
            records
                .list_documents(case_id)?
                .into_iter()
                .map(|d| SourceRef::Document { id: d.id }),
        );
    }

    if request.options.includes(Section::Exhibits) {
        let exhibits = records.list_exhibits(case_id)?;
        match &request.exhibit_ids {
            Some(selected) => {
                for id in selected {
                    if !exhibits.iter().any(|e| &e.id == id) {
                        return Err(missing("exhibit", id, case_id));
                    }
                    manifest.push(SourceRef::Exhibit { id: id.clone() });
                }
            }
            None => manifest.extend(
                exhibits
                    .into_iter()
                    .map(|e| SourceRef::Exhibit { id: e.id }),
            ),
        }
    }

    if request.options.includes(Section::Drafts) {
        let drafts = records.list_drafts(case_id)?;
        match &request.source_draft_id {
            Some(id) => {
                if !drafts.iter().any(|d| &d.id == id) {
                    return Err(missing("draft", id, case_id));
                }
                manifest.push(SourceRef::Draft { id: id.clone() });
            }
            None => manifest.extend(drafts.into_iter().map(|d| SourceRef::Draft { id: d.id })),
        }
    }

    let mut new_job = NewBundleJob::new(case_id, request.options, manifest);
    new_job.source_draft_id = request.source_draft_id;
    let job = records.create_job(new_job)?;

    info!(
        job_id = %job.id,
        case_id = %job.case_id,
        sources = job.manifest.len(),
        "Bundle job queued"
    );
    Ok(job)
}

fn missing(kind: &'static str, id: &str, case_id: &str) -> BundleError {
    BundleError::SourceMissing {
        kind,
        id: id.to_string(),
        case_id: case_id.to_string(),
    }
}
