//! Client-facing downloads: finished bundle archives and single-draft
//! exports, each with the headers an HTTP layer would send.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bundle::{
    blocking, BundleStatus, DraftRow, RecordStore, RunnerSettings, ZIP_CONTENT_TYPE,
};
use crate::docx::{DocxBuilder, DOCX_CONTENT_TYPE};
use crate::error::BundleError;
use crate::pdf::{PdfBuilder, PdfLayout};
use crate::sanitize::sanitize_filename;
use crate::storage::BlobStore;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Characters of the job id kept in a bundle's download name.
const JOB_ID_PREFIX_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Docx,
    Pdf,
    Text,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "docx" => Some(ExportFormat::Docx),
            "pdf" => Some(ExportFormat::Pdf),
            "text" | "txt" => Some(ExportFormat::Text),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Docx => "docx",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Text => "txt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Docx => DOCX_CONTENT_TYPE,
            ExportFormat::Pdf => PDF_CONTENT_TYPE,
            ExportFormat::Text => TEXT_CONTENT_TYPE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResponse {
    pub content_type: &'static str,
    pub content_disposition: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl DownloadResponse {
    /// An attachment named `<sanitized stem>.<extension>`.
    pub fn attachment(
        stem: &str,
        extension: &str,
        content_type: &'static str,
        bytes: Vec<u8>,
    ) -> Self {
        let filename = format!("{}.{}", sanitize_filename(stem), extension);
        Self {
            content_type,
            content_disposition: format!("attachment; filename=\"{}\"", filename),
            filename,
            bytes,
        }
    }
}

/// Returns the archive of a `Ready` job.
pub async fn fetch_bundle_download(
    records: &dyn RecordStore,
    blobs: &dyn BlobStore,
    job_id: &str,
) -> Result<DownloadResponse, BundleError> {
    let job = records
        .get_job(job_id)?
        .ok_or_else(|| BundleError::JobNotFound(job_id.to_string()))?;
    if job.status != BundleStatus::Ready {
        return Err(BundleError::NotReady {
            id: job.id,
            status: job.status,
        });
    }

    let location = job.output_location.as_ref().ok_or_else(|| {
        BundleError::Processing(format!("ready job '{}' has no output location", job.id))
    })?;
    let bytes = blobs
        .get(&location.bucket, &location.path)
        .await
        .map_err(|e| BundleError::source_fetch(format!("bundle archive of job '{}'", job.id), e))?;

    let short_id: String = job.id.chars().take(JOB_ID_PREFIX_LEN).collect();
    let stem = format!("case-{}-bundle-{}", job.case_id, short_id);
    info!(job_id = %job.id, bytes = bytes.len(), "Serving bundle download");
    Ok(DownloadResponse::attachment(&stem, "zip", ZIP_CONTENT_TYPE, bytes))
}

/// Renders one draft in `format`. Pure; run it on the blocking pool from
/// async code.
pub fn export_draft(
    draft: &DraftRow,
    format: ExportFormat,
    layout: &PdfLayout,
    court_style: bool,
    signature: Option<&[u8]>,
) -> Result<DownloadResponse, BundleError> {
    let bytes = match format {
        ExportFormat::Docx => DocxBuilder::new().court_style(court_style).build(
            draft.front_matter.as_deref(),
            &draft.title,
            draft.meta.as_deref(),
            &draft.body,
            signature,
        )?,
        ExportFormat::Pdf => {
            let body = match &draft.front_matter {
                Some(front_matter) => format!("{}\n\n{}", front_matter, draft.body),
                None => draft.body.clone(),
            };
            PdfBuilder::new(layout.clone()).build(
                &draft.title,
                draft.meta.as_deref().unwrap_or_default(),
                &body,
            )
        }
        ExportFormat::Text => draft_text(draft).into_bytes(),
    };

    Ok(DownloadResponse::attachment(
        &draft.title,
        format.extension(),
        format.content_type(),
        bytes,
    ))
}

/// Looks up a draft of `case_id`, fetches its signature and exports it.
///
/// A signature that cannot be fetched is left out, as during bundling.
pub async fn fetch_draft_export(
    records: &dyn RecordStore,
    blobs: &dyn BlobStore,
    case_id: &str,
    draft_id: &str,
    format: ExportFormat,
    settings: &RunnerSettings,
) -> Result<DownloadResponse, BundleError> {
    let draft = records
        .list_drafts(case_id)?
        .into_iter()
        .find(|d| d.id == draft_id)
        .ok_or_else(|| BundleError::SourceMissing {
            kind: "draft",
            id: draft_id.to_string(),
            case_id: case_id.to_string(),
        })?;

    let signature = match (&draft.signature, format) {
        (Some(blob), ExportFormat::Docx) => match blobs.get(&blob.bucket, &blob.path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(draft_id = %draft.id, "Signature image unavailable, omitting it: {}", e);
                None
            }
        },
        _ => None,
    };

    let layout = settings.pdf_layout.clone();
    let court_style = settings.court_style;
    blocking(move || export_draft(&draft, format, &layout, court_style, signature.as_deref()))
        .await?
}

fn draft_text(draft: &DraftRow) -> String {
    let mut sections = Vec::with_capacity(4);
    if let Some(front_matter) = draft.front_matter.as_deref().filter(|s| !s.trim().is_empty()) {
        sections.push(front_matter.trim_end().to_string());
    }
    let mut heading = draft.title.clone();
    if let Some(meta) = draft.meta.as_deref().filter(|s| !s.trim().is_empty()) {
        heading.push('\n');
        heading.push_str(meta.trim_end());
    }
    sections.push(heading);
    sections.push(draft.body.trim_end().to_string());

    let mut text = sections.join("\n\n");
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{BlobRef, BundleOptions, JobStatusUpdate, NewBundleJob, SourceRef};
    use crate::db::{Database, SqliteRecordStore};
    use crate::storage::MemoryBlobStore;
    use crate::test_support::{signature_png, Seeder};
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    fn draft(title: &str) -> DraftRow {
        let at: DateTime<Utc> = DateTime::from_timestamp(1_760_000_000, 0).unwrap();
        DraftRow {
            id: "dr1".to_string(),
            case_id: "c1".to_string(),
            title: title.to_string(),
            front_matter: Some("SUPERIOR COURT\nCounty of Alameda".to_string()),
            meta: Some("Case No. 24-0001".to_string()),
            body: "The tenant requests relief.".to_string(),
            signature: None,
            position: 0,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_format_metadata() {
        assert_eq!(ExportFormat::parse("PDF"), Some(ExportFormat::Pdf));
        assert_eq!(ExportFormat::parse("txt"), Some(ExportFormat::Text));
        assert_eq!(ExportFormat::parse("rtf"), None);
        assert_eq!(ExportFormat::Text.content_type(), "text/plain; charset=utf-8");
        assert_eq!(ExportFormat::Docx.extension(), "docx");
    }

    #[test]
    fn test_attachment_sanitizes_name() {
        let response = DownloadResponse::attachment("../Motion: Dismiss", "pdf", PDF_CONTENT_TYPE, vec![]);
        assert_eq!(response.filename, "_Motion_Dismiss.pdf");
        assert_eq!(
            response.content_disposition,
            "attachment; filename=\"_Motion_Dismiss.pdf\""
        );
    }

    #[test]
    fn test_text_export() {
        let response = export_draft(
            &draft("Motion to Dismiss"),
            ExportFormat::Text,
            &PdfLayout::default(),
            false,
            None,
        )
        .unwrap();
        assert_eq!(response.content_type, TEXT_CONTENT_TYPE);
        assert_eq!(response.filename, "Motion_to_Dismiss.txt");
        assert_eq!(
            String::from_utf8(response.bytes).unwrap(),
            "SUPERIOR COURT\nCounty of Alameda\n\nMotion to Dismiss\nCase No. 24-0001\n\nThe tenant requests relief.\n"
        );
    }

    #[test]
    fn test_pdf_and_docx_exports() {
        let pdf = export_draft(&draft("Reply"), ExportFormat::Pdf, &PdfLayout::default(), false, None)
            .unwrap();
        assert!(pdf.bytes.starts_with(b"%PDF-1.4"));
        assert_eq!(pdf.content_type, PDF_CONTENT_TYPE);

        let docx = export_draft(&draft("Reply"), ExportFormat::Docx, &PdfLayout::default(), true, None)
            .unwrap();
        assert!(docx.bytes.starts_with(b"PK\x03\x04"));
        assert_eq!(docx.filename, "Reply.docx");
    }

    #[test]
    fn test_empty_title_falls_back() {
        let response =
            export_draft(&draft("???"), ExportFormat::Text, &PdfLayout::default(), false, None)
                .unwrap();
        assert_eq!(response.filename, "download.txt");
    }

    #[tokio::test]
    async fn test_bundle_download_requires_ready() {
        let records = SqliteRecordStore::new(Database::open_in_memory().unwrap());
        let blobs = MemoryBlobStore::new();
        let job = records
            .create_job(NewBundleJob::new(
                "c1",
                BundleOptions::default(),
                vec![SourceRef::Draft { id: "dr1".to_string() }],
            ))
            .unwrap();

        let err = fetch_bundle_download(&records, &blobs, &job.id).await.unwrap_err();
        assert!(matches!(err, BundleError::NotReady { status: BundleStatus::Queued, .. }));

        let err = fetch_bundle_download(&records, &blobs, "missing").await.unwrap_err();
        assert!(matches!(err, BundleError::JobNotFound(_)));

        records.claim_queued(1).unwrap();
        let location = BlobRef::new("bundles", format!("cases/c1/bundles/{}.zip", job.id));
        blobs.insert(&location.bucket, &location.path, b"PK\x05\x06".to_vec(), ZIP_CONTENT_TYPE);
        records
            .update_job_status(&job.id, BundleStatus::Ready, JobStatusUpdate::ready(location, 4))
            .unwrap();

        let response = fetch_bundle_download(&records, &blobs, &job.id).await.unwrap();
        assert_eq!(response.content_type, "application/zip");
        assert_eq!(response.bytes, b"PK\x05\x06");
        assert!(response.filename.starts_with("case-c1-bundle-"));
        assert!(response.filename.ends_with(".zip"));
    }

    #[tokio::test]
    async fn test_fetch_draft_export_embeds_signature() {
        let db = Database::open_in_memory().unwrap();
        let blobs = Arc::new(MemoryBlobStore::new());
        let seeder = Seeder::new(db.clone(), blobs.clone());
        let signature = BlobRef::new("case-files", "c1/dr1/signature.png");
        blobs.insert(&signature.bucket, &signature.path, signature_png(), "image/png");
        seeder.draft("c1", "dr1", "Motion to Dismiss", "Body", Some(signature));
        let records = SqliteRecordStore::new(db);

        let response = fetch_draft_export(
            &records,
            blobs.as_ref(),
            "c1",
            "dr1",
            ExportFormat::Docx,
            &RunnerSettings::default(),
        )
        .await
        .unwrap();

        assert_eq!(response.content_type, DOCX_CONTENT_TYPE);
        assert_eq!(response.filename, "Motion_to_Dismiss.docx");
        let archive = zip::ZipArchive::new(std::io::Cursor::new(response.bytes)).unwrap();
        assert_eq!(archive.len(), 6);
        assert!(archive.file_names().any(|n| n == "word/media/signature.png"));
    }

    #[tokio::test]
    async fn test_fetch_draft_export_missing_signature_omitted() {
        let db = Database::open_in_memory().unwrap();
        let blobs = Arc::new(MemoryBlobStore::new());
        let seeder = Seeder::new(db.clone(), blobs.clone());
        seeder.draft(
            "c1",
            "dr1",
            "Reply",
            "Body",
            Some(BlobRef::new("case-files", "c1/dr1/missing.png")),
        );
        let records = SqliteRecordStore::new(db);

        let response = fetch_draft_export(
            &records,
            blobs.as_ref(),
            "c1",
            "dr1",
            ExportFormat::Docx,
            &RunnerSettings::default(),
        )
        .await
        .unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(response.bytes)).unwrap();
        assert_eq!(archive.len(), 5);
    }

    #[tokio::test]
    async fn test_fetch_draft_export_unknown_draft() {
        let records = SqliteRecordStore::new(Database::open_in_memory().unwrap());
        let blobs = MemoryBlobStore::new();
        let err = fetch_draft_export(
            &records,
            &blobs,
            "c1",
            "nope",
            ExportFormat::Pdf,
            &RunnerSettings::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BundleError::SourceMissing { kind: "draft", .. }));
    }
}
