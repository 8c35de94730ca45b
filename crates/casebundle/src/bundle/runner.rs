use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::docx::DocxBuilder;
use crate::error::{BundleError, PdfError};
use crate::pdf::{self, PdfBuilder, PdfLayout, StampResult};
use crate::sanitize::sanitize_filename;
use crate::storage::BlobStore;

use super::context::{BundleContext, BundleOutput, BundleWarning, ExhibitIndexLine};
use super::job::{BlobRef, BundleJob, Section, SourceRef};
use super::manifest::{ArchiveManifest, BatesRange, ManifestEntry, MANIFEST_PATH};
use super::source::{is_pdf, split_extension, DocumentRow, DraftRow, ExhibitRow, ResolvedSource};
use super::store::RecordStore;

/// Archive paths and Bates range produced for one source.
struct Collected {
    paths: Vec<String>,
    bates: Option<BatesRange>,
}

pub const ZIP_CONTENT_TYPE: &str = "application/zip";
pub const EXHIBIT_INDEX_PATH: &str = "exhibits/exhibit-index.pdf";
const EXHIBIT_INDEX_TITLE: &str = "Exhibit Index";

/// Where a job's archive is written inside the output bucket.
pub fn output_path(case_id: &str, job_id: &str) -> String {
    format!("cases/{}/bundles/{}.zip", case_id, job_id)
}

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub output_bucket: String,
    pub pdf_layout: PdfLayout,
    /// Double-spaced DOCX drafts.
    pub court_style: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            output_bucket: "bundles".to_string(),
            pdf_layout: PdfLayout::default(),
            court_style: false,
        }
    }
}

/// Runs the assembly steps for one claimed job. Status writes are left to
/// the caller.
#[derive(Clone)]
pub struct BundleRunner {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    settings: Arc<RunnerSettings>,
}

impl BundleRunner {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            records,
            blobs,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Assembles and uploads the archive for `job`.
    pub async fn run(&self, job: BundleJob) -> Result<BundleOutput, BundleError> {
        let span = info_span!("bundle", job_id = %job.id, case_id = %job.case_id);
        self.run_steps(BundleContext::new(job)).instrument(span).await
    }

    async fn run_steps(&self, mut ctx: BundleContext) -> Result<BundleOutput, BundleError> {
        // Step 1: Join the manifest with current rows
        self.step_resolve_sources(&mut ctx)
            .instrument(info_span!("resolve_sources"))
            .await?;

        // Step 2: Fetch, stamp and render every source in manifest order
        self.step_collect(&mut ctx)
            .instrument(info_span!("collect"))
            .await?;

        // Step 3: Write manifest.json and serialize the archive
        self.step_package(&mut ctx)
            .instrument(info_span!("package"))
            .await?;

        // Step 4: Upload to the job's own output path
        self.step_upload(&mut ctx)
            .instrument(info_span!("upload"))
            .await?;

        let mut output = ctx
            .output
            .take()
            .ok_or_else(|| BundleError::Processing("upload step produced no output".into()))?;
        output.warnings = std::mem::take(&mut ctx.warnings);
        Ok(output)
    }

    async fn step_resolve_sources(&self, ctx: &mut BundleContext) -> Result<(), BundleError> {
        let job = &ctx.job;
        let case_id = job.case_id.as_str();
        let needs = |section: Section| job.manifest.iter().any(|s| s.section() == section);

        let documents: HashMap<String, DocumentRow> = if needs(Section::Documents) {
            self.records
                .list_documents(case_id)?
                .into_iter()
                .map(|row| (row.id.clone(), row))
                .collect()
        } else {
            HashMap::new()
        };
        let exhibits: HashMap<String, ExhibitRow> = if needs(Section::Exhibits) {
            self.records
                .list_exhibits(case_id)?
                .into_iter()
                .map(|row| (row.id.clone(), row))
                .collect()
        } else {
            HashMap::new()
        };
        let drafts: HashMap<String, DraftRow> = if needs(Section::Drafts) {
            self.records
                .list_drafts(case_id)?
                .into_iter()
                .map(|row| (row.id.clone(), row))
                .collect()
        } else {
            HashMap::new()
        };

        let mut sources = Vec::with_capacity(job.manifest.len());
        for source in &job.manifest {
            if !job.options.includes(source.section()) {
                debug!(
                    kind = source.kind(),
                    id = source.id(),
                    "Skipping source outside the included sections"
                );
                continue;
            }

            let resolved = match source {
                SourceRef::Document { id } => documents.get(id).cloned().map(ResolvedSource::Document),
                SourceRef::Exhibit { id } => exhibits.get(id).cloned().map(ResolvedSource::Exhibit),
                SourceRef::Draft { id } => drafts.get(id).cloned().map(ResolvedSource::Draft),
            };
            match resolved {
                Some(resolved) => sources.push(resolved),
                None => {
                    return Err(BundleError::SourceMissing {
                        kind: source.kind(),
                        id: source.id().to_string(),
                        case_id: case_id.to_string(),
                    })
                }
            }
        }

        info!(sources = sources.len(), "Resolved bundle sources");
        ctx.sources = sources;
        Ok(())
    }

    async fn step_collect(&self, ctx: &mut BundleContext) -> Result<(), BundleError> {
        let sources = std::mem::take(&mut ctx.sources);

        for (index, source) in sources.iter().enumerate() {
            let ordinal = format!("{:03}", index + 1);
            let label = source.label();
            let collected = match source {
                ResolvedSource::Document(row) => {
                    self.collect_document(ctx, &ordinal, &label, row).await?
                }
                ResolvedSource::Exhibit(row) => {
                    self.collect_exhibit(ctx, &ordinal, &label, row).await?
                }
                ResolvedSource::Draft(row) => self.collect_draft(ctx, &ordinal, row).await?,
            };
            ctx.manifest.push(ManifestEntry {
                source: source.source_ref(),
                title: source.title().to_string(),
                paths: collected.paths,
                bates: collected.bates,
            });
        }

        if !ctx.exhibit_index.is_empty() {
            self.add_exhibit_index(ctx).await?;
        }

        info!(
            entries = ctx.archive.len(),
            next_bates = ctx.counter.next,
            "Collected bundle sources"
        );
        ctx.sources = sources;
        Ok(())
    }

    async fn collect_document(
        &self,
        ctx: &mut BundleContext,
        ordinal: &str,
        source_label: &str,
        row: &DocumentRow,
    ) -> Result<Collected, BundleError> {
        let dir = Section::Documents.dir_name();
        let bytes = self.fetch(&row.blob, source_label).await?;

        let (stem, ext) = split_extension(&row.filename);
        let name = format!("{}-{}", ordinal, sanitize_filename(stem));
        let mut paths = Vec::new();
        let mut bates = None;

        if is_pdf(row.mime_type.as_deref(), &row.filename) {
            let file_name = format!("{}.pdf", name);
            let original = ctx.job.options.include_originals.then(|| bytes.clone());
            let stamped = self.stamp(ctx, bytes, source_label).await?;
            bates = BatesRange::from_labels(&stamped.labels);
            add_entry(ctx, format!("{}/{}", dir, file_name), stamped.bytes, &mut paths)?;
            if let Some(original) = original {
                add_entry(ctx, format!("originals/{}", file_name), original, &mut paths)?;
            }
        } else {
            let file_name = with_extension(&name, ext.as_deref());
            add_entry(ctx, format!("{}/{}", dir, file_name), bytes, &mut paths)?;
        }

        Ok(Collected { paths, bates })
    }

    async fn collect_exhibit(
        &self,
        ctx: &mut BundleContext,
        ordinal: &str,
        source_label: &str,
        row: &ExhibitRow,
    ) -> Result<Collected, BundleError> {
        let dir = Section::Exhibits.dir_name();
        let mut paths = Vec::new();
        let mut bates = None;

        if let Some(blob) = &row.blob {
            let bytes = self.fetch(blob, source_label).await?;
            let filename = row.filename.clone().unwrap_or_else(|| {
                blob.path
                    .rsplit('/')
                    .next()
                    .unwrap_or(blob.path.as_str())
                    .to_string()
            });
            let (stem, ext) = split_extension(&filename);
            let name = format!(
                "{}-Exhibit-{}-{}",
                ordinal,
                sanitize_filename(&row.label),
                sanitize_filename(stem)
            );

            if is_pdf(row.mime_type.as_deref(), &filename) {
                let file_name = format!("{}.pdf", name);
                let original = ctx.job.options.include_originals.then(|| bytes.clone());
                let stamped = self.stamp(ctx, bytes, source_label).await?;
                bates = BatesRange::from_labels(&stamped.labels);
                add_entry(ctx, format!("{}/{}", dir, file_name), stamped.bytes, &mut paths)?;
                if let Some(original) = original {
                    add_entry(ctx, format!("originals/{}", file_name), original, &mut paths)?;
                }
            } else {
                let file_name = with_extension(&name, ext.as_deref());
                add_entry(ctx, format!("{}/{}", dir, file_name), bytes, &mut paths)?;
            }
        } else {
            debug!(exhibit = %row.label, "Exhibit has no file; listing it in the index only");
        }

        ctx.exhibit_index.push(ExhibitIndexLine {
            label: row.label.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            bates: bates.as_ref().map(BatesRange::to_string),
        });

        Ok(Collected { paths, bates })
    }

    async fn collect_draft(
        &self,
        ctx: &mut BundleContext,
        ordinal: &str,
        row: &DraftRow,
    ) -> Result<Collected, BundleError> {
        let dir = Section::Drafts.dir_name();
        let signature = match &row.signature {
            Some(blob) => match self.blobs.get(&blob.bucket, &blob.path).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(draft_id = %row.id, "Signature image unavailable, omitting it: {}", e);
                    ctx.warnings.push(BundleWarning::SignatureOmitted {
                        draft_id: row.id.clone(),
                        reason: e.to_string(),
                    });
                    None
                }
            },
            None => None,
        };

        let name = format!("{}-{}", ordinal, sanitize_filename(&row.title));
        let mut paths = Vec::new();

        let builder = DocxBuilder::new().court_style(self.settings.court_style);
        let draft = row.clone();
        let docx = blocking(move || {
            builder.build(
                draft.front_matter.as_deref(),
                &draft.title,
                draft.meta.as_deref(),
                &draft.body,
                signature.as_deref(),
            )
        })
        .await??;
        add_entry(ctx, format!("{}/{}.docx", dir, name), docx, &mut paths)?;

        if ctx.job.options.include_draft_as_pdf {
            let pdf = render_draft_pdf(&self.settings.pdf_layout, row).await?;
            add_entry(ctx, format!("{}/{}.pdf", dir, name), pdf, &mut paths)?;
        }

        Ok(Collected { paths, bates: None })
    }

    async fn add_exhibit_index(&self, ctx: &mut BundleContext) -> Result<(), BundleError> {
        let mut body = String::new();
        for line in &ctx.exhibit_index {
            let _ = write!(body, "Exhibit {}: {}", line.label, line.title);
            if let Some(bates) = &line.bates {
                let _ = write!(body, " ({})", bates);
            }
            body.push('\n');
            if let Some(description) = &line.description {
                let _ = writeln!(body, "{}", description);
            }
            body.push('\n');
        }

        let meta = format!("Case {}", ctx.job.case_id);
        let builder = PdfBuilder::new(self.settings.pdf_layout.clone());
        let pdf = blocking(move || builder.build(EXHIBIT_INDEX_TITLE, &meta, &body)).await?;
        ctx.archive.add(EXHIBIT_INDEX_PATH, pdf)?;
        Ok(())
    }

    async fn step_package(&self, ctx: &mut BundleContext) -> Result<(), BundleError> {
        let manifest = ArchiveManifest {
            job_id: ctx.job.id.clone(),
            case_id: ctx.job.case_id.clone(),
            options: ctx.job.options.clone(),
            exhibit_index: ctx
                .archive
                .contains(EXHIBIT_INDEX_PATH)
                .then(|| EXHIBIT_INDEX_PATH.to_string()),
            sources: ctx.manifest.clone(),
        };
        let json = manifest
            .to_json()
            .map_err(|e| BundleError::Processing(format!("failed to encode manifest: {}", e)))?;
        ctx.archive.add(MANIFEST_PATH, json)?;

        let archive = std::mem::take(&mut ctx.archive);
        let entries = archive.len();
        let bytes = blocking(move || archive.finish()).await??;

        info!(entries, bytes = bytes.len(), "Archive assembled");
        ctx.archive_bytes = Some(bytes);
        Ok(())
    }

    async fn step_upload(&self, ctx: &mut BundleContext) -> Result<(), BundleError> {
        let bytes = ctx
            .archive_bytes
            .take()
            .ok_or_else(|| BundleError::Processing("package step produced no archive".into()))?;
        let location = BlobRef::new(
            self.settings.output_bucket.clone(),
            output_path(&ctx.job.case_id, &ctx.job.id),
        );
        let byte_size = bytes.len() as u64;

        self.blobs
            .put(&location.bucket, &location.path, bytes, ZIP_CONTENT_TYPE)
            .await
            .map_err(BundleError::Upload)?;

        info!(location = %location, byte_size, "Bundle uploaded");
        ctx.output = Some(BundleOutput {
            location,
            byte_size,
            warnings: Vec::new(),
        });
        Ok(())
    }

    async fn fetch(&self, blob: &BlobRef, source_label: &str) -> Result<Vec<u8>, BundleError> {
        self.blobs
            .get(&blob.bucket, &blob.path)
            .await
            .map_err(|e| BundleError::source_fetch(source_label, e))
    }

    /// Stamps one PDF and advances the job's counter.
    async fn stamp(
        &self,
        ctx: &mut BundleContext,
        bytes: Vec<u8>,
        source_label: &str,
    ) -> Result<StampResult, BundleError> {
        let counter = ctx.counter.clone();
        let mode = ctx.job.options.bates_mode;
        let result = blocking(move || pdf::stamp(&bytes, &counter, mode))
            .await?
            .map_err(|e| match e {
                PdfError::CounterExhausted { .. } => BundleError::InvalidOptions(e.to_string()),
                other => BundleError::malformed_pdf(source_label, other),
            })?;

        debug!(
            source = source_label,
            pages = result.labels.len(),
            first = result.first_label().unwrap_or_default(),
            last = result.last_label().unwrap_or_default(),
            "Stamped PDF"
        );
        ctx.counter = result.counter.clone();
        Ok(result)
    }
}

/// Renders a draft as a text PDF, front matter first.
pub async fn render_draft_pdf(layout: &PdfLayout, draft: &DraftRow) -> Result<Vec<u8>, BundleError> {
    let builder = PdfBuilder::new(layout.clone());
    let title = draft.title.clone();
    let meta = draft.meta.clone().unwrap_or_default();
    let body = match &draft.front_matter {
        Some(front_matter) => format!("{}\n\n{}", front_matter, draft.body),
        None => draft.body.clone(),
    };
    blocking(move || builder.build(&title, &meta, &body)).await
}

/// Runs a pure builder on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, BundleError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BundleError::Processing(format!("blocking task failed: {}", e)))
}

fn add_entry(
    ctx: &mut BundleContext,
    path: String,
    bytes: Vec<u8>,
    paths: &mut Vec<String>,
) -> Result<(), BundleError> {
    ctx.archive.add(path.clone(), bytes)?;
    paths.push(path);
    Ok(())
}

fn with_extension(name: &str, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{}.{}", name, sanitize_filename(ext)),
        None => name.to_string(),
    }
}
