//! Bundle jobs: the status machine, manifest resolution and the runner that
//! assembles one case bundle archive.

mod context;
mod job;
mod manifest;
mod request;
mod runner;
mod source;
mod store;

pub use context::{BundleContext, BundleOutput, BundleWarning, ExhibitIndexLine};
pub use job::{
    truncate_error, BlobRef, BundleJob, BundleOptions, BundleStatus, JobStatusUpdate,
    NewBundleJob, Section, SourceRef, DEFAULT_ERROR_MESSAGE_LIMIT, MAX_BATES_START, MAX_BATES_WIDTH,
};
pub use manifest::{ArchiveManifest, BatesRange, ManifestEntry, MANIFEST_PATH};
pub use request::{create_bundle_job, BundleRequest};
pub use runner::{
    output_path, render_draft_pdf, BundleRunner, RunnerSettings, EXHIBIT_INDEX_PATH,
    ZIP_CONTENT_TYPE,
};
pub(crate) use runner::blocking;
pub use source::{is_pdf, split_extension, DocumentRow, DraftRow, ExhibitRow, ResolvedSource};
pub use store::RecordStore;
