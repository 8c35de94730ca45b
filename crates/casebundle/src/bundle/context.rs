use crate::container::ZipBuilder;
use crate::pdf::BatesCounter;

use super::job::{BlobRef, BundleJob};
use super::manifest::ManifestEntry;
use super::source::ResolvedSource;

/// Location and size of an uploaded archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOutput {
    pub location: BlobRef,
    pub byte_size: u64,
    pub warnings: Vec<BundleWarning>,
}

/// A problem that did not fail the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleWarning {
    SignatureOmitted { draft_id: String, reason: String },
}

/// One line of the generated exhibit index.
#[derive(Debug, Clone)]
pub struct ExhibitIndexLine {
    pub label: String,
    pub title: String,
    pub description: Option<String>,
    pub bates: Option<String>,
}

pub struct BundleContext {
    // Input
    pub job: BundleJob,

    // Step 1 result: manifest joined with current rows
    pub sources: Vec<ResolvedSource>,

    // Step 2 results
    pub counter: BatesCounter,
    pub archive: ZipBuilder,
    pub manifest: Vec<ManifestEntry>,
    pub exhibit_index: Vec<ExhibitIndexLine>,

    // Step 3 result
    pub archive_bytes: Option<Vec<u8>>,

    // Step 4 result
    pub output: Option<BundleOutput>,

    pub warnings: Vec<BundleWarning>,
}

impl BundleContext {
    pub fn new(job: BundleJob) -> Self {
        let counter = job.options.counter();
        Self {
            job,
            sources: Vec::new(),
            counter,
            archive: ZipBuilder::new(),
            manifest: Vec::new(),
            exhibit_index: Vec::new(),
            archive_bytes: None,
            output: None,
            warnings: Vec::new(),
        }
    }
}
