//! Test harness for isolated bundle runs.
//!
//! Each `TestHarness` owns a temporary directory holding a SQLite database
//! and a blob store, plus helpers to seed one case's material and read back
//! the archive a job produced.

#![allow(dead_code)]

use std::io::{Cursor, Read};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use zip::ZipArchive;

use casebundle::bundle::{DocumentRow, DraftRow, ExhibitRow};
use casebundle::db::{source_repo, Database, SqliteRecordStore};
use casebundle::{
    BlobRef, BlobStore, BundleJob, BundleWorker, FilesystemBlobStore, MemoryBlobStore,
    RecordStore, RunnerSettings, WorkerSettings,
};

pub const CASE_ID: &str = "case-42";
pub const CASE_FILES: &str = "case-files";

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub records: Arc<SqliteRecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    /// Set when the harness runs on the in-memory blob store.
    pub memory: Option<Arc<MemoryBlobStore>>,
}

impl TestHarness {
    /// SQLite file and filesystem blob store under a temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let blobs = Arc::new(FilesystemBlobStore::new(temp_dir.path().join("blobs")));
        Self::build(temp_dir, blobs, None)
    }

    /// Same database setup, blobs kept in memory.
    pub fn in_memory() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let memory = Arc::new(MemoryBlobStore::new());
        Self::build(temp_dir, memory.clone(), Some(memory))
    }

    fn build(
        temp_dir: TempDir,
        blobs: Arc<dyn BlobStore>,
        memory: Option<Arc<MemoryBlobStore>>,
    ) -> Self {
        let db = Database::open(&temp_dir.path().join("casebundle.db"))
            .expect("Failed to open database");
        Self {
            records: Arc::new(SqliteRecordStore::new(db.clone())),
            db,
            blobs,
            memory,
            temp_dir,
        }
    }

    pub fn memory(&self) -> &MemoryBlobStore {
        self.memory
            .as_deref()
            .expect("harness was not created with in_memory()")
    }

    pub fn worker(&self, settings: WorkerSettings) -> BundleWorker {
        BundleWorker::new(
            self.records.clone(),
            self.blobs.clone(),
            RunnerSettings::default(),
            settings,
        )
    }

    pub async fn put_blob(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> BlobRef {
        self.blobs
            .put(CASE_FILES, path, bytes, content_type)
            .await
            .expect("Failed to write blob");
        BlobRef::new(CASE_FILES, path)
    }

    pub async fn add_document(
        &self,
        id: &str,
        title: &str,
        filename: &str,
        bytes: Vec<u8>,
        position: i64,
    ) -> DocumentRow {
        let blob = self
            .put_blob(&format!("{}/documents/{}", CASE_ID, filename), bytes, "application/pdf")
            .await;
        self.add_document_row(id, title, filename, blob, position)
    }

    /// Registers a document whose blob may not exist.
    pub fn add_document_row(
        &self,
        id: &str,
        title: &str,
        filename: &str,
        blob: BlobRef,
        position: i64,
    ) -> DocumentRow {
        let row = DocumentRow {
            id: id.to_string(),
            case_id: CASE_ID.to_string(),
            title: title.to_string(),
            filename: filename.to_string(),
            mime_type: None,
            blob,
            position,
            created_at: fixed_time(),
        };
        source_repo::insert_document(&self.db, &row).expect("Failed to insert document");
        row
    }

    pub async fn add_exhibit(
        &self,
        id: &str,
        label: &str,
        title: &str,
        file: Option<(&str, Vec<u8>)>,
        position: i64,
    ) -> ExhibitRow {
        let (filename, blob) = match file {
            Some((filename, bytes)) => {
                let blob = self
                    .put_blob(&format!("{}/exhibits/{}", CASE_ID, filename), bytes, "application/pdf")
                    .await;
                (Some(filename.to_string()), Some(blob))
            }
            None => (None, None),
        };
        let row = ExhibitRow {
            id: id.to_string(),
            case_id: CASE_ID.to_string(),
            label: label.to_string(),
            title: title.to_string(),
            description: Some(format!("Description of exhibit {}", label)),
            filename,
            mime_type: None,
            blob,
            position,
            created_at: fixed_time(),
        };
        source_repo::insert_exhibit(&self.db, &row).expect("Failed to insert exhibit");
        row
    }

    pub fn add_draft(&self, id: &str, title: &str, body: &str, signature: Option<BlobRef>) -> DraftRow {
        let row = DraftRow {
            id: id.to_string(),
            case_id: CASE_ID.to_string(),
            title: title.to_string(),
            front_matter: Some("JANE DOE, Plaintiff in pro per".to_string()),
            meta: Some(format!("Case No. {}", CASE_ID)),
            body: body.to_string(),
            signature,
            position: 0,
            created_at: fixed_time(),
            updated_at: fixed_time(),
        };
        source_repo::insert_draft(&self.db, &row).expect("Failed to insert draft");
        row
    }

    pub fn job(&self, id: &str) -> BundleJob {
        self.records
            .get_job(id)
            .expect("Failed to read job")
            .expect("job exists")
    }

    /// The uploaded archive of a `Ready` job, with its raw bytes.
    pub async fn archive(&self, job: &BundleJob) -> (Vec<u8>, ZipArchive<Cursor<Vec<u8>>>) {
        let location = job.output_location.as_ref().expect("job has an output");
        let bytes = self
            .blobs
            .get(&location.bucket, &location.path)
            .await
            .expect("archive was uploaded");
        let archive = ZipArchive::new(Cursor::new(bytes.clone())).expect("valid ZIP");
        (bytes, archive)
    }
}

pub fn entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    archive
        .by_name(name)
        .unwrap_or_else(|e| panic!("missing entry {}: {}", name, e))
        .read_to_end(&mut out)
        .expect("read entry");
    out
}

pub fn entry_names(archive: &ZipArchive<Cursor<Vec<u8>>>) -> Vec<String> {
    archive.file_names().map(str::to_string).collect()
}

fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_760_000_000, 0).expect("valid timestamp")
}
