pub mod bundle;
pub mod config;
pub mod container;
pub mod db;
pub mod docx;
pub mod error;
pub mod export;
pub mod layout;
pub mod pdf;
pub mod sanitize;
pub mod storage;
pub mod telemetry;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use bundle::{
    create_bundle_job, BlobRef, BundleJob, BundleOptions, BundleRequest, BundleRunner,
    BundleStatus, RecordStore, RunnerSettings, SourceRef,
};
pub use config::{load_config, Config};
pub use container::{crc32, ZipBuilder};
pub use docx::DocxBuilder;
pub use error::{
    BundleError, CaseBundleError, ConfigError, ContainerError, PdfError, Result, StorageError,
};
pub use export::{export_draft, fetch_bundle_download, DownloadResponse, ExportFormat};
pub use pdf::{stamp, BatesCounter, BatesMode, PdfBuilder, PdfLayout};
pub use storage::{BlobStore, FilesystemBlobStore, MemoryBlobStore};
pub use worker::{BundleWorker, WorkerSettings};
