use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::bundle::{RunnerSettings, DEFAULT_ERROR_MESSAGE_LIMIT};
use crate::pdf::{PageSize, PdfLayout};
use crate::worker::WorkerSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite file. Defaults to `~/.casebundle/data/casebundle.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub pdf: PdfConfig,
    #[serde(default)]
    pub docx: DocxConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Configured database path, or the default location.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            output_bucket: self.storage.output_bucket.clone(),
            pdf_layout: self.pdf.layout(),
            court_style: self.docx.court_style,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per bucket.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default = "default_output_bucket")]
    pub output_bucket: String,
}

fn default_storage_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".casebundle").join("blobs"))
        .unwrap_or_else(|| PathBuf::from("blobs"))
}

fn default_output_bucket() -> String {
    "bundles".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            output_bucket: default_output_bucket(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    #[serde(default = "default_error_message_limit")]
    pub error_message_limit: usize,
}

fn default_batch_size() -> usize {
    8
}

fn default_concurrency() -> usize {
    num_cpus::get()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_job_timeout_secs() -> u64 {
    300
}

fn default_error_message_limit() -> usize {
    DEFAULT_ERROR_MESSAGE_LIMIT
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            job_timeout_secs: default_job_timeout_secs(),
            error_message_limit: default_error_message_limit(),
        }
    }
}

impl WorkerConfig {
    pub fn settings(&self) -> WorkerSettings {
        WorkerSettings {
            batch_size: self.batch_size,
            concurrency: self.concurrency,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            job_timeout: Duration::from_secs(self.job_timeout_secs),
            error_message_limit: self.error_message_limit,
        }
    }
}

/// Geometry and type sizes for generated PDFs, in points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfConfig {
    #[serde(default = "default_page_width")]
    pub page_width: f64,
    #[serde(default = "default_page_height")]
    pub page_height: f64,
    #[serde(default = "default_margin")]
    pub margin: f64,
    #[serde(default = "default_body_font_size")]
    pub body_font_size: f64,
    #[serde(default = "default_title_font_size")]
    pub title_font_size: f64,
    #[serde(default = "default_leading")]
    pub leading: f64,
    #[serde(default = "default_avg_glyph_width_em")]
    pub avg_glyph_width_em: f64,
}

fn default_page_width() -> f64 {
    PageSize::LETTER.width
}

fn default_page_height() -> f64 {
    PageSize::LETTER.height
}

fn default_margin() -> f64 {
    72.0
}

fn default_body_font_size() -> f64 {
    11.0
}

fn default_title_font_size() -> f64 {
    16.0
}

fn default_leading() -> f64 {
    16.0
}

fn default_avg_glyph_width_em() -> f64 {
    0.5
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            page_width: default_page_width(),
            page_height: default_page_height(),
            margin: default_margin(),
            body_font_size: default_body_font_size(),
            title_font_size: default_title_font_size(),
            leading: default_leading(),
            avg_glyph_width_em: default_avg_glyph_width_em(),
        }
    }
}

impl PdfConfig {
    pub fn layout(&self) -> PdfLayout {
        PdfLayout {
            page_size: PageSize {
                width: self.page_width,
                height: self.page_height,
            },
            margin: self.margin,
            body_font_size: self.body_font_size,
            title_font_size: self.title_font_size,
            leading: self.leading,
            avg_glyph_width_em: self.avg_glyph_width_em,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocxConfig {
    /// Double-spaced body paragraphs.
    #[serde(default)]
    pub court_style: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// One JSON object per line instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
