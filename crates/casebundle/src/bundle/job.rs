use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BundleError;
use crate::pdf::{BatesCounter, BatesMode};
use crate::sanitize;

/// Default cap on the persisted error message, in characters.
pub const DEFAULT_ERROR_MESSAGE_LIMIT: usize = 800;

/// Widest zero padding a Bates label may request.
pub const MAX_BATES_WIDTH: usize = 12;

/// Largest accepted `batesStart`: the widest label's digits, all nines.
pub const MAX_BATES_START: u64 = 10u64.pow(MAX_BATES_WIDTH as u32) - 1;

/// Lifecycle state of a bundle job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    Queued,
    Processing,
    Ready,
    Error,
}

impl BundleStatus {
    pub const ALL: [BundleStatus; 4] = [
        BundleStatus::Queued,
        BundleStatus::Processing,
        BundleStatus::Ready,
        BundleStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BundleStatus::Queued => "queued",
            BundleStatus::Processing => "processing",
            BundleStatus::Ready => "ready",
            BundleStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BundleStatus::Ready | BundleStatus::Error)
    }

    /// Whether a job may move from `self` to `next`.
    ///
    /// `Queued` is only ever an initial state, so nothing transitions into it.
    pub fn can_transition_to(&self, next: BundleStatus) -> bool {
        matches!(
            (self, next),
            (BundleStatus::Queued, BundleStatus::Processing)
                | (BundleStatus::Processing, BundleStatus::Ready)
                | (BundleStatus::Processing, BundleStatus::Error)
        )
    }

    /// States a job must currently be in to move to `next`.
    pub fn predecessors(next: BundleStatus) -> Vec<BundleStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }
}

impl std::fmt::Display for BundleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A top-level section of the archive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Documents,
    Exhibits,
    Drafts,
}

impl Section {
    pub fn all() -> BTreeSet<Section> {
        [Section::Documents, Section::Exhibits, Section::Drafts]
            .into_iter()
            .collect()
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            Section::Documents => "documents",
            Section::Exhibits => "exhibits",
            Section::Drafts => "drafts",
        }
    }
}

/// Per-job packaging and numbering options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundleOptions {
    pub bates_prefix: String,
    pub bates_start: u64,
    pub bates_width: usize,
    pub bates_mode: BatesMode,
    pub include_originals: bool,
    pub include_draft_as_pdf: bool,
    pub included_sections: BTreeSet<Section>,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            bates_prefix: "EX".to_string(),
            bates_start: 1,
            bates_width: 6,
            bates_mode: BatesMode::PerPage,
            include_originals: false,
            include_draft_as_pdf: false,
            included_sections: Section::all(),
        }
    }
}

impl BundleOptions {
    pub fn validate(&self) -> Result<(), BundleError> {
        if self.bates_prefix.is_empty() {
            return Err(BundleError::InvalidOptions(
                "batesPrefix must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .bates_prefix
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(BundleError::InvalidOptions(format!(
                "batesPrefix contains unsupported character {:?}",
                bad
            )));
        }
        if self.bates_start < 1 || self.bates_start > MAX_BATES_START {
            return Err(BundleError::InvalidOptions(format!(
                "batesStart must be between 1 and {}",
                MAX_BATES_START
            )));
        }
        if self.bates_width < 1 || self.bates_width > MAX_BATES_WIDTH {
            return Err(BundleError::InvalidOptions(format!(
                "batesWidth must be between 1 and {}",
                MAX_BATES_WIDTH
            )));
        }
        if self.included_sections.is_empty() {
            return Err(BundleError::InvalidOptions(
                "includedSections must name at least one section".to_string(),
            ));
        }
        Ok(())
    }

    pub fn includes(&self, section: Section) -> bool {
        self.included_sections.contains(&section)
    }

    /// A fresh counter for one job.
    pub fn counter(&self) -> BatesCounter {
        BatesCounter::new(self.bates_prefix.clone(), self.bates_width, self.bates_start)
    }
}

/// Location of a blob in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub bucket: String,
    pub path: String,
}

impl BlobRef {
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            path: path.into(),
        }
    }
}

impl std::fmt::Display for BlobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.path)
    }
}

/// One entry of a job manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRef {
    Document { id: String },
    Exhibit { id: String },
    Draft { id: String },
}

impl SourceRef {
    pub fn id(&self) -> &str {
        match self {
            SourceRef::Document { id } | SourceRef::Exhibit { id } | SourceRef::Draft { id } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SourceRef::Document { .. } => "document",
            SourceRef::Exhibit { .. } => "exhibit",
            SourceRef::Draft { .. } => "draft",
        }
    }

    pub fn section(&self) -> Section {
        match self {
            SourceRef::Document { .. } => Section::Documents,
            SourceRef::Exhibit { .. } => Section::Exhibits,
            SourceRef::Draft { .. } => Section::Drafts,
        }
    }
}

/// A job as persisted by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleJob {
    pub id: String,
    pub case_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_draft_id: Option<String>,
    pub status: BundleStatus,
    pub options: BundleOptions,
    pub manifest: Vec<SourceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_location: Option<BlobRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_byte_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input to [`RecordStore::create_job`](crate::bundle::RecordStore::create_job).
#[derive(Debug, Clone)]
pub struct NewBundleJob {
    pub id: String,
    pub case_id: String,
    pub source_draft_id: Option<String>,
    pub options: BundleOptions,
    pub manifest: Vec<SourceRef>,
}

impl NewBundleJob {
    pub fn new(case_id: impl Into<String>, options: BundleOptions, manifest: Vec<SourceRef>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            case_id: case_id.into(),
            source_draft_id: None,
            options,
            manifest,
        }
    }
}

/// Fields written alongside a status change. Unset fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStatusUpdate {
    pub output_location: Option<BlobRef>,
    pub output_byte_size: Option<u64>,
    pub error: Option<String>,
}

impl JobStatusUpdate {
    pub fn ready(location: BlobRef, byte_size: u64) -> Self {
        Self {
            output_location: Some(location),
            output_byte_size: Some(byte_size),
            error: None,
        }
    }

    /// A failure update whose message is cut to `limit` characters.
    pub fn failed(message: &str, limit: usize) -> Self {
        Self {
            error: Some(truncate_error(message, limit)),
            ..Self::default()
        }
    }
}

/// Cuts an error message to `limit` characters for storage.
pub fn truncate_error(message: &str, limit: usize) -> String {
    sanitize::truncate_chars(message, limit).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        assert!(BundleStatus::Queued.can_transition_to(BundleStatus::Processing));
        assert!(BundleStatus::Processing.can_transition_to(BundleStatus::Ready));
        assert!(BundleStatus::Processing.can_transition_to(BundleStatus::Error));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!BundleStatus::Queued.can_transition_to(BundleStatus::Ready));
        assert!(!BundleStatus::Queued.can_transition_to(BundleStatus::Error));
        assert!(!BundleStatus::Error.can_transition_to(BundleStatus::Queued));
        assert!(!BundleStatus::Error.can_transition_to(BundleStatus::Processing));
        assert!(!BundleStatus::Ready.can_transition_to(BundleStatus::Error));
        for status in BundleStatus::ALL {
            assert!(!status.can_transition_to(BundleStatus::Queued));
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(BundleStatus::Ready.is_terminal());
        assert!(BundleStatus::Error.is_terminal());
        assert!(!BundleStatus::Queued.is_terminal());
        assert!(!BundleStatus::Processing.is_terminal());
    }

    #[test]
    fn test_predecessors() {
        assert_eq!(
            BundleStatus::predecessors(BundleStatus::Ready),
            vec![BundleStatus::Processing]
        );
        assert!(BundleStatus::predecessors(BundleStatus::Queued).is_empty());
    }

    #[test]
    fn test_status_parse_round_trip() {
        for status in BundleStatus::ALL {
            assert_eq!(BundleStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BundleStatus::parse("done"), None);
    }

    #[test]
    fn test_default_options_are_valid() {
        BundleOptions::default().validate().unwrap();
    }

    #[test]
    fn test_options_validation() {
        let cases = [
            BundleOptions {
                bates_prefix: String::new(),
                ..Default::default()
            },
            BundleOptions {
                bates_prefix: "EX 1".to_string(),
                ..Default::default()
            },
            BundleOptions {
                bates_start: 0,
                ..Default::default()
            },
            BundleOptions {
                bates_start: MAX_BATES_START + 1,
                ..Default::default()
            },
            BundleOptions {
                bates_width: 0,
                ..Default::default()
            },
            BundleOptions {
                bates_width: 13,
                ..Default::default()
            },
            BundleOptions {
                included_sections: BTreeSet::new(),
                ..Default::default()
            },
        ];
        for options in cases {
            assert!(
                matches!(options.validate(), Err(BundleError::InvalidOptions(_))),
                "expected rejection: {:?}",
                options
            );
        }
    }

    #[test]
    fn test_bates_start_bounds() {
        let options: BundleOptions =
            serde_json::from_str(r#"{"batesPrefix":"EX","batesStart":18446744073709551615}"#)
                .unwrap();
        assert!(matches!(options.validate(), Err(BundleError::InvalidOptions(_))));

        let options = BundleOptions {
            bates_start: MAX_BATES_START,
            ..Default::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: BundleOptions = serde_json::from_str(
            r#"{"batesPrefix":"PROSEIQ","batesWidth":6,"includeOriginals":true,"batesMode":"per_document"}"#,
        )
        .unwrap();
        assert_eq!(options.bates_prefix, "PROSEIQ");
        assert_eq!(options.bates_start, 1);
        assert!(options.include_originals);
        assert_eq!(options.bates_mode, BatesMode::PerDocument);
        assert_eq!(options.included_sections, Section::all());
    }

    #[test]
    fn test_source_ref_serde_is_tagged() {
        let json = serde_json::to_string(&SourceRef::Exhibit {
            id: "x1".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"exhibit","id":"x1"}"#);
    }

    #[test]
    fn test_truncate_error() {
        let long = "é".repeat(1000);
        let truncated = truncate_error(&long, DEFAULT_ERROR_MESSAGE_LIMIT);
        assert_eq!(truncated.chars().count(), 800);
        assert_eq!(truncate_error("short", 800), "short");
    }

    #[test]
    fn test_failed_update_truncates() {
        let update = JobStatusUpdate::failed(&"x".repeat(900), 10);
        assert_eq!(update.error.as_deref(), Some("xxxxxxxxxx"));
        assert!(update.output_location.is_none());
    }
}
