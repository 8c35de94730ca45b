//! The `manifest.json` written as the last entry of every archive.

use serde::{Deserialize, Serialize};

use super::job::{BundleOptions, SourceRef};

pub const MANIFEST_PATH: &str = "manifest.json";

/// First and last Bates label stamped on one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatesRange {
    pub first: String,
    pub last: String,
}

impl BatesRange {
    pub fn from_labels(labels: &[String]) -> Option<Self> {
        Some(Self {
            first: labels.first()?.clone(),
            last: labels.last()?.clone(),
        })
    }
}

impl std::fmt::Display for BatesRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.first == self.last {
            f.write_str(&self.first)
        } else {
            write!(f, "{} - {}", self.first, self.last)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    #[serde(flatten)]
    pub source: SourceRef,
    pub title: String,
    /// Archive paths written for this source, in write order.
    pub paths: Vec<String>,
    pub bates: Option<BatesRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveManifest {
    pub job_id: String,
    pub case_id: String,
    pub options: BundleOptions,
    /// Archive path of the generated exhibit index, when one was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhibit_index: Option<String>,
    pub sources: Vec<ManifestEntry>,
}

impl ArchiveManifest {
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}
