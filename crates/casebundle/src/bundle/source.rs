//! Case material a bundle is assembled from, as read from the record store.

use chrono::{DateTime, Utc};
use mime_guess::Mime;
use serde::{Deserialize, Serialize};

use super::job::{BlobRef, SourceRef};

const PDF_MIME: &str = "application/pdf";

/// An uploaded case document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRow {
    pub id: String,
    pub case_id: String,
    pub title: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub blob: BlobRef,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// An exhibit. Exhibits without a file still appear in the exhibit index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExhibitRow {
    pub id: String,
    pub case_id: String,
    pub label: String,
    pub title: String,
    pub description: Option<String>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub blob: Option<BlobRef>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// A drafted filing. `body` is already rendered to plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRow {
    pub id: String,
    pub case_id: String,
    pub title: String,
    pub front_matter: Option<String>,
    pub meta: Option<String>,
    pub body: String,
    pub signature: Option<BlobRef>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A manifest entry joined with its row.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedSource {
    Document(DocumentRow),
    Exhibit(ExhibitRow),
    Draft(DraftRow),
}

impl ResolvedSource {
    pub fn source_ref(&self) -> SourceRef {
        match self {
            ResolvedSource::Document(row) => SourceRef::Document { id: row.id.clone() },
            ResolvedSource::Exhibit(row) => SourceRef::Exhibit { id: row.id.clone() },
            ResolvedSource::Draft(row) => SourceRef::Draft { id: row.id.clone() },
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ResolvedSource::Document(row) => &row.title,
            ResolvedSource::Exhibit(row) => &row.title,
            ResolvedSource::Draft(row) => &row.title,
        }
    }

    /// Human-readable name used in error messages.
    pub fn label(&self) -> String {
        match self {
            ResolvedSource::Document(row) => format!("document '{}'", row.title),
            ResolvedSource::Exhibit(row) => format!("exhibit {} '{}'", row.label, row.title),
            ResolvedSource::Draft(row) => format!("draft '{}'", row.title),
        }
    }
}

/// Whether a file is a PDF, judged by declared MIME type, then extension.
///
/// Parameters on the declared type are ignored. A declared type that does
/// not parse falls back to the extension.
pub fn is_pdf(mime_type: Option<&str>, filename: &str) -> bool {
    match mime_type.and_then(|m| m.trim().parse::<Mime>().ok()) {
        Some(mime) => mime.essence_str() == PDF_MIME,
        None => mime_guess::from_path(filename)
            .first_raw()
            .is_some_and(|m| m == PDF_MIME),
    }
}

/// Splits `filename` into stem and lowercase extension.
pub fn split_extension(filename: &str) -> (&str, Option<String>) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            (stem, Some(ext.to_ascii_lowercase()))
        }
        _ => (filename, None),
    }
}
