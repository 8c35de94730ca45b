//! Case documents, exhibits and drafts.
//!
//! Lists are ordered by `position`, then `created_at`, then `id`, which is the
//! order sources appear in a new bundle's manifest.

use rusqlite::{params, Row};

use crate::bundle::{BlobRef, DocumentRow, DraftRow, ExhibitRow};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};

fn optional_blob(
    table: &'static str,
    id: &str,
    bucket: Option<String>,
    path: Option<String>,
) -> Result<Option<BlobRef>, DatabaseError> {
    match (bucket, path) {
        (Some(bucket), Some(path)) => Ok(Some(BlobRef::new(bucket, path))),
        (None, None) => Ok(None),
        _ => Err(DatabaseError::InvalidRow {
            table,
            id: id.to_string(),
            reason: "blob bucket and path must be set together".to_string(),
        }),
    }
}

struct RawDocument {
    id: String,
    case_id: String,
    title: String,
    filename: String,
    mime_type: Option<String>,
    blob_bucket: String,
    blob_path: String,
    position: i64,
    created_at: String,
}

impl RawDocument {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            case_id: row.get("case_id")?,
            title: row.get("title")?,
            filename: row.get("filename")?,
            mime_type: row.get("mime_type")?,
            blob_bucket: row.get("blob_bucket")?,
            blob_path: row.get("blob_path")?,
            position: row.get("position")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_row(self) -> Result<DocumentRow, DatabaseError> {
        Ok(DocumentRow {
            created_at: parse_timestamp("case_documents", &self.id, &self.created_at)?,
            id: self.id,
            case_id: self.case_id,
            title: self.title,
            filename: self.filename,
            mime_type: self.mime_type,
            blob: BlobRef::new(self.blob_bucket, self.blob_path),
            position: self.position,
        })
    }
}

struct RawExhibit {
    id: String,
    case_id: String,
    label: String,
    title: String,
    description: Option<String>,
    filename: Option<String>,
    mime_type: Option<String>,
    blob_bucket: Option<String>,
    blob_path: Option<String>,
    position: i64,
    created_at: String,
}

impl RawExhibit {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            case_id: row.get("case_id")?,
            label: row.get("label")?,
            title: row.get("title")?,
            description: row.get("description")?,
            filename: row.get("filename")?,
            mime_type: row.get("mime_type")?,
            blob_bucket: row.get("blob_bucket")?,
            blob_path: row.get("blob_path")?,
            position: row.get("position")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_row(self) -> Result<ExhibitRow, DatabaseError> {
        Ok(ExhibitRow {
            created_at: parse_timestamp("case_exhibits", &self.id, &self.created_at)?,
            blob: optional_blob("case_exhibits", &self.id, self.blob_bucket, self.blob_path)?,
            id: self.id,
            case_id: self.case_id,
            label: self.label,
            title: self.title,
            description: self.description,
            filename: self.filename,
            mime_type: self.mime_type,
            position: self.position,
        })
    }
}

struct RawDraft {
    id: String,
    case_id: String,
    title: String,
    front_matter: Option<String>,
    meta: Option<String>,
    body: String,
    signature_bucket: Option<String>,
    signature_path: Option<String>,
    position: i64,
    created_at: String,
    updated_at: String,
}

impl RawDraft {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            case_id: row.get("case_id")?,
            title: row.get("title")?,
            front_matter: row.get("front_matter")?,
            meta: row.get("meta")?,
            body: row.get("body")?,
            signature_bucket: row.get("signature_bucket")?,
            signature_path: row.get("signature_path")?,
            position: row.get("position")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_row(self) -> Result<DraftRow, DatabaseError> {
        Ok(DraftRow {
            created_at: parse_timestamp("case_drafts", &self.id, &self.created_at)?,
            updated_at: parse_timestamp("case_drafts", &self.id, &self.updated_at)?,
            signature: optional_blob(
                "case_drafts",
                &self.id,
                self.signature_bucket,
                self.signature_path,
            )?,
            id: self.id,
            case_id: self.case_id,
            title: self.title,
            front_matter: self.front_matter,
            meta: self.meta,
            body: self.body,
            position: self.position,
        })
    }
}

pub fn insert_document(db: &Database, row: &DocumentRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO case_documents (id, case_id, title, filename, mime_type, blob_bucket,
             blob_path, position, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.id,
                row.case_id,
                row.title,
                row.filename,
                row.mime_type,
                row.blob.bucket,
                row.blob.path,
                row.position,
                format_timestamp(row.created_at),
            ],
        )?;
        Ok(())
    })
}

pub fn insert_exhibit(db: &Database, row: &ExhibitRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO case_exhibits (id, case_id, label, title, description, filename,
             mime_type, blob_bucket, blob_path, position, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.id,
                row.case_id,
                row.label,
                row.title,
                row.description,
                row.filename,
                row.mime_type,
                row.blob.as_ref().map(|b| b.bucket.as_str()),
                row.blob.as_ref().map(|b| b.path.as_str()),
                row.position,
                format_timestamp(row.created_at),
            ],
        )?;
        Ok(())
    })
}

pub fn insert_draft(db: &Database, row: &DraftRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO case_drafts (id, case_id, title, front_matter, meta, body,
             signature_bucket, signature_path, position, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.id,
                row.case_id,
                row.title,
                row.front_matter,
                row.meta,
                row.body,
                row.signature.as_ref().map(|b| b.bucket.as_str()),
                row.signature.as_ref().map(|b| b.path.as_str()),
                row.position,
                format_timestamp(row.created_at),
                format_timestamp(row.updated_at),
            ],
        )?;
        Ok(())
    })
}

pub fn list_documents(db: &Database, case_id: &str) -> Result<Vec<DocumentRow>, DatabaseError> {
    let raw = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM case_documents WHERE case_id = ?1
             ORDER BY position, created_at, id",
        )?;
        let rows = stmt
            .query_map(params![case_id], RawDocument::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    raw.into_iter().map(RawDocument::into_row).collect()
}

pub fn list_exhibits(db: &Database, case_id: &str) -> Result<Vec<ExhibitRow>, DatabaseError> {
    let raw = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM case_exhibits WHERE case_id = ?1
             ORDER BY position, created_at, id",
        )?;
        let rows = stmt
            .query_map(params![case_id], RawExhibit::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    raw.into_iter().map(RawExhibit::into_row).collect()
}

pub fn list_drafts(db: &Database, case_id: &str) -> Result<Vec<DraftRow>, DatabaseError> {
    let raw = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM case_drafts WHERE case_id = ?1
             ORDER BY position, created_at, id",
        )?;
        let rows = stmt
            .query_map(params![case_id], RawDraft::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    raw.into_iter().map(RawDraft::into_row).collect()
}
