//! Fixtures shared by unit tests.

use std::io::Cursor;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lopdf::{dictionary, Document, Object, Stream};

use crate::bundle::{BlobRef, DocumentRow, DraftRow, ExhibitRow, SourceRef};
use crate::db::{source_repo, Database};
use crate::storage::MemoryBlobStore;

/// A PDF with `pages` pages, each showing `(Page N)`.
///
/// MediaBox and Resources live on the page tree root so stamping has to
/// resolve inherited attributes.
pub(crate) fn pdf_with_pages(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::with_capacity(pages);
    for n in 1..=pages {
        let content = format!("BT\n/F1 12 Tf\n72 720 Td\n(Page {}) Tj\nET\n", n);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// A 4x1 transparent PNG.
pub(crate) fn signature_png() -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(image::RgbaImage::new(4, 1))
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Writes case source rows and their blobs.
pub(crate) struct Seeder {
    db: Database,
    blobs: Arc<MemoryBlobStore>,
}

impl Seeder {
    pub(crate) fn new(db: Database, blobs: Arc<MemoryBlobStore>) -> Self {
        Self { db, blobs }
    }

    pub(crate) fn document(
        &self,
        case_id: &str,
        id: &str,
        title: &str,
        filename: &str,
        bytes: Vec<u8>,
        position: i64,
    ) -> SourceRef {
        self.document_with_mime(case_id, id, title, filename, None, bytes, position)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn document_with_mime(
        &self,
        case_id: &str,
        id: &str,
        title: &str,
        filename: &str,
        mime_type: Option<&str>,
        bytes: Vec<u8>,
        position: i64,
    ) -> SourceRef {
        let source = self.insert_document(case_id, id, title, filename, mime_type, position);
        self.blobs.insert(
            CASE_FILES,
            &blob_path(case_id, id, filename),
            bytes,
            mime_type.unwrap_or("application/pdf"),
        );
        source
    }

    /// A document whose blob was never uploaded.
    pub(crate) fn document_row_only(
        &self,
        case_id: &str,
        id: &str,
        title: &str,
        filename: &str,
        position: i64,
    ) -> SourceRef {
        self.insert_document(case_id, id, title, filename, None, position)
    }

    fn insert_document(
        &self,
        case_id: &str,
        id: &str,
        title: &str,
        filename: &str,
        mime_type: Option<&str>,
        position: i64,
    ) -> SourceRef {
        source_repo::insert_document(
            &self.db,
            &DocumentRow {
                id: id.to_string(),
                case_id: case_id.to_string(),
                title: title.to_string(),
                filename: filename.to_string(),
                mime_type: mime_type.map(str::to_string),
                blob: BlobRef::new(CASE_FILES, blob_path(case_id, id, filename)),
                position,
                created_at: fixed_time(),
            },
        )
        .unwrap();
        SourceRef::Document { id: id.to_string() }
    }

    pub(crate) fn exhibit(
        &self,
        case_id: &str,
        id: &str,
        label: &str,
        title: &str,
        file: Option<(&str, Vec<u8>)>,
        position: i64,
    ) -> SourceRef {
        let (filename, blob) = match file {
            Some((filename, bytes)) => {
                let path = blob_path(case_id, id, filename);
                self.blobs.insert(CASE_FILES, &path, bytes, "application/pdf");
                (Some(filename.to_string()), Some(BlobRef::new(CASE_FILES, path)))
            }
            None => (None, None),
        };
        source_repo::insert_exhibit(
            &self.db,
            &ExhibitRow {
                id: id.to_string(),
                case_id: case_id.to_string(),
                label: label.to_string(),
                title: title.to_string(),
                description: None,
                filename,
                mime_type: None,
                blob,
                position,
                created_at: fixed_time(),
            },
        )
        .unwrap();
        SourceRef::Exhibit { id: id.to_string() }
    }

    pub(crate) fn draft(
        &self,
        case_id: &str,
        id: &str,
        title: &str,
        body: &str,
        signature: Option<BlobRef>,
    ) -> SourceRef {
        source_repo::insert_draft(
            &self.db,
            &DraftRow {
                id: id.to_string(),
                case_id: case_id.to_string(),
                title: title.to_string(),
                front_matter: None,
                meta: None,
                body: body.to_string(),
                signature,
                position: 0,
                created_at: fixed_time(),
                updated_at: fixed_time(),
            },
        )
        .unwrap();
        SourceRef::Draft { id: id.to_string() }
    }
}

const CASE_FILES: &str = "case-files";

fn blob_path(case_id: &str, id: &str, filename: &str) -> String {
    format!("{}/{}/{}", case_id, id, filename)
}

fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_760_000_000, 0).unwrap()
}
