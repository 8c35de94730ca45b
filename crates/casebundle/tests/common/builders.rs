//! Fixture builders for case material.

#![allow(dead_code)]

use std::io::Cursor;

use casebundle::{BatesMode, BundleOptions};
use casebundle::bundle::Section;
use lopdf::{dictionary, Document, Object, Stream};

/// A PDF with `pages` Letter pages, each showing `(Page N)`.
pub fn pdf_with_pages(pages: usize) -> Vec<u8> {
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
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
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
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("save fixture PDF");
    buffer
}

/// A small opaque PNG usable as a signature image.
pub fn signature_png() -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(8, 2, image::Rgba([0, 0, 0, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode PNG");
    bytes.into_inner()
}

/// Text shown on each page of a stamped PDF, in page order.
pub fn shown_text(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).expect("load PDF");
    doc.get_pages()
        .into_values()
        .map(|page_id| {
            let content = doc.get_page_content(page_id).expect("page content");
            String::from_utf8_lossy(&content).into_owned()
        })
        .collect()
}

/// Builder for `BundleOptions`.
pub struct OptionsBuilder {
    options: BundleOptions,
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: BundleOptions::default(),
        }
    }

    pub fn bates(mut self, prefix: &str, start: u64, width: usize) -> Self {
        self.options.bates_prefix = prefix.to_string();
        self.options.bates_start = start;
        self.options.bates_width = width;
        self
    }

    pub fn mode(mut self, mode: BatesMode) -> Self {
        self.options.bates_mode = mode;
        self
    }

    pub fn include_originals(mut self) -> Self {
        self.options.include_originals = true;
        self
    }

    pub fn include_draft_as_pdf(mut self) -> Self {
        self.options.include_draft_as_pdf = true;
        self
    }

    pub fn sections(mut self, sections: &[Section]) -> Self {
        self.options.included_sections = sections.iter().copied().collect();
        self
    }

    pub fn build(self) -> BundleOptions {
        self.options
    }
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
