//! Bates stamping of existing PDFs.
//!
//! # Coordinate system
//!
//! PDF user space has its origin at the bottom-left of the MediaBox, so the
//! stamp is placed relative to `(x1, y0)`, the bottom-right corner.
//!
//! # Counter threading
//!
//! [`BatesCounter`] is an immutable value. [`stamp`] returns the advanced
//! counter, and the caller passes it into the next call, so numbering
//! continues across every document of one job and never leaks between jobs.

use std::fmt::Write as _;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};

use crate::error::PdfError;

use super::text::{helvetica_width, literal_string, number};

const STAMP_FONT_SIZE: f64 = 9.0;
const STAMP_FONT_RESOURCE: &str = "CBBates";
const BOX_PADDING: f64 = 3.0;
const RIGHT_OFFSET: f64 = 36.0;
const BOTTOM_OFFSET: f64 = 24.0;
/// The stamp box never rises closer than this to the top edge.
const TOP_MARGIN: f64 = 36.0;
/// Helvetica descender depth as a fraction of the font size.
const DESCENT_EM: f64 = 0.21;
/// Guards against cyclic `Parent` chains in damaged files.
const MAX_INHERITANCE_DEPTH: usize = 32;

const LETTER_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Whether each page or each document gets its own number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatesMode {
    #[default]
    PerPage,
    PerDocument,
}

/// Next Bates number to hand out, with its formatting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatesCounter {
    pub prefix: String,
    pub width: usize,
    pub next: u64,
}

impl BatesCounter {
    pub fn new(prefix: impl Into<String>, width: usize, start: u64) -> Self {
        Self {
            prefix: prefix.into(),
            width,
            next: start,
        }
    }

    /// Returns the label for `next` and a counter advanced by one.
    pub fn allocate(&self) -> Result<(String, BatesCounter), PdfError> {
        let next = self
            .next
            .checked_add(1)
            .ok_or(PdfError::CounterExhausted { last: self.next })?;
        let label = self.format(self.next);
        let advanced = BatesCounter {
            next,
            ..self.clone()
        };
        Ok((label, advanced))
    }

    /// Formats `number` as `PREFIX-000123`. Numbers wider than `width`
    /// are printed in full.
    pub fn format(&self, number: u64) -> String {
        format!("{}-{:0width$}", self.prefix, number, width = self.width)
    }
}

/// Output of one stamping pass.
#[derive(Debug, Clone)]
pub struct StampResult {
    pub bytes: Vec<u8>,
    pub counter: BatesCounter,
    /// Label drawn on each page, in page order.
    pub labels: Vec<String>,
}

impl StampResult {
    pub fn first_label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    pub fn last_label(&self) -> Option<&str> {
        self.labels.last().map(String::as_str)
    }
}

/// Stamps every page of `pdf_bytes` with a Bates label in the bottom-right
/// corner.
///
/// In [`BatesMode::PerPage`] the counter advances once per page; in
/// [`BatesMode::PerDocument`] one label is drawn on every page and the
/// counter advances once.
pub fn stamp(
    pdf_bytes: &[u8],
    counter: &BatesCounter,
    mode: BatesMode,
) -> Result<StampResult, PdfError> {
    let mut doc = Document::load_mem(pdf_bytes)
        .map_err(|e| PdfError::Malformed(format!("failed to load PDF: {}", e)))?;

    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(PdfError::Malformed("encrypted PDFs cannot be stamped".into()));
    }

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Err(PdfError::Malformed("document has no pages".into()));
    }

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let save_state_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));

    let mut counter = counter.clone();
    let mut labels = Vec::with_capacity(pages.len());
    let document_label = match mode {
        BatesMode::PerDocument => {
            let (label, next) = counter.allocate()?;
            counter = next;
            Some(label)
        }
        BatesMode::PerPage => None,
    };

    for page_id in pages {
        let label = match &document_label {
            Some(label) => label.clone(),
            None => {
                let (label, next) = counter.allocate()?;
                counter = next;
                label
            }
        };

        let media_box = media_box(&doc, page_id);
        let resources = resources_with_font(&doc, page_id, font_id);
        let contents = existing_contents(&doc, page_id);

        let stamp_id = doc.add_object(Stream::new(
            Dictionary::new(),
            stamp_content(&label, &media_box).into_bytes(),
        ));

        let mut wrapped = Vec::with_capacity(contents.len() + 2);
        wrapped.push(Object::Reference(save_state_id));
        wrapped.extend(contents);
        wrapped.push(Object::Reference(stamp_id));

        let page = doc
            .get_dictionary_mut(page_id)
            .map_err(|e| PdfError::Malformed(format!("page {:?} is not a dictionary: {}", page_id, e)))?;
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", Object::Array(wrapped));

        labels.push(label);
    }

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| PdfError::Save(e.to_string()))?;

    Ok(StampResult {
        bytes: out,
        counter,
        labels,
    })
}

/// Drawing operators for one stamp. The leading `Q` closes the `q` that was
/// prepended to the page's original content.
fn stamp_content(label: &str, media_box: &[f64; 4]) -> String {
    let [x0, y0, x1, y1] = *media_box;
    let text_width = helvetica_width(label, STAMP_FONT_SIZE);
    let box_width = text_width + 2.0 * BOX_PADDING;
    let box_height = STAMP_FONT_SIZE + 2.0 * BOX_PADDING;

    let x = (x1 - RIGHT_OFFSET - box_width).max(x0);
    let highest = (y1 - TOP_MARGIN - box_height).max(y0);
    let y = (y0 + BOTTOM_OFFSET).min(highest);

    let mut out = String::new();
    out.push_str("Q\nq\n1 g\n");
    let _ = writeln!(
        out,
        "{} {} {} {} re f",
        number(x),
        number(y),
        number(box_width),
        number(box_height)
    );
    out.push_str("0 g\nBT\n");
    let _ = writeln!(out, "/{} {} Tf", STAMP_FONT_RESOURCE, number(STAMP_FONT_SIZE));
    let _ = writeln!(
        out,
        "{} {} Td",
        number(x + BOX_PADDING),
        number(y + BOX_PADDING + DESCENT_EM * STAMP_FONT_SIZE)
    );
    let _ = writeln!(out, "({}) Tj", literal_string(label));
    out.push_str("ET\nQ\n");
    out
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

/// Looks `key` up on the page, then on its ancestors in the page tree.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = page_id;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

fn as_number(doc: &Document, object: &Object) -> Option<f64> {
    match resolve(doc, object) {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let values: Option<Vec<f64>> = inherited(doc, page_id, b"MediaBox")
        .and_then(|o| o.as_array().ok())
        .map(|arr| arr.iter().filter_map(|o| as_number(doc, o)).collect());

    match values.as_deref() {
        Some([a, b, c, d]) => [a.min(*c), b.min(*d), a.max(*c), b.max(*d)],
        _ => LETTER_MEDIA_BOX,
    }
}

/// Clones the page's effective resources and registers the stamp font.
fn resources_with_font(doc: &Document, page_id: ObjectId, font_id: ObjectId) -> Dictionary {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|o| o.as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let mut fonts = resources
        .get(b"Font")
        .ok()
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
        .cloned()
        .unwrap_or_default();
    fonts.set(STAMP_FONT_RESOURCE, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));
    resources
}

/// The page's content streams as a flat list of objects.
fn existing_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Some(contents) = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Contents").ok())
    else {
        return Vec::new();
    };

    match contents {
        Object::Array(items) => items.clone(),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    }
}
