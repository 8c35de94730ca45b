//! Minimal PDF 1.4 writer for text documents.
//!
//! Object numbering is fixed: 1 Catalog, 2 Pages, 3 Font, then for page `i`
//! the page object is `4 + 2i` and its content stream `5 + 2i`. The output
//! contains no timestamps or ids, so identical input yields identical bytes.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::layout;

use super::text::{literal_string, number};

const FONT_RESOURCE: &str = "F1";

/// Page dimensions in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };
}

impl Default for PageSize {
    fn default() -> Self {
        Self::LETTER
    }
}

/// Typographic settings for generated PDFs.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfLayout {
    pub page_size: PageSize,
    pub margin: f64,
    pub body_font_size: f64,
    pub title_font_size: f64,
    /// Baseline-to-baseline distance, shared by every line.
    pub leading: f64,
    /// Average glyph advance as a fraction of the font size.
    pub avg_glyph_width_em: f64,
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self {
            page_size: PageSize::LETTER,
            margin: 72.0,
            body_font_size: 11.0,
            title_font_size: 16.0,
            leading: 16.0,
            avg_glyph_width_em: 0.5,
        }
    }
}

impl PdfLayout {
    fn usable_width(&self) -> f64 {
        (self.page_size.width - 2.0 * self.margin).max(0.0)
    }

    /// Characters that fit on one line at `font_size`.
    pub fn max_chars_per_line(&self, font_size: f64) -> usize {
        let glyph = (font_size * self.avg_glyph_width_em).max(f64::EPSILON);
        ((self.usable_width() / glyph).floor() as usize).max(1)
    }

    pub fn lines_per_page(&self) -> usize {
        let usable_height = (self.page_size.height - 2.0 * self.margin).max(0.0);
        ((usable_height / self.leading.max(f64::EPSILON)).floor() as usize).max(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct LayoutLine {
    text: String,
    font_size: f64,
}

/// Builds text-only PDFs according to a [`PdfLayout`].
#[derive(Debug, Clone, Default)]
pub struct PdfBuilder {
    layout: PdfLayout,
}

impl PdfBuilder {
    pub fn new(layout: PdfLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &PdfLayout {
        &self.layout
    }

    /// Renders a title, an optional metadata line and a body into a PDF.
    pub fn build(&self, title: &str, metadata_line: &str, body: &str) -> Vec<u8> {
        let lines = self.layout_lines(title, metadata_line, body);
        let pages = layout::paginate(&lines, self.layout.lines_per_page());

        let mut arena = ObjectArena::default();
        let catalog = arena.reserve();
        let pages_id = arena.reserve();
        let font = arena.reserve();

        let mut kids = Vec::with_capacity(pages.len());
        for page_lines in &pages {
            let page = arena.reserve();
            let contents = arena.reserve();
            kids.push(page);

            let stream = self.content_stream(page_lines);
            let mut body = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
            body.extend_from_slice(stream.as_bytes());
            body.extend_from_slice(b"\nendstream");
            arena.fill(contents, body);

            arena.fill(
                page,
                format!(
                    "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] \
                     /Resources << /Font << /{} {} 0 R >> >> /Contents {} 0 R >>",
                    pages_id,
                    number(self.layout.page_size.width),
                    number(self.layout.page_size.height),
                    FONT_RESOURCE,
                    font,
                    contents
                ),
            );
        }

        let kid_refs: Vec<String> = kids.iter().map(|id| format!("{} 0 R", id)).collect();
        arena.fill(
            catalog,
            format!("<< /Type /Catalog /Pages {} 0 R >>", pages_id),
        );
        arena.fill(
            pages_id,
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kid_refs.join(" "),
                kids.len()
            ),
        );
        arena.fill(
            font,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        );

        arena.serialize(catalog)
    }

    fn layout_lines(&self, title: &str, metadata_line: &str, body: &str) -> Vec<LayoutLine> {
        let title_size = self.layout.title_font_size;
        let body_size = self.layout.body_font_size;
        let styled = |text: String, font_size: f64| LayoutLine { text, font_size };

        let mut lines: Vec<LayoutLine> =
            layout::wrap(title, self.layout.max_chars_per_line(title_size))
                .into_iter()
                .map(|l| styled(l, title_size))
                .collect();
        if !metadata_line.trim().is_empty() {
            lines.extend(
                layout::wrap(metadata_line, self.layout.max_chars_per_line(body_size))
                    .into_iter()
                    .map(|l| styled(l, body_size)),
            );
        }
        lines.push(styled(String::new(), body_size));
        lines.extend(
            layout::wrap(body, self.layout.max_chars_per_line(body_size))
                .into_iter()
                .map(|l| styled(l, body_size)),
        );
        lines
    }

    fn content_stream(&self, lines: &[LayoutLine]) -> String {
        let layout = &self.layout;
        let mut out = String::new();
        out.push_str("0 g\nBT\n");
        let mut current_size = lines.first().map_or(layout.body_font_size, |l| l.font_size);
        let _ = writeln!(out, "/{} {} Tf", FONT_RESOURCE, number(current_size));
        let _ = writeln!(out, "{} TL", number(layout.leading));
        let _ = writeln!(
            out,
            "{} {} Td",
            number(layout.margin),
            number(layout.page_size.height - layout.margin - layout.leading)
        );
        for line in lines {
            if line.font_size != current_size {
                current_size = line.font_size;
                let _ = writeln!(out, "/{} {} Tf", FONT_RESOURCE, number(current_size));
            }
            let _ = writeln!(out, "({}) Tj T*", literal_string(&line.text));
        }
        out.push_str("ET");
        out
    }
}

/// Builds a PDF with the default fonts for the given page geometry.
pub fn build_pdf(
    title: &str,
    metadata_line: &str,
    body: &str,
    page_size: PageSize,
    margin: f64,
) -> Vec<u8> {
    PdfBuilder::new(PdfLayout {
        page_size,
        margin,
        ..PdfLayout::default()
    })
    .build(title, metadata_line, body)
}

/// Indirect objects keyed by the id they were reserved with.
///
/// Ids are handed out sequentially from 1 and never reused; byte offsets are
/// only computed at serialization time.
#[derive(Debug, Default)]
struct ObjectArena {
    objects: Vec<IndirectObject>,
}

#[derive(Debug)]
struct IndirectObject {
    id: u32,
    body: Vec<u8>,
}

impl ObjectArena {
    fn reserve(&mut self) -> u32 {
        let id = self.objects.len() as u32 + 1;
        self.objects.push(IndirectObject {
            id,
            body: b"null".to_vec(),
        });
        id
    }

    fn fill(&mut self, id: u32, body: impl Into<Vec<u8>>) {
        if let Some(object) = self.objects.iter_mut().find(|o| o.id == id) {
            object.body = body.into();
        }
    }

    fn serialize(mut self, root: u32) -> Vec<u8> {
        self.objects.sort_by_key(|o| o.id);

        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

        let mut offsets = Vec::with_capacity(self.objects.len());
        for object in &self.objects {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", object.id).as_bytes());
            out.extend_from_slice(&object.body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_offset = out.len();
        let size = self.objects.len() + 1;
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", size);
        for offset in offsets {
            let _ = write!(xref, "{:010} 00000 n \n", offset);
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {} /Root {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            size, root, xref_offset
        );
        out.extend_from_slice(xref.as_bytes());
        out
    }
}
