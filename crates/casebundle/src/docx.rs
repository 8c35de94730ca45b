//! Minimal WordprocessingML (`.docx`) writer.
//!
//! The package is assembled with the crate's own STORE-only ZIP writer and
//! holds five parts, six when a signature image is embedded.

use std::borrow::Cow;
use std::fmt::Write as _;

use image::ImageFormat;
use quick_xml::escape::escape;
use tracing::warn;

use crate::container::ZipBuilder;
use crate::error::ContainerError;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const SIGNATURE_PART: &str = "word/media/signature.png";
const SIGNATURE_REL_ID: &str = "rIdSignature";

/// 2in by 0.5in, in EMUs (914400 per inch).
const SIGNATURE_CX: u64 = 1_828_800;
const SIGNATURE_CY: u64 = 457_200;

/// US Letter in twentieths of a point, with one-inch margins.
const PAGE_WIDTH_TWIPS: u32 = 12_240;
const PAGE_HEIGHT_TWIPS: u32 = 15_840;
const MARGIN_TWIPS: u32 = 1_440;

/// Double spacing: `w:line` is in 240ths of a line.
const COURT_LINE_SPACING: u32 = 480;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_CORE_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
}

struct Paragraph {
    lines: Vec<String>,
    align: Align,
    bold: bool,
}

/// Builds `.docx` packages. Pure and allocation-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxBuilder {
    court_style: bool,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Double line spacing on every paragraph.
    pub fn court_style(mut self, enabled: bool) -> Self {
        self.court_style = enabled;
        self
    }

    /// Builds a complete package.
    ///
    /// A `signature` that is empty or not a PNG is left out with a warning.
    pub fn build(
        &self,
        front_matter: Option<&str>,
        title: &str,
        meta: Option<&str>,
        body: &str,
        signature: Option<&[u8]>,
    ) -> Result<Vec<u8>, ContainerError> {
        let signature = signature.filter(|bytes| accept_signature(bytes));
        let title = xml_text(title).replace(|c| c == '\n' || c == '\r', " ");

        let mut paragraphs = Vec::new();
        if let Some(front_matter) = front_matter {
            paragraphs.extend(split_paragraphs(front_matter, Align::Left, false));
        }
        paragraphs.push(Paragraph {
            lines: vec![title.clone()],
            align: Align::Center,
            bold: true,
        });
        if let Some(meta) = meta.filter(|m| !m.trim().is_empty()) {
            paragraphs.extend(split_paragraphs(meta, Align::Center, false));
        }
        paragraphs.extend(split_paragraphs(body, Align::Left, false));

        let document_xml = self.document_xml(&paragraphs, signature.is_some());

        let mut zip = ZipBuilder::new();
        zip.add(
            "[Content_Types].xml",
            content_types_xml(signature.is_some()).into_bytes(),
        )?;
        zip.add("_rels/.rels", package_rels_xml().into_bytes())?;
        zip.add("docProps/core.xml", core_xml(&title).into_bytes())?;
        zip.add("word/document.xml", document_xml.into_bytes())?;
        zip.add(
            "word/_rels/document.xml.rels",
            document_rels_xml(signature.is_some()).into_bytes(),
        )?;
        if let Some(bytes) = signature {
            zip.add(SIGNATURE_PART, bytes.to_vec())?;
        }
        zip.finish()
    }

    fn document_xml(&self, paragraphs: &[Paragraph], with_signature: bool) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        let _ = write!(
            xml,
            r#"<w:document xmlns:w="{}" xmlns:r="{}" xmlns:wp="{}" xmlns:a="{}" xmlns:pic="{}"><w:body>"#,
            NS_W, NS_R, NS_WP, NS_A, NS_PIC
        );

        for paragraph in paragraphs {
            xml.push_str("<w:p>");
            xml.push_str(&self.paragraph_properties(paragraph.align));
            xml.push_str("<w:r>");
            if paragraph.bold {
                xml.push_str("<w:rPr><w:b/></w:rPr>");
            }
            for (i, line) in paragraph.lines.iter().enumerate() {
                if i > 0 {
                    xml.push_str("<w:br/>");
                }
                for (j, segment) in line.split('\t').enumerate() {
                    if j > 0 {
                        xml.push_str("<w:tab/>");
                    }
                    if !segment.is_empty() {
                        let _ = write!(xml, r#"<w:t xml:space="preserve">{}</w:t>"#, escape(segment));
                    }
                }
            }
            xml.push_str("</w:r></w:p>");
        }

        if with_signature {
            xml.push_str("<w:p>");
            xml.push_str(&self.paragraph_properties(Align::Left));
            xml.push_str(&signature_run());
            xml.push_str("</w:p>");
        }

        let _ = write!(
            xml,
            r#"<w:sectPr><w:pgSz w:w="{w}" w:h="{h}"/><w:pgMar w:top="{m}" w:right="{m}" w:bottom="{m}" w:left="{m}" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr>"#,
            w = PAGE_WIDTH_TWIPS,
            h = PAGE_HEIGHT_TWIPS,
            m = MARGIN_TWIPS
        );
        xml.push_str("</w:body></w:document>");
        xml
    }

    fn paragraph_properties(&self, align: Align) -> String {
        let mut props = String::new();
        if self.court_style {
            let _ = write!(
                props,
                r#"<w:spacing w:line="{}" w:lineRule="auto"/>"#,
                COURT_LINE_SPACING
            );
        }
        if align == Align::Center {
            props.push_str(r#"<w:jc w:val="center"/>"#);
        }
        if props.is_empty() {
            props
        } else {
            format!("<w:pPr>{}</w:pPr>", props)
        }
    }
}

fn accept_signature(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        warn!("Signature image is empty; omitting it");
        return false;
    }
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => true,
        Ok(other) => {
            warn!(format = ?other, "Signature image is not a PNG; omitting it");
            false
        }
        Err(_) => {
            warn!("Signature image format not recognised; omitting it");
            false
        }
    }
}

/// Removes characters XML 1.0 does not allow. A form feed becomes a line
/// break; tabs, newlines and carriage returns are kept.
fn xml_text(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .filter_map(|c| match c {
                '\u{000C}' => Some('\n'),
                c if is_xml_char(c) => Some(c),
                _ => None,
            })
            .collect(),
    )
}

fn is_xml_char(c: char) -> bool {
    match c {
        '\t' | '\n' | '\r' => true,
        '\u{FFFE}' | '\u{FFFF}' => false,
        c => c >= '\u{20}',
    }
}

/// Splits text on blank lines. Lines inside a paragraph are kept and later
/// joined with `<w:br/>`.
fn split_paragraphs(text: &str, align: Align, bold: bool) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in xml_text(text).lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(Paragraph {
                    lines: std::mem::take(&mut current),
                    align,
                    bold,
                });
            }
        } else {
            current.push(line.to_string());
        }
    }
    if !current.is_empty() {
        paragraphs.push(Paragraph {
            lines: current,
            align,
            bold,
        });
    }
    paragraphs
}

fn signature_run() -> String {
    format!(
        concat!(
            "<w:r><w:drawing>",
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:docPr id="1" name="Signature"/>"#,
            r#"<a:graphic><a:graphicData uri="{pic}">"#,
            r#"<pic:pic><pic:nvPicPr><pic:cNvPr id="0" name="signature.png"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>"#,
            "</a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"
        ),
        cx = SIGNATURE_CX,
        cy = SIGNATURE_CY,
        pic = NS_PIC,
        rel = SIGNATURE_REL_ID
    )
}

fn content_types_xml(with_png: bool) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
        r#"<Default Extension="xml" ContentType="application/xml"/>"#
    ));
    if with_png {
        xml.push_str(r#"<Default Extension="png" ContentType="image/png"/>"#);
    }
    xml.push_str(concat!(
        r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
        r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#,
        "</Types>"
    ));
    xml
}

fn package_rels_xml() -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId1" Type="{}" Target="word/document.xml"/>"#,
            r#"<Relationship Id="rId2" Type="{}" Target="docProps/core.xml"/>"#,
            "</Relationships>"
        ),
        REL_OFFICE_DOCUMENT, REL_CORE_PROPERTIES
    )
}

fn document_rels_xml(with_signature: bool) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#
    ));
    if with_signature {
        let _ = write!(
            xml,
            r#"<Relationship Id="{}" Type="{}" Target="media/signature.png"/>"#,
            SIGNATURE_REL_ID, REL_IMAGE
        );
    }
    xml.push_str("</Relationships>");
    xml
}

fn core_xml(title: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/">"#,
            "<dc:title>{}</dc:title></cp:coreProperties>"
        ),
        escape(title)
    )
}
