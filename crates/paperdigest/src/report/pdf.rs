use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::{RenderedReport, ReportRenderer};
use crate::config::ReportConfig;
use crate::error::ProcessError;

/// A4 in points.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 56.0;
const LINE_SPACING: f32 = 1.45;
const TITLE_SCALE: f32 = 1.5;

/// Standard Japanese CID font every conforming viewer provides, so nothing
/// has to be embedded.
const FONT_NAME: &str = "HeiseiKakuGo-W5";
/// Half-width variant: ASCII maps to CIDs 231-632 at 500 units.
const CMAP: &str = "UniJIS-UCS2-HW-H";

/// Renders the summary as a plain paginated A4 PDF.
#[derive(Debug, Clone)]
pub struct PdfReportRenderer {
    font_size: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct PlacedLine {
    text: String,
    size: f32,
    y: f32,
}

impl PdfReportRenderer {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            font_size: config.font_size,
        }
    }

    /// Positions every line, starting a new page when the bottom margin is hit.
    fn layout(&self, title: &str, summary: &str) -> Vec<Vec<PlacedLine>> {
        let title_size = self.font_size * TITLE_SCALE;

        let mut lines: Vec<(String, f32)> = Vec::new();
        for line in wrap(title, max_em(title_size)) {
            lines.push((line, title_size));
        }
        lines.push((String::new(), self.font_size));
        for paragraph in summary.lines() {
            for line in wrap(paragraph, max_em(self.font_size)) {
                lines.push((line, self.font_size));
            }
        }

        let mut pages = vec![Vec::new()];
        let mut y = PAGE_HEIGHT - MARGIN;
        for (text, size) in lines {
            let leading = size * LINE_SPACING;
            if y - leading < MARGIN {
                pages.push(Vec::new());
                y = PAGE_HEIGHT - MARGIN;
            }
            y -= leading;
            if let Some(page) = pages.last_mut() {
                page.push(PlacedLine { text, size, y });
            }
        }
        pages
    }
}

fn max_em(size: f32) -> f32 {
    (PAGE_WIDTH - 2.0 * MARGIN) / size
}

/// Approximate advance in em: half-width for ASCII, full-width otherwise.
fn char_em(c: char) -> f32 {
    if c.is_ascii() {
        0.5
    } else {
        1.0
    }
}

/// Greedy character wrap. An empty paragraph stays as one empty line.
fn wrap(paragraph: &str, max_em: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut width = 0.0;

    for c in paragraph.chars() {
        let c = if c == '\t' { ' ' } else { c };
        if c.is_control() {
            continue;
        }
        let w = char_em(c);
        if width + w > max_em && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            width = 0.0;
        }
        current.push(c);
        width += w;
    }
    lines.push(current);
    lines
}

/// UTF-16BE for the UCS2 CMap. Characters outside the BMP become `?`.
fn encode_ucs2(text: &str) -> Vec<u8> {
    text.chars()
        .flat_map(|c| {
            let unit = u16::try_from(u32::from(c)).unwrap_or(u16::from(b'?'));
            unit.to_be_bytes()
        })
        .collect()
}

fn add_font(doc: &mut Document) -> ObjectId {
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => FONT_NAME,
        "Flags" => 4,
        "FontBBox" => vec![(-92).into(), (-250).into(), 1010.into(), 922.into()],
        "ItalicAngle" => 0,
        "Ascent" => 880,
        "Descent" => -120,
        "CapHeight" => 737,
        "StemV" => 116,
    });

    let descendant_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType0",
        "BaseFont" => FONT_NAME,
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Japan1"),
            "Supplement" => 2,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => 1000,
        "W" => vec![231.into(), 632.into(), 500.into()],
    });

    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => format!("{}-{}", FONT_NAME, CMAP),
        "Encoding" => CMAP,
        "DescendantFonts" => vec![descendant_id.into()],
    })
}

fn page_content(lines: &[PlacedLine]) -> Content {
    let mut operations = vec![Operation::new("BT", vec![])];
    for line in lines {
        if line.text.is_empty() {
            continue;
        }
        operations.push(Operation::new("Tf", vec!["F1".into(), line.size.into()]));
        operations.push(Operation::new(
            "Tm",
            vec![
                1.into(),
                0.into(),
                0.into(),
                1.into(),
                MARGIN.into(),
                line.y.into(),
            ],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(
                encode_ucs2(&line.text),
                StringFormat::Hexadecimal,
            )],
        ));
    }
    operations.push(Operation::new("ET", vec![]));
    Content { operations }
}

impl ReportRenderer for PdfReportRenderer {
    fn render(&self, title: &str, summary: &str) -> Result<RenderedReport, ProcessError> {
        let _span = tracing::info_span!("report.render").entered();

        let pages = self.layout(title, summary);

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = add_font(&mut doc);
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for lines in &pages {
            let content = page_content(lines)
                .encode()
                .map_err(|e| ProcessError::Render(format!("Failed to encode page: {}", e)))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| ProcessError::Render(format!("Failed to write PDF: {}", e)))?;

        tracing::debug!(pages = page_count, bytes = bytes.len(), "Rendered report");
        Ok(RenderedReport {
            bytes,
            pages: page_count,
        })
    }
}
