use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::path::Path;

use super::{ReceiptDocument, ReceiptRenderer, RenderError};

// A4 in points.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

type Rgb = (f32, f32, f32);

const BRAND: Rgb = (0.12, 0.31, 0.47);
const WHITE: Rgb = (1.0, 1.0, 1.0);
const TEXT: Rgb = (0.13, 0.13, 0.13);
const RULE: Rgb = (0.8, 0.8, 0.8);
const SHADE: Rgb = (0.96, 0.96, 0.96);

/// Draws a fixed single-page A4 receipt layout with the standard Helvetica fonts.
#[derive(Clone)]
pub struct DrawRenderer {
    organization: String,
}

impl DrawRenderer {
    pub fn new(organization: &str) -> Self {
        Self {
            organization: organization.to_string(),
        }
    }

    pub fn render_bytes(&self, document: &ReceiptDocument) -> Result<Vec<u8>, RenderError> {
        let content = self.layout(document);

        let mut pdf = Document::with_version("1.5");
        let pages_id = pdf.new_object_id();

        let regular_id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold_id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = pdf.add_object(dictionary! {
            "Font" => dictionary! {
                REGULAR => regular_id,
                BOLD => bold_id,
            },
        });

        let content_id = pdf.add_object(Stream::new(Dictionary::new(), content.encode()?));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Contents" => content_id,
            "Resources" => resources_id,
        });

        pdf.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );

        let catalog_id = pdf.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        pdf.trailer.set("Root", catalog_id);

        let info_id = pdf.add_object(dictionary! {
            "Title" => Object::string_literal(win_ansi(&document.receipt_number)),
            "Producer" => Object::string_literal("receipt-service"),
        });
        pdf.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        pdf.save_to(&mut bytes)?;
        Ok(bytes)
    }

    fn layout(&self, doc: &ReceiptDocument) -> Content {
        let mut canvas = Canvas::default();
        let right = PAGE_WIDTH - MARGIN;
        let width = right - MARGIN;

        // Header band.
        canvas.fill_rect(0.0, 0.0, PAGE_WIDTH, 90.0, BRAND);
        canvas.text(BOLD, 20.0, MARGIN, 42.0, WHITE, &self.organization);
        canvas.text(REGULAR, 12.0, MARGIN, 66.0, WHITE, "Donation Receipt");

        let mut y = 125.0;
        canvas.text(BOLD, 11.0, MARGIN, y, TEXT, &format!("Receipt No: {}", doc.receipt_number));
        let stamp = format!("Date: {}   Time: {}", doc.formatted_date, doc.formatted_time);
        canvas.text_right(REGULAR, 11.0, right, y, TEXT, &stamp);
        y += 14.0;
        canvas.line(MARGIN, y, right, y, RULE);

        y += 28.0;
        let details = [
            ("Donor Name", &doc.donor_name),
            ("PAN", &doc.donor_pan),
            ("Email", &doc.email),
            ("Mobile No", &doc.mobile_no),
            ("Address", &doc.address),
        ];
        for (label, value) in details {
            canvas.text(BOLD, 11.0, MARGIN, y, TEXT, label);
            canvas.text(REGULAR, 11.0, MARGIN + 130.0, y, TEXT, value);
            y += 20.0;
        }

        // Denominations table.
        y += 16.0;
        let row_height = 22.0;
        let columns = [MARGIN, MARGIN + width * 0.4, MARGIN + width * 0.7, right];

        canvas.fill_rect(MARGIN, y, width, row_height, BRAND);
        canvas.text(BOLD, 11.0, columns[0] + 8.0, y + 15.0, WHITE, "Denomination");
        canvas.text(BOLD, 11.0, columns[1] + 8.0, y + 15.0, WHITE, "Count");
        canvas.text_right(BOLD, 11.0, columns[3] - 8.0, y + 15.0, WHITE, "Amount");
        y += row_height;

        for (i, row) in doc.rows.iter().enumerate() {
            if i % 2 == 1 {
                canvas.fill_rect(MARGIN, y, width, row_height, SHADE);
            }
            canvas.stroke_rect(MARGIN, y, width, row_height, RULE);
            canvas.text(REGULAR, 11.0, columns[0] + 8.0, y + 15.0, TEXT, &format!("{} Rs", row.value));
            canvas.text(REGULAR, 11.0, columns[1] + 8.0, y + 15.0, TEXT, &row.count.to_string());
            canvas.text_right(REGULAR, 11.0, columns[3] - 8.0, y + 15.0, TEXT, &format!("Rs. {}", row.amount));
            y += row_height;
        }
        for x in &columns[1..3] {
            let top = y - row_height * doc.rows.len() as f32;
            canvas.line(*x, top, *x, y, RULE);
        }

        canvas.fill_rect(MARGIN, y, width, row_height, SHADE);
        canvas.stroke_rect(MARGIN, y, width, row_height, RULE);
        canvas.text(BOLD, 11.0, columns[0] + 8.0, y + 15.0, TEXT, "Denomination total");
        canvas.text_right(BOLD, 11.0, columns[3] - 8.0, y + 15.0, TEXT, &format!("Rs. {}", doc.rows_total));
        y += row_height;

        y += 30.0;
        canvas.text_right(BOLD, 14.0, right, y, TEXT, &format!("Total: Rs. {}", doc.total));
        y += 20.0;
        let words = format!("({} rupees only)", capitalize(&doc.total_in_words));
        canvas.text_right(REGULAR, 11.0, right, y, TEXT, &words);

        // Signature block.
        let sign_y = y + 80.0;
        canvas.line(right - 180.0, sign_y, right, sign_y, TEXT);
        canvas.text_right(REGULAR, 10.0, right, sign_y + 14.0, TEXT, &format!("Collected by: {}", doc.volunteer_name));

        canvas.text(REGULAR, 8.0, MARGIN, PAGE_HEIGHT - 30.0, RULE, "This is a computer generated receipt.");

        canvas.finish()
    }
}

#[async_trait]
impl ReceiptRenderer for DrawRenderer {
    async fn render(&self, document: &ReceiptDocument, output: &Path) -> Result<(), RenderError> {
        let renderer = self.clone();
        let document = document.clone();
        let bytes = tokio::task::spawn_blocking(move || renderer.render_bytes(&document)).await??;

        tokio::fs::write(output, bytes).await?;
        Ok(())
    }
}

/// Content stream builder using top-left page coordinates.
#[derive(Default)]
struct Canvas {
    operations: Vec<Operation>,
}

impl Canvas {
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        self.push("rg", vec![color.0.into(), color.1.into(), color.2.into()]);
        self.push("re", vec![x.into(), (PAGE_HEIGHT - y - h).into(), w.into(), h.into()]);
        self.push("f", vec![]);
    }

    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        self.push("w", vec![0.75_f32.into()]);
        self.push("RG", vec![color.0.into(), color.1.into(), color.2.into()]);
        self.push("re", vec![x.into(), (PAGE_HEIGHT - y - h).into(), w.into(), h.into()]);
        self.push("S", vec![]);
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Rgb) {
        self.push("w", vec![0.75_f32.into()]);
        self.push("RG", vec![color.0.into(), color.1.into(), color.2.into()]);
        self.push("m", vec![x1.into(), (PAGE_HEIGHT - y1).into()]);
        self.push("l", vec![x2.into(), (PAGE_HEIGHT - y2).into()]);
        self.push("S", vec![]);
    }

    /// `y` is the text baseline.
    fn text(&mut self, font: &str, size: f32, x: f32, y: f32, color: Rgb, text: &str) {
        self.push("BT", vec![]);
        self.push("Tf", vec![font.into(), size.into()]);
        self.push("rg", vec![color.0.into(), color.1.into(), color.2.into()]);
        self.push("Td", vec![x.into(), (PAGE_HEIGHT - y).into()]);
        self.push("Tj", vec![Object::string_literal(win_ansi(text))]);
        self.push("ET", vec![]);
    }

    fn text_right(&mut self, font: &str, size: f32, right: f32, y: f32, color: Rgb, text: &str) {
        let width = text_width(text, size, font == BOLD);
        self.text(font, size, right - width, y, color, text);
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    fn finish(self) -> Content {
        Content {
            operations: self.operations,
        }
    }
}

/// Bytes for a standard-font string; characters outside Latin-1 become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            0x20..=0x7E | 0xA0..=0xFF => u32::from(c) as u8,
            _ => b'?',
        })
        .collect()
}

/// Approximate Helvetica advance width, good enough for right alignment.
fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c {
            '0'..='9' => 556,
            ' ' | '.' | ',' | ':' | '/' | '(' | ')' => 278,
            'i' | 'j' | 'l' => 222,
            'f' | 't' | 'r' => 300,
            'm' | 'w' => 833,
            'A'..='Z' => 700,
            _ => 540,
        })
        .sum();
    let scale = if bold { 1.05 } else { 1.0 };
    units as f32 * size * scale / 1000.0
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::sample_document;

    #[test]
    fn produces_single_page_pdf() {
        let bytes = DrawRenderer::new("Test Trust")
            .render_bytes(&sample_document())
            .expect("render");

        assert!(bytes.starts_with(b"%PDF-1.5"));
        let parsed = Document::load_mem(&bytes).expect("parse");
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn draws_receipt_text() {
        let content = DrawRenderer::new("Test Trust").layout(&sample_document());
        let strings: Vec<Vec<u8>> = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(bytes.clone()),
                _ => None,
            })
            .collect();

        let has = |needle: &str| strings.iter().any(|s| s.as_slice() == needle.as_bytes());
        assert!(has("Test Trust"));
        assert!(has("Receipt No: #NMF01/24-25/FSJB7"));
        assert!(has("Rs. 1000"));
        assert!(has("Denomination total"));
        assert!(has("Rs. 1300"));
        assert!(has("Total: Rs. 1300"));
        assert!(has("(One thousand three hundred rupees only)"));
    }

    #[test]
    fn non_latin_text_is_replaced() {
        assert_eq!(win_ansi("Rs ₹5"), b"Rs ?5".to_vec());
        assert_eq!(win_ansi("café"), vec![b'c', b'a', b'f', 0xE9]);
    }

    #[tokio::test]
    async fn writes_file() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("receipt.pdf");

        DrawRenderer::new("Test Trust")
            .render(&sample_document(), &path)
            .await
            .expect("render");

        let bytes = std::fs::read(&path).expect("read");
        assert!(bytes.starts_with(b"%PDF"));
    }
}
