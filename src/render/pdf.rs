//! Built-in fixed-layout renderer
//!
//! Emits a minimal single-page PDF: title block, a label/value table of
//! the entry fields, and an attestation footer. The output is byte-stable:
//! no timestamps, no randomness, object offsets derived only from the
//! input fields.

use super::{NormalizedFields, RenderError, Renderer};

/// US Letter media box
const PAGE_WIDTH: u32 = 612;
const PAGE_HEIGHT: u32 = 792;

/// Left margin and table value column, in points
const MARGIN_X: u32 = 72;
const VALUE_X: u32 = 210;

/// Deterministic single-page document renderer.
pub struct PdfRenderer;

impl PdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PdfRenderer {
    fn render(&self, fields: &NormalizedFields) -> Result<Vec<u8>, RenderError> {
        Ok(render_document(fields))
    }
}

fn render_document(fields: &NormalizedFields) -> Vec<u8> {
    let content = content_stream(fields);

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 4 0 R /F2 5 0 R >> >> /Contents 6 0 R >>"
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
        format!(
            "<< /Title (Certification Issuance Pack - {}) \
             /Creator (Registry Issuance System) /Producer (issuance-lane) >>",
            escape(&fields.certification_id)
        ),
    ];

    let mut buf: Vec<u8> = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());

    for (i, body) in objects.iter().enumerate() {
        offsets.push(buf.len());
        buf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = buf.len();
    buf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    buf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        buf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    buf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            objects.len(),
            xref_offset
        )
        .as_bytes(),
    );

    buf
}

fn content_stream(fields: &NormalizedFields) -> String {
    let mut ops = Vec::new();

    ops.push(text("F2", 18, MARGIN_X, 720, "Certification Issuance Pack"));
    ops.push(text("F2", 14, MARGIN_X, 694, "Official Record of Issuance"));

    let rows = [
        ("Certification ID:", fields.certification_id.as_str()),
        ("Entity Name:", fields.entity_name.as_str()),
        ("Jurisdiction:", fields.jurisdiction.as_str()),
        ("Issue Date:", fields.issued_date.as_str()),
        ("Expiration Date:", fields.expiration_date.as_str()),
        ("Scope:", fields.scope.as_str()),
    ];

    let mut y = 640;
    for (label, value) in rows {
        ops.push(text("F2", 11, MARGIN_X, y, label));
        ops.push(text("F1", 11, VALUE_X, y, value));
        y -= 24;
    }

    ops.push(text(
        "F1",
        10,
        MARGIN_X,
        120,
        "This document certifies compliance with the registry's governance standards.",
    ));
    ops.push(text(
        "F1",
        10,
        MARGIN_X,
        104,
        "Verify integrity against the digests recorded in the pack manifest.",
    ));

    ops.join("\n")
}

fn text(font: &str, size: u32, x: u32, y: u32, s: &str) -> String {
    format!("BT /{font} {size} Tf {x} {y} Td ({}) Tj ET", escape(s))
}

/// Escape the PDF string delimiters.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            _ => out.push(c),
        }
    }
    out
}
