//! Printable and shareable forms of a prescription: the QR payload, the PDF
//! sheet and the WhatsApp share link.

use std::io::BufWriter;

use chrono::{DateTime, FixedOffset};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rect};
use qrcode::render::svg;
use qrcode::QrCode;

use crate::models::{Medication, PrescriptionDetails, PrescriptionError};

const PAGE_WIDTH: f32 = 148.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN: f32 = 12.0;
const QR_SIZE: f32 = 32.0;
const LINE_CHARS: usize = 70;
const TEXT_TOP: f32 = PAGE_HEIGHT - MARGIN - 4.0;
/// Text stays above this line so it never runs into the QR code.
const FOOTER_TOP: f32 = MARGIN + QR_SIZE + 4.0;

pub fn view_url(site_url: &str, prescription_id: impl std::fmt::Display) -> String {
    format!("{}/prescriptions/{}", site_url.trim_end_matches('/'), prescription_id)
}

/// Text encoded in the prescription's QR code. `issued` is on the clinic clock.
pub fn qr_payload(details: &PrescriptionDetails, issued: DateTime<FixedOffset>, site_url: &str) -> String {
    let prescription = &details.prescription;
    format!(
        "Prescription ID: {}\nPatient: {}\nDate: {}\nView: {}",
        prescription.id,
        prescription.patient_full_name,
        issued.format("%Y-%m-%d %H:%M"),
        view_url(site_url, prescription.id)
    )
}

pub fn render_qr_svg(payload: &str) -> Result<String, PrescriptionError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| PrescriptionError::RenderError(format!("QR generation failed: {e}")))?;

    Ok(code
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .max_dimensions(300, 300)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .quiet_zone(true)
        .build())
}

pub fn whatsapp_message(details: &PrescriptionDetails, issued: DateTime<FixedOffset>, site_url: &str) -> String {
    let prescription = &details.prescription;
    let mut lines = vec![
        format!("Prescription from Dr. {}", prescription.doctor_name()),
        format!("Patient: {}, Age: {}", prescription.patient_full_name, prescription.age),
        format!("Date: {}", issued.format("%Y-%m-%d %H:%M")),
    ];
    if let Some(voice_note) = prescription.voice_note_url.as_deref().filter(|url| !url.is_empty()) {
        lines.push(format!("Voice Note: {}", voice_note));
    }
    lines.push(format!("View: {}", view_url(site_url, prescription.id)));
    lines.join("\n")
}

pub fn whatsapp_link(message: &str) -> String {
    format!("https://wa.me/?text={}", urlencoding::encode(message))
}

fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn draw_qr(layer: &PdfLayerReference, code: &QrCode, left: f32, bottom: f32, size: f32) {
    let width = code.width();
    let module = size / width as f32;

    for (index, color) in code.to_colors().into_iter().enumerate() {
        if color != qrcode::Color::Dark {
            continue;
        }
        let x = left + (index % width) as f32 * module;
        let y = bottom + size - (index / width + 1) as f32 * module;
        layer.add_rect(Rect::new(Mm(x), Mm(y), Mm(x + module), Mm(y + module)));
    }
}

fn medication_lines(medications: &[Medication]) -> Vec<String> {
    medications
        .iter()
        .enumerate()
        .flat_map(|(i, m)| wrap_text(&format!("{}. {} - {}", i + 1, m.name, m.dosage), LINE_CHARS))
        .collect()
}

/// A line of text positioned on a page, in millimetres from the bottom left.
#[derive(Debug, Clone)]
struct PlacedText {
    text: String,
    size: f32,
    x: f32,
    y: f32,
    bold: bool,
}

/// Flows text down the sheet and starts a new page before the footer band.
struct SheetLayout {
    pages: Vec<Vec<PlacedText>>,
    current: Vec<PlacedText>,
    y: f32,
}

impl SheetLayout {
    fn new() -> Self {
        Self { pages: Vec::new(), current: Vec::new(), y: TEXT_TOP }
    }

    fn place(&mut self, text: impl Into<String>, size: f32, x: f32, bold: bool) {
        if self.y < FOOTER_TOP {
            self.pages.push(std::mem::take(&mut self.current));
            self.y = TEXT_TOP;
        }
        self.current.push(PlacedText { text: text.into(), size, x, y: self.y, bold });
    }

    fn down(&mut self, step: f32) {
        self.y -= step;
    }

    fn finish(mut self) -> Vec<Vec<PlacedText>> {
        self.pages.push(self.current);
        self.pages
    }
}

fn layout_sheet(details: &PrescriptionDetails, issued: DateTime<FixedOffset>) -> Vec<Vec<PlacedText>> {
    let prescription = &details.prescription;
    let mut sheet = SheetLayout::new();

    // Header
    sheet.place(format!("Dr. {}", prescription.doctor_name()), 14.0, MARGIN, true);
    sheet.down(6.0);
    if let Some(specialty) = prescription.doctor.as_ref().and_then(|d| d.specialty.as_deref()) {
        sheet.place(specialty, 10.0, MARGIN, false);
        sheet.down(6.0);
    }
    sheet.down(4.0);

    sheet.place(format!("Patient: {}", prescription.patient_full_name), 11.0, MARGIN, false);
    sheet.place(format!("Age: {}", prescription.age), 11.0, PAGE_WIDTH - MARGIN - 30.0, false);
    sheet.down(6.0);
    sheet.place(format!("Date: {}", issued.format("%Y-%m-%d %H:%M")), 11.0, MARGIN, false);
    sheet.down(10.0);

    // Medications
    sheet.place("Rx", 16.0, MARGIN, true);
    sheet.down(7.0);
    for line in medication_lines(&details.medications) {
        sheet.place(line, 10.0, MARGIN + 4.0, false);
        sheet.down(5.0);
    }

    if let Some(instructions) = prescription.instructions.as_deref().filter(|i| !i.trim().is_empty()) {
        sheet.down(4.0);
        sheet.place("Instructions:", 11.0, MARGIN, true);
        sheet.down(6.0);
        for line in wrap_text(instructions, LINE_CHARS) {
            sheet.place(line, 10.0, MARGIN + 4.0, false);
            sheet.down(5.0);
        }
    }

    sheet.finish()
}

/// A5 prescription sheet, continued onto further pages when the medication
/// list is long. Every page carries the QR code and link in its footer.
pub fn render_pdf(
    details: &PrescriptionDetails,
    issued: DateTime<FixedOffset>,
    site_url: &str,
) -> Result<Vec<u8>, PrescriptionError> {
    let prescription = &details.prescription;
    let title = format!("Prescription {}", prescription.id);

    let (doc, first_page, first_layer) = PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font: IndirectFontRef = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| PrescriptionError::RenderError(format!("PDF font error: {e}")))?;
    let bold: IndirectFontRef = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| PrescriptionError::RenderError(format!("PDF font error: {e}")))?;

    let payload = qr_payload(details, issued, site_url);
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| PrescriptionError::RenderError(format!("QR generation failed: {e}")))?;
    let link = view_url(site_url, prescription.id);

    let pages = layout_sheet(details, issued);
    let total = pages.len();
    for (number, lines) in pages.into_iter().enumerate() {
        let layer = if number == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            doc.get_page(page).get_layer(layer)
        };

        for line in lines {
            let face = if line.bold { &bold } else { &font };
            layer.use_text(line.text, line.size, Mm(line.x), Mm(line.y), face);
        }

        // Footer: QR code bottom right, link bottom left
        draw_qr(&layer, &code, PAGE_WIDTH - MARGIN - QR_SIZE, MARGIN, QR_SIZE);
        layer.use_text(link.as_str(), 7.0, Mm(MARGIN), Mm(MARGIN), &font);
        if total > 1 {
            layer.use_text(format!("Page {} of {}", number + 1, total), 7.0, Mm(MARGIN), Mm(MARGIN + 4.0), &font);
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| PrescriptionError::RenderError(format!("PDF save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| PrescriptionError::RenderError(format!("PDF buffer error: {e}")))
}
