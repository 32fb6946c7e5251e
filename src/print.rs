//! Printable referral documents.
//!
//! The referral screen hands a fully resolved [`PrintableReferral`] to a
//! [`PrintTarget`]. The crate ships a PDF target (A4, `printpdf`) and the
//! escaped HTML page the browser host opens in a print window.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use printpdf::*;
use serde::{Deserialize, Serialize};

use crate::models::enums::ReferralStatus;
use crate::models::Referral;

pub const DOCUMENT_TITLE: &str = "KonsultaLokál Referral";

#[derive(Debug, thiserror::Error)]
pub enum PrintError {
    #[error("Popup blocked. Allow popups and try again.")]
    PopupBlocked,
    #[error("PDF error: {0}")]
    Pdf(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Field values ready for printing. `status` is absent when printing an
/// unsaved preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintableReferral {
    pub id: String,
    pub patient_name: String,
    pub patient_age: String,
    pub patient_sex: String,
    pub date: String,
    pub receiving_facility: String,
    pub reason: String,
    pub findings: String,
    pub status: Option<ReferralStatus>,
}

impl PrintableReferral {
    /// A saved referral, status included.
    pub fn from_saved(referral: &Referral) -> Self {
        Self {
            status: Some(referral.status),
            ..Self::from_preview(referral)
        }
    }

    /// A prepared referral that has not been submitted yet.
    pub fn from_preview(referral: &Referral) -> Self {
        Self {
            id: referral.id.clone(),
            patient_name: referral.patient_name.clone(),
            patient_age: referral.patient_age.clone(),
            patient_sex: referral.patient_sex.clone(),
            date: referral.date.format("%Y-%m-%d").to_string(),
            receiving_facility: referral.receiving_facility.clone(),
            reason: referral.reason.clone(),
            findings: referral.findings.clone(),
            status: None,
        }
    }

    /// Label/value rows in print order.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            ("Referral ID", self.id.clone()),
            (
                "Patient",
                format!("{} — {} yrs", self.patient_name, self.patient_age),
            ),
            ("Sex", self.patient_sex.clone()),
            ("Date", self.date.clone()),
            ("Facility", self.receiving_facility.clone()),
            ("Reason", self.reason.clone()),
            ("Findings", self.findings.clone()),
        ];
        if let Some(status) = self.status {
            rows.push(("Status", status.to_string()));
        }
        rows
    }

    /// Stand-alone print page. Every user-supplied value is escaped.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        html.push_str("<html><head><title>Referral ");
        html.push_str(&escape_html(&self.id));
        html.push_str("</title><style>");
        html.push_str("body{font-family:Arial,Helvetica,sans-serif;padding:24px;color:#111;}");
        html.push_str("h1{font-size:20px;}.section{margin-bottom:12px;}.klabel{font-weight:700;}");
        html.push_str("</style></head><body>");
        html.push_str(&format!("<h1>{DOCUMENT_TITLE}</h1>"));
        for (label, value) in self.rows() {
            html.push_str(&format!(
                "<div class=\"section\"><div class=\"klabel\">{label}:</div><div>{}</div></div>",
                escape_html(&value)
            ));
        }
        html.push_str(
            "<div style=\"margin-top:20px;\"><button onclick=\"window.print();\">Print / Save as PDF</button></div>",
        );
        html.push_str("</body></html>");
        html
    }

    /// File name for exports: the id with anything unusual replaced.
    pub fn file_name(&self) -> String {
        let stem: String = self
            .id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}.pdf", if stem.is_empty() { "referral" } else { &stem })
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ─── Targets ──────────────────────────────────────────────────────────────────

/// Where printable documents go.
pub trait PrintTarget: Send + Sync {
    /// Render `doc`. Returns the location of the output.
    fn print(&self, doc: &PrintableReferral) -> Result<PathBuf, PrintError>;
}

/// Writes one A4 PDF per referral into `dir`.
#[derive(Debug, Clone)]
pub struct PdfPrintTarget {
    dir: PathBuf,
}

impl PdfPrintTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PrintTarget for PdfPrintTarget {
    fn print(&self, doc: &PrintableReferral) -> Result<PathBuf, PrintError> {
        let bytes = generate_referral_pdf(doc)?;
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(doc.file_name());
        std::fs::write(&path, bytes)?;
        tracing::info!(referral_id = %doc.id, path = %path.display(), "Referral printed");
        Ok(path)
    }
}

/// Target for hosts where printing is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockedPrintTarget;

impl PrintTarget for BlockedPrintTarget {
    fn print(&self, _doc: &PrintableReferral) -> Result<PathBuf, PrintError> {
        Err(PrintError::PopupBlocked)
    }
}

// ─── PDF generation ───────────────────────────────────────────────────────────

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const TOP_MM: f32 = 280.0;
const BOTTOM_MARGIN_MM: f32 = 20.0;
const LINE_MM: f32 = 5.0;
const ROW_GAP_MM: f32 = 3.0;

/// One positioned run of text on a PDF page.
#[derive(Debug, Clone, PartialEq)]
struct PdfLine {
    text: String,
    size: f32,
    x_mm: f32,
    y_mm: f32,
    bold: bool,
}

/// Lay the title and rows out over as many pages as needed. A row that does
/// not fit continues on the next page with its label repeated.
fn layout_pages(doc: &PrintableReferral) -> Vec<Vec<PdfLine>> {
    let mut pages = Vec::new();
    let mut page = vec![PdfLine {
        text: pdf_text(DOCUMENT_TITLE),
        size: 16.0,
        x_mm: 20.0,
        y_mm: TOP_MM,
        bold: true,
    }];
    let mut y = TOP_MM - 12.0;

    for (label, value) in doc.rows() {
        let mut label_pending = true;
        for line in wrap_text(&pdf_text(&value), 70) {
            if y < BOTTOM_MARGIN_MM {
                pages.push(std::mem::take(&mut page));
                y = TOP_MM;
                label_pending = true;
            }
            if label_pending {
                page.push(PdfLine {
                    text: format!("{label}:"),
                    size: 10.0,
                    x_mm: 20.0,
                    y_mm: y,
                    bold: true,
                });
                label_pending = false;
            }
            page.push(PdfLine {
                text: line,
                size: 10.0,
                x_mm: 60.0,
                y_mm: y,
                bold: false,
            });
            y -= LINE_MM;
        }
        y -= ROW_GAP_MM;
    }
    pages.push(page);
    pages
}

/// Text restricted to what the builtin Helvetica encoding can show.
fn pdf_text(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{2013}' | '\u{2014}' | '\u{2212}' => '-',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2022}' => '*',
            c if (c as u32) < 0x100 => c,
            _ => '?',
        })
        .collect()
}

/// Generates the referral PDF. Returns PDF bytes.
pub fn generate_referral_pdf(doc: &PrintableReferral) -> Result<Vec<u8>, PrintError> {
    let title = format!("Referral {}", doc.id);
    let (pdf, page1, layer1) = PdfDocument::new(&title, PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
    let font = pdf
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| PrintError::Pdf(format!("font error: {e}")))?;
    let bold = pdf
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| PrintError::Pdf(format!("font error: {e}")))?;

    for (i, lines) in layout_pages(doc).into_iter().enumerate() {
        let layer = if i == 0 {
            pdf.get_page(page1).get_layer(layer1)
        } else {
            let (page, layer) = pdf.add_page(PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
            pdf.get_page(page).get_layer(layer)
        };
        for line in lines {
            let face = if line.bold { &bold } else { &font };
            layer.use_text(&line.text, line.size, Mm(line.x_mm), Mm(line.y_mm), face);
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    pdf.save(&mut buf)
        .map_err(|e| PrintError::Pdf(format!("save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| PrintError::Pdf(format!("buffer error: {e}")))
}

/// Greedy word wrap for PDF text.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = current.chars().count() + word.chars().count() + 1;
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

// ─── Tests ────────────────────────────────────────────────────────────────────
