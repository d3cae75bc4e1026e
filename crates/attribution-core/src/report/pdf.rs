//! Minimal PDF 1.4 writer for text reports.
//!
//! Pages are US Letter, text uses the standard Helvetica fonts (no
//! embedding). Layout is top-down: each call advances a cursor and a new
//! page starts when the cursor reaches the bottom margin.

use chrono::NaiveDate;
use std::fmt::Write as _;

pub const PAGE_WIDTH: f64 = 612.0;
pub const PAGE_HEIGHT: f64 = 792.0;
pub const MARGIN: f64 = 72.0;
const LINE_SPACING: f64 = 1.35;
/// Average Helvetica glyph width as a fraction of the font size
const AVG_CHAR_WIDTH: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// Rough rendered width of `text` in points.
pub fn text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * AVG_CHAR_WIDTH
}

/// Escape a string for a PDF literal; characters outside printable ASCII
/// become `?`.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Greedy word wrap to at most `width` points per line.
pub fn wrap(text: &str, size: f64, width: f64) -> Vec<String> {
    let max_chars = ((width / (size * AVG_CHAR_WIDTH)).floor() as usize).max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let needed = if line.is_empty() {
            word.chars().count()
        } else {
            line.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[derive(Debug, Clone)]
pub struct PdfDocument {
    pages: Vec<String>,
    current: String,
    y: f64,
}

impl Default for PdfDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfDocument {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: String::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    pub fn content_width(&self) -> f64 {
        PAGE_WIDTH - 2.0 * MARGIN
    }

    pub fn page_count(&self) -> usize {
        self.pages.len() + usize::from(!self.current.is_empty())
    }

    pub fn page_break(&mut self) {
        if !self.current.is_empty() {
            self.pages.push(std::mem::take(&mut self.current));
        }
        self.y = PAGE_HEIGHT - MARGIN;
    }

    /// Move the cursor down, starting a new page if it runs out.
    pub fn space(&mut self, points: f64) {
        self.y -= points;
        if self.y < MARGIN {
            self.page_break();
        }
    }

    fn ensure_room(&mut self, height: f64) {
        if self.y - height < MARGIN {
            self.page_break();
        }
    }

    fn put(&mut self, x: f64, text: &str, font: Font, size: f64) {
        let _ = writeln!(
            self.current,
            "BT /{} {:.1} Tf {:.2} {:.2} Td ({}) Tj ET",
            font.resource(),
            size,
            x,
            self.y,
            escape(text)
        );
    }

    /// Write a wrapped paragraph.
    pub fn text(&mut self, text: &str, font: Font, size: f64, align: Align) {
        let leading = size * LINE_SPACING;
        for line in wrap(text, size, self.content_width()) {
            self.ensure_room(leading);
            self.y -= size;
            let x = match align {
                Align::Left => MARGIN,
                Align::Center => (PAGE_WIDTH - text_width(&line, size)) / 2.0,
            };
            self.put(x.max(MARGIN), &line, font, size);
            self.y -= leading - size;
        }
    }

    /// Write one table row; cells are clipped to their column width.
    pub fn row(&mut self, cells: &[String], widths: &[f64], font: Font, size: f64) {
        let leading = size * LINE_SPACING;
        self.ensure_room(leading);
        self.y -= size;
        let mut x = MARGIN;
        for (cell, width) in cells.iter().zip(widths) {
            let max_chars = ((width - 4.0) / (size * AVG_CHAR_WIDTH)).floor().max(1.0) as usize;
            let clipped: String = cell.chars().take(max_chars).collect();
            self.put(x, &clipped, font, size);
            x += width;
        }
        self.y -= leading - size;
    }

    /// Horizontal rule across the given width.
    pub fn rule(&mut self, width: f64) {
        self.ensure_room(4.0);
        self.y -= 2.0;
        let _ = writeln!(
            self.current,
            "0.5 w {:.2} {:.2} m {:.2} {:.2} l S",
            MARGIN,
            self.y,
            MARGIN + width,
            self.y
        );
        self.y -= 2.0;
    }

    /// Serialise the document. `date` fills the info dictionary, so the
    /// same content and date always give the same bytes.
    pub fn to_bytes(&self, title: &str, date: NaiveDate) -> Vec<u8> {
        let mut pages = self.pages.clone();
        if !self.current.is_empty() || pages.is_empty() {
            pages.push(self.current.clone());
        }

        // 1 catalog, 2 page tree, 3-4 fonts, 5 info, then page/content pairs
        let first_page = 6;
        let mut objects: Vec<String> = Vec::with_capacity(5 + pages.len() * 2);
        objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
        let kids: Vec<String> = (0..pages.len())
            .map(|i| format!("{} 0 R", first_page + 2 * i))
            .collect();
        objects.push(format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ));
        objects.push(
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        );
        objects.push(
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
                .to_string(),
        );
        objects.push(format!(
            "<< /Title ({}) /Producer (attribution-core) /CreationDate (D:{}000000Z) >>",
            escape(title),
            date.format("%Y%m%d")
        ));
        for (i, content) in pages.iter().enumerate() {
            let content_id = first_page + 2 * i + 1;
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                PAGE_WIDTH, PAGE_HEIGHT, content_id
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}endstream",
                content.len(),
                content
            ));
        }

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            let _ = write!(out, "{} 0 obj\n{}\nendobj\n", i + 1, body);
        }
        let xref_at = out.len();
        let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for off in &offsets {
            let _ = writeln!(out, "{:010} 00000 n ", off);
        }
        let _ = write!(
            out,
            "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        );
        out.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[test]
    fn test_escape_specials_and_non_ascii() {
        assert_eq!(escape("a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(escape("caf\u{e9} \u{2022}"), "caf? ?");
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "the quick brown fox jumps over the lazy dog ".repeat(10);
        let lines = wrap(&text, 10.0, 100.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= 20));
    }

    #[test]
    fn test_wrap_long_word_kept_whole() {
        let lines = wrap("supercalifragilistic", 10.0, 20.0);
        assert_eq!(lines, vec!["supercalifragilistic"]);
    }

    #[test]
    fn test_structure() {
        let mut doc = PdfDocument::new();
        doc.text("Hello (world)", Font::Bold, 14.0, Align::Center);
        let bytes = doc.to_bytes("Test", date());
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("(Hello \\(world\\)) Tj"));
        assert!(text.contains("/Count 1"));
        assert!(text.contains("D:20250115"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let mut doc = PdfDocument::new();
        doc.text("Body", Font::Regular, 11.0, Align::Left);
        let text = String::from_utf8(doc.to_bytes("T", date())).unwrap();
        let xref = text.find("xref\n").unwrap();
        let entries: Vec<usize> = text[xref..]
            .lines()
            .skip(3)
            .take_while(|l| l.ends_with(" n "))
            .map(|l| l[..10].parse().unwrap())
            .collect();
        assert_eq!(entries.len(), 7);
        for (i, off) in entries.iter().enumerate() {
            assert!(text[*off..].starts_with(&format!("{} 0 obj", i + 1)));
        }
        let startxref: usize = text
            .lines()
            .skip_while(|l| *l != "startxref")
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(startxref, xref);
    }

    #[test]
    fn test_overflow_adds_pages() {
        let mut doc = PdfDocument::new();
        for i in 0..120 {
            doc.text(&format!("line {i}"), Font::Regular, 11.0, Align::Left);
        }
        assert!(doc.page_count() >= 3);
        let text = String::from_utf8(doc.to_bytes("T", date())).unwrap();
        assert!(text.contains(&format!("/Count {}", doc.page_count())));
    }

    #[test]
    fn test_deterministic_bytes() {
        let build = || {
            let mut doc = PdfDocument::new();
            doc.text("Same", Font::Regular, 11.0, Align::Left);
            doc.rule(100.0);
            doc.to_bytes("T", date())
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_empty_document_has_one_page() {
        let text = String::from_utf8(PdfDocument::new().to_bytes("T", date())).unwrap();
        assert!(text.contains("/Count 1"));
    }
}
