use crate::curve::{CurvePath, CurveSink, fmt_num};
use crate::types::{Color, Point, Size};
use std::collections::BTreeSet;

const PDF_CATALOG_ID: usize = 1;
const PDF_PAGES_ID: usize = 2;
const PDF_RESOURCES_ID: usize = 3;
const PDF_FONT_ID: usize = 4;
const PRODUCER: &str = "inkrender";

// Average Helvetica advance as a fraction of the font size, used for line wrapping.
const AVG_CHAR_WIDTH_EM: f64 = 0.5;

/// Content of one output page. Pages are independent so they can be built in parallel.
#[derive(Debug, Clone)]
pub struct PageContent {
    size: Size,
    ops: String,
    opacities: BTreeSet<u16>,
}

impl PageContent {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            ops: String::new(),
            opacities: BTreeSet::new(),
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Raw content stream operators.
    pub fn operators(&self) -> &str {
        &self.ops
    }

    /// Fills a traced path given in top-down page coordinates.
    pub fn fill_path(&mut self, path: &CurvePath, color: Color) {
        self.ops.push_str("q\n");
        self.push_flip();
        self.ops.push_str(&format!(
            "{} {} {} rg\n",
            fmt_num(clamp_unit(color.r)),
            fmt_num(clamp_unit(color.g)),
            fmt_num(clamp_unit(color.b))
        ));
        if !color.is_opaque() {
            let name = self.opacity_state(color.a);
            self.ops.push_str(&format!("/{} gs\n", name));
        }
        let mut sink = PdfPathSink {
            out: &mut self.ops,
            current: Point::ZERO,
            start: Point::ZERO,
        };
        path.replay(&mut sink);
        self.ops.push_str("f\nQ\n");
    }

    /// Lays `text` out in Helvetica inside `margin`, painted at zero opacity so it is
    /// selectable and searchable but never visible.
    pub fn invisible_text(&mut self, text: &str, margin: f64, font_size: f64) {
        let max_width = (self.size.width - 2.0 * margin).max(font_size);
        let max_chars = ((max_width / (font_size * AVG_CHAR_WIDTH_EM)).floor() as usize).max(1);
        let lines = wrap_text(text, max_chars);
        if lines.is_empty() {
            return;
        }
        let leading = font_size * 1.2;
        let name = self.opacity_state(0.0);
        self.ops.push_str("q\n");
        self.ops.push_str(&format!("/{} gs\n", name));
        self.ops.push_str("BT\n");
        self.ops
            .push_str(&format!("/F1 {} Tf\n{} TL\n", fmt_num(font_size), fmt_num(leading)));
        self.ops.push_str(&format!(
            "1 0 0 1 {} {} Tm\n",
            fmt_num(margin),
            fmt_num(self.size.height - margin - font_size)
        ));
        for (idx, line) in lines.iter().enumerate() {
            if idx > 0 {
                self.ops.push_str("T*\n");
            }
            self.ops
                .push_str(&format!("({}) Tj\n", encode_winansi_string(line)));
        }
        self.ops.push_str("ET\nQ\n");
    }

    // Page space is y-up; strokes are authored y-down.
    fn push_flip(&mut self) {
        self.ops
            .push_str(&format!("1 0 0 -1 0 {} cm\n", fmt_num(self.size.height)));
    }

    fn opacity_state(&mut self, alpha: f32) -> String {
        let milli = ((alpha * 1000.0).round() as i32).clamp(0, 1000) as u16;
        self.opacities.insert(milli);
        gs_name(milli)
    }
}

fn gs_name(milli: u16) -> String {
    format!("GS{}", milli)
}

struct PdfPathSink<'a> {
    out: &'a mut String,
    current: Point,
    start: Point,
}

impl CurveSink for PdfPathSink<'_> {
    fn move_to(&mut self, p: Point) {
        self.out
            .push_str(&format!("{} {} m\n", fmt_num(p.x), fmt_num(p.y)));
        self.current = p;
        self.start = p;
    }

    fn quad_to(&mut self, ctrl: Point, to: Point) {
        // PDF has no quadratic segment; degree-elevate to the equivalent cubic.
        let c1 = self.current + (ctrl - self.current) * (2.0 / 3.0);
        let c2 = to + (ctrl - to) * (2.0 / 3.0);
        self.out.push_str(&format!(
            "{} {} {} {} {} {} c\n",
            fmt_num(c1.x),
            fmt_num(c1.y),
            fmt_num(c2.x),
            fmt_num(c2.y),
            fmt_num(to.x),
            fmt_num(to.y)
        ));
        self.current = to;
    }

    fn line_to(&mut self, p: Point) {
        self.out
            .push_str(&format!("{} {} l\n", fmt_num(p.x), fmt_num(p.y)));
        self.current = p;
    }

    fn close(&mut self) {
        self.out.push_str("h\n");
        self.current = self.start;
    }
}

/// Reads the path operators of a content stream back into quadratic segments.
#[cfg(test)]
pub(crate) fn content_path_segments(ops: &str) -> Vec<crate::curve::PathSegment> {
    use crate::curve::PathSegment;
    let mut segments = Vec::new();
    let mut current = Point::ZERO;
    for line in ops.lines() {
        let mut fields: Vec<&str> = line.split_whitespace().collect();
        let Some(op) = fields.pop() else {
            continue;
        };
        let nums: Vec<f64> = fields.iter().filter_map(|f| f.parse().ok()).collect();
        match (op, nums.as_slice()) {
            ("m", [x, y]) => {
                current = Point::new(*x, *y);
                segments.push(PathSegment::MoveTo(current));
            }
            ("c", [c1x, c1y, _, _, x, y]) => {
                let ctrl = current + (Point::new(*c1x, *c1y) - current) * 1.5;
                current = Point::new(*x, *y);
                segments.push(PathSegment::QuadTo { ctrl, to: current });
            }
            ("l", [x, y]) => {
                current = Point::new(*x, *y);
                segments.push(PathSegment::LineTo(current));
            }
            ("h", []) => segments.push(PathSegment::Close),
            _ => {}
        }
    }
    segments
}

/// A paginated vector document assembled from [`PageContent`]s.
#[derive(Debug, Clone, Default)]
pub struct PdfDocument {
    title: Option<String>,
    pages: Vec<PageContent>,
}

impl PdfDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    pub fn push_page(&mut self, page: PageContent) {
        self.pages.push(page);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[PageContent] {
        &self.pages
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let opacities: BTreeSet<u16> = self
            .pages
            .iter()
            .flat_map(|page| page.opacities.iter().copied())
            .collect();

        let gs_start = PDF_FONT_ID + 1;
        let page_start = gs_start + opacities.len();
        let info_id = page_start + self.pages.len() * 2;

        let mut objects: Vec<String> = Vec::with_capacity(info_id);
        objects.push(format!("<< /Type /Catalog /Pages {} 0 R >>", PDF_PAGES_ID));
        let kids: Vec<String> = (0..self.pages.len())
            .map(|idx| format!("{} 0 R", page_start + idx * 2))
            .collect();
        objects.push(format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            self.pages.len()
        ));

        let gs_entries: Vec<String> = opacities
            .iter()
            .enumerate()
            .map(|(idx, milli)| format!("/{} {} 0 R", gs_name(*milli), gs_start + idx))
            .collect();
        objects.push(format!(
            "<< /Font << /F1 {} 0 R >> /ExtGState << {} >> >>",
            PDF_FONT_ID,
            gs_entries.join(" ")
        ));
        objects.push(
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        );
        for milli in &opacities {
            let alpha = fmt_num(*milli as f64 / 1000.0);
            objects.push(format!(
                "<< /Type /ExtGState /ca {} /CA {} >>",
                alpha, alpha
            ));
        }

        for (idx, page) in self.pages.iter().enumerate() {
            let content_id = page_start + idx * 2 + 1;
            objects.push(format!(
                "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources {} 0 R /Contents {} 0 R >>",
                PDF_PAGES_ID,
                fmt_num(page.size.width),
                fmt_num(page.size.height),
                PDF_RESOURCES_ID,
                content_id
            ));
            objects.push(stream_object(&page.ops));
        }

        objects.push(info_object(self.title.as_deref()));
        build_pdf(objects, PDF_CATALOG_ID, info_id)
    }
}

fn stream_object(content: &str) -> String {
    let length = content.len();
    format!("<< /Length {} >>\nstream\n{}\nendstream", length, content)
}

fn info_object(title: Option<&str>) -> String {
    let mut entries: Vec<String> = Vec::new();
    if let Some(title) = title {
        entries.push(format!("/Title ({})", encode_winansi_string(title)));
    }
    entries.push(format!("/Producer ({})", PRODUCER));
    format!("<< {} >>", entries.join(" "))
}

fn build_pdf(objects: Vec<String>, catalog_id: usize, info_id: usize) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.7\n");
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (index, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        out.extend_from_slice(obj.as_bytes());
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF",
            objects.len() + 1,
            catalog_id,
            info_id,
            xref_start
        )
        .as_bytes(),
    );
    out
}

fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
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
    }
    lines
}

/// Escapes a literal string for a WinAnsi Helvetica font. Latin-1 characters become octal
/// escapes; anything outside Latin-1 is replaced with `?`.
fn encode_winansi_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ' '..='~' => out.push(ch),
            '\u{a0}'..='\u{ff}' => out.push_str(&format!("\\{:03o}", ch as u32)),
            _ => out.push('?'),
        }
    }
    out
}

fn clamp_unit(value: f32) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{PathSegment, assert_segments_close, fit_curve};
    use crate::inspect::summarize_pdf;
    use crate::outline::outline_points;
    use crate::types::{PenStyle, StrokePoint};

    fn triangle_path() -> CurvePath {
        fit_curve(
            &[
                Point::new(10.0, 10.0),
                Point::new(40.0, 10.0),
                Point::new(25.0, 40.0),
            ],
            1.0,
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn empty_document_is_still_well_formed() {
        let bytes = PdfDocument::new().to_bytes();
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(bytes.ends_with(b"%%EOF"));
    }

    #[test]
    fn pages_are_written_with_their_media_boxes() {
        let mut doc = PdfDocument::new().with_title("Notes (draft)");
        doc.push_page(PageContent::new(Size::a4()));
        doc.push_page(PageContent::new(Size::letter()));
        let bytes = doc.to_bytes();
        let summary = summarize_pdf(&bytes).unwrap();
        assert_eq!(summary.page_count(), 2);
        let close = |(w, h): (f64, f64), size: Size| {
            (w - size.width).abs() < 0.01 && (h - size.height).abs() < 0.01
        };
        assert!(close(summary.page_sizes[0], Size::a4()));
        assert!(close(summary.page_sizes[1], Size::letter()));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Title (Notes \\(draft\\))"));
    }

    #[test]
    fn fill_path_flips_into_page_space_and_elevates_quadratics() {
        let mut page = PageContent::new(Size::new(100.0, 200.0));
        page.fill_path(&triangle_path(), Color::rgb(1.0, 0.0, 0.0));
        let ops = page.operators();
        assert!(ops.starts_with("q\n1 0 0 -1 0 200 cm\n1 0 0 rg\n10 10 m\n"));
        // Quadratic from (10,10) via (40,10) to (32.5,25).
        assert!(ops.contains("30 10 37.5 15 32.5 25 c\n"));
        assert!(ops.contains("25 40 l\nh\nf\nQ\n"));
        assert!(!ops.contains(" gs"));
    }

    #[test]
    fn fill_path_cubics_are_exact_elevations_of_the_trace() {
        let points: Vec<_> = (0..30)
            .map(|i| {
                let t = i as f64 * 0.2;
                let pressure = 0.4 + 0.02 * i as f64;
                StrokePoint::new(200.0 + t * 40.0, 300.0 + t.sin() * 80.0, pressure)
            })
            .collect();
        let outline = outline_points(&points, PenStyle::Pressure, 8.0);
        let traced = fit_curve(&outline, 0.5, 0.5).unwrap();
        let mut page = PageContent::new(Size::new(702.0, 936.0));
        page.fill_path(&traced, Color::BLACK);

        let ops = page.operators();
        let cubics: Vec<&str> = ops.lines().filter(|l| l.ends_with(" c")).collect();
        let quads: Vec<_> = traced
            .segments()
            .iter()
            .filter_map(|s| match *s {
                PathSegment::QuadTo { ctrl, to } => Some((ctrl, to)),
                _ => None,
            })
            .collect();
        assert_eq!(cubics.len(), quads.len());

        // Second control point sits two thirds of the way from the end point to the control.
        for (line, (ctrl, to)) in cubics.iter().zip(&quads) {
            let nums: Vec<f64> = line
                .split_whitespace()
                .filter_map(|f| f.parse().ok())
                .collect();
            let c2 = *to + (*ctrl - *to) * (2.0 / 3.0);
            assert!((nums[2] - c2.x).abs() < 1e-3 && (nums[3] - c2.y).abs() < 1e-3, "{line}");
            assert!((nums[4] - to.x).abs() < 1e-3 && (nums[5] - to.y).abs() < 1e-3, "{line}");
        }
        assert_segments_close(&content_path_segments(ops), traced.segments(), 3e-3);
    }

    #[test]
    fn translucent_fill_registers_ext_gstate() {
        let mut page = PageContent::new(Size::a4());
        let mut color = Color::rgb(0.0, 0.0, 1.0);
        color.a = 0.5;
        page.fill_path(&triangle_path(), color);
        let mut doc = PdfDocument::new();
        doc.push_page(page);
        let text = String::from_utf8_lossy(&doc.to_bytes()).to_string();
        assert!(text.contains("/GS500 gs"));
        assert!(text.contains("/Type /ExtGState /ca 0.5 /CA 0.5"));
    }

    #[test]
    fn invisible_text_is_wrapped_and_zero_opacity() {
        let mut page = PageContent::new(Size::new(200.0, 300.0));
        page.invisible_text("alpha beta gamma delta (epsilon) caf\u{e9} \u{4e2d}", 50.0, 10.0);
        let ops = page.operators();
        assert!(ops.contains("/GS0 gs"));
        assert!(ops.contains("/F1 10 Tf"));
        assert!(ops.contains("1 0 0 1 50 240 Tm"));
        assert!(ops.contains("T*"));
        assert!(ops.contains("\\(epsilon\\)"));
        assert!(ops.contains("caf\\351"));
        assert!(ops.contains('?'));
    }

    #[test]
    fn wrap_text_breaks_on_words_and_keeps_long_words() {
        assert_eq!(
            wrap_text("one two three\nfour", 8),
            vec!["one two", "three", "four"]
        );
        assert_eq!(wrap_text("incomprehensibilities", 5), vec!["incomprehensibilities"]);
        assert!(wrap_text("   \n  ", 10).is_empty());
    }
}
