use crate::curve::fit_curve;
use crate::outline::stroke_outline;
use crate::pdf::{PageContent, PdfDocument};
use crate::types::{Color, Size, Stroke};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const OVERLAY_MARGIN: f64 = 50.0;
const OVERLAY_FONT_SIZE: f64 = 12.0;

/// Output page size for vector documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    /// The logical page, one point per logical unit.
    #[default]
    Original,
    A4,
    Letter,
}

impl PageSize {
    pub fn dimensions(self) -> Size {
        match self {
            PageSize::Original => Size::logical_page(),
            PageSize::A4 => Size::a4(),
            PageSize::Letter => Size::letter(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageSize::Original => "original",
            PageSize::A4 => "a4",
            PageSize::Letter => "letter",
        }
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "original" => Ok(PageSize::Original),
            "a4" => Ok(PageSize::A4),
            "letter" => Ok(PageSize::Letter),
            other => Err(format!("unknown page size {other:?}")),
        }
    }
}

/// A stroke's fill path as SVG path data.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPath {
    pub data: String,
    pub color: Color,
}

/// Vector emission for one stroke at `(scale_x, scale_y)`; `None` when the outline is empty.
pub fn vector_path(stroke: &Stroke, scale_x: f64, scale_y: f64) -> Option<VectorPath> {
    let outline = stroke_outline(stroke);
    let path = fit_curve(&outline, scale_x, scale_y)?;
    Some(VectorPath {
        data: path.to_svg_path_data(),
        color: stroke.fill_color(),
    })
}

/// Builds one page of vector output. Outlines are computed in logical space and only the
/// fitted curve is scaled onto the target size.
pub fn render_page_content(
    strokes: &[Stroke],
    page_size: PageSize,
    transcription: Option<&str>,
) -> PageContent {
    let size = page_size.dimensions();
    let (scale_x, scale_y) = size.scale_from_logical();
    let mut page = PageContent::new(size);
    for stroke in strokes {
        let outline = stroke_outline(stroke);
        if let Some(path) = fit_curve(&outline, scale_x, scale_y) {
            page.fill_path(&path, stroke.fill_color());
        }
    }
    if let Some(text) = transcription.filter(|text| !text.trim().is_empty()) {
        page.invisible_text(text, OVERLAY_MARGIN, OVERLAY_FONT_SIZE);
    }
    page
}

/// Appends a page for `strokes` to `doc`, with an invisible searchable text layer when a
/// non-blank transcription is given.
pub fn render_page_to_document(
    doc: &mut PdfDocument,
    strokes: &[Stroke],
    page_size: PageSize,
    transcription: Option<&str>,
) {
    doc.push_page(render_page_content(strokes, page_size, transcription));
}
