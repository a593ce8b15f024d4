use lopdf::{Document, Object};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("not a readable pdf: {0}")]
    Unreadable(String),
    #[error("encrypted pdf documents cannot be inspected")]
    Encrypted,
}

/// What an exported document looks like from a reader's side.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfSummary {
    pub version: String,
    /// `(width, height)` in points, one entry per page in reading order.
    pub page_sizes: Vec<(f64, f64)>,
    pub title: Option<String>,
    pub byte_len: usize,
}

impl PdfSummary {
    pub fn page_count(&self) -> usize {
        self.page_sizes.len()
    }
}

/// Parses `bytes` with `lopdf` and summarizes pages and document info.
pub fn summarize_pdf(bytes: &[u8]) -> Result<PdfSummary, InspectError> {
    let doc = Document::load_mem(bytes).map_err(|e| InspectError::Unreadable(e.to_string()))?;
    if doc.is_encrypted() {
        return Err(InspectError::Encrypted);
    }
    let page_sizes = doc
        .get_pages()
        .into_values()
        .map(|id| {
            doc.get_dictionary(id)
                .and_then(|page| page.get(b"MediaBox"))
                .and_then(Object::as_array)
                .ok()
                .and_then(|rect| rect_size(rect))
                .unwrap_or((0.0, 0.0))
        })
        .collect();
    Ok(PdfSummary {
        version: doc.version.clone(),
        page_sizes,
        title: info_title(&doc),
        byte_len: bytes.len(),
    })
}

fn rect_size(rect: &[Object]) -> Option<(f64, f64)> {
    let [x0, y0, x1, y1] = rect else {
        return None;
    };
    Some((as_f64(x1)? - as_f64(x0)?, as_f64(y1)? - as_f64(y0)?))
}

fn as_f64(obj: &Object) -> Option<f64> {
    match *obj {
        Object::Integer(v) => Some(v as f64),
        Object::Real(v) => Some(f64::from(v)),
        _ => None,
    }
}

fn info_title(doc: &Document) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?;
    let dict = match info {
        Object::Reference(id) => doc.get_dictionary(*id).ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    match dict.get(b"Title").ok()? {
        Object::String(raw, _) => Some(raw.iter().map(|&b| char::from(b)).collect()),
        _ => None,
    }
}
