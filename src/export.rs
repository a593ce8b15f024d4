use crate::error::InkError;
use crate::pdf::{PageContent, PdfDocument};
use crate::perf::{PerfLogger, timed};
use crate::raster::{RenderTarget, render_page_png};
use crate::source::PageSource;
use crate::vector::{PageSize, render_page_content, render_page_to_document};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_MAX_EXPORT_SCALE: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PdfExportOptions {
    pub include_transcription: bool,
    pub page_size: PageSize,
}

impl PdfExportOptions {
    pub fn new(include_transcription: bool, page_size: PageSize) -> Self {
        Self {
            include_transcription,
            page_size,
        }
    }
}

/// Downloadable PNG and PDF output for single pages and whole notebooks.
pub struct ExportService {
    pages: Arc<dyn PageSource>,
    max_scale: f64,
    perf: Option<PerfLogger>,
}

impl ExportService {
    pub fn new(pages: Arc<dyn PageSource>) -> Self {
        Self {
            pages,
            max_scale: DEFAULT_MAX_EXPORT_SCALE,
            perf: None,
        }
    }

    pub fn with_max_scale(mut self, max_scale: f64) -> Self {
        self.max_scale = max_scale;
        self
    }

    pub fn with_perf(mut self, perf: Option<PerfLogger>) -> Self {
        self.perf = perf;
        self
    }

    /// PNG of the whole logical page at `scale`. `None` only when the page is unknown;
    /// a page without strokes yields a blank white image.
    pub fn export_page_png(&self, page_id: &str, scale: f64) -> Result<Option<Vec<u8>>, InkError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(InkError::InvalidScale(scale));
        }
        let Some(strokes) = self.pages.strokes(page_id) else {
            return Ok(None);
        };
        let effective = scale.min(self.max_scale);
        if effective < scale {
            log::debug!("export scale {scale} clamped to {effective} for page {page_id}");
        }
        let target = RenderTarget::logical_page(effective);
        let bytes = timed(self.perf.as_ref(), "export.png", Some(page_id), || {
            render_page_png(&strokes, &target)
        })?;
        log::info!(
            "exported page {page_id} as {}x{} png ({} bytes)",
            target.width,
            target.height,
            bytes.len()
        );
        Ok(Some(bytes))
    }

    /// Single-page PDF sized per `options.page_size`. `None` only when the page is unknown.
    pub fn export_page_pdf(
        &self,
        page_id: &str,
        options: &PdfExportOptions,
    ) -> Result<Option<Vec<u8>>, InkError> {
        let Some(strokes) = self.pages.strokes(page_id) else {
            return Ok(None);
        };
        let transcription = self.transcription_for(page_id, options);
        let bytes = timed(self.perf.as_ref(), "export.page_pdf", Some(page_id), || {
            let mut doc = PdfDocument::new().with_title(page_id);
            render_page_to_document(
                &mut doc,
                &strokes,
                options.page_size,
                transcription.as_deref(),
            );
            doc.to_bytes()
        });
        log::info!(
            "exported page {page_id} as {} pdf ({} bytes)",
            options.page_size.as_str(),
            bytes.len()
        );
        Ok(Some(bytes))
    }

    /// One output page per id in `page_ids`, in that order. `None` iff `page_ids` is empty.
    pub fn export_notebook_pdf(
        &self,
        notebook_id: &str,
        page_ids: &[String],
        options: &PdfExportOptions,
    ) -> Result<Option<Vec<u8>>, InkError> {
        let Some(doc) = self.notebook_document(notebook_id, page_ids, options) else {
            return Ok(None);
        };
        let bytes = timed(self.perf.as_ref(), "export.notebook_pdf", None, || {
            doc.to_bytes()
        });
        log::info!(
            "exported notebook {notebook_id}: {} pages ({} bytes)",
            doc.page_count(),
            bytes.len()
        );
        Ok(Some(bytes))
    }

    pub(crate) fn notebook_document(
        &self,
        notebook_id: &str,
        page_ids: &[String],
        options: &PdfExportOptions,
    ) -> Option<PdfDocument> {
        if page_ids.is_empty() {
            return None;
        }
        let title = self
            .pages
            .container(notebook_id)
            .map(|info| info.title)
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| notebook_id.to_string());

        let contents: Vec<PageContent> = page_ids
            .par_iter()
            .map(|page_id| match self.pages.strokes(page_id) {
                Some(strokes) => {
                    let transcription = self.transcription_for(page_id, options);
                    render_page_content(&strokes, options.page_size, transcription.as_deref())
                }
                None => {
                    log::warn!(
                        "notebook {notebook_id}: strokes for page {page_id} unavailable, exporting a blank page"
                    );
                    render_page_content(&[], options.page_size, None)
                }
            })
            .collect();

        let mut doc = PdfDocument::new().with_title(title);
        for content in contents {
            doc.push_page(content);
        }
        Some(doc)
    }

    fn transcription_for(&self, page_id: &str, options: &PdfExportOptions) -> Option<String> {
        if !options.include_transcription {
            return None;
        }
        self.pages.transcription_text(page_id)
    }
}

/// Download filename for a notebook export: non-alphanumerics become `_`.
pub fn export_filename(title: &str) -> String {
    download_filename(title, "pdf")
}

pub(crate) fn download_filename(title: &str, extension: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();
    if stem.is_empty() {
        format!("notebook.{extension}")
    } else {
        format!("{stem}.{extension}")
    }
}
