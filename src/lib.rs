mod config;
mod curve;
mod error;
mod export;
pub mod http;
mod inspect;
mod outline;
mod pdf;
mod perf;
mod raster;
mod recognition;
mod source;
mod thumbnail;
mod types;
mod vector;

pub use config::RenderConfig;
pub use curve::{CurvePath, CurveSink, MIN_OUTLINE_POINTS, PathSegment, fit_curve};
pub use error::InkError;
pub use export::{DEFAULT_MAX_EXPORT_SCALE, ExportService, PdfExportOptions, export_filename};
pub use inspect::{InspectError, PdfSummary, summarize_pdf};
pub use outline::{OutlineParams, STREAMLINE, Taper, outline_points, stroke_outline};
pub use pdf::{PageContent, PdfDocument};
pub use perf::PerfLogger;
pub use raster::{
    RenderMetrics, RenderTarget, encode_png, fill_curve, render_page, render_page_png,
};
pub use recognition::{DEFAULT_RECOGNITION_SCALE, RecognitionImage, RecognitionPreparer};
pub use source::{ContainerInfo, InMemoryPageSource, PageSource};
pub use thumbnail::{
    CacheKey, CacheStorage, DEFAULT_THUMBNAIL_WIDTH, FsCacheStorage, MemoryCacheStorage,
    THUMBNAIL_CACHE_CONTROL, THUMBNAIL_CONTENT_TYPE, ThumbnailCache, ThumbnailResponse,
    UNOWNED_CONTAINER_SEGMENT, etag_for,
};
pub use types::{
    Color, LOGICAL_PAGE_HEIGHT, LOGICAL_PAGE_WIDTH, PenStyle, Point, Size, Stroke, StrokePoint,
};
pub use vector::{PageSize, VectorPath, render_page_content, render_page_to_document, vector_path};

use std::path::PathBuf;
use std::sync::Arc;

/// Thumbnail cache, exports and recognition handoff sharing one page source.
pub struct InkRender<S: CacheStorage = FsCacheStorage> {
    pages: Arc<dyn PageSource>,
    thumbnails: ThumbnailCache<S>,
    exports: ExportService,
    recognition: RecognitionPreparer,
    perf: Option<PerfLogger>,
}

impl InkRender {
    pub fn builder(pages: Arc<dyn PageSource>) -> InkRenderBuilder {
        InkRenderBuilder::new(pages)
    }
}

impl<S: CacheStorage> InkRender<S> {
    pub fn pages(&self) -> &dyn PageSource {
        self.pages.as_ref()
    }

    pub fn thumbnails(&self) -> &ThumbnailCache<S> {
        &self.thumbnails
    }

    pub fn exports(&self) -> &ExportService {
        &self.exports
    }

    pub fn recognition(&self) -> &RecognitionPreparer {
        &self.recognition
    }

    /// Flushes the span log, if one is attached.
    pub fn flush_perf(&self) {
        if let Some(perf) = &self.perf {
            perf.flush();
        }
    }
}

pub struct InkRenderBuilder {
    pages: Arc<dyn PageSource>,
    config: RenderConfig,
}

impl InkRenderBuilder {
    pub fn new(pages: Arc<dyn PageSource>) -> Self {
        Self {
            pages,
            config: RenderConfig::default(),
        }
    }

    pub fn from_config(pages: Arc<dyn PageSource>, config: RenderConfig) -> Self {
        Self { pages, config }
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = dir.into();
        self
    }

    pub fn thumbnail_width(mut self, width: u32) -> Self {
        self.config.thumbnail_width = width;
        self
    }

    pub fn recognition_scale(mut self, scale: f64) -> Self {
        self.config.recognition_scale = scale;
        self
    }

    pub fn max_export_scale(mut self, scale: f64) -> Self {
        self.config.max_export_scale = scale;
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.perf_log = Some(path.into());
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Builds with thumbnails cached on disk under `cache_dir`.
    pub fn build(self) -> Result<InkRender, InkError> {
        let storage = FsCacheStorage::new(self.config.cache_dir.clone());
        self.build_with_storage(storage)
    }

    pub fn build_with_storage<S: CacheStorage>(self, storage: S) -> Result<InkRender<S>, InkError> {
        self.config.validate()?;
        let perf = match &self.config.perf_log {
            Some(path) => Some(PerfLogger::new(path)?),
            None => None,
        };
        let thumbnails = ThumbnailCache::new(self.pages.clone(), storage)
            .with_width(self.config.thumbnail_width)
            .with_perf(perf.clone());
        let exports = ExportService::new(self.pages.clone())
            .with_max_scale(self.config.max_export_scale)
            .with_perf(perf.clone());
        let recognition = RecognitionPreparer::new(self.pages.clone())
            .with_scale(self.config.recognition_scale)?
            .with_perf(perf.clone());
        log::debug!(
            "inkrender ready: thumbnail width {}, recognition scale {}, max export scale {}",
            self.config.thumbnail_width,
            self.config.recognition_scale,
            self.config.max_export_scale
        );
        Ok(InkRender {
            pages: self.pages,
            thumbnails,
            exports,
            recognition,
            perf,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_a() -> Stroke {
        Stroke::new(
            "a",
            vec![
                StrokePoint::new(0.0, 0.0, 0.2),
                StrokePoint::new(25.0, 25.0, 0.5),
                StrokePoint::new(50.0, 50.0, 0.8),
                StrokePoint::new(75.0, 75.0, 0.5),
                StrokePoint::new(100.0, 100.0, 0.2),
            ],
            3.0,
        )
    }

    #[test]
    fn builder_wires_services_to_one_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(InMemoryPageSource::new());
        source.add_container("nb", "Sketches");
        source.add_page("nb", "p1", vec![scenario_a()]);

        let render = InkRender::builder(source.clone())
            .cache_dir(dir.path())
            .thumbnail_width(100)
            .build()
            .unwrap();
        let thumb = render.thumbnails().generate_and_cache("p1").unwrap().unwrap();
        assert!(dir.path().join("nb").join("p1.png").is_file());
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.width(), 100);

        assert!(render.exports().export_page_pdf("p1", &PdfExportOptions::default()).unwrap().is_some());
        assert!(render.recognition().render_for_recognition("p1").unwrap().is_some());
        assert_eq!(render.pages().container("nb").unwrap().page_ids, vec!["p1"]);
    }

    #[test]
    fn invalid_settings_fail_to_build() {
        let source: Arc<dyn PageSource> = Arc::new(InMemoryPageSource::new());
        assert!(InkRender::builder(source.clone()).thumbnail_width(0).build().is_err());
        assert!(InkRender::builder(source.clone()).recognition_scale(2.0).build().is_err());
        assert!(InkRender::builder(source).max_export_scale(f64::NAN).build().is_err());
    }

    #[test]
    fn from_config_applies_json_settings() {
        let dir = tempfile::tempdir().unwrap();
        let raw = format!(
            r#"{{"thumbnail_width":64,"recognition_scale":0.25,"perf_log":{}}}"#,
            serde_json::to_string(&dir.path().join("perf.jsonl")).unwrap()
        );
        let config = RenderConfig::from_json_str(&raw).unwrap();
        let source = Arc::new(InMemoryPageSource::new());
        source.add_page("nb", "p1", vec![scenario_a()]);
        let render = InkRenderBuilder::from_config(source, config)
            .build_with_storage(MemoryCacheStorage::new())
            .unwrap();
        assert_eq!(render.thumbnails().width(), 64);
        assert_eq!(render.recognition().scale(), 0.25);
        render.thumbnails().serve("p1").unwrap().unwrap();
        render.flush_perf();
        let log = std::fs::read_to_string(dir.path().join("perf.jsonl")).unwrap();
        assert!(log.contains("\"thumbnail.render\""));
    }

    #[test]
    fn scenario_a_produces_a_closed_quadratic_path() {
        let stroke = scenario_a();
        assert!(!stroke_outline(&stroke).is_empty());
        let path = vector_path(&stroke, 1.0, 1.0).unwrap();
        assert!(path.data.starts_with('M'));
        assert!(path.data.contains('Q'));
        assert!(path.data.ends_with('Z'));
    }
}
