use crate::error::InkError;
use crate::perf::{PerfLogger, timed};
use crate::raster::{RenderTarget, render_page};
use crate::source::PageSource;
use base64::Engine;
use image::{GrayImage, ImageFormat, Luma};
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;

/// Half the full export resolution in each axis.
pub const DEFAULT_RECOGNITION_SCALE: f64 = 0.5;

/// Image handed to the external recognition collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RecognitionImage {
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }
}

pub struct RecognitionPreparer {
    pages: Arc<dyn PageSource>,
    scale: f64,
    perf: Option<PerfLogger>,
}

impl RecognitionPreparer {
    pub fn new(pages: Arc<dyn PageSource>) -> Self {
        Self {
            pages,
            scale: DEFAULT_RECOGNITION_SCALE,
            perf: None,
        }
    }

    /// `scale` must lie in `(0, 1]`.
    pub fn with_scale(mut self, scale: f64) -> Result<Self, InkError> {
        if !scale.is_finite() || scale <= 0.0 || scale > 1.0 {
            return Err(InkError::InvalidConfiguration(format!(
                "recognition scale {scale} must be in (0, 1]"
            )));
        }
        self.scale = scale;
        Ok(self)
    }

    pub fn with_perf(mut self, perf: Option<PerfLogger>) -> Self {
        self.perf = perf;
        self
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Grayscale PNG of the page; `None` when the page is unknown or has no strokes.
    pub fn render_for_recognition(
        &self,
        page_id: &str,
    ) -> Result<Option<RecognitionImage>, InkError> {
        let Some(strokes) = self.pages.strokes(page_id) else {
            return Ok(None);
        };
        if strokes.is_empty() {
            return Ok(None);
        }
        let target = RenderTarget::logical_page(self.scale);
        let image = timed(self.perf.as_ref(), "recognition.render", Some(page_id), || {
            let (pixmap, _) = render_page(&strokes, &target)?;
            grayscale_png(&pixmap)
        })?;
        log::debug!(
            "prepared {}x{} recognition image for page {page_id}",
            image.width,
            image.height
        );
        Ok(Some(image))
    }
}

fn grayscale_png(pixmap: &Pixmap) -> Result<RecognitionImage, InkError> {
    let (width, height) = (pixmap.width(), pixmap.height());
    let pixels = pixmap.pixels();
    let gray = GrayImage::from_fn(width, height, |x, y| {
        let idx = (y as usize) * (width as usize) + x as usize;
        // Pages are composited onto opaque white, so premultiplied channels are final colors.
        let p = pixels[idx];
        let luma =
            0.299 * f32::from(p.red()) + 0.587 * f32::from(p.green()) + 0.114 * f32::from(p.blue());
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    });
    let mut png = Vec::new();
    gray.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| InkError::Encode(format!("grayscale png encode failed: {e}")))?;
    Ok(RecognitionImage { png, width, height })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryPageSource;
    use crate::types::{Stroke, StrokePoint};

    fn preparer() -> RecognitionPreparer {
        let source = Arc::new(InMemoryPageSource::new());
        source.add_page("nb", "empty", Vec::new());
        let points = (0..20)
            .map(|i| StrokePoint::new(200.0 + i as f64 * 40.0, 600.0, 0.5))
            .collect();
        source.add_page(
            "nb",
            "written",
            vec![Stroke::new("s", points, 12.0).with_color("#d32f2f")],
        );
        RecognitionPreparer::new(source)
    }

    #[test]
    fn unknown_and_empty_pages_have_no_image() {
        let preparer = preparer();
        assert!(preparer.render_for_recognition("missing").unwrap().is_none());
        assert!(preparer.render_for_recognition("empty").unwrap().is_none());
    }

    #[test]
    fn image_is_reduced_grayscale_png() {
        let prepared = preparer().render_for_recognition("written").unwrap().unwrap();
        assert_eq!((prepared.width, prepared.height), (702, 936));
        let decoded = image::load_from_memory(&prepared.png).unwrap();
        assert_eq!(decoded.color(), image::ColorType::L8);
        assert_eq!((decoded.width(), decoded.height()), (702, 936));
        let gray = decoded.to_luma8();
        assert!(gray.pixels().any(|p| p.0[0] < 200));
        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn data_uri_wraps_png_bytes() {
        let prepared = preparer().render_for_recognition("written").unwrap().unwrap();
        let uri = prepared.to_data_uri();
        let payload = uri.strip_prefix("data:image/png;base64,").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        assert_eq!(decoded, prepared.png);
    }

    #[test]
    fn scale_must_stay_within_unit_interval() {
        assert!(preparer().with_scale(0.0).is_err());
        assert!(preparer().with_scale(1.5).is_err());
        assert!(preparer().with_scale(f64::NAN).is_err());
        let full = preparer().with_scale(1.0).unwrap();
        let prepared = full.render_for_recognition("written").unwrap().unwrap();
        assert_eq!((prepared.width, prepared.height), (1404, 1872));
    }
}
