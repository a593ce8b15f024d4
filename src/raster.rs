use crate::curve::{CurvePath, CurveSink, fit_curve};
use crate::error::InkError;
use crate::outline::stroke_outline;
use crate::types::{Color, LOGICAL_PAGE_HEIGHT, LOGICAL_PAGE_WIDTH, Point, Stroke};
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};

/// Output pixel size plus the factors mapping logical units into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl RenderTarget {
    pub fn new(width: u32, height: u32, scale_x: f64, scale_y: f64) -> Self {
        Self {
            width,
            height,
            scale_x,
            scale_y,
        }
    }

    /// The whole logical page at a uniform `scale`; dimensions round half away from zero.
    pub fn logical_page(scale: f64) -> Self {
        Self {
            width: scaled_dimension(LOGICAL_PAGE_WIDTH, scale),
            height: scaled_dimension(LOGICAL_PAGE_HEIGHT, scale),
            scale_x: scale,
            scale_y: scale,
        }
    }

    /// The whole logical page at a fixed pixel width, preserving its aspect ratio.
    pub fn fit_width(width: u32) -> Self {
        let scale = width as f64 / LOGICAL_PAGE_WIDTH;
        Self {
            width,
            height: scaled_dimension(LOGICAL_PAGE_HEIGHT, scale),
            scale_x: scale,
            scale_y: scale,
        }
    }
}

fn scaled_dimension(base: f64, scale: f64) -> u32 {
    let exact = base * scale;
    if exact.is_finite() && exact > 0.0 {
        exact.round().clamp(1.0, u32::MAX as f64) as u32
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderMetrics {
    pub strokes_drawn: usize,
    pub strokes_skipped: usize,
    pub outline_points: usize,
}

/// Paints `strokes` in order onto an opaque white pixmap.
pub fn render_page(
    strokes: &[Stroke],
    target: &RenderTarget,
) -> Result<(Pixmap, RenderMetrics), InkError> {
    let mut pixmap = Pixmap::new(target.width, target.height).ok_or_else(|| {
        InkError::InvalidConfiguration(format!(
            "invalid raster size {}x{}",
            target.width, target.height
        ))
    })?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let mut metrics = RenderMetrics::default();
    for stroke in strokes {
        let outline = stroke_outline(stroke);
        metrics.outline_points += outline.len();
        match fit_curve(&outline, target.scale_x, target.scale_y) {
            Some(path) if fill_curve(&mut pixmap, &path, stroke.fill_color()) => {
                metrics.strokes_drawn += 1;
            }
            _ => metrics.strokes_skipped += 1,
        }
    }
    log::debug!(
        "rendered {}x{} page: {} strokes drawn, {} skipped",
        target.width,
        target.height,
        metrics.strokes_drawn,
        metrics.strokes_skipped
    );
    Ok((pixmap, metrics))
}

/// Renders and encodes to PNG.
pub fn render_page_png(strokes: &[Stroke], target: &RenderTarget) -> Result<Vec<u8>, InkError> {
    let (pixmap, _) = render_page(strokes, target)?;
    encode_png(&pixmap)
}

pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, InkError> {
    pixmap
        .encode_png()
        .map_err(|e| InkError::Encode(format!("png encode failed: {e}")))
}

/// Draws one traced outline; false when the path collapses to nothing drawable.
pub fn fill_curve(pixmap: &mut Pixmap, path: &CurvePath, color: Color) -> bool {
    let Some(path) = skia_path(path) else {
        return false;
    };
    let paint = fill_paint(color);
    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    true
}

pub(crate) fn skia_path(path: &CurvePath) -> Option<tiny_skia::Path> {
    let mut sink = SkiaPathSink::default();
    path.replay(&mut sink);
    sink.builder.finish()
}

/// Segments of a tiny-skia path in crate terms; cubics never occur in traced outlines.
#[cfg(test)]
pub(crate) fn skia_segments(path: &tiny_skia::Path) -> Vec<crate::curve::PathSegment> {
    use crate::curve::PathSegment;
    let point = |p: tiny_skia::Point| Point::new(f64::from(p.x), f64::from(p.y));
    path.segments()
        .map(|segment| match segment {
            tiny_skia::PathSegment::MoveTo(p) => PathSegment::MoveTo(point(p)),
            tiny_skia::PathSegment::LineTo(p) => PathSegment::LineTo(point(p)),
            tiny_skia::PathSegment::QuadTo(ctrl, to) => PathSegment::QuadTo {
                ctrl: point(ctrl),
                to: point(to),
            },
            tiny_skia::PathSegment::CubicTo(..) => panic!("unexpected cubic segment"),
            tiny_skia::PathSegment::Close => PathSegment::Close,
        })
        .collect()
}

#[derive(Default)]
struct SkiaPathSink {
    builder: PathBuilder,
}

impl CurveSink for SkiaPathSink {
    fn move_to(&mut self, p: Point) {
        self.builder.move_to(p.x as f32, p.y as f32);
    }

    fn quad_to(&mut self, ctrl: Point, to: Point) {
        self.builder
            .quad_to(ctrl.x as f32, ctrl.y as f32, to.x as f32, to.y as f32);
    }

    fn line_to(&mut self, p: Point) {
        self.builder.line_to(p.x as f32, p.y as f32);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn fill_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_sk_color(color));
    paint.anti_alias = true;
    paint
}

fn to_sk_color(color: Color) -> tiny_skia::Color {
    let r = color.r.clamp(0.0, 1.0);
    let g = color.g.clamp(0.0, 1.0);
    let b = color.b.clamp(0.0, 1.0);
    let a = color.a.clamp(0.0, 1.0);
    tiny_skia::Color::from_rgba(r, g, b, a)
        .unwrap_or_else(|| tiny_skia::Color::from_rgba8(0, 0, 0, 255))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::PathSegment;
    use crate::types::{PenStyle, StrokePoint};

    fn horizontal(id: &str, color: &str) -> Stroke {
        let points = (0..=20)
            .map(|i| StrokePoint::new(100.0 + i as f64 * 10.0, 100.0, 0.5))
            .collect();
        Stroke::new(id, points, 20.0)
            .with_color(color)
            .with_pen_style(PenStyle::Uniform)
    }

    fn has_non_white_pixel(pixmap: &Pixmap) -> bool {
        pixmap
            .pixels()
            .iter()
            .any(|p| !(p.red() == 255 && p.green() == 255 && p.blue() == 255))
    }

    #[test]
    fn skia_path_follows_traced_segments() {
        let stroke = horizontal("a", "").with_pen_style(PenStyle::Pressure);
        let traced = fit_curve(&stroke_outline(&stroke), 0.5, 0.5).unwrap();
        let skia = skia_path(&traced).unwrap();
        let expected: Vec<_> = traced
            .segments()
            .iter()
            .map(|segment| match *segment {
                PathSegment::MoveTo(p) => PathSegment::MoveTo(as_f32(p)),
                PathSegment::LineTo(p) => PathSegment::LineTo(as_f32(p)),
                PathSegment::QuadTo { ctrl, to } => PathSegment::QuadTo {
                    ctrl: as_f32(ctrl),
                    to: as_f32(to),
                },
                PathSegment::Close => PathSegment::Close,
            })
            .collect();
        assert_eq!(skia_segments(&skia), expected);
    }

    fn as_f32(p: Point) -> Point {
        Point::new(f64::from(p.x as f32), f64::from(p.y as f32))
    }

    #[test]
    fn blank_page_is_opaque_white() {
        let (pixmap, metrics) = render_page(&[], &RenderTarget::new(40, 30, 1.0, 1.0)).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (40, 30));
        assert!(!has_non_white_pixel(&pixmap));
        assert!(pixmap.pixels().iter().all(|p| p.alpha() == 255));
        assert_eq!(metrics, RenderMetrics::default());
    }

    #[test]
    fn strokes_paint_non_white_pixels() {
        let (pixmap, metrics) =
            render_page(&[horizontal("a", "")], &RenderTarget::logical_page(0.5)).unwrap();
        assert!(has_non_white_pixel(&pixmap));
        assert_eq!(metrics.strokes_drawn, 1);
    }

    #[test]
    fn later_strokes_paint_over_earlier_ones() {
        let strokes = [horizontal("red", "#ff0000"), horizontal("blue", "#0000ff")];
        let (pixmap, _) = render_page(&strokes, &RenderTarget::logical_page(1.0)).unwrap();
        let px = pixmap.pixel(200, 100).unwrap();
        assert_eq!((px.red(), px.green(), px.blue()), (0, 0, 255));
    }

    #[test]
    fn empty_strokes_are_skipped_without_effect() {
        let target = RenderTarget::new(64, 64, 1.0, 1.0);
        let blank = render_page_png(&[], &target).unwrap();
        let empty = Stroke::new("empty", Vec::new(), 3.0);
        let (pixmap, metrics) = render_page(&[empty], &target).unwrap();
        assert_eq!(metrics.strokes_skipped, 1);
        assert_eq!(encode_png(&pixmap).unwrap(), blank);
    }

    #[test]
    fn zero_sized_target_is_rejected() {
        let err = render_page(&[], &RenderTarget::new(0, 10, 1.0, 1.0)).unwrap_err();
        assert!(matches!(err, InkError::InvalidConfiguration(_)));
    }

    #[test]
    fn png_output_has_signature_and_grows_with_scale() {
        let strokes = [horizontal("a", "#222222")];
        let small = render_page_png(&strokes, &RenderTarget::logical_page(1.0)).unwrap();
        let large = render_page_png(&strokes, &RenderTarget::logical_page(2.0)).unwrap();
        assert!(small.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]));
        assert!(large.len() > small.len());
        let decoded = image::load_from_memory(&large).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (2808, 3744));
    }

    #[test]
    fn fit_width_preserves_aspect_ratio() {
        let target = RenderTarget::fit_width(200);
        assert_eq!((target.width, target.height), (200, 267));
        assert!((target.scale_x - 200.0 / 1404.0).abs() < 1e-12);
        assert_eq!(RenderTarget::logical_page(0.0).width, 0);
    }
}
