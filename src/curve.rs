//! Curve fitting shared by raster and vector output.
//!
//! An outline is traced once into a [`CurvePath`]; every output format replays the same
//! segments through a [`CurveSink`], so raster and vector renderings cannot drift apart.

use crate::types::Point;

/// Outlines with fewer points than this produce no path at all.
pub const MIN_OUTLINE_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(Point),
    QuadTo { ctrl: Point, to: Point },
    LineTo(Point),
    Close,
}

/// Receives a traced outline in output space.
pub trait CurveSink {
    fn move_to(&mut self, p: Point);
    fn quad_to(&mut self, ctrl: Point, to: Point);
    fn line_to(&mut self, p: Point);
    fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurvePath {
    segments: Vec<PathSegment>,
}

impl CurvePath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn replay<S: CurveSink + ?Sized>(&self, sink: &mut S) {
        for segment in &self.segments {
            match *segment {
                PathSegment::MoveTo(p) => sink.move_to(p),
                PathSegment::QuadTo { ctrl, to } => sink.quad_to(ctrl, to),
                PathSegment::LineTo(p) => sink.line_to(p),
                PathSegment::Close => sink.close(),
            }
        }
    }

    /// SVG path data: `M x y`, `Q cx cy ex ey`..., `L x y`, `Z`.
    pub fn to_svg_path_data(&self) -> String {
        let mut sink = SvgPathData::default();
        self.replay(&mut sink);
        sink.finish()
    }
}

/// Traces an outline at `(scale_x, scale_y)`: move to the first point, a quadratic through
/// each interior point ending at the midpoint to its successor, a line to the last point,
/// then close. Returns `None` for outlines too small to enclose anything.
pub fn fit_curve(outline: &[Point], scale_x: f64, scale_y: f64) -> Option<CurvePath> {
    let n = outline.len();
    if n < MIN_OUTLINE_POINTS {
        return None;
    }
    let scaled: Vec<Point> = outline.iter().map(|p| p.scaled(scale_x, scale_y)).collect();
    let mut segments = Vec::with_capacity(n + 1);
    segments.push(PathSegment::MoveTo(scaled[0]));
    for i in 1..n - 1 {
        segments.push(PathSegment::QuadTo {
            ctrl: scaled[i],
            to: scaled[i].midpoint(scaled[i + 1]),
        });
    }
    segments.push(PathSegment::LineTo(scaled[n - 1]));
    segments.push(PathSegment::Close);
    Some(CurvePath { segments })
}

#[derive(Debug, Default)]
struct SvgPathData {
    parts: Vec<String>,
}

impl SvgPathData {
    fn finish(self) -> String {
        self.parts.join(" ")
    }
}

impl CurveSink for SvgPathData {
    fn move_to(&mut self, p: Point) {
        self.parts.push(format!("M {} {}", fmt_num(p.x), fmt_num(p.y)));
    }

    fn quad_to(&mut self, ctrl: Point, to: Point) {
        self.parts.push(format!(
            "Q {} {} {} {}",
            fmt_num(ctrl.x),
            fmt_num(ctrl.y),
            fmt_num(to.x),
            fmt_num(to.y)
        ));
    }

    fn line_to(&mut self, p: Point) {
        self.parts.push(format!("L {} {}", fmt_num(p.x), fmt_num(p.y)));
    }

    fn close(&mut self) {
        self.parts.push("Z".to_string());
    }
}

/// Records replayed segments verbatim.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub(crate) segments: Vec<PathSegment>,
}

#[cfg(test)]
impl CurveSink for RecordingSink {
    fn move_to(&mut self, p: Point) {
        self.segments.push(PathSegment::MoveTo(p));
    }

    fn quad_to(&mut self, ctrl: Point, to: Point) {
        self.segments.push(PathSegment::QuadTo { ctrl, to });
    }

    fn line_to(&mut self, p: Point) {
        self.segments.push(PathSegment::LineTo(p));
    }

    fn close(&mut self) {
        self.segments.push(PathSegment::Close);
    }
}

/// Reads `M`/`Q`/`L`/`Z` path data back into segments.
#[cfg(test)]
pub(crate) fn parse_svg_path(data: &str) -> Vec<PathSegment> {
    fn point(tokens: &mut std::str::SplitWhitespace<'_>) -> Point {
        let x: f64 = tokens.next().unwrap().parse().unwrap();
        let y: f64 = tokens.next().unwrap().parse().unwrap();
        Point::new(x, y)
    }

    let mut tokens = data.split_whitespace();
    let mut segments = Vec::new();
    while let Some(command) = tokens.next() {
        let segment = match command {
            "M" => PathSegment::MoveTo(point(&mut tokens)),
            "Q" => {
                let ctrl = point(&mut tokens);
                PathSegment::QuadTo { ctrl, to: point(&mut tokens) }
            }
            "L" => PathSegment::LineTo(point(&mut tokens)),
            "Z" => PathSegment::Close,
            other => panic!("unexpected path command {other:?}"),
        };
        segments.push(segment);
    }
    segments
}

/// Asserts both lists have the same segment kinds with coordinates within `tolerance`.
#[cfg(test)]
pub(crate) fn assert_segments_close(
    actual: &[PathSegment],
    expected: &[PathSegment],
    tolerance: f64,
) {
    assert_eq!(actual.len(), expected.len(), "segment count");
    let near =
        |a: Point, b: Point| (a.x - b.x).abs() <= tolerance && (a.y - b.y).abs() <= tolerance;
    for (index, (a, b)) in actual.iter().zip(expected).enumerate() {
        let same = match (*a, *b) {
            (PathSegment::MoveTo(p), PathSegment::MoveTo(q))
            | (PathSegment::LineTo(p), PathSegment::LineTo(q)) => near(p, q),
            (
                PathSegment::QuadTo { ctrl: c1, to: t1 },
                PathSegment::QuadTo { ctrl: c2, to: t2 },
            ) => near(c1, c2) && near(t1, t2),
            (PathSegment::Close, PathSegment::Close) => true,
            _ => false,
        };
        assert!(same, "segment {index}: {a:?} != {b:?}");
    }
}

/// Formats a coordinate rounded to thousandths with trailing zeros trimmed.
pub(crate) fn fmt_num(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let milli = (value * 1000.0).round();
    let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.unsigned_abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}
