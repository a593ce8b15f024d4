use serde::{Deserialize, Serialize};

/// Width of the logical page every stroke is authored in.
pub const LOGICAL_PAGE_WIDTH: f64 = 1404.0;
/// Height of the logical page every stroke is authored in.
pub const LOGICAL_PAGE_HEIGHT: f64 = 1872.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_pressure")]
    pub pressure: f64, // 0..=1
}

fn default_pressure() -> f64 {
    0.5
}

impl StrokePoint {
    pub fn new(x: f64, y: f64, pressure: f64) -> Self {
        Self { x, y, pressure }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PenStyle {
    #[default]
    Pressure,
    Uniform,
    Ballpoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub id: String,
    #[serde(default)]
    pub points: Vec<StrokePoint>,
    #[serde(default)]
    pub color: String,
    pub width: f64,
    #[serde(default)]
    pub pen_style: PenStyle,
    // Unix epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
}

impl Stroke {
    pub fn new(id: impl Into<String>, points: Vec<StrokePoint>, width: f64) -> Self {
        Self {
            id: id.into(),
            points,
            color: String::new(),
            width,
            pen_style: PenStyle::Pressure,
            created_at: 0,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_pen_style(mut self, pen_style: PenStyle) -> Self {
        self.pen_style = pen_style;
        self
    }

    /// Fill color for both raster and vector output.
    pub fn fill_color(&self) -> Color {
        Color::from_hex(&self.color).unwrap_or(Color::BLACK)
    }
}

/// A point in outline or output space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Perpendicular, rotated a quarter turn clockwise in y-down space.
    pub fn per(self) -> Point {
        Point::new(self.y, -self.x)
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dist(self, other: Point) -> f64 {
        (self - other).length()
    }

    pub fn dist2(self, other: Point) -> f64 {
        let d = self - other;
        d.x * d.x + d.y * d.y
    }

    /// Unit vector; the zero vector stays zero.
    pub fn uni(self) -> Point {
        let len = self.length();
        if len == 0.0 || !len.is_finite() {
            Point::ZERO
        } else {
            Point::new(self.x / len, self.y / len)
        }
    }

    pub fn lerp(self, other: Point, t: f64) -> Point {
        self + (other - self) * t
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn rotate_around(self, center: Point, radians: f64) -> Point {
        let (s, c) = radians.sin_cos();
        let px = self.x - center.x;
        let py = self.y - center.y;
        Point::new(px * c - py * s + center.x, px * s + py * c + center.y)
    }

    pub fn scaled(self, scale_x: f64, scale_y: f64) -> Point {
        Point::new(self.x * scale_x, self.y * scale_y)
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };

    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn from_hex(raw: &str) -> Option<Color> {
        let hex = raw.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        let (r, g, b, a) = match hex.len() {
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
                (expand(0)?, expand(1)?, expand(2)?, 255)
            }
            6 => (
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                255,
            ),
            8 => (
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            ),
            _ => return None,
        };
        Some(Color {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        })
    }

    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }
}

/// Absolute page dimensions in PDF points (or logical units for the original size).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn logical_page() -> Self {
        Self::new(LOGICAL_PAGE_WIDTH, LOGICAL_PAGE_HEIGHT)
    }

    pub fn a4() -> Self {
        Self::new(595.28, 841.89)
    }

    pub fn letter() -> Self {
        // 8.5in x 11in at 72pt/in.
        Self::new(612.0, 792.0)
    }

    /// Scale factors mapping the logical page onto this size.
    pub fn scale_from_logical(&self) -> (f64, f64) {
        (
            self.width / LOGICAL_PAGE_WIDTH,
            self.height / LOGICAL_PAGE_HEIGHT,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_parse_short_long_and_alpha_forms() {
        assert_eq!(Color::from_hex("#000"), Some(Color::BLACK));
        assert_eq!(Color::from_hex("ffffff"), Some(Color::WHITE));
        let red = Color::from_hex("#ff0000").unwrap();
        assert_eq!((red.r, red.g, red.b, red.a), (1.0, 0.0, 0.0, 1.0));
        let translucent = Color::from_hex("#0000ff80").unwrap();
        assert!(!translucent.is_opaque());
        assert!((translucent.a - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn invalid_or_empty_colors_fall_back_to_black() {
        assert_eq!(Color::from_hex(""), None);
        assert_eq!(Color::from_hex("#12345"), None);
        assert_eq!(Color::from_hex("#gggggg"), None);
        let stroke = Stroke::new("s", Vec::new(), 2.0).with_color("not-a-color");
        assert_eq!(stroke.fill_color(), Color::BLACK);
        assert_eq!(Stroke::new("s", Vec::new(), 2.0).fill_color(), Color::BLACK);
    }

    #[test]
    fn stroke_deserializes_from_collaborator_json() {
        let json = r##"{
            "id": "s1",
            "points": [{"x": 1.0, "y": 2.0, "pressure": 0.3}, {"x": 4.0, "y": 5.0}],
            "color": "#336699",
            "width": 3.0,
            "penStyle": "ballpoint",
            "createdAt": 1700000000000
        }"##;
        let stroke: Stroke = serde_json::from_str(json).unwrap();
        assert_eq!(stroke.pen_style, PenStyle::Ballpoint);
        assert_eq!(stroke.points.len(), 2);
        assert_eq!(stroke.points[1].pressure, 0.5);
        assert_eq!(stroke.created_at, 1_700_000_000_000);
    }

    #[test]
    fn unit_vector_of_zero_is_zero() {
        assert_eq!(Point::ZERO.uni(), Point::ZERO);
        let u = Point::new(3.0, 4.0).uni();
        assert!((u.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn page_sizes_scale_from_logical_space() {
        let (sx, sy) = Size::logical_page().scale_from_logical();
        assert_eq!((sx, sy), (1.0, 1.0));
        let (sx, sy) = Size::letter().scale_from_logical();
        assert!((sx - 612.0 / 1404.0).abs() < 1e-12);
        assert!((sy - 792.0 / 1872.0).abs() < 1e-12);
    }
}
