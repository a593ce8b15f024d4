//! Variable-width outline generation for freehand strokes.
//!
//! Samples are streamlined toward each other, a radius is computed per sample from
//! (recorded or simulated) pressure, and left/right offset boundaries are joined with
//! start/end caps into one closed polygon. The result is a pure function of
//! `(points, pen_style, width)`.

use crate::types::{PenStyle, Point, Stroke, StrokePoint};

/// Blend factor between consecutive samples; shared by every pen style.
pub const STREAMLINE: f64 = 0.5;
const SMOOTHING: f64 = 0.5;
const RATE_OF_PRESSURE_CHANGE: f64 = 0.275;
const FIXED_PI: f64 = std::f64::consts::PI + 0.0001;
const UNIFORM_PRESSURE: f64 = 0.5;
const BALLPOINT_END_TAPER: f64 = 20.0;
const MIN_RADIUS: f64 = 0.01;
const ARC_STEPS: usize = 13;
const END_CAP_STEPS: usize = 29;
// Samples closer than this to the stroke end are folded into the final sample.
const END_NOISE_LENGTH: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Taper {
    None,
    /// Taper across the whole stroke (at least one stroke size).
    Full,
    Length(f64),
}

impl Taper {
    fn resolve(self, size: f64, total_length: f64) -> f64 {
        match self {
            Taper::None => 0.0,
            Taper::Full => size.max(total_length),
            Taper::Length(length) if length.is_finite() => length.max(0.0),
            Taper::Length(_) => 0.0,
        }
    }
}

/// Width-modulation parameters selected by a pen style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineParams {
    pub size: f64,
    pub thinning: f64,
    pub smoothing: f64,
    pub streamline: f64,
    pub simulate_pressure: bool,
    /// Replaces every recorded pressure when set.
    pub fixed_pressure: Option<f64>,
    pub taper_start: Taper,
    pub taper_end: Taper,
    pub cap_start: bool,
    pub cap_end: bool,
}

impl OutlineParams {
    pub fn for_style(style: PenStyle, width: f64) -> Self {
        let base = OutlineParams {
            size: width,
            thinning: 0.0,
            smoothing: SMOOTHING,
            streamline: STREAMLINE,
            simulate_pressure: false,
            fixed_pressure: None,
            taper_start: Taper::None,
            taper_end: Taper::None,
            cap_start: true,
            cap_end: true,
        };
        match style {
            PenStyle::Pressure => OutlineParams {
                thinning: 0.5,
                taper_start: Taper::Full,
                taper_end: Taper::Full,
                ..base
            },
            PenStyle::Uniform => OutlineParams {
                fixed_pressure: Some(UNIFORM_PRESSURE),
                ..base
            },
            PenStyle::Ballpoint => OutlineParams {
                thinning: 0.3,
                simulate_pressure: true,
                taper_end: Taper::Length(BALLPOINT_END_TAPER),
                ..base
            },
        }
    }

    fn pressure_for(&self, recorded: f64) -> f64 {
        match self.fixed_pressure {
            Some(pressure) => pressure,
            None if recorded.is_nan() => UNIFORM_PRESSURE,
            None => recorded.clamp(0.0, 1.0),
        }
    }

    fn radius_for(&self, pressure: f64) -> f64 {
        self.size * (0.5 - self.thinning * (0.5 - pressure))
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    point: Point,
    pressure: f64,
    vector: Point,
    distance: f64,
    running_length: f64,
}

/// Outline polygon for a stroke. `id`, `color` and `created_at` never reach this function.
pub fn stroke_outline(stroke: &Stroke) -> Vec<Point> {
    outline_points(&stroke.points, stroke.pen_style, stroke.width)
}

/// Closed outline polygon for raw samples.
///
/// Never panics: empty input or a non-positive width gives an empty polygon, non-finite
/// samples are dropped, and a single distinct sample gives a round dot.
pub fn outline_points(points: &[StrokePoint], style: PenStyle, width: f64) -> Vec<Point> {
    if !width.is_finite() || width <= 0.0 {
        return Vec::new();
    }
    let params = OutlineParams::for_style(style, width);
    let samples = streamline_samples(points, &params);
    outline_from_samples(&samples, &params)
}

fn streamline_samples(raw: &[StrokePoint], params: &OutlineParams) -> Vec<Sample> {
    let mut pts: Vec<(Point, f64)> = raw
        .iter()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .map(|p| (Point::new(p.x, p.y), params.pressure_for(p.pressure)))
        .collect();
    let Some(&(first, first_pressure)) = pts.first() else {
        return Vec::new();
    };

    if pts.len() == 2 {
        let (last, last_pressure) = pts[1];
        pts.truncate(1);
        for i in 1..5 {
            let t = i as f64 / 4.0;
            let pressure = first_pressure + (last_pressure - first_pressure) * t;
            pts.push((first.lerp(last, t), pressure));
        }
    }

    let t = 0.15 + (1.0 - params.streamline) * 0.85;
    let mut samples = vec![Sample {
        point: first,
        pressure: first_pressure,
        vector: Point::new(1.0, 1.0),
        distance: 0.0,
        running_length: 0.0,
    }];
    let mut reached_min_length = false;
    let mut running_length = 0.0;
    let max = pts.len() - 1;

    for (i, &(target, pressure)) in pts.iter().enumerate().skip(1) {
        let prev = samples[samples.len() - 1];
        // Strokes are always complete, so the final sample is taken verbatim.
        let point = if i == max {
            target
        } else {
            prev.point.lerp(target, t)
        };
        if point == prev.point {
            continue;
        }
        let distance = point.dist(prev.point);
        running_length += distance;
        if i < max && !reached_min_length {
            if running_length < params.size {
                continue;
            }
            reached_min_length = true;
        }
        samples.push(Sample {
            point,
            pressure,
            vector: (prev.point - point).uni(),
            distance,
            running_length,
        });
    }

    samples[0].vector = samples.get(1).map(|s| s.vector).unwrap_or(Point::ZERO);
    samples
}

fn simulated_pressure(prev: f64, distance: f64, size: f64) -> f64 {
    let speed = (distance / size).min(1.0);
    let rate = (1.0 - speed).min(1.0);
    (prev + (rate - prev) * (speed * RATE_OF_PRESSURE_CHANGE)).min(1.0)
}

fn ease_out_quad(t: f64) -> f64 {
    t * (2.0 - t)
}

fn ease_out_cubic(t: f64) -> f64 {
    let t = t - 1.0;
    t * t * t + 1.0
}

fn outline_from_samples(points: &[Sample], params: &OutlineParams) -> Vec<Point> {
    let Some(&last) = points.last() else {
        return Vec::new();
    };
    let size = params.size;
    let total_length = last.running_length;
    let taper_start = params.taper_start.resolve(size, total_length);
    let taper_end = params.taper_end.resolve(size, total_length);
    let min_distance = (size * params.smoothing).powi(2);

    let mut left: Vec<Point> = Vec::new();
    let mut right: Vec<Point> = Vec::new();

    let mut prev_pressure = points.iter().take(10).fold(points[0].pressure, |acc, curr| {
        let pressure = if params.simulate_pressure {
            simulated_pressure(acc, curr.distance, size)
        } else {
            curr.pressure
        };
        (acc + pressure) / 2.0
    });

    let mut radius = params.radius_for(last.pressure);
    let mut first_radius: Option<f64> = None;
    let mut prev_vector = points[0].vector;
    let mut pl = points[0].point;
    let mut pr = pl;
    let mut tl = pl;
    let mut tr = pr;
    let mut prev_sharp = false;
    let n = points.len();

    for (i, sample) in points.iter().enumerate() {
        let is_last = i == n - 1;
        if !is_last && total_length - sample.running_length < END_NOISE_LENGTH {
            continue;
        }

        let mut pressure = sample.pressure;
        if params.thinning != 0.0 {
            if params.simulate_pressure {
                pressure = simulated_pressure(prev_pressure, sample.distance, size);
            }
            radius = params.radius_for(pressure);
        } else {
            radius = size / 2.0;
        }
        if first_radius.is_none() {
            first_radius = Some(radius);
        }

        let ts = if sample.running_length < taper_start {
            ease_out_quad(sample.running_length / taper_start)
        } else {
            1.0
        };
        let remaining = total_length - sample.running_length;
        let te = if remaining < taper_end {
            ease_out_cubic(remaining / taper_end)
        } else {
            1.0
        };
        radius = (radius * ts.min(te)).max(MIN_RADIUS);

        let next_vector = if is_last {
            sample.vector
        } else {
            points[i + 1].vector
        };
        let next_dpr = if is_last {
            1.0
        } else {
            sample.vector.dot(next_vector)
        };
        let prev_dpr = sample.vector.dot(prev_vector);
        let sharp = prev_dpr < 0.0 && !prev_sharp;
        let next_sharp = next_dpr < 0.0;

        if sharp || next_sharp {
            // Hairpin turn: sweep a half circle so the outline does not fold over itself.
            let offset = prev_vector.per() * radius;
            for step in 0..=ARC_STEPS {
                let t = step as f64 / ARC_STEPS as f64;
                tl = (sample.point - offset).rotate_around(sample.point, FIXED_PI * t);
                left.push(tl);
                tr = (sample.point + offset).rotate_around(sample.point, -FIXED_PI * t);
                right.push(tr);
            }
            pl = tl;
            pr = tr;
            if next_sharp {
                prev_sharp = true;
            }
            continue;
        }
        prev_sharp = false;

        if is_last {
            let offset = sample.vector.per() * radius;
            left.push(sample.point - offset);
            right.push(sample.point + offset);
            continue;
        }

        let offset = next_vector.lerp(sample.vector, next_dpr).per() * radius;
        tl = sample.point - offset;
        if i <= 1 || pl.dist2(tl) > min_distance {
            left.push(tl);
            pl = tl;
        }
        tr = sample.point + offset;
        if i <= 1 || pr.dist2(tr) > min_distance {
            right.push(tr);
            pr = tr;
        }
        prev_pressure = pressure;
        prev_vector = sample.vector;
    }

    let first_point = points[0].point;
    if n == 1 {
        return dot(first_point, first_radius.unwrap_or(radius));
    }
    let last_point = last.point;

    // A tapered start already converges to a point and needs no cap.
    let mut start_cap = Vec::new();
    if taper_start <= 0.0 {
        if params.cap_start {
            if let Some(&r0) = right.first() {
                for step in 1..=ARC_STEPS {
                    let t = step as f64 / ARC_STEPS as f64;
                    start_cap.push(r0.rotate_around(first_point, FIXED_PI * t));
                }
            }
        } else if let (Some(&l0), Some(&r0)) = (left.first(), right.first()) {
            let corners = l0 - r0;
            let a = corners * 0.5;
            let b = corners * 0.51;
            start_cap.extend([first_point - a, first_point - b, first_point + b, first_point + a]);
        }
    }

    let direction = (-last.vector).per();
    let mut end_cap = Vec::new();
    if taper_end > 0.0 {
        end_cap.push(last_point);
    } else if params.cap_end {
        let start = last_point + direction * radius;
        for step in 1..END_CAP_STEPS {
            let t = step as f64 / END_CAP_STEPS as f64;
            end_cap.push(start.rotate_around(last_point, FIXED_PI * 3.0 * t));
        }
    } else {
        end_cap.extend([
            last_point + direction * radius,
            last_point + direction * (radius * 0.99),
            last_point - direction * (radius * 0.99),
            last_point - direction * radius,
        ]);
    }

    let mut outline = left;
    outline.extend(end_cap);
    outline.extend(right.into_iter().rev());
    outline.extend(start_cap);
    outline
}

fn dot(center: Point, radius: f64) -> Vec<Point> {
    let start = center + Point::new(-1.0, 1.0).uni() * radius;
    (1..=ARC_STEPS)
        .map(|step| {
            let t = step as f64 / ARC_STEPS as f64;
            start.rotate_around(center, FIXED_PI * 2.0 * t)
        })
        .collect()
}
