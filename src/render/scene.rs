//! Scene geometry.
//!
//! Everything here is a pure function of elapsed time, viewport size and
//! pointer position, so any frame can be recomputed exactly.

use rand::Rng;
use std::f64::consts::{PI, TAU};

pub const RING_COUNT: usize = 3;
pub const SHAPE_COUNT: usize = 8;
pub const PARTICLE_COUNT: usize = 5;
pub const SPARKLE_COUNT: usize = 12;

/// Ring angular velocity in radians per second.
pub const RING_SPIN: f64 = 1.0;
pub const RING_STROKE_WIDTH: f64 = 2.0;
pub const PARTICLE_RADIUS: f64 = 3.0;
pub const SPARKLE_RADIUS: f64 = 2.0;

pub const PRIMARY: Color = Color::rgb(8, 145, 178);
pub const SECONDARY: Color = Color::rgb(245, 158, 11);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point at `angle` radians and `distance` from `self`.
    pub fn polar(self, angle: f64, distance: f64) -> Self {
        Self::new(self.x + angle.cos() * distance, self.y + angle.sin() * distance)
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// Per-frame inputs: elapsed seconds, viewport and last pointer position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    pub t: f64,
    pub width: u32,
    pub height: u32,
    pub pointer: Option<Point>,
}

impl FrameInput {
    pub fn center(&self) -> Point {
        Point::new(self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Where the particles orbit: the pointer, or the center before any
    /// pointer movement was seen.
    pub fn anchor(&self) -> Point {
        self.pointer.unwrap_or_else(|| self.center())
    }
}

/// Stroked hexagon.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    pub center: Point,
    pub radius: f64,
    pub rotation: f64,
    pub vertices: [Point; 6],
    pub alpha: f64,
}

impl Ring {
    pub fn at(index: usize, t: f64, center: Point) -> Self {
        let i = index as f64;
        let radius = 100.0 + 50.0 * i;
        let rotation = t * RING_SPIN + i * PI / 3.0;
        let vertices =
            std::array::from_fn(|j| center.polar(j as f64 * PI / 3.0 + rotation, radius));

        Self {
            center,
            radius,
            rotation,
            vertices,
            alpha: 0.1 - 0.02 * i,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Triangle,
    Circle,
    Square,
}

impl ShapeKind {
    pub fn for_index(index: usize) -> Self {
        match index % 3 {
            0 => Self::Triangle,
            1 => Self::Circle,
            _ => Self::Square,
        }
    }
}

/// Filled shape drifting around the center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatingShape {
    pub kind: ShapeKind,
    pub center: Point,
    pub size: f64,
    pub alpha: f64,
}

impl FloatingShape {
    pub fn at(index: usize, t: f64, center: Point) -> Self {
        let i = index as f64;
        Self {
            kind: ShapeKind::for_index(index),
            center: Point::new(
                center.x + (0.5 * t + i).cos() * (200.0 + 30.0 * i),
                center.y + (0.7 * t + i).sin() * (150.0 + 20.0 * i),
            ),
            size: 10.0 + 5.0 * (2.0 * t + i).sin(),
            alpha: 0.15 + 0.1 * (3.0 * t + i).sin(),
        }
    }

    /// Polygon outline for triangles and squares; `None` for circles.
    pub fn outline(&self) -> Option<Vec<Point>> {
        let Point { x, y } = self.center;
        let s = self.size;
        match self.kind {
            ShapeKind::Triangle => Some(vec![
                Point::new(x, y - s),
                Point::new(x - s, y + s),
                Point::new(x + s, y + s),
            ]),
            ShapeKind::Square => Some(vec![
                Point::new(x - s, y - s),
                Point::new(x + s, y - s),
                Point::new(x + s, y + s),
                Point::new(x - s, y + s),
            ]),
            ShapeKind::Circle => None,
        }
    }
}

/// Dot orbiting the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub center: Point,
    pub radius: f64,
    pub alpha: f64,
}

impl Particle {
    pub fn at(index: usize, t: f64, anchor: Point) -> Self {
        let i = index as f64;
        let angle = TAU * i / PARTICLE_COUNT as f64 + 2.0 * t;
        let distance = 50.0 + 20.0 * (3.0 * t + i).sin();
        Self {
            center: anchor.polar(angle, distance),
            radius: PARTICLE_RADIUS,
            alpha: 0.6 - 0.1 * i,
        }
    }
}

/// Decorative floating dot, positioned in viewport fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sparkle {
    pub left: f64,
    pub top: f64,
    /// Seconds per float cycle.
    pub period: f64,
    /// Seconds before the cycle starts.
    pub delay: f64,
}

// (progress, dx, dy, opacity)
const FLOAT_KEYFRAMES: [(f64, f64, f64, f64); 5] = [
    (0.0, 0.0, 0.0, 0.3),
    (0.25, 10.0, -20.0, 0.6),
    (0.5, -10.0, -40.0, 0.9),
    (0.75, -15.0, -20.0, 0.6),
    (1.0, 0.0, 0.0, 0.3),
];

fn ease_in_out(x: f64) -> f64 {
    x * x * (3.0 - 2.0 * x)
}

impl Sparkle {
    /// Offset in pixels and opacity at `t` seconds.
    pub fn float(&self, t: f64) -> (f64, f64, f64) {
        let local = t - self.delay;
        if local <= 0.0 || self.period <= 0.0 {
            let (_, dx, dy, opacity) = FLOAT_KEYFRAMES[0];
            return (dx, dy, opacity);
        }

        let progress = (local / self.period).fract();
        let segment = FLOAT_KEYFRAMES
            .windows(2)
            .find(|pair| progress <= pair[1].0)
            .unwrap_or(&FLOAT_KEYFRAMES[3..5]);
        let (p0, x0, y0, o0) = segment[0];
        let (p1, x1, y1, o1) = segment[1];

        let k = ease_in_out((progress - p0) / (p1 - p0));
        (x0 + (x1 - x0) * k, y0 + (y1 - y0) * k, o0 + (o1 - o0) * k)
    }

    pub fn dot(&self, t: f64, width: u32, height: u32) -> Particle {
        let (dx, dy, opacity) = self.float(t);
        Particle {
            center: Point::new(
                self.left * width as f64 + dx,
                self.top * height as f64 + dy,
            ),
            radius: SPARKLE_RADIUS,
            alpha: 0.3 * opacity,
        }
    }
}

/// Sparkles chosen once per activation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparkleField {
    pub sparkles: Vec<Sparkle>,
}

impl SparkleField {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let sparkles = (0..SPARKLE_COUNT)
            .map(|_| Sparkle {
                left: rng.gen_range(0.0..1.0),
                top: rng.gen_range(0.0..1.0),
                period: rng.gen_range(4.0..10.0),
                delay: rng.gen_range(0.0..3.0),
            })
            .collect();
        Self { sparkles }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// All primitives for one frame, in draw order.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub rings: Vec<Ring>,
    pub shapes: Vec<FloatingShape>,
    pub particles: Vec<Particle>,
    pub sparkles: Vec<Particle>,
}

impl Scene {
    pub fn compose(input: &FrameInput, field: &SparkleField) -> Self {
        let center = input.center();
        let anchor = input.anchor();
        let t = input.t;

        Self {
            rings: (0..RING_COUNT).map(|i| Ring::at(i, t, center)).collect(),
            shapes: (0..SHAPE_COUNT)
                .map(|i| FloatingShape::at(i, t, center))
                .collect(),
            particles: (0..PARTICLE_COUNT)
                .map(|i| Particle::at(i, t, anchor))
                .collect(),
            sparkles: field
                .sparkles
                .iter()
                .map(|s| s.dot(t, input.width, input.height))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const EPS: f64 = 1e-9;

    fn input(t: f64) -> FrameInput {
        FrameInput {
            t,
            width: 800,
            height: 600,
            pointer: None,
        }
    }

    #[test]
    fn test_ring_zero_at_start() {
        let center = Point::new(400.0, 300.0);
        let ring = Ring::at(0, 0.0, center);

        assert_eq!(ring.radius, 100.0);
        for (j, vertex) in ring.vertices.iter().enumerate() {
            let expected = j as f64 * PI / 3.0;
            let angle = (vertex.y - center.y).atan2(vertex.x - center.x).rem_euclid(TAU);
            let diff = (angle - expected).abs();
            assert!(diff < EPS || (TAU - diff) < EPS, "vertex {j} at {angle}");
            assert!((vertex.distance(center) - 100.0).abs() < EPS);
        }
    }

    #[test]
    fn test_rings_grow_and_fade() {
        let scene = Scene::compose(&input(2.5), &SparkleField::empty());
        assert_eq!(scene.rings.len(), RING_COUNT);
        for pair in scene.rings.windows(2) {
            assert_eq!(pair[1].radius - pair[0].radius, 50.0);
            assert!(pair[1].alpha < pair[0].alpha);
        }
    }

    #[test]
    fn test_shapes_cycle_kinds() {
        let scene = Scene::compose(&input(1.0), &SparkleField::empty());
        let kinds: Vec<ShapeKind> = scene.shapes.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ShapeKind::Triangle,
                ShapeKind::Circle,
                ShapeKind::Square,
                ShapeKind::Triangle,
                ShapeKind::Circle,
                ShapeKind::Square,
                ShapeKind::Triangle,
                ShapeKind::Circle,
            ]
        );
        assert!(scene.shapes[1].outline().is_none());
        assert_eq!(scene.shapes[0].outline().map(|o| o.len()), Some(3));
        assert_eq!(scene.shapes[2].outline().map(|o| o.len()), Some(4));
    }

    #[test]
    fn test_shape_bounds() {
        for step in 0..200 {
            let t = step as f64 * 0.37;
            for shape in Scene::compose(&input(t), &SparkleField::empty()).shapes {
                assert!((5.0 - EPS..=15.0 + EPS).contains(&shape.size));
                assert!((0.05 - EPS..=0.25 + EPS).contains(&shape.alpha));
            }
        }
    }

    #[test]
    fn test_compose_is_deterministic() {
        let mut frame = input(12.345);
        frame.pointer = Some(Point::new(10.0, 20.0));
        let field = SparkleField::random(&mut StdRng::seed_from_u64(7));

        assert_eq!(Scene::compose(&frame, &field), Scene::compose(&frame, &field));
    }

    #[test]
    fn test_particles_anchor_to_pointer_or_center() {
        // At t = 0 particle i sits 50 + 20 sin(i) from its anchor.
        let expected = |i: usize| 50.0 + 20.0 * (i as f64).sin();

        let mut frame = input(0.0);
        let centered = Scene::compose(&frame, &SparkleField::empty());
        for (i, p) in centered.particles.iter().enumerate() {
            assert!((p.center.distance(Point::new(400.0, 300.0)) - expected(i)).abs() < EPS);
        }

        frame.pointer = Some(Point::new(100.0, 100.0));
        let scene = Scene::compose(&frame, &SparkleField::empty());
        for (i, p) in scene.particles.iter().enumerate() {
            assert!((p.center.distance(Point::new(100.0, 100.0)) - expected(i)).abs() < EPS);
        }
    }

    #[test]
    fn test_later_particles_are_dimmer() {
        let scene = Scene::compose(&input(3.0), &SparkleField::empty());
        assert_eq!(scene.particles.len(), PARTICLE_COUNT);
        for pair in scene.particles.windows(2) {
            assert!(pair[1].alpha < pair[0].alpha);
        }
        assert!(scene.particles.iter().all(|p| p.alpha > 0.0));
    }

    #[test]
    fn test_sparkle_float_keyframes() {
        let sparkle = Sparkle {
            left: 0.5,
            top: 0.5,
            period: 4.0,
            delay: 1.0,
        };

        assert_eq!(sparkle.float(0.5), (0.0, 0.0, 0.3));
        let (dx, dy, opacity) = sparkle.float(1.0 + 2.0);
        assert!((dx + 10.0).abs() < EPS);
        assert!((dy + 40.0).abs() < EPS);
        assert!((opacity - 0.9).abs() < EPS);

        let (dx, dy, _) = sparkle.float(1.0 + 1.0);
        assert!((dx - 10.0).abs() < EPS && (dy + 20.0).abs() < EPS);
    }

    #[test]
    fn test_random_field_ranges() {
        let field = SparkleField::random(&mut StdRng::seed_from_u64(42));
        assert_eq!(field.sparkles.len(), SPARKLE_COUNT);
        for s in &field.sparkles {
            assert!((0.0..1.0).contains(&s.left) && (0.0..1.0).contains(&s.top));
            assert!((4.0..10.0).contains(&s.period));
            assert!((0.0..3.0).contains(&s.delay));
        }
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(Color::parse_hex("#0891b2"), Some(PRIMARY));
        assert_eq!(Color::parse_hex("f59e0b"), Some(SECONDARY));
        assert_eq!(Color::parse_hex("#fff"), None);
        assert_eq!(Color::parse_hex("#zzzzzz"), None);
    }
}
