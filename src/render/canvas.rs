//! Drawing surfaces.

use image::{ImageFormat, Rgba, RgbaImage};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use super::scene::{Color, Point};

/// Largest width or height a surface may have.
pub const MAX_DIMENSION: u32 = 16_384;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Drawing surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("Invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
}

/// A 2D surface the renderer draws on. Alpha values are in `0.0..=1.0`.
pub trait Canvas: Send {
    fn size(&self) -> (u32, u32);
    fn resize(&mut self, width: u32, height: u32);
    /// Reset every pixel to the background.
    fn clear(&mut self);
    /// Stroke the closed outline through `points`.
    fn stroke_polygon(&mut self, points: &[Point], width: f64, color: Color, alpha: f64);
    fn fill_polygon(&mut self, points: &[Point], color: Color, alpha: f64);
    fn fill_circle(&mut self, center: Point, radius: f64, color: Color, alpha: f64);
    /// Copy of the current pixels, if the surface keeps any.
    fn snapshot(&self) -> Option<RgbaImage>;
}

/// Hands out drawing surfaces.
pub trait SurfaceProvider: Send + Sync {
    fn acquire(&self, width: u32, height: u32) -> Result<Box<dyn Canvas>, RenderError>;
}

fn check_size(width: u32, height: u32) -> Result<(), RenderError> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(RenderError::InvalidSize { width, height });
    }
    Ok(())
}

/// Software canvas over an RGBA pixel buffer.
pub struct PixelCanvas {
    image: RgbaImage,
    background: Rgba<u8>,
}

impl PixelCanvas {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        let background = Rgba([background.r, background.g, background.b, 255]);
        Self {
            image: RgbaImage::from_pixel(width, height, background),
            background,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Blend `color` at `alpha * coverage` over the pixel at (x, y).
    fn blend(&mut self, x: u32, y: u32, color: Color, alpha: f64) {
        let a = alpha.clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }

        let px = self.image.get_pixel_mut(x, y);
        let [dr, dg, db, da] = px.0;
        let da = da as f64 / 255.0;
        let out_a = a + da * (1.0 - a);
        if out_a <= 0.0 {
            return;
        }

        let mix = |src: u8, dst: u8| -> u8 {
            let v = (src as f64 * a + dst as f64 * da * (1.0 - a)) / out_a;
            v.round().clamp(0.0, 255.0) as u8
        };

        px.0 = [
            mix(color.r, dr),
            mix(color.g, dg),
            mix(color.b, db),
            (out_a * 255.0).round() as u8,
        ];
    }

    /// Pixel rows and columns overlapping the box, clipped to the image.
    fn clip(&self, min: Point, max: Point) -> Option<(u32, u32, u32, u32)> {
        let (w, h) = self.image.dimensions();
        let x0 = min.x.floor().max(0.0);
        let y0 = min.y.floor().max(0.0);
        let x1 = max.x.ceil().min(w as f64);
        let y1 = max.y.ceil().min(h as f64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

fn bounds(points: &[Point]) -> (Point, Point) {
    points.iter().fold(
        (
            Point::new(f64::INFINITY, f64::INFINITY),
            Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        ),
        |(min, max), p| {
            (
                Point::new(min.x.min(p.x), min.y.min(p.y)),
                Point::new(max.x.max(p.x), max.y.max(p.y)),
            )
        },
    )
}

fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let k = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + k * dx, a.y + k * dy))
}

impl Canvas for PixelCanvas {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = RgbaImage::from_pixel(width, height, self.background);
        }
    }

    fn clear(&mut self) {
        for px in self.image.pixels_mut() {
            *px = self.background;
        }
    }

    fn stroke_polygon(&mut self, points: &[Point], width: f64, color: Color, alpha: f64) {
        if points.len() < 2 {
            return;
        }

        let half = width / 2.0;
        let (min, max) = bounds(points);
        let pad = half + 1.0;
        let Some((x0, y0, x1, y1)) = self.clip(
            Point::new(min.x - pad, min.y - pad),
            Point::new(max.x + pad, max.y + pad),
        ) else {
            return;
        };

        for y in y0..y1 {
            for x in x0..x1 {
                let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                let d = (0..points.len())
                    .map(|i| segment_distance(p, points[i], points[(i + 1) % points.len()]))
                    .fold(f64::INFINITY, f64::min);
                let coverage = (half + 0.5 - d).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend(x, y, color, alpha * coverage);
                }
            }
        }
    }

    fn fill_polygon(&mut self, points: &[Point], color: Color, alpha: f64) {
        if points.len() < 3 {
            return;
        }

        let (min, max) = bounds(points);
        let Some((x0, y0, x1, y1)) = self.clip(min, max) else {
            return;
        };

        let mut crossings = Vec::with_capacity(points.len());
        for y in y0..y1 {
            let yc = y as f64 + 0.5;
            crossings.clear();
            for i in 0..points.len() {
                let a = points[i];
                let b = points[(i + 1) % points.len()];
                if (a.y <= yc) != (b.y <= yc) {
                    crossings.push(a.x + (yc - a.y) / (b.y - a.y) * (b.x - a.x));
                }
            }
            crossings.sort_by(f64::total_cmp);

            // Even-odd rule: fill between each pair of crossings.
            for span in crossings.chunks_exact(2) {
                for x in x0..x1 {
                    let xc = x as f64 + 0.5;
                    if xc >= span[0] && xc < span[1] {
                        self.blend(x, y, color, alpha);
                    }
                }
            }
        }
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: Color, alpha: f64) {
        if radius <= 0.0 {
            return;
        }

        let pad = radius + 1.0;
        let Some((x0, y0, x1, y1)) = self.clip(
            Point::new(center.x - pad, center.y - pad),
            Point::new(center.x + pad, center.y + pad),
        ) else {
            return;
        };

        for y in y0..y1 {
            for x in x0..x1 {
                let d = center.distance(Point::new(x as f64 + 0.5, y as f64 + 0.5));
                let coverage = (radius + 0.5 - d).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend(x, y, color, alpha * coverage);
                }
            }
        }
    }

    fn snapshot(&self) -> Option<RgbaImage> {
        Some(self.image.clone())
    }
}

/// Provides [`PixelCanvas`] surfaces filled with a background colour.
#[derive(Debug, Clone, Copy)]
pub struct PixelSurfaceProvider {
    pub background: Color,
}

impl PixelSurfaceProvider {
    pub fn new(background: Color) -> Self {
        Self { background }
    }
}

impl SurfaceProvider for PixelSurfaceProvider {
    fn acquire(&self, width: u32, height: u32) -> Result<Box<dyn Canvas>, RenderError> {
        check_size(width, height)?;
        debug!("Allocating {}x{} pixel surface", width, height);
        Ok(Box::new(PixelCanvas::new(width, height, self.background)))
    }
}

/// Write a frame to `path` as PNG.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), RenderError> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Color = Color::rgb(0, 0, 0);
    const WHITE: Color = Color::rgb(255, 255, 255);

    #[test]
    fn test_fill_square_covers_interior_only() {
        let mut canvas = PixelCanvas::new(10, 10, BLACK);
        let square = [
            Point::new(2.0, 2.0),
            Point::new(6.0, 2.0),
            Point::new(6.0, 6.0),
            Point::new(2.0, 6.0),
        ];
        canvas.fill_polygon(&square, WHITE, 1.0);

        assert_eq!(canvas.image().get_pixel(3, 3).0, [255, 255, 255, 255]);
        assert_eq!(canvas.image().get_pixel(5, 5).0, [255, 255, 255, 255]);
        assert_eq!(canvas.image().get_pixel(6, 6).0, [0, 0, 0, 255]);
        assert_eq!(canvas.image().get_pixel(1, 3).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_half_alpha_blends_toward_colour() {
        let mut canvas = PixelCanvas::new(4, 4, BLACK);
        canvas.fill_circle(Point::new(2.0, 2.0), 10.0, WHITE, 0.5);
        let [r, g, b, a] = canvas.image().get_pixel(1, 1).0;
        assert_eq!((r, g, b, a), (128, 128, 128, 255));
    }

    #[test]
    fn test_stroke_leaves_center_untouched() {
        let mut canvas = PixelCanvas::new(40, 40, BLACK);
        let ring: Vec<Point> = (0..6)
            .map(|j| Point::new(20.0, 20.0).polar(j as f64 * std::f64::consts::PI / 3.0, 15.0))
            .collect();
        canvas.stroke_polygon(&ring, 2.0, WHITE, 1.0);

        assert_eq!(canvas.image().get_pixel(20, 20).0, [0, 0, 0, 255]);
        // Vertex at angle 0 is (35, 20).
        assert_ne!(canvas.image().get_pixel(34, 19).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_drawing_off_surface_is_clipped() {
        let mut canvas = PixelCanvas::new(8, 8, BLACK);
        canvas.fill_circle(Point::new(-50.0, -50.0), 5.0, WHITE, 1.0);
        canvas.fill_polygon(
            &[Point::new(100.0, 100.0), Point::new(120.0, 100.0), Point::new(110.0, 120.0)],
            WHITE,
            1.0,
        );
        assert!(canvas.image().pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn test_clear_and_resize() {
        let mut canvas = PixelCanvas::new(4, 4, BLACK);
        canvas.fill_circle(Point::new(2.0, 2.0), 3.0, WHITE, 1.0);
        canvas.clear();
        assert!(canvas.image().pixels().all(|p| p.0 == [0, 0, 0, 255]));

        canvas.resize(16, 9);
        assert_eq!(canvas.size(), (16, 9));
    }

    #[test]
    fn test_provider_rejects_empty_surface() {
        let provider = PixelSurfaceProvider::new(BLACK);
        assert!(matches!(
            provider.acquire(0, 100),
            Err(RenderError::InvalidSize { width: 0, height: 100 })
        ));
        assert!(provider.acquire(MAX_DIMENSION + 1, 1).is_err());
        assert_eq!(provider.acquire(32, 24).unwrap().size(), (32, 24));
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let canvas = PixelCanvas::new(8, 8, WHITE);

        save_png(canvas.image(), &path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 8));
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }
}
