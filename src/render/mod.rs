//! Ambient renderer: a frame loop drawing the procedural scene.

pub mod canvas;
pub mod scene;

pub use canvas::{save_png, Canvas, PixelCanvas, PixelSurfaceProvider, RenderError, SurfaceProvider};
pub use scene::{Color, FrameInput, Point, Scene, SparkleField};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::lock;
use scene::{PRIMARY, RING_STROKE_WIDTH, SECONDARY};

/// Default frame interval (60 frames per second).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

type SharedCanvas = Arc<Mutex<Option<Box<dyn Canvas>>>>;

/// Draw one complete frame.
pub fn render_frame(canvas: &mut dyn Canvas, input: &FrameInput, sparkles: &SparkleField) {
    if canvas.size() != (input.width, input.height) {
        canvas.resize(input.width, input.height);
    }
    canvas.clear();

    let scene = Scene::compose(input, sparkles);

    for ring in &scene.rings {
        canvas.stroke_polygon(&ring.vertices, RING_STROKE_WIDTH, PRIMARY, ring.alpha);
    }

    for shape in &scene.shapes {
        match shape.outline() {
            Some(outline) => canvas.fill_polygon(&outline, SECONDARY, shape.alpha),
            None => canvas.fill_circle(shape.center, shape.size, SECONDARY, shape.alpha),
        }
    }

    for particle in &scene.particles {
        canvas.fill_circle(particle.center, particle.radius, PRIMARY, particle.alpha);
    }

    for sparkle in &scene.sparkles {
        canvas.fill_circle(sparkle.center, sparkle.radius, SECONDARY, sparkle.alpha);
    }
}

/// Owns the drawing surface and the frame loop while the overlay is active.
pub struct AmbientRenderer {
    provider: Arc<dyn SurfaceProvider>,
    frame_interval: Duration,
    pointer: Arc<Mutex<Option<Point>>>,
    canvas: SharedCanvas,
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    started_at: Option<Instant>,
    task: Option<JoinHandle<()>>,
}

impl AmbientRenderer {
    pub fn new(provider: Arc<dyn SurfaceProvider>, frame_interval: Duration) -> Self {
        Self {
            provider,
            frame_interval,
            pointer: Arc::new(Mutex::new(None)),
            canvas: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            frames: Arc::new(AtomicU64::new(0)),
            started_at: None,
            task: None,
        }
    }

    /// Start drawing on a fresh `width`x`height` surface with elapsed time at zero.
    ///
    /// Returns false when no surface could be acquired; the renderer then
    /// stays idle and draws nothing.
    pub fn start(&mut self, width: u32, height: u32, sparkles: SparkleField) -> bool {
        self.stop();

        *lock(&self.pointer) = None;
        self.frames.store(0, Ordering::SeqCst);
        let started_at = Instant::now();
        self.started_at = Some(started_at);

        let surface = match self.provider.acquire(width, height) {
            Ok(surface) => surface,
            Err(e) => {
                warn!("No drawing surface, overlay runs without animation: {}", e);
                return false;
            }
        };
        *lock(&self.canvas) = Some(surface);

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let canvas = self.canvas.clone();
        let pointer = self.pointer.clone();
        let frames = self.frames.clone();
        let frame_interval = self.frame_interval;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let t = started_at.elapsed().as_secs_f64();
                let Some(n) = draw_tick(&canvas, &pointer, &sparkles, &frames, t) else {
                    break;
                };
                trace!("Rendered frame {} at t={:.3}s", n, t);
            }
        }));

        info!(
            "Ambient renderer started at {}x{} every {:?}",
            width, height, self.frame_interval
        );
        true
    }

    /// Stop the frame loop and release the surface. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        lock(&self.canvas).take();
        self.started_at = None;

        if was_running {
            debug!(
                "Ambient renderer stopped after {} frames",
                self.frames.load(Ordering::SeqCst)
            );
        }
    }

    /// Record the latest pointer position.
    pub fn set_pointer(&self, position: Point) {
        *lock(&self.pointer) = Some(position);
    }

    /// Shared pointer slot, written by pointer-tracking listeners.
    pub fn pointer_cell(&self) -> Arc<Mutex<Option<Point>>> {
        self.pointer.clone()
    }

    pub fn pointer(&self) -> Option<Point> {
        *lock(&self.pointer)
    }

    /// Time since the last start, or `None` when stopped.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|at| at.elapsed())
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn has_surface(&self) -> bool {
        lock(&self.canvas).is_some()
    }

    /// Pixels of the most recent frame.
    pub fn snapshot(&self) -> Option<image::RgbaImage> {
        lock(&self.canvas).as_ref().and_then(|c| c.snapshot())
    }
}

impl Drop for AmbientRenderer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn draw_tick(
    canvas: &SharedCanvas,
    pointer: &Mutex<Option<Point>>,
    sparkles: &SparkleField,
    frames: &AtomicU64,
    t: f64,
) -> Option<u64> {
    let pointer = *lock(pointer);
    // The count is bumped under the canvas lock so that no frame is counted
    // once `stop` has released the surface.
    let mut guard = lock(canvas);
    let surface = guard.as_mut()?;

    let (width, height) = surface.size();
    let input = FrameInput {
        t,
        width,
        height,
        pointer,
    };
    render_frame(surface.as_mut(), &input, sparkles);
    Some(frames.fetch_add(1, Ordering::SeqCst) + 1)
}
