//! Overlay state machine.
//!
//! Holds the Active/Inactive state and owns everything that only exists
//! while the overlay is up: the ambient renderer, the clock panel and the
//! pointer-tracking listener.

pub mod clock;
pub mod quotes;

pub use clock::{ClockPanel, ClockReading};
pub use quotes::QuotePool;

use chrono::Local;
use image::RgbaImage;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::activity::{InputHost, InputKind, Listener};
use crate::display::Viewport;
use crate::idle::Expiry;
use crate::lock;
use crate::render::{save_png, AmbientRenderer, Point, SparkleField, SurfaceProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayState {
    #[default]
    Inactive,
    Active,
}

impl OverlayState {
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl fmt::Display for OverlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => f.write_str("inactive"),
            Self::Active => f.write_str("active"),
        }
    }
}

/// Settings fixed for the overlay's lifetime.
#[derive(Debug, Clone)]
pub struct OverlayOptions {
    pub frame_interval: Duration,
    pub quotes: QuotePool,
    /// Where the last frame is saved on deactivation, if anywhere.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            frame_interval: crate::render::DEFAULT_FRAME_INTERVAL,
            quotes: QuotePool::builtin(),
            snapshot_dir: None,
        }
    }
}

struct PointerTracking {
    listener: Listener,
    hosts: Vec<usize>,
}

pub struct Overlay {
    state: watch::Sender<OverlayState>,
    quotes: QuotePool,
    rng: StdRng,
    quote: Option<String>,
    renderer: AmbientRenderer,
    clock: ClockPanel,
    viewport: Arc<dyn Viewport>,
    input_hosts: Vec<Arc<dyn InputHost>>,
    tracking: Option<PointerTracking>,
    snapshot_dir: Option<PathBuf>,
    snapshot_task: Option<JoinHandle<()>>,
    activations: u64,
}

impl Overlay {
    pub fn new(
        viewport: Arc<dyn Viewport>,
        surfaces: Arc<dyn SurfaceProvider>,
        options: OverlayOptions,
    ) -> Self {
        let (state, _) = watch::channel(OverlayState::Inactive);
        Self {
            state,
            quotes: options.quotes,
            rng: StdRng::from_entropy(),
            quote: None,
            renderer: AmbientRenderer::new(surfaces, options.frame_interval),
            clock: ClockPanel::new(),
            viewport,
            input_hosts: Vec::new(),
            tracking: None,
            snapshot_dir: options.snapshot_dir,
            snapshot_task: None,
            activations: 0,
        }
    }

    /// Use a seeded random source for quote and sparkle selection.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Host used for pointer tracking while active.
    pub fn add_input_host(&mut self, host: Arc<dyn InputHost>) {
        self.input_hosts.push(host);
    }

    /// Inactive → Active. Only a timer [`Expiry`] can trigger this.
    ///
    /// Returns false if the overlay was already active.
    pub fn activate(&mut self, expiry: &Expiry) -> bool {
        if self.is_active() {
            debug!("Overlay already active, ignoring expiry {}", expiry.generation());
            return false;
        }

        let quote = self.quotes.pick(&mut self.rng).to_string();
        let (width, height) = self.viewport.size();
        let sparkles = SparkleField::random(&mut self.rng);

        self.track_pointer();
        self.renderer.start(width, height, sparkles);
        self.clock.start(quote.clone());
        self.quote = Some(quote);
        self.activations += 1;

        self.state.send_replace(OverlayState::Active);
        info!(
            "Overlay activated after {:?} idle ({}x{})",
            expiry.timeout(),
            width,
            height
        );
        true
    }

    /// Active → Inactive. Returns false if the overlay was already inactive.
    ///
    /// The frame snapshot, when configured, is copied before the renderer
    /// stops and written on a blocking worker afterwards.
    pub fn deactivate(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }

        let frame = self.snapshot_dir.as_ref().and_then(|_| self.renderer.snapshot());
        self.renderer.stop();
        self.clock.stop();
        self.untrack_pointer();
        self.quote = None;

        self.state.send_replace(OverlayState::Inactive);
        info!("Overlay deactivated");

        if let Some(frame) = frame {
            self.save_snapshot(frame);
        } else if self.snapshot_dir.is_some() {
            debug!("No frame to snapshot");
        }
        true
    }

    /// Wait for the snapshot started by the last deactivation, if any.
    pub async fn flush_snapshot(&mut self) {
        if let Some(task) = self.snapshot_task.take() {
            if let Err(e) = task.await {
                warn!("Snapshot writer failed: {}", e);
            }
        }
    }

    pub fn state(&self) -> OverlayState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Read-only view of the state.
    pub fn subscribe(&self) -> watch::Receiver<OverlayState> {
        self.state.subscribe()
    }

    pub fn subscribe_clock(&self) -> watch::Receiver<Option<ClockReading>> {
        self.clock.subscribe()
    }

    /// Quote chosen at the current activation.
    pub fn quote(&self) -> Option<&str> {
        self.quote.as_deref()
    }

    pub fn renderer(&self) -> &AmbientRenderer {
        &self.renderer
    }

    /// Number of Inactive → Active transitions so far.
    pub fn activations(&self) -> u64 {
        self.activations
    }

    pub fn is_tracking_pointer(&self) -> bool {
        self.tracking.is_some()
    }

    fn track_pointer(&mut self) {
        self.untrack_pointer();

        let cell = self.renderer.pointer_cell();
        let listener = Listener::new(move |input| {
            if let Some((x, y)) = input.position {
                *lock(&cell) = Some(Point::new(x, y));
            }
        });

        let mut hosts = Vec::new();
        for (index, host) in self.input_hosts.iter().enumerate() {
            match host.add_listener(InputKind::PointerMove, &listener) {
                Ok(()) => hosts.push(index),
                Err(e) => debug!("No pointer tracking on {}: {}", host.name(), e),
            }
        }

        self.tracking = Some(PointerTracking { listener, hosts });
    }

    fn untrack_pointer(&mut self) {
        if let Some(tracking) = self.tracking.take() {
            for index in tracking.hosts {
                self.input_hosts[index].remove_listener(InputKind::PointerMove, &tracking.listener);
            }
        }
    }

    fn save_snapshot(&mut self, frame: RgbaImage) {
        let Some(dir) = self.snapshot_dir.clone() else {
            return;
        };
        let name = Local::now().format("frame-%Y%m%d-%H%M%S%3f.png").to_string();

        self.snapshot_task = Some(tokio::task::spawn_blocking(move || {
            if let Err(e) = std::fs::create_dir_all(&dir) {
                warn!("Failed to create snapshot directory {}: {}", dir.display(), e);
                return;
            }

            let path = dir.join(name);
            match save_png(&frame, &path) {
                Ok(()) => info!("Saved overlay frame to {}", path.display()),
                Err(e) => warn!("Failed to save overlay frame to {}: {}", path.display(), e),
            }
        }));
    }
}

impl Drop for Overlay {
    fn drop(&mut self) {
        self.untrack_pointer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{InputBus, RawInput};
    use crate::display::FixedViewport;
    use crate::render::{Canvas, Color, PixelSurfaceProvider, RenderError};

    struct NoSurface;

    impl SurfaceProvider for NoSurface {
        fn acquire(&self, _: u32, _: u32) -> Result<Box<dyn Canvas>, RenderError> {
            Err(RenderError::SurfaceUnavailable("test".to_string()))
        }
    }

    fn overlay_with(options: OverlayOptions) -> Overlay {
        Overlay::new(
            Arc::new(FixedViewport::new(64, 48)),
            Arc::new(PixelSurfaceProvider::new(Color::rgb(0, 0, 0))),
            options,
        )
        .with_seed(9)
    }

    fn overlay() -> Overlay {
        overlay_with(OverlayOptions::default())
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_and_deactivate_are_idempotent() {
        let mut overlay = overlay();
        let rx = overlay.subscribe();

        assert!(overlay.activate(&Expiry::for_test(1)));
        assert!(!overlay.activate(&Expiry::for_test(2)));
        assert_eq!(*rx.borrow(), OverlayState::Active);
        assert_eq!(overlay.activations(), 1);

        assert!(overlay.deactivate());
        assert!(!overlay.deactivate());
        assert_eq!(*rx.borrow(), OverlayState::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_starts_everything() {
        let mut overlay = overlay();
        overlay.activate(&Expiry::for_test(1));
        settle().await;

        let quote = overlay.quote().map(str::to_string);
        assert!(quote.is_some());
        assert!(overlay.renderer().is_running());
        assert!(overlay.renderer().frames_drawn() >= 1);
        assert_eq!(
            overlay.subscribe_clock().borrow().as_ref().map(|r| r.quote.clone()),
            quote
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_quote_fixed_while_active() {
        let mut overlay = overlay();
        overlay.activate(&Expiry::for_test(1));
        let quote = overlay.quote().map(str::to_string);

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(overlay.quote().map(str::to_string), quote);
        assert_eq!(
            overlay.subscribe_clock().borrow().as_ref().map(|r| r.quote.clone()),
            quote
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivation_releases_resources() {
        let bus = Arc::new(InputBus::new());
        let mut overlay = overlay();
        overlay.add_input_host(bus.clone());

        overlay.activate(&Expiry::for_test(1));
        assert!(overlay.is_tracking_pointer());
        assert_eq!(bus.listener_count(), 1);

        overlay.deactivate();
        assert!(!overlay.is_tracking_pointer());
        assert_eq!(bus.listener_count(), 0);
        assert!(!overlay.renderer().is_running());
        assert!(overlay.subscribe_clock().borrow().is_none());
        assert!(overlay.quote().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pointer_moves_feed_particles() {
        let bus = Arc::new(InputBus::new());
        let mut overlay = overlay();
        overlay.add_input_host(bus.clone());
        overlay.activate(&Expiry::for_test(1));

        assert_eq!(overlay.renderer().pointer(), None);
        bus.emit(RawInput::pointer_move(10.0, 20.0));
        assert_eq!(overlay.renderer().pointer(), Some(Point::new(10.0, 20.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_surface_keeps_clock() {
        let mut overlay = Overlay::new(
            Arc::new(FixedViewport::new(64, 48)),
            Arc::new(NoSurface),
            OverlayOptions::default(),
        );

        assert!(overlay.activate(&Expiry::for_test(1)));
        settle().await;

        assert!(overlay.is_active());
        assert!(!overlay.renderer().is_running());
        assert!(overlay.subscribe_clock().borrow().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_written_on_deactivate() {
        let dir = tempfile::tempdir().unwrap();
        let mut overlay = overlay_with(OverlayOptions {
            snapshot_dir: Some(dir.path().join("frames")),
            ..OverlayOptions::default()
        });

        overlay.activate(&Expiry::for_test(1));
        settle().await;
        overlay.deactivate();
        overlay.flush_snapshot().await;

        let files: Vec<_> = std::fs::read_dir(dir.path().join("frames"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("frame-") && files[0].ends_with(".png"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_snapshot_does_not_hold_up_deactivation() {
        let dir = tempfile::tempdir().unwrap();
        let mut overlay = Overlay::new(
            Arc::new(FixedViewport::new(1920, 1080)),
            Arc::new(PixelSurfaceProvider::new(Color::rgb(0, 0, 0))),
            OverlayOptions {
                snapshot_dir: Some(dir.path().to_path_buf()),
                ..OverlayOptions::default()
            },
        );

        overlay.activate(&Expiry::for_test(1));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(overlay.renderer().frames_drawn() >= 1);

        overlay.deactivate();
        let frames = overlay.renderer().frames_drawn();
        assert!(!overlay.renderer().is_running());
        assert_eq!(overlay.state(), OverlayState::Inactive);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(overlay.renderer().frames_drawn(), frames);

        overlay.flush_snapshot().await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
