//! idlescreen - idle activity monitor daemon
//!
//! Watches for user input and, after a stretch of inactivity, brings up an
//! ambient overlay (animated scene, clock and quote) until the user returns.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use idlescreen::activity::{InputBus, SystemIdleHost};
use idlescreen::config::Config;
use idlescreen::console;
use idlescreen::display::{self, DisplayViewport};
use idlescreen::overlay::{Overlay, OverlayOptions, QuotePool};
use idlescreen::prefs::{self, JsonFileStore};
use idlescreen::render::{self, FrameInput, PixelCanvas, PixelSurfaceProvider, Point, SparkleField};
use idlescreen::{Monitor, MonitorHandle};

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// Idle activity monitor with an ambient overlay.
#[derive(Parser, Debug)]
#[command(name = "idlescreen")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Idle timeout in milliseconds, overriding config and preferences.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the idle monitor (default).
    Run,
    /// Render a single overlay frame to a PNG file.
    Render {
        /// Seconds since activation.
        #[arg(long, default_value_t = 0.0)]
        time: f64,
        #[arg(long, default_value_t = 1280)]
        width: u32,
        #[arg(long, default_value_t = 720)]
        height: u32,
        /// Pointer position as X,Y.
        #[arg(long, value_parser = parse_point)]
        pointer: Option<Point>,
        #[arg(long, default_value = "frame.png")]
        out: PathBuf,
    },
    /// List detected displays.
    Monitors,
    /// Inspect or change stored preferences.
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(Subcommand, Debug)]
enum PrefsAction {
    /// Print the effective preferences.
    Show,
    /// Store a new idle timeout in milliseconds.
    SetTimeout { ms: u64 },
    /// Forget stored preferences.
    Reset,
}

fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {s:?}"))?;
    let x = x.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let y = y.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Ok(Point::new(x, y))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(ms) = args.timeout_ms {
        config.idle.timeout_ms = ms;
    }
    config.validate()?;

    init_tracing(&config.logging.level, config.logging.json)?;
    debug!("Configuration: {:?}", config);

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
            let result = runtime.block_on(run_daemon(config, args.timeout_ms.is_some()));
            // The stdin reader sits in a blocking read; don't wait for it.
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
            result
        }
        Command::Render {
            time,
            width,
            height,
            pointer,
            out,
        } => render_one(&config, time, width, height, pointer, out),
        Command::Monitors => print_monitors(),
        Command::Prefs { action } => prefs_command(&config, action),
    }
}

async fn run_daemon(config: Config, timeout_pinned: bool) -> Result<()> {
    info!("Starting idlescreen v{}", VERSION);

    match display::list_monitors() {
        Ok(monitors) => {
            info!("Available monitors:");
            for m in &monitors {
                info!(
                    "  Monitor {}: {}x{}{}",
                    m.id,
                    m.width,
                    m.height,
                    if m.is_primary { " (primary)" } else { "" }
                );
            }
        }
        Err(e) => warn!("Could not list monitors: {}", e),
    }

    let store = JsonFileStore::open(&config.preferences.path);
    let timeout = match prefs::stored_timeout(&store) {
        Some(stored) if !timeout_pinned => {
            info!("Using idle timeout {:?} from preferences", stored);
            stored
        }
        _ => config.idle.timeout(),
    };

    let background = config
        .overlay
        .background_color()
        .context("Invalid overlay background colour")?;
    let options = OverlayOptions {
        frame_interval: config.overlay.frame_interval(),
        quotes: config
            .overlay
            .quotes
            .as_deref()
            .map(QuotePool::from_custom)
            .unwrap_or_default(),
        snapshot_dir: config.overlay.snapshot_dir.clone(),
    };
    let overlay = Overlay::new(
        Arc::new(DisplayViewport::new(
            config.overlay.fallback_width,
            config.overlay.fallback_height,
        )),
        Arc::new(PixelSurfaceProvider::new(background)),
        options,
    );

    let mut monitor = Monitor::new(timeout, overlay);

    let bus = Arc::new(InputBus::new());
    monitor.attach_host(bus.clone());

    if config.input.system {
        match SystemIdleHost::new(config.input.poll_interval()) {
            Ok(host) => {
                monitor.attach_host(Arc::new(host));
            }
            Err(e) => warn!("System idle counter unavailable, continuing without it: {}", e),
        }
    }

    let (handle, mut task) = monitor.spawn();

    if config.input.stdin {
        console::spawn_stdin_console(bus.clone(), handle.clone());
        info!("Reading commands from stdin (move X Y, key, click, reset, dismiss, status, quit)");
    }

    if !timeout_pinned {
        let prefs_handle = handle.clone();
        prefs::spawn_timeout_watch(
            config.preferences.path.clone(),
            config.preferences.watch_interval(),
            Some(timeout),
            move |timeout| prefs_handle.set_timeout(timeout),
        );
    }

    tokio::spawn(log_transitions(handle.clone()));

    let interrupted = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            true
        }
        result = &mut task => {
            result.context("Monitor task failed")?;
            false
        }
    };

    if interrupted {
        info!("Shutdown requested");
        handle.shutdown();
        task.await.context("Monitor task failed")?;
    }

    info!("idlescreen shutdown complete");
    Ok(())
}

/// Log every overlay state change and clock refresh.
async fn log_transitions(handle: MonitorHandle) {
    let mut state = handle.watch_state();
    let mut clock = handle.watch_clock();

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                info!("Overlay is now {}", *state.borrow_and_update());
            }
            changed = clock.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(reading) = clock.borrow_and_update().as_ref() {
                    debug!("{}  {}  {}", reading.time, reading.date, reading.zone);
                    if reading.tick == 0 {
                        for line in reading.panel_lines() {
                            info!("{}", line);
                        }
                    }
                }
            }
        }
    }
}

fn render_one(
    config: &Config,
    time: f64,
    width: u32,
    height: u32,
    pointer: Option<Point>,
    out: PathBuf,
) -> Result<()> {
    let max = render::canvas::MAX_DIMENSION;
    if width == 0 || height == 0 || width > max || height > max {
        bail!("Frame size {}x{} is out of range", width, height);
    }
    if !time.is_finite() || time < 0.0 {
        bail!("Time must be a non-negative number of seconds");
    }

    let background = config
        .overlay
        .background_color()
        .context("Invalid overlay background colour")?;
    let mut canvas = PixelCanvas::new(width, height, background);
    let input = FrameInput {
        t: time,
        width,
        height,
        pointer,
    };
    render::render_frame(&mut canvas, &input, &SparkleField::empty());
    render::save_png(canvas.image(), &out)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    info!("Wrote {}x{} frame at t={}s to {}", width, height, time, out.display());
    Ok(())
}

fn print_monitors() -> Result<()> {
    let monitors = display::list_monitors().context("Failed to list monitors")?;
    if monitors.is_empty() {
        println!("No monitors detected");
    }
    for m in &monitors {
        println!(
            "{}: {}x{}{}",
            m.id,
            m.width,
            m.height,
            if m.is_primary { " (primary)" } else { "" }
        );
    }
    Ok(())
}

fn prefs_command(config: &Config, action: PrefsAction) -> Result<()> {
    let mut store = JsonFileStore::open(&config.preferences.path);

    match action {
        PrefsAction::Show => {
            let current = prefs::load_preferences(&store);
            println!("{}", serde_json::to_string_pretty(&current)?);
        }
        PrefsAction::SetTimeout { ms } => {
            if ms == 0 {
                bail!("Timeout must be greater than 0");
            }
            let mut current = prefs::load_preferences(&store);
            current.screensaver_timeout = ms;
            prefs::save_preferences(&mut store, &current)?;
            println!("Idle timeout set to {}s", Duration::from_millis(ms).as_secs_f64());
        }
        PrefsAction::Reset => {
            prefs::reset_preferences(&mut store)?;
            println!("Preferences reset to defaults");
        }
    }
    Ok(())
}

/// Initialize tracing subscriber with the given log level.
fn init_tracing(level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}
