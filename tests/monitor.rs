//! End-to-end behaviour of the idle monitor under virtual time.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::advance;

use idlescreen::activity::{InputBus, InputKind, RawInput};
use idlescreen::display::FixedViewport;
use idlescreen::overlay::quotes::BUILTIN_QUOTES;
use idlescreen::overlay::{Overlay, OverlayOptions};
use idlescreen::render::{Color, PixelSurfaceProvider};
use idlescreen::{Monitor, MonitorHandle, OverlayState};

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

async fn step(ms: u64) {
    advance(Duration::from_millis(ms)).await;
    settle().await;
}

async fn start(timeout_ms: u64) -> (MonitorHandle, Arc<InputBus>) {
    let overlay = Overlay::new(
        Arc::new(FixedViewport::new(64, 48)),
        Arc::new(PixelSurfaceProvider::new(Color::rgb(0, 0, 0))),
        OverlayOptions::default(),
    )
    .with_seed(2024);

    let bus = Arc::new(InputBus::new());
    let mut monitor = Monitor::new(Duration::from_millis(timeout_ms), overlay);
    assert_eq!(monitor.attach_host(bus.clone()), InputKind::ALL.len());

    let (handle, _task) = monitor.spawn();
    settle().await;
    (handle, bus)
}

#[tokio::test(start_paused = true)]
async fn activates_after_timeout_and_input_restarts_countdown() {
    let (handle, bus) = start(1000).await;

    step(999).await;
    assert!(!handle.is_active());
    step(1).await;
    assert!(handle.is_active());

    step(1).await;
    bus.emit(RawInput::new(InputKind::KeyPress));
    settle().await;
    assert!(!handle.is_active());

    step(999).await;
    assert!(!handle.is_active());
    step(1).await;
    assert!(handle.is_active());
}

#[tokio::test(start_paused = true)]
async fn activity_spaced_below_timeout_never_activates() {
    let (handle, bus) = start(1000).await;
    let mut state = handle.watch_state();
    state.borrow_and_update();

    let kinds = [
        InputKind::PointerDown,
        InputKind::KeyPress,
        InputKind::Scroll,
        InputKind::Touch,
        InputKind::Click,
        InputKind::System,
    ];
    for i in 0..60 {
        step(999).await;
        bus.emit(RawInput::new(kinds[i % kinds.len()]));
        settle().await;
    }

    assert!(!state.has_changed().unwrap());
    assert_eq!(handle.state(), OverlayState::Inactive);
}

#[tokio::test(start_paused = true)]
async fn activates_exactly_once_per_idle_period() {
    let (handle, _bus) = start(500).await;
    let mut state = handle.watch_state();
    state.borrow_and_update();

    step(500).await;
    assert!(state.has_changed().unwrap());
    assert_eq!(*state.borrow_and_update(), OverlayState::Active);

    for _ in 0..10 {
        step(500).await;
    }
    assert!(!state.has_changed().unwrap());
    assert!(handle.is_active());
}

#[tokio::test(start_paused = true)]
async fn second_input_before_timeout_does_not_reactivate() {
    let (handle, bus) = start(1000).await;
    step(1000).await;
    assert!(handle.is_active());

    bus.emit(RawInput::pointer_move(5.0, 5.0));
    settle().await;
    assert!(!handle.is_active());

    step(500).await;
    bus.emit(RawInput::new(InputKind::Click));
    settle().await;

    step(999).await;
    assert!(!handle.is_active());
    step(1).await;
    assert!(handle.is_active());
}

#[tokio::test(start_paused = true)]
async fn manual_reset_and_dismiss() {
    let (handle, _bus) = start(200).await;

    step(150).await;
    handle.reset_timer();
    settle().await;
    step(150).await;
    assert!(!handle.is_active());
    step(50).await;
    assert!(handle.is_active());

    handle.dismiss();
    settle().await;
    assert!(!handle.is_active());
    step(200).await;
    assert!(handle.is_active());
}

#[tokio::test(start_paused = true)]
async fn timeout_change_applies_from_next_restart() {
    let (handle, bus) = start(1000).await;

    handle.set_timeout(Duration::from_millis(100));
    settle().await;
    step(500).await;
    assert!(!handle.is_active());

    bus.emit(RawInput::new(InputKind::KeyPress));
    settle().await;
    step(100).await;
    assert!(handle.is_active());
}

#[tokio::test(start_paused = true)]
async fn clock_runs_only_while_active() {
    let (handle, bus) = start(100).await;
    let clock = handle.watch_clock();
    assert!(clock.borrow().is_none());

    step(100).await;
    let first = clock.borrow().clone().unwrap();
    assert_eq!(first.tick, 0);
    assert!(BUILTIN_QUOTES.contains(&first.quote.as_str()));

    step(1000).await;
    let second = clock.borrow().clone().unwrap();
    assert_eq!(second.tick, 1);
    assert_eq!(second.quote, first.quote);

    bus.emit(RawInput::new(InputKind::Scroll));
    settle().await;
    assert!(clock.borrow().is_none());
}

#[tokio::test(start_paused = true)]
async fn activations_cover_whole_quote_pool() {
    let (handle, _bus) = start(10).await;
    let clock = handle.watch_clock();
    let mut seen = HashSet::new();

    for _ in 0..1000 {
        step(10).await;
        let reading = clock.borrow().clone();
        let reading = reading.expect("overlay should be active");
        seen.insert(reading.quote);
        handle.dismiss();
        settle().await;
    }

    assert_eq!(seen.len(), BUILTIN_QUOTES.len());
}

#[tokio::test(start_paused = true)]
async fn shutdown_deactivates_and_releases_listeners() {
    let overlay = Overlay::new(
        Arc::new(FixedViewport::new(64, 48)),
        Arc::new(PixelSurfaceProvider::new(Color::rgb(0, 0, 0))),
        OverlayOptions::default(),
    );
    let bus = Arc::new(InputBus::new());
    let mut monitor = Monitor::new(Duration::from_millis(100), overlay);
    monitor.attach_host(bus.clone());
    let (handle, task) = monitor.spawn();
    settle().await;

    step(100).await;
    assert!(handle.is_active());
    // Activity listeners plus the active-only pointer tracker.
    assert_eq!(bus.listener_count(), InputKind::ALL.len() + 1);

    handle.shutdown();
    tokio_test::assert_ok!(task.await);

    assert_eq!(handle.state(), OverlayState::Inactive);
    assert_eq!(bus.listener_count(), 0);
}
