//! Line-based control input for the daemon.
//!
//! Each line is either a raw input fed to an [`InputBus`] or a request for
//! the monitor:
//!
//! ```text
//! move X Y | down | key | scroll | touch | click
//! reset | dismiss | status | quit
//! ```

use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::activity::{InputBus, InputKind, RawInput};
use crate::monitor::MonitorHandle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    Input(InputKind, Option<(f64, f64)>),
    Reset,
    Dismiss,
    Status,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Usage: move X Y")]
    BadPosition,
}

/// Parse one console line. Blank lines parse to `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "move" => {
            let x = words.next().and_then(|w| w.parse::<f64>().ok());
            let y = words.next().and_then(|w| w.parse::<f64>().ok());
            match (x, y) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
                    ConsoleCommand::Input(InputKind::PointerMove, Some((x, y)))
                }
                _ => return Err(ParseError::BadPosition),
            }
        }
        "down" => ConsoleCommand::Input(InputKind::PointerDown, None),
        "key" => ConsoleCommand::Input(InputKind::KeyPress, None),
        "scroll" => ConsoleCommand::Input(InputKind::Scroll, None),
        "touch" => ConsoleCommand::Input(InputKind::Touch, None),
        "click" => ConsoleCommand::Input(InputKind::Click, None),
        "reset" => ConsoleCommand::Reset,
        "dismiss" => ConsoleCommand::Dismiss,
        "status" => ConsoleCommand::Status,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// Apply a command. Returns false when the console should stop reading.
pub fn execute(command: ConsoleCommand, bus: &InputBus, monitor: &MonitorHandle) -> bool {
    match command {
        ConsoleCommand::Input(kind, position) => {
            let mut input = RawInput::new(kind);
            input.position = position;
            bus.emit(input);
        }
        ConsoleCommand::Reset => monitor.reset_timer(),
        ConsoleCommand::Dismiss => monitor.dismiss(),
        ConsoleCommand::Status => {
            let clock = monitor.watch_clock().borrow().clone();
            match clock {
                Some(reading) => {
                    info!("Overlay {}: {}", monitor.state(), reading.panel_lines().join(" | "))
                }
                None => info!("Overlay {}", monitor.state()),
            }
        }
        ConsoleCommand::Quit => {
            monitor.shutdown();
            return false;
        }
    }
    true
}

/// Read commands from `reader` until EOF or `quit`.
pub async fn run_console<R>(reader: R, bus: Arc<InputBus>, monitor: MonitorHandle)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Console input closed");
                break;
            }
            Err(e) => {
                warn!("Failed to read console input: {}", e);
                break;
            }
        };

        match parse_line(&line) {
            Ok(Some(command)) => {
                if !execute(command, &bus, &monitor) {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("{}", e),
        }
    }
}

/// Spawn a console reading stdin.
pub fn spawn_stdin_console(bus: Arc<InputBus>, monitor: MonitorHandle) -> JoinHandle<()> {
    tokio::spawn(run_console(BufReader::new(tokio::io::stdin()), bus, monitor))
}
