//! Terminal control surface.
//!
//! A blocking input thread forwards key presses over an mpsc channel; the
//! loop `select!`s between keys and a fixed tick, hands each event to the
//! controller in arrival order and repaints the snapshot afterwards.

pub mod input;
pub mod render;
pub mod terminal;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::timelapse::recorder::ProcessSupervisor;
use crate::timelapse::window::WindowLocator;
use crate::timelapse::{ControlEvent, Flow, SessionController};
use input::{spawn_input_thread, UiState};
use terminal::TerminalGuard;

#[derive(Error, Debug)]
pub enum TuiError {
    #[error("Terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

pub async fn run<L, S>(
    mut controller: SessionController<L, S>,
    tick_interval: Duration,
) -> Result<(), TuiError>
where
    L: WindowLocator,
    S: ProcessSupervisor,
{
    let mut terminal = TerminalGuard::enter()?;

    let (key_tx, mut key_rx) = mpsc::channel(64);
    let stop_input = Arc::new(AtomicBool::new(false));
    let _input_handle = spawn_input_thread(key_tx, stop_input.clone());

    let mut ticker = tokio::time::interval(tick_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut ui = UiState::default();
    let mut input_closed = false;
    controller.handle(ControlEvent::RefreshWindows, Instant::now());

    tracing::info!(target: "system", "[TUI] Starting event loop");

    let result = loop {
        let flow = tokio::select! {
            key = key_rx.recv(), if !input_closed => {
                if key.is_none() {
                    tracing::warn!(target: "system", "[TUI] Input closed, exiting");
                    input_closed = true;
                }
                let now = Instant::now();
                let snapshot = controller.snapshot(now);
                match ui.map_input(key, &snapshot) {
                    Some(event) => {
                        tracing::debug!(target: "session", "[TUI] {:?}", event);
                        controller.handle(event, now)
                    }
                    None => Flow::Continue,
                }
            }
            _ = ticker.tick() => controller.handle(ControlEvent::Tick, Instant::now()),
        };

        if flow == Flow::Shutdown {
            break Ok(());
        }

        let rows = terminal.rows();
        let snapshot = controller.snapshot(Instant::now());
        if let Err(e) = render::draw(terminal.out(), &snapshot, &ui, rows) {
            break Err(TuiError::from(e));
        }
    };

    stop_input.store(true, Ordering::Relaxed);
    tracing::info!(target: "system", "[TUI] Event loop finished");
    result
}
