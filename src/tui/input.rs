//! Keyboard input: a blocking reader thread plus the pure key-to-event mapping.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::timelapse::types::ConfigField;
use crate::timelapse::{ControlEvent, DisplayState};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Forwards key presses until `stop` is set or the receiver is dropped.
pub fn spawn_input_thread(tx: mpsc::Sender<KeyEvent>, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            match event::poll(POLL_INTERVAL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    tracing::warn!(target: "system", "Input poll failed: {}", e);
                    break;
                }
            }

            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if tx.blocking_send(key).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(target: "system", "Input read failed: {}", e);
                    break;
                }
            }
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Windows,
    Field(ConfigField),
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Windows => Focus::Field(ConfigField::RecordFps),
            Focus::Field(ConfigField::RecordFps) => Focus::Field(ConfigField::TargetFps),
            Focus::Field(ConfigField::TargetFps) => Focus::Field(ConfigField::Bitrate),
            Focus::Field(ConfigField::Bitrate) => Focus::Windows,
        }
    }
}

/// Frontend-only state: focus and list cursor.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub focus: Focus,
    pub cursor: usize,
}

impl UiState {
    /// `None` means the input thread is gone; nothing can be typed any more.
    pub fn map_input(
        &mut self,
        key: Option<KeyEvent>,
        display: &DisplayState,
    ) -> Option<ControlEvent> {
        match key {
            Some(key) => self.map_key(key, display),
            None => Some(ControlEvent::Exit),
        }
    }

    pub fn map_key(&mut self, key: KeyEvent, display: &DisplayState) -> Option<ControlEvent> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(ControlEvent::Exit);
        }

        match key.code {
            KeyCode::Char('r') | KeyCode::Char('R') => return Some(ControlEvent::Start),
            KeyCode::Char('s') | KeyCode::Char('S') => return Some(ControlEvent::Stop),
            KeyCode::Char('c') | KeyCode::Char('C') => return Some(ControlEvent::Cancel),
            KeyCode::Char('x') | KeyCode::Char('X') => return Some(ControlEvent::Exit),
            KeyCode::F(5) => return Some(ControlEvent::RefreshWindows),
            KeyCode::Tab => {
                self.focus = self.focus.next();
                return None;
            }
            KeyCode::Esc => {
                self.focus = Focus::Windows;
                return None;
            }
            _ => {}
        }

        match self.focus {
            Focus::Windows => self.map_list_key(key.code, display),
            Focus::Field(field) => map_field_key(field, key.code, display),
        }
    }

    fn map_list_key(&mut self, code: KeyCode, display: &DisplayState) -> Option<ControlEvent> {
        let count = display.windows.len();
        if count == 0 {
            self.cursor = 0;
            return None;
        }
        self.cursor = self.cursor.min(count - 1);

        match code {
            KeyCode::Up => {
                self.cursor = self.cursor.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                self.cursor = (self.cursor + 1).min(count - 1);
                None
            }
            KeyCode::Enter => display
                .windows
                .get(self.cursor)
                .map(|w| ControlEvent::SelectWindow(w.id)),
            _ => None,
        }
    }
}

fn map_field_key(
    field: ConfigField,
    code: KeyCode,
    display: &DisplayState,
) -> Option<ControlEvent> {
    let mut value = display.fields.get(field).to_string();
    match code {
        KeyCode::Char(ch) if ch.is_ascii_digit() || ch == '.' => value.push(ch),
        KeyCode::Backspace => {
            value.pop()?;
        }
        _ => return None,
    }
    Some(ControlEvent::SetField(field, value))
}
