//! Snapshot of everything the control surface renders on a tick.

use super::recorder::SessionPhase;
use super::types::{CaptureRegion, ConfigFields};
use super::window::WindowCandidate;

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    pub phase: SessionPhase,
    pub windows: Vec<WindowCandidate>,
    pub selected_window: Option<String>,
    pub region: Option<CaptureRegion>,
    /// Real wall-clock time since Start.
    pub elapsed_seconds: f64,
    pub elapsed_text: String,
    /// What the output should last given the session's rates.
    pub expected_output_seconds: Option<f64>,
    pub speedup: Option<f64>,
    /// Output time reported by the encoder itself.
    pub encoder_time_seconds: Option<f64>,
    pub encoder_line: Option<String>,
    pub output_path: Option<String>,
    pub fields: ConfigFields,
    pub error: Option<String>,
    pub can_start: bool,
    pub can_stop: bool,
    pub can_cancel: bool,
}

impl DisplayState {
    pub fn status_label(&self) -> &'static str {
        match self.phase {
            SessionPhase::Idle => "Idle",
            SessionPhase::WindowSelected => "Ready",
            SessionPhase::Recording => "Recording",
            SessionPhase::Finalizing => "Finalizing",
        }
    }
}
