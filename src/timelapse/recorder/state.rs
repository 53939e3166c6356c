//! Pure state machine for the session lifecycle.
//!
//! `(SessionState, SessionEvent) -> (SessionState, Vec<SideEffect>)`
//!
//! The controller performs all I/O and feeds the outcome back in as events.
//! Invalid transitions return the current state with empty effects.

use std::path::PathBuf;
use std::time::Instant;

use super::super::errors::SessionError;
use super::super::types::{CaptureRegion, SessionParams};

/// Window picked by the user, frozen at selection time.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedWindow {
    pub id: u32,
    pub title: String,
    pub region: CaptureRegion,
}

/// A launched encoder session.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    pub session_id: String,
    pub window: SelectedWindow,
    pub output_path: PathBuf,
    pub params: SessionParams,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Idle,

    /// Region resolved, ready to start.
    WindowSelected { window: SelectedWindow },

    /// Encoder running and writing the output file.
    Recording { session: ActiveSession },

    /// Graceful stop sent, waiting for the encoder to exit.
    Finalizing {
        session: ActiveSession,
        stop_requested_at: Instant,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    WindowSelected,
    Recording,
    Finalizing,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::WindowSelected { .. } => SessionPhase::WindowSelected,
            SessionState::Recording { .. } => SessionPhase::Recording,
            SessionState::Finalizing { .. } => SessionPhase::Finalizing,
        }
    }

    /// True while an encoder process belongs to this session.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Recording { .. } | SessionState::Finalizing { .. }
        )
    }

    pub fn session(&self) -> Option<&ActiveSession> {
        match self {
            SessionState::Recording { session } | SessionState::Finalizing { session, .. } => {
                Some(session)
            }
            _ => None,
        }
    }

    pub fn window(&self) -> Option<&SelectedWindow> {
        match self {
            SessionState::WindowSelected { window } => Some(window),
            SessionState::Recording { session } | SessionState::Finalizing { session, .. } => {
                Some(&session.window)
            }
            SessionState::Idle => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Locator resolved the picked window.
    WindowResolved { window: SelectedWindow },

    SelectionFailed { error: SessionError },

    /// Encoder spawned successfully.
    Launched { session: ActiveSession },

    LaunchFailed { error: SessionError },

    StopRequested { at: Instant },

    CancelRequested,

    /// Kill immediately but keep the output (second Exit).
    KillRequested,

    /// Encoder exited after a graceful stop.
    ProcessExited,

    /// Encoder died while believed to be recording.
    ProcessCrashed { error: SessionError },

    /// Encoder ignored the graceful stop for the whole grace period.
    GraceExpired,

    /// A kill could not be confirmed; the encoder may still own the session.
    KillFailed { session: ActiveSession, at: Instant },
}

/// Side effects executed by the controller. The state machine never performs I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    StartTimer,
    FreezeTimer,
    ResetTimer,
    SignalGracefulStop,
    KillProcess,
    DeleteOutput { path: PathBuf },
    ReportError { message: String },
    ClearError,
}

pub fn transition(state: SessionState, event: SessionEvent) -> (SessionState, Vec<SideEffect>) {
    match (&state, event) {
        // Idle | WindowSelected + WindowResolved -> WindowSelected
        (
            SessionState::Idle | SessionState::WindowSelected { .. },
            SessionEvent::WindowResolved { window },
        ) => (
            SessionState::WindowSelected { window },
            vec![SideEffect::ClearError],
        ),

        // Idle | WindowSelected + SelectionFailed -> Idle
        (
            SessionState::Idle | SessionState::WindowSelected { .. },
            SessionEvent::SelectionFailed { error },
        ) => (
            SessionState::Idle,
            vec![SideEffect::ReportError {
                message: error.to_string(),
            }],
        ),

        // WindowSelected + Launched -> Recording
        (SessionState::WindowSelected { .. }, SessionEvent::Launched { session }) => (
            SessionState::Recording { session },
            vec![SideEffect::ClearError, SideEffect::StartTimer],
        ),

        // WindowSelected + LaunchFailed -> WindowSelected
        (SessionState::WindowSelected { .. }, SessionEvent::LaunchFailed { error }) => (
            state,
            vec![SideEffect::ReportError {
                message: error.to_string(),
            }],
        ),

        // Recording + StopRequested -> Finalizing
        (SessionState::Recording { session }, SessionEvent::StopRequested { at }) => {
            let new_state = SessionState::Finalizing {
                session: session.clone(),
                stop_requested_at: at,
            };
            (new_state, vec![SideEffect::SignalGracefulStop])
        }

        // Recording | Finalizing + CancelRequested -> Idle (output deleted)
        (
            SessionState::Recording { session } | SessionState::Finalizing { session, .. },
            SessionEvent::CancelRequested,
        ) => {
            let path = session.output_path.clone();
            (
                SessionState::Idle,
                vec![
                    SideEffect::KillProcess,
                    SideEffect::DeleteOutput { path },
                    SideEffect::ResetTimer,
                ],
            )
        }

        // Recording | Finalizing + KillRequested -> Idle (output retained)
        (
            SessionState::Recording { .. } | SessionState::Finalizing { .. },
            SessionEvent::KillRequested,
        ) => (
            SessionState::Idle,
            vec![SideEffect::KillProcess, SideEffect::FreezeTimer],
        ),

        // Finalizing + ProcessExited -> Idle (output retained)
        (SessionState::Finalizing { .. }, SessionEvent::ProcessExited) => {
            (SessionState::Idle, vec![SideEffect::FreezeTimer])
        }

        // Recording + ProcessCrashed -> Idle (partial output retained)
        (SessionState::Recording { .. }, SessionEvent::ProcessCrashed { error }) => (
            SessionState::Idle,
            vec![
                SideEffect::FreezeTimer,
                SideEffect::ReportError {
                    message: error.to_string(),
                },
            ],
        ),

        // Finalizing + GraceExpired -> Idle (killed, output retained)
        (SessionState::Finalizing { .. }, SessionEvent::GraceExpired) => (
            SessionState::Idle,
            vec![
                SideEffect::KillProcess,
                SideEffect::FreezeTimer,
                SideEffect::ReportError {
                    message: "Encoder did not finish in time and was killed".to_string(),
                },
            ],
        ),

        // Idle + KillFailed -> Finalizing (keep polling, retry after grace)
        (SessionState::Idle, SessionEvent::KillFailed { session, at }) => (
            SessionState::Finalizing {
                session,
                stop_requested_at: at,
            },
            vec![],
        ),

        _ => (state, vec![]),
    }
}
