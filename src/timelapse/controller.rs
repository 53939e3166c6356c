//! SessionController - single owner of the recording session.
//!
//! The controller owns the window locator, the process supervisor, the timer
//! and the raw field text. Control events are handled one at a time; each
//! runs the pure state machine and then executes the returned side effects.
//! Errors never escape `handle`: they end up in `DisplayState.error`.

use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::core::settings::AppSettings;
use crate::shared::paths::resolve_dir;

use super::display::DisplayState;
use super::errors::{LaunchError, SessionError, SupervisorError};
use super::recorder::command::{build_command, output_path_for};
use super::recorder::progress::{parse_stats_line, EncoderProgress};
use super::recorder::state::{
    transition, ActiveSession, SelectedWindow, SessionEvent, SessionState, SideEffect,
};
use super::recorder::supervisor::{ProcessStatus, ProcessSupervisor};
use super::recorder::timer::{format_elapsed, SessionTimer};
use super::types::{
    CaptureInput, CaptureSize, CodecProfile, ConfigField, ConfigFields, SessionConfig,
    SessionParams,
};
use super::window::{WindowCandidate, WindowLocator};

/// Fixed inputs for every session the controller starts.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub recordings_dir: PathBuf,
    pub container: String,
    pub encoder_program: String,
    pub codec: CodecProfile,
    pub capture_input: CaptureInput,
    pub max_capture: CaptureSize,
    pub grace_period: Duration,
    pub defaults: SessionParams,
}

impl ControllerSettings {
    pub fn from_app_settings(settings: &AppSettings, max_capture: CaptureSize) -> Self {
        Self {
            recordings_dir: resolve_dir(&settings.recordings_dir),
            container: settings.container.clone(),
            encoder_program: settings.encoder_program.clone(),
            codec: CodecProfile::resolve(settings.codec, settings.cpu_threads),
            capture_input: CaptureInput::default(),
            max_capture,
            grace_period: Duration::from_secs(settings.grace_period_secs),
            defaults: SessionParams {
                record_fps: settings.record_fps,
                target_fps: settings.target_fps,
                bitrate_kbps: settings.bitrate_kbps,
            },
        }
    }
}

/// Typed input from the control surface.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    SelectWindow(u32),
    SetField(ConfigField, String),
    Start,
    Stop,
    Cancel,
    Exit,
    RefreshWindows,
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

pub struct SessionController<L: WindowLocator, S: ProcessSupervisor> {
    locator: L,
    supervisor: S,
    settings: ControllerSettings,
    state: SessionState,
    timer: SessionTimer,
    fields: ConfigFields,
    windows: Vec<WindowCandidate>,
    error: Option<String>,
    progress: Option<EncoderProgress>,
    /// Most recent session, kept for display once back in Idle.
    last_session: Option<ActiveSession>,
    last_kill_failed: bool,
    exit_requested: bool,
    wall_clock: fn() -> DateTime<Local>,
}

impl<L: WindowLocator, S: ProcessSupervisor> SessionController<L, S> {
    pub fn new(locator: L, supervisor: S, settings: ControllerSettings) -> Self {
        Self {
            locator,
            supervisor,
            settings,
            state: SessionState::Idle,
            timer: SessionTimer::new(),
            fields: ConfigFields::default(),
            windows: Vec::new(),
            error: None,
            progress: None,
            last_session: None,
            last_kill_failed: false,
            exit_requested: false,
            wall_clock: Local::now,
        }
    }

    /// Overrides the clock used to timestamp output file names.
    pub fn with_wall_clock(mut self, wall_clock: fn() -> DateTime<Local>) -> Self {
        self.wall_clock = wall_clock;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    pub fn handle(&mut self, event: ControlEvent, now: Instant) -> Flow {
        match event {
            ControlEvent::SelectWindow(id) => self.select_window(id, now),
            ControlEvent::SetField(field, value) => self.fields.set(field, value),
            ControlEvent::Start => self.start(now),
            ControlEvent::Stop => self.stop(now),
            ControlEvent::Cancel => self.cancel(now),
            ControlEvent::RefreshWindows => self.refresh_windows(),
            ControlEvent::Exit => return self.exit(now),
            ControlEvent::Tick => return self.tick(now),
        }
        Flow::Continue
    }

    fn apply(&mut self, event: SessionEvent, now: Instant) {
        let from = self.state.phase();
        let session = self.state.session().cloned();
        let (new_state, effects) = transition(std::mem::take(&mut self.state), event);
        self.state = new_state;

        if from != self.state.phase() {
            tracing::info!(target: "session", "[CONTROLLER] {:?} -> {:?}", from, self.state.phase());
        }

        let mut kill_failed = false;
        for effect in effects {
            let is_kill = effect == SideEffect::KillProcess;
            self.execute_effect(effect, now);
            kill_failed |= is_kill && self.last_kill_failed;
        }

        if let (true, Some(session)) = (kill_failed, session) {
            tracing::warn!(target: "session", "[CONTROLLER] Encoder may still be running, watching it again");
            self.apply(SessionEvent::KillFailed { session, at: now }, now);
        }
    }

    fn execute_effect(&mut self, effect: SideEffect, now: Instant) {
        match effect {
            SideEffect::StartTimer => self.timer.start(now),
            SideEffect::FreezeTimer => self.timer.stop(now),
            SideEffect::ResetTimer => {
                self.timer.reset();
                self.progress = None;
            }
            SideEffect::SignalGracefulStop => {
                if let Err(e) = self.supervisor.request_graceful_stop() {
                    self.report(e.into());
                }
            }
            SideEffect::KillProcess => match self.supervisor.kill() {
                Ok(killed) => {
                    self.last_kill_failed = false;
                    tracing::info!(target: "session", "[CONTROLLER] Kill requested (process was running: {})", killed);
                }
                Err(e) => {
                    self.last_kill_failed = true;
                    self.report(e.into());
                }
            },
            SideEffect::DeleteOutput { path } => self.delete_output(path),
            SideEffect::ReportError { message } => {
                tracing::warn!(target: "session", "[CONTROLLER] {}", message);
                self.error = Some(message);
            }
            SideEffect::ClearError => self.error = None,
        }
    }

    fn report(&mut self, error: SessionError) {
        tracing::warn!(target: "session", "[CONTROLLER] {}", error);
        self.error = Some(error.to_string());
    }

    fn refresh_windows(&mut self) {
        match self.locator.list_candidate_windows() {
            Ok(windows) => {
                tracing::debug!(target: "session", "[CONTROLLER] {} candidate windows", windows.len());
                self.windows = windows;
            }
            Err(e) => self.report(e.into()),
        }
    }

    fn select_window(&mut self, id: u32, now: Instant) {
        if self.state.is_active() {
            self.report(SessionError::AlreadyRecording);
            return;
        }

        let event = match self.locator.resolve_region(id) {
            Ok(region) => {
                let title = self
                    .windows
                    .iter()
                    .find(|w| w.id == id)
                    .map(|w| w.title.clone())
                    .unwrap_or_else(|| format!("Window {}", id));

                tracing::info!(target: "session", "[CONTROLLER] Selected '{}' ({}) at {:?}", title, id, region);

                SessionEvent::WindowResolved {
                    window: SelectedWindow { id, title, region },
                }
            }
            Err(e) => SessionEvent::SelectionFailed { error: e.into() },
        };

        self.apply(event, now);
    }

    fn start(&mut self, now: Instant) {
        let selected = match &self.state {
            SessionState::WindowSelected { window } => Ok(window.clone()),
            SessionState::Idle => Err(SessionError::NoWindowSelected),
            SessionState::Recording { .. } | SessionState::Finalizing { .. } => {
                Err(SessionError::AlreadyRecording)
            }
        };
        let window = match selected {
            Ok(window) => window,
            Err(e) => return self.report(e),
        };

        let params = match self.fields.validate(&self.settings.defaults) {
            Ok(params) => params,
            Err(e) => return self.report(e.into()),
        };

        let event = match self.launch(window, params) {
            Ok(session) => {
                self.progress = None;
                self.last_session = Some(session.clone());
                SessionEvent::Launched { session }
            }
            Err(e) => SessionEvent::LaunchFailed { error: e.into() },
        };

        self.apply(event, now);
    }

    fn launch(
        &mut self,
        window: SelectedWindow,
        params: SessionParams,
    ) -> Result<ActiveSession, LaunchError> {
        let dir = &self.settings.recordings_dir;
        std::fs::create_dir_all(dir).map_err(|e| LaunchError::RecordingsDir(e.to_string()))?;

        let output_path = output_path_for(dir, &self.settings.container, (self.wall_clock)());
        if output_path.exists() {
            return Err(LaunchError::OutputExists(output_path));
        }

        let config = SessionConfig {
            program: self.settings.encoder_program.clone(),
            params,
            codec: self.settings.codec,
            input: self.settings.capture_input.clone(),
            region: window.region,
            max_capture: self.settings.max_capture,
            output_path: output_path.clone(),
        };

        let argv = build_command(&config);
        let info = self.supervisor.start(&argv, &output_path)?;

        let session = ActiveSession {
            session_id: uuid::Uuid::new_v4().to_string(),
            window,
            output_path,
            params,
        };

        tracing::info!(
            target: "session",
            "[CONTROLLER] Session {} recording to {:?} (pid={}, speedup={}x)",
            session.session_id,
            session.output_path,
            info.pid,
            params.speedup()
        );

        Ok(session)
    }

    fn stop(&mut self, now: Instant) {
        match self.state {
            SessionState::Recording { .. } => self.apply(SessionEvent::StopRequested { at: now }, now),
            SessionState::Finalizing { .. } => {}
            SessionState::Idle | SessionState::WindowSelected { .. } => {
                self.report(SessionError::NotRecording)
            }
        }
    }

    fn cancel(&mut self, now: Instant) {
        self.apply(SessionEvent::CancelRequested, now);
    }

    /// Stop gracefully and shut down once the encoder is gone. A repeated
    /// Exit while finalizing kills the encoder and shuts down immediately.
    fn exit(&mut self, now: Instant) -> Flow {
        match self.state {
            SessionState::Idle | SessionState::WindowSelected { .. } => {
                tracing::info!(target: "session", "[CONTROLLER] Exit requested, shutting down");
                Flow::Shutdown
            }
            SessionState::Recording { .. } => {
                tracing::info!(target: "session", "[CONTROLLER] Exit requested, finalizing first...");
                self.exit_requested = true;
                self.apply(SessionEvent::StopRequested { at: now }, now);
                self.shutdown_if_done()
            }
            SessionState::Finalizing { .. } if self.exit_requested => {
                tracing::warn!(target: "session", "[CONTROLLER] Exit repeated, killing encoder");
                self.apply(SessionEvent::KillRequested, now);
                Flow::Shutdown
            }
            SessionState::Finalizing { .. } => {
                self.exit_requested = true;
                Flow::Continue
            }
        }
    }

    fn shutdown_if_done(&self) -> Flow {
        if self.exit_requested && !self.state.is_active() {
            Flow::Shutdown
        } else {
            Flow::Continue
        }
    }

    fn tick(&mut self, now: Instant) -> Flow {
        self.drain_output();

        let event = match &self.state {
            SessionState::Recording { .. } => match self.supervisor.probe() {
                ProcessStatus::Running => None,
                ProcessStatus::Exited { code } => Some(crashed(code)),
                ProcessStatus::NotRunning => Some(crashed(None)),
            },
            SessionState::Finalizing {
                stop_requested_at, ..
            } => {
                let deadline = *stop_requested_at + self.settings.grace_period;
                match self.supervisor.probe() {
                    ProcessStatus::Running if now >= deadline => {
                        tracing::warn!(target: "session", "[CONTROLLER] Grace period of {:?} elapsed", self.settings.grace_period);
                        Some(SessionEvent::GraceExpired)
                    }
                    ProcessStatus::Running => None,
                    ProcessStatus::Exited { code } => {
                        tracing::info!(target: "session", "[CONTROLLER] Encoder finalized (code {:?})", code);
                        Some(SessionEvent::ProcessExited)
                    }
                    ProcessStatus::NotRunning => Some(SessionEvent::ProcessExited),
                }
            }
            SessionState::Idle | SessionState::WindowSelected { .. } => None,
        };

        if let Some(event) = event {
            self.apply(event, now);
            // Lines written between the last poll and the exit.
            self.drain_output();
        }

        self.shutdown_if_done()
    }

    fn drain_output(&mut self) {
        for line in self.supervisor.poll_output() {
            tracing::info!(target: "encoder", "{}", line);
            if let Some(progress) = parse_stats_line(&line) {
                self.progress = Some(progress);
            }
        }
    }

    /// Deletes a killed session's output. Skipped if the kill was not confirmed.
    fn delete_output(&mut self, path: PathBuf) {
        if self.last_kill_failed {
            tracing::warn!(target: "session", "[CONTROLLER] Kill not confirmed, keeping {:?}", path);
            return;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(target: "session", "[CONTROLLER] Deleted {:?}", path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(target: "session", "[CONTROLLER] Nothing to delete at {:?}", path);
            }
            Err(e) => self.report(SessionError::StorageError(e.to_string())),
        }

        self.last_session = None;
    }

    pub fn snapshot(&self, now: Instant) -> DisplayState {
        let elapsed = self.timer.elapsed(now);
        let session = self.state.session().or(self.last_session.as_ref());
        let params = session.map(|s| s.params);
        let window = self.state.window();

        let can_start = matches!(self.state, SessionState::WindowSelected { .. })
            && self.fields.validate(&self.settings.defaults).is_ok();

        DisplayState {
            phase: self.state.phase(),
            windows: self.windows.clone(),
            selected_window: window.map(|w| format!("{} ({})", w.title, w.id)),
            region: window.map(|w| w.region),
            elapsed_seconds: elapsed.as_secs_f64(),
            elapsed_text: format_elapsed(elapsed),
            expected_output_seconds: params.map(|p| p.output_seconds_for(elapsed.as_secs_f64())),
            speedup: params.map(|p| p.speedup()),
            encoder_time_seconds: self.progress.as_ref().and_then(|p| p.output_seconds()),
            encoder_line: self.progress.as_ref().map(|p| p.line.clone()),
            output_path: session.map(|s| s.output_path.to_string_lossy().to_string()),
            fields: self.fields.clone(),
            error: self.error.clone(),
            can_start,
            can_stop: matches!(self.state, SessionState::Recording { .. }),
            can_cancel: self.state.is_active(),
        }
    }
}

fn crashed(exit_code: Option<i32>) -> SessionEvent {
    SessionEvent::ProcessCrashed {
        error: SupervisorError::ProcessCrashed { exit_code }.into(),
    }
}
