use chrono::{DateTime, Local, TimeZone};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use winlapse_lib::timelapse::errors::{LaunchError, SelectionError, SupervisorError};
use winlapse_lib::timelapse::recorder::{
    ProcessInfo, ProcessStatus, ProcessSupervisor, SessionPhase, SessionState,
};
use winlapse_lib::timelapse::types::{
    CaptureInput, CaptureRegion, CaptureSize, CodecProfile, ConfigField, SessionParams,
};
use winlapse_lib::timelapse::window::{WindowCandidate, WindowLocator};
use winlapse_lib::timelapse::{ControlEvent, ControllerSettings, Flow, SessionController};

const STATS_LINE: &str =
    "frame=  360 fps=1.0 q=23.0 size=    2048kB time=00:00:06.00 bitrate=2796.2kbits/s speed=0.0167x";

struct FakeLocator {
    regions: HashMap<u32, Result<CaptureRegion, SelectionError>>,
}

impl FakeLocator {
    fn with_window(id: u32, region: CaptureRegion) -> Self {
        Self {
            regions: HashMap::from([(id, Ok(region))]),
        }
    }
}

impl WindowLocator for FakeLocator {
    fn list_candidate_windows(&self) -> Result<Vec<WindowCandidate>, SelectionError> {
        let mut ids: Vec<u32> = self.regions.keys().copied().collect();
        ids.sort();
        Ok(ids
            .into_iter()
            .map(|id| WindowCandidate {
                id,
                title: format!("Window {}", id),
            })
            .collect())
    }

    fn resolve_region(&self, id: u32) -> Result<CaptureRegion, SelectionError> {
        self.regions
            .get(&id)
            .cloned()
            .unwrap_or(Err(SelectionError::WindowNotFound(id)))
    }
}

/// What the fake encoder did, shared with the test body.
#[derive(Default)]
struct EncoderLog {
    launches: Vec<Vec<String>>,
    signals: u32,
    kills: u32,
    lines: Vec<String>,
    running: bool,
    crash: bool,
}

#[derive(Default)]
struct FakeSupervisor {
    log: Arc<Mutex<EncoderLog>>,
    info: Option<ProcessInfo>,
    missing_executable: bool,
    ignores_graceful_stop: bool,
}

impl ProcessSupervisor for FakeSupervisor {
    fn start(&mut self, argv: &[String], output_path: &Path) -> Result<ProcessInfo, LaunchError> {
        if self.missing_executable {
            return Err(LaunchError::ExecutableNotFound(argv[0].clone()));
        }

        std::fs::write(output_path, b"partial").unwrap();

        let mut log = self.log.lock().unwrap();
        log.launches.push(argv.to_vec());
        log.running = true;

        let info = ProcessInfo {
            pid: 4242,
            started_at: Instant::now(),
            output_path: output_path.to_path_buf(),
        };
        self.info = Some(info.clone());
        Ok(info)
    }

    fn probe(&mut self) -> ProcessStatus {
        let mut log = self.log.lock().unwrap();
        if !log.running {
            return ProcessStatus::NotRunning;
        }

        if log.crash {
            log.running = false;
            self.info = None;
            return ProcessStatus::Exited { code: Some(1) };
        }

        if log.signals > 0 && !self.ignores_graceful_stop {
            log.running = false;
            self.info = None;
            return ProcessStatus::Exited { code: Some(0) };
        }

        ProcessStatus::Running
    }

    fn request_graceful_stop(&mut self) -> Result<(), SupervisorError> {
        let mut log = self.log.lock().unwrap();
        log.signals += 1;
        log.lines.push(STATS_LINE.to_string());
        Ok(())
    }

    fn kill(&mut self) -> Result<bool, SupervisorError> {
        let mut log = self.log.lock().unwrap();
        if !log.running {
            return Ok(false);
        }
        log.running = false;
        log.kills += 1;
        self.info = None;
        Ok(true)
    }

    fn poll_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log.lock().unwrap().lines)
    }

    fn active(&self) -> Option<&ProcessInfo> {
        self.info.as_ref()
    }
}

fn fixed_clock() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
}

fn full_screen() -> CaptureRegion {
    CaptureRegion {
        x: 0,
        y: 0,
        width: 1920,
        height: 1080,
    }
}

struct Harness {
    ctl: SessionController<FakeLocator, FakeSupervisor>,
    log: Arc<Mutex<EncoderLog>>,
    recordings: PathBuf,
    _dir: tempfile::TempDir,
    t0: Instant,
}

impl Harness {
    fn new(locator: FakeLocator, supervisor: FakeSupervisor) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let recordings = dir.path().join("recordings");
        let log = supervisor.log.clone();

        let settings = ControllerSettings {
            recordings_dir: recordings.clone(),
            container: "mkv".to_string(),
            encoder_program: "ffmpeg".to_string(),
            codec: CodecProfile::Gpu,
            capture_input: CaptureInput::Gdigrab,
            max_capture: CaptureSize {
                width: 1920,
                height: 1080,
            },
            grace_period: Duration::from_secs(30),
            defaults: SessionParams::default(),
        };

        let ctl =
            SessionController::new(locator, supervisor, settings).with_wall_clock(fixed_clock);

        Self {
            ctl,
            log,
            recordings,
            _dir: dir,
            t0: Instant::now(),
        }
    }

    fn standard() -> Self {
        Self::new(
            FakeLocator::with_window(1, full_screen()),
            FakeSupervisor::default(),
        )
    }

    fn at(&self, secs: u64) -> Instant {
        self.t0 + Duration::from_secs(secs)
    }

    fn send(&mut self, event: ControlEvent, secs: u64) -> Flow {
        let now = self.at(secs);
        self.ctl.handle(event, now)
    }

    fn output_path(&self) -> PathBuf {
        self.recordings.join("timelapse_2024.05.01_10.00.00.mkv")
    }

    fn last_argv(&self) -> Vec<String> {
        self.log.lock().unwrap().launches.last().cloned().unwrap_or_default()
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

#[test]
fn test_six_minute_session_compresses_to_six_seconds() {
    let mut h = Harness::standard();

    h.send(ControlEvent::SelectWindow(1), 0);
    h.send(ControlEvent::Start, 0);
    assert_eq!(h.ctl.snapshot(h.at(0)).phase, SessionPhase::Recording);

    let argv = h.last_argv();
    assert_eq!(value_after(&argv, "-framerate"), Some("1"));
    assert_eq!(value_after(&argv, "-video_size"), Some("1920x1080"));
    assert_eq!(value_after(&argv, "-r"), Some("60"));
    assert_eq!(value_after(&argv, "-b:v"), Some("4000k"));
    assert_eq!(argv.last().map(PathBuf::from), Some(h.output_path()));

    h.send(ControlEvent::Tick, 180);
    assert_eq!(h.ctl.snapshot(h.at(180)).elapsed_text, "00:03:00.00");

    h.send(ControlEvent::Stop, 360);
    assert_eq!(h.ctl.snapshot(h.at(360)).phase, SessionPhase::Finalizing);
    h.send(ControlEvent::Tick, 360);

    let snap = h.ctl.snapshot(h.at(500));
    assert_eq!(snap.phase, SessionPhase::Idle);
    assert_eq!(snap.elapsed_seconds, 360.0);
    assert_eq!(snap.expected_output_seconds, Some(6.0));
    let encoder_time = snap.encoder_time_seconds.unwrap();
    assert!((encoder_time - 6.0).abs() < 0.01);
    assert!(snap.error.is_none());

    assert!(h.output_path().exists());
    let log = h.log.lock().unwrap();
    assert_eq!(log.signals, 1);
    assert_eq!(log.kills, 0);
}

#[test]
fn test_launch_error_keeps_window_selected() {
    let supervisor = FakeSupervisor {
        missing_executable: true,
        ..Default::default()
    };
    let mut h = Harness::new(FakeLocator::with_window(1, full_screen()), supervisor);

    h.send(ControlEvent::SelectWindow(1), 0);
    h.send(ControlEvent::Start, 0);

    let snap = h.ctl.snapshot(h.at(1));
    assert_eq!(snap.phase, SessionPhase::WindowSelected);
    assert!(snap.error.unwrap().contains("Encoder executable not found: ffmpeg"));
    assert_eq!(snap.elapsed_seconds, 0.0);
    assert!(!h.output_path().exists());
}

#[test]
fn test_cancel_deletes_output_and_resets_timer() {
    let mut h = Harness::standard();

    h.send(ControlEvent::SelectWindow(1), 0);
    h.send(ControlEvent::Start, 0);
    h.send(ControlEvent::Tick, 90);
    assert!(h.output_path().exists());

    h.send(ControlEvent::Cancel, 120);

    let snap = h.ctl.snapshot(h.at(130));
    assert_eq!(snap.phase, SessionPhase::Idle);
    assert_eq!(snap.elapsed_seconds, 0.0);
    assert_eq!(snap.elapsed_text, "00:00:00.00");
    assert!(snap.output_path.is_none());
    assert!(!h.output_path().exists());
    assert_eq!(h.log.lock().unwrap().kills, 1);
}

#[test]
fn test_double_cancel_terminates_once() {
    let mut h = Harness::standard();

    h.send(ControlEvent::SelectWindow(1), 0);
    h.send(ControlEvent::Start, 0);
    h.send(ControlEvent::Cancel, 10);
    h.send(ControlEvent::Cancel, 10);

    assert_eq!(h.ctl.state(), &SessionState::Idle);
    assert_eq!(h.log.lock().unwrap().kills, 1);
    assert!(h.ctl.snapshot(h.at(10)).error.is_none());
    assert!(!h.output_path().exists());
}

#[test]
fn test_cancel_during_finalizing_kills() {
    let supervisor = FakeSupervisor {
        ignores_graceful_stop: true,
        ..Default::default()
    };
    let mut h = Harness::new(FakeLocator::with_window(1, full_screen()), supervisor);

    h.send(ControlEvent::SelectWindow(1), 0);
    h.send(ControlEvent::Start, 0);
    h.send(ControlEvent::Stop, 60);
    h.send(ControlEvent::Tick, 61);
    assert_eq!(h.ctl.snapshot(h.at(61)).phase, SessionPhase::Finalizing);

    h.send(ControlEvent::Cancel, 62);
    assert_eq!(h.ctl.state(), &SessionState::Idle);
    assert_eq!(h.log.lock().unwrap().kills, 1);
    assert!(!h.output_path().exists());
}

#[test]
fn test_start_from_idle_is_an_error_not_a_crash() {
    let mut h = Harness::standard();

    assert_eq!(h.send(ControlEvent::Start, 0), Flow::Continue);

    let snap = h.ctl.snapshot(h.at(0));
    assert_eq!(snap.phase, SessionPhase::Idle);
    assert_eq!(snap.error.as_deref(), Some("Select a window before starting"));
    assert!(h.log.lock().unwrap().launches.is_empty());
}

#[test]
fn test_crash_returns_to_idle_and_keeps_partial_output() {
    let mut h = Harness::standard();

    h.send(ControlEvent::SelectWindow(1), 0);
    h.send(ControlEvent::Start, 0);
    h.log.lock().unwrap().crash = true;
    h.send(ControlEvent::Tick, 45);

    let snap = h.ctl.snapshot(h.at(100));
    assert_eq!(snap.phase, SessionPhase::Idle);
    assert!(snap.error.unwrap().contains("exit code 1"));
    assert_eq!(snap.elapsed_seconds, 45.0);
    assert!(h.output_path().exists());
    assert_eq!(h.log.lock().unwrap().kills, 0);

    // No automatic retry.
    h.send(ControlEvent::Tick, 101);
    assert_eq!(h.log.lock().unwrap().launches.len(), 1);
}

#[test]
fn test_unresponsive_encoder_is_killed_after_grace_period() {
    let supervisor = FakeSupervisor {
        ignores_graceful_stop: true,
        ..Default::default()
    };
    let mut h = Harness::new(FakeLocator::with_window(1, full_screen()), supervisor);

    h.send(ControlEvent::SelectWindow(1), 0);
    h.send(ControlEvent::Start, 0);
    h.send(ControlEvent::Stop, 100);

    h.send(ControlEvent::Tick, 129);
    assert_eq!(h.ctl.snapshot(h.at(129)).phase, SessionPhase::Finalizing);

    h.send(ControlEvent::Tick, 130);
    let snap = h.ctl.snapshot(h.at(130));
    assert_eq!(snap.phase, SessionPhase::Idle);
    assert!(snap.error.is_some());
    assert_eq!(h.log.lock().unwrap().kills, 1);
    assert!(h.output_path().exists());
}

#[test]
fn test_invalid_field_blocks_start() {
    let mut h = Harness::standard();

    h.send(ControlEvent::SelectWindow(1), 0);
    h.send(ControlEvent::SetField(ConfigField::RecordFps, "0".to_string()), 0);
    assert!(!h.ctl.snapshot(h.at(0)).can_start);

    h.send(ControlEvent::Start, 0);
    let snap = h.ctl.snapshot(h.at(0));
    assert_eq!(snap.phase, SessionPhase::WindowSelected);
    assert!(snap.error.unwrap().contains("Record FPS"));
    assert!(h.log.lock().unwrap().launches.is_empty());

    h.send(ControlEvent::SetField(ConfigField::RecordFps, "0.5".to_string()), 1);
    h.send(ControlEvent::Start, 1);
    let argv = h.last_argv();
    assert_eq!(value_after(&argv, "-filter_complex"), Some("settb=1/0.5,setpts=N/120"));
    assert!(h.ctl.snapshot(h.at(1)).error.is_none());
}

#[test]
fn test_exit_while_recording_finalizes_then_shuts_down() {
    let mut h = Harness::standard();

    h.send(ControlEvent::SelectWindow(1), 0);
    h.send(ControlEvent::Start, 0);

    assert_eq!(h.send(ControlEvent::Exit, 30), Flow::Continue);
    assert_eq!(h.log.lock().unwrap().signals, 1);
    assert_eq!(h.send(ControlEvent::Tick, 31), Flow::Shutdown);

    assert!(h.output_path().exists());
    assert_eq!(h.log.lock().unwrap().kills, 0);
}

#[test]
fn test_exit_when_idle_shuts_down_immediately() {
    let mut h = Harness::standard();
    assert_eq!(h.send(ControlEvent::Exit, 0), Flow::Shutdown);
}

#[test]
fn test_selection_error_stays_idle() {
    let mut locator = FakeLocator::with_window(1, full_screen());
    locator.regions.insert(2, Err(SelectionError::ZeroArea(2)));
    let mut h = Harness::new(locator, FakeSupervisor::default());

    h.send(ControlEvent::SelectWindow(99), 0);
    let snap = h.ctl.snapshot(h.at(0));
    assert_eq!(snap.phase, SessionPhase::Idle);
    assert_eq!(snap.error.as_deref(), Some("Window 99 no longer exists"));

    h.send(ControlEvent::SelectWindow(1), 0);
    assert_eq!(h.ctl.snapshot(h.at(0)).phase, SessionPhase::WindowSelected);

    h.send(ControlEvent::SelectWindow(2), 0);
    let snap = h.ctl.snapshot(h.at(0));
    assert_eq!(snap.phase, SessionPhase::Idle);
    assert!(snap.error.unwrap().contains("zero area"));
}

#[test]
fn test_oversized_window_is_clamped_in_command() {
    let region = CaptureRegion {
        x: 100,
        y: 50,
        width: 4000,
        height: 3000,
    };
    let mut h = Harness::new(FakeLocator::with_window(5, region), FakeSupervisor::default());

    h.send(ControlEvent::SelectWindow(5), 0);
    h.send(ControlEvent::Start, 0);

    let argv = h.last_argv();
    assert_eq!(value_after(&argv, "-video_size"), Some("1920x1080"));
    assert_eq!(value_after(&argv, "-offset_x"), Some("100"));
    assert!(!argv.iter().any(|a| a == "4000x3000"));
}

#[test]
fn test_existing_output_is_never_overwritten() {
    let mut h = Harness::standard();
    std::fs::create_dir_all(&h.recordings).unwrap();
    std::fs::write(h.output_path(), b"earlier take").unwrap();

    h.send(ControlEvent::SelectWindow(1), 0);
    h.send(ControlEvent::Start, 0);

    let snap = h.ctl.snapshot(h.at(0));
    assert_eq!(snap.phase, SessionPhase::WindowSelected);
    assert!(snap.error.unwrap().contains("already exists"));
    assert_eq!(std::fs::read(h.output_path()).unwrap(), b"earlier take");
}

#[test]
fn test_stopped_session_requires_reselection() {
    let mut h = Harness::standard();

    h.send(ControlEvent::SelectWindow(1), 0);
    h.send(ControlEvent::Start, 0);
    h.send(ControlEvent::Stop, 10);
    h.send(ControlEvent::Tick, 10);
    assert_eq!(h.ctl.state(), &SessionState::Idle);

    h.send(ControlEvent::Start, 11);
    assert_eq!(
        h.ctl.snapshot(h.at(11)).error.as_deref(),
        Some("Select a window before starting")
    );
    assert_eq!(h.log.lock().unwrap().launches.len(), 1);
}

#[test]
fn test_refresh_lists_windows_with_labels() {
    let mut h = Harness::standard();
    h.send(ControlEvent::RefreshWindows, 0);
    h.send(ControlEvent::SelectWindow(1), 0);

    let snap = h.ctl.snapshot(h.at(0));
    assert_eq!(snap.windows.len(), 1);
    assert_eq!(snap.windows[0].label(), "Window 1 (1)");
    assert_eq!(snap.selected_window.as_deref(), Some("Window 1 (1)"));
}
