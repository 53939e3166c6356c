//! Encoder process lifecycle: spawn, liveness probe, graceful stop, kill.
//!
//! The supervisor exclusively owns the child process. The handle is released
//! as soon as an exit is confirmed, either by a probe or by `kill`. The stderr
//! channel outlives the handle until the reader thread hits EOF.

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;
use std::time::Instant;

use super::super::errors::{LaunchError, SupervisorError};

/// Progress lines buffered between ticks; older lines are dropped when full.
const OUTPUT_BUFFER_LINES: usize = 64;

/// Byte sent on stdin to make ffmpeg finalize the container and quit.
const GRACEFUL_QUIT: &[u8] = b"q";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    NotRunning,
    Running,
    Exited { code: Option<i32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub started_at: Instant,
    pub output_path: PathBuf,
}

pub trait ProcessSupervisor {
    /// Spawns `argv[0]` with the remaining arguments.
    fn start(&mut self, argv: &[String], output_path: &Path) -> Result<ProcessInfo, LaunchError>;

    /// Non-blocking. Reports `Exited` once, then `NotRunning`.
    fn probe(&mut self) -> ProcessStatus;

    fn is_alive(&mut self) -> bool {
        matches!(self.probe(), ProcessStatus::Running)
    }

    /// Asks the encoder to finalize. Does not wait; poll `probe` afterwards.
    fn request_graceful_stop(&mut self) -> Result<(), SupervisorError>;

    /// Terminates and reaps the process. Returns false when nothing was running.
    fn kill(&mut self) -> Result<bool, SupervisorError>;

    /// Drains output lines received since the last call without blocking.
    fn poll_output(&mut self) -> Vec<String>;

    fn active(&self) -> Option<&ProcessInfo>;
}

struct EncoderProcess {
    info: ProcessInfo,
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<String>,
    _reader: JoinHandle<()>,
}

/// Supervisor for a real ffmpeg child process.
#[derive(Default)]
pub struct FfmpegSupervisor {
    active: Option<EncoderProcess>,
    /// Output of a released process, read until its reader disconnects.
    draining: Option<Receiver<String>>,
}

impl FfmpegSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    fn release(&mut self) {
        if let Some(process) = self.active.take() {
            tracing::debug!(
                target: "session",
                "[SUPERVISOR] Released encoder pid={} after {:?}",
                process.info.pid,
                process.info.started_at.elapsed()
            );
            self.draining = Some(process.lines);
        }
    }
}

impl ProcessSupervisor for FfmpegSupervisor {
    fn start(&mut self, argv: &[String], output_path: &Path) -> Result<ProcessInfo, LaunchError> {
        if self.active.is_some() {
            return Err(LaunchError::SpawnFailed("an encoder is already running".to_string()));
        }

        let (program, args) = argv
            .split_first()
            .ok_or_else(|| LaunchError::SpawnFailed("empty command".to_string()))?;

        tracing::info!(target: "session", "[SUPERVISOR] Spawning {} -> {}", program, output_path.display());
        tracing::debug!(target: "session", "[SUPERVISOR] Encoder args: {:?}", args);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => LaunchError::ExecutableNotFound(program.clone()),
                _ => LaunchError::SpawnFailed(e.to_string()),
            })?;

        let stdin = child.stdin.take();
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| {
                LaunchError::SpawnFailed("failed to capture encoder stderr".to_string())
            })?;

        let (line_tx, line_rx) = crossbeam_channel::bounded(OUTPUT_BUFFER_LINES);
        let reader = spawn_output_reader(stderr, line_tx);

        let info = ProcessInfo {
            pid: child.id(),
            started_at: Instant::now(),
            output_path: output_path.to_path_buf(),
        };

        tracing::info!(target: "session", "[SUPERVISOR] Encoder started pid={}", info.pid);

        self.draining = None;
        self.active = Some(EncoderProcess {
            info: info.clone(),
            child,
            stdin,
            lines: line_rx,
            _reader: reader,
        });

        Ok(info)
    }

    fn probe(&mut self) -> ProcessStatus {
        let Some(process) = self.active.as_mut() else {
            return ProcessStatus::NotRunning;
        };

        match process.child.try_wait() {
            Ok(None) => ProcessStatus::Running,
            Ok(Some(status)) => {
                tracing::info!(target: "session", "[SUPERVISOR] Encoder pid={} exited: {}", process.info.pid, status);
                self.release();
                ProcessStatus::Exited {
                    code: status.code(),
                }
            }
            Err(e) => {
                tracing::warn!(target: "session", "[SUPERVISOR] Liveness probe failed: {}", e);
                ProcessStatus::Running
            }
        }
    }

    fn request_graceful_stop(&mut self) -> Result<(), SupervisorError> {
        let Some(process) = self.active.as_mut() else {
            return Ok(());
        };

        let stdin = process
            .stdin
            .as_mut()
            .ok_or_else(|| SupervisorError::Signal("encoder stdin is closed".to_string()))?;

        tracing::info!(target: "session", "[SUPERVISOR] Sending quit to encoder pid={}", process.info.pid);

        stdin
            .write_all(GRACEFUL_QUIT)
            .and_then(|_| stdin.flush())
            .map_err(|e| SupervisorError::Signal(e.to_string()))
    }

    fn kill(&mut self) -> Result<bool, SupervisorError> {
        let Some(process) = self.active.as_mut() else {
            return Ok(false);
        };

        tracing::info!(target: "session", "[SUPERVISOR] Killing encoder pid={}", process.info.pid);

        match process.child.kill() {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::InvalidInput => {}
            Err(e) => return Err(SupervisorError::Kill(e.to_string())),
        }

        process
            .child
            .wait()
            .map_err(|e| SupervisorError::Kill(e.to_string()))?;

        self.release();
        Ok(true)
    }

    fn poll_output(&mut self) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(rx) = self.draining.as_ref() {
            let finished = loop {
                match rx.try_recv() {
                    Ok(line) => lines.push(line),
                    Err(TryRecvError::Empty) => break false,
                    Err(TryRecvError::Disconnected) => break true,
                }
            };
            if finished {
                self.draining = None;
            }
        }

        if let Some(process) = self.active.as_ref() {
            lines.extend(process.lines.try_iter());
        }
        lines
    }

    fn active(&self) -> Option<&ProcessInfo> {
        self.active.as_ref().map(|p| &p.info)
    }
}

impl Drop for FfmpegSupervisor {
    fn drop(&mut self) {
        if self.active.is_none() {
            return;
        }

        tracing::warn!(target: "session", "[SUPERVISOR] Dropping with a live encoder, killing it...");
        if let Err(e) = self.kill() {
            tracing::warn!(target: "session", "[SUPERVISOR] Failed to kill encoder on drop: {}", e);
        }
    }
}

/// Splits stderr on `\r` and `\n` (ffmpeg rewrites its stats line with `\r`).
fn spawn_output_reader(mut stderr: ChildStderr, tx: Sender<String>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut buf = [0u8; 4096];
        let mut pending: Vec<u8> = Vec::new();

        loop {
            match stderr.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    for &byte in &buf[..n] {
                        if byte == b'\r' || byte == b'\n' {
                            if !flush_line(&mut pending, &tx) {
                                return;
                            }
                        } else {
                            pending.push(byte);
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }

        flush_line(&mut pending, &tx);
    })
}

/// Returns false once the receiving side is gone.
fn flush_line(pending: &mut Vec<u8>, tx: &Sender<String>) -> bool {
    if pending.is_empty() {
        return true;
    }

    let line = String::from_utf8_lossy(pending).trim().to_string();
    pending.clear();

    if line.is_empty() {
        return true;
    }

    match tx.try_send(line) {
        Ok(()) | Err(TrySendError::Full(_)) => true,
        Err(TrySendError::Disconnected(_)) => false,
    }
}
