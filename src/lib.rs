pub mod core;
pub mod shared;
pub mod timelapse;
pub mod tui;

use std::time::Duration;
use thiserror::Error;

use crate::core::logging::{init_logging, LoggingError};
use crate::core::settings::load_settings;
use crate::timelapse::recorder::FfmpegSupervisor;
use crate::timelapse::window::{max_capture_size, XcapLocator};
use crate::timelapse::{ControllerSettings, SessionController};
use crate::tui::TuiError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error("Failed to start runtime: {0}")]
    Runtime(std::io::Error),
    #[error(transparent)]
    Tui(#[from] TuiError),
}

pub fn run() -> Result<(), AppError> {
    // Logging first so settings problems are recorded.
    let _logging_guards = init_logging()?;

    let settings = load_settings();
    tracing::info!(target: "system", "Settings: {:?}", settings);

    let max_capture = max_capture_size();
    tracing::info!(target: "system", "Max capture size {}x{}", max_capture.width, max_capture.height);

    let controller = SessionController::new(
        XcapLocator::new(max_capture),
        FfmpegSupervisor::new(),
        ControllerSettings::from_app_settings(&settings, max_capture),
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(AppError::Runtime)?;

    runtime.block_on(tui::run(
        controller,
        Duration::from_millis(settings.tick_interval_ms),
    ))?;

    tracing::info!(target: "system", "Shutting down");
    Ok(())
}
