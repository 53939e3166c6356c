//! Encoder argument construction. Pure: builds the vector, never runs it.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use super::super::types::{CaptureInput, CodecProfile, SessionConfig};

pub const OUTPUT_PREFIX: &str = "timelapse_";
const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y.%m.%d_%H.%M.%S";

/// Builds the full argument vector, program name first. Flags and their
/// values are kept on one row each.
#[rustfmt::skip]
pub fn build_command(config: &SessionConfig) -> Vec<String> {
    let params = &config.params;
    let region = config.region.clamped_to(config.max_capture);
    let framerate = format_number(params.record_fps);
    let video_size = format!("{}x{}", region.width, region.height);

    let mut args: Vec<String> = vec![
        config.program.clone(),
        "-v".to_string(), "quiet".to_string(),
        "-stats".to_string(),
    ];

    match &config.input {
        CaptureInput::Gdigrab => {
            args.extend([
                "-f".to_string(), "gdigrab".to_string(),
                "-thread_queue_size".to_string(), "1024".to_string(),
                "-rtbufsize".to_string(), "256M".to_string(),
                "-framerate".to_string(), framerate,
                "-offset_x".to_string(), region.x.to_string(),
                "-offset_y".to_string(), region.y.to_string(),
                "-video_size".to_string(), video_size,
                "-show_region".to_string(), "0".to_string(),
                "-i".to_string(), "desktop".to_string(),
            ]);
        }
        CaptureInput::X11grab { display } => {
            args.extend([
                "-f".to_string(), "x11grab".to_string(),
                "-thread_queue_size".to_string(), "1024".to_string(),
                "-framerate".to_string(), framerate,
                "-video_size".to_string(), video_size,
                "-i".to_string(), format!("{}+{},{}", display, region.x, region.y),
            ]);
        }
    }

    args.extend([
        "-filter_complex".to_string(), timestamp_filter(params.record_fps, params.target_fps),
        "-c:v".to_string(), config.codec.encoder().to_string(),
        "-r".to_string(), format_number(params.target_fps),
        "-preset".to_string(), config.codec.preset().to_string(),
        "-tune".to_string(), config.codec.tune().to_string(),
    ]);

    if let CodecProfile::Cpu { threads } = config.codec {
        args.extend(["-threads".to_string(), threads.to_string()]);
    }

    args.extend([
        "-b:v".to_string(), format!("{}k", params.bitrate_kbps),
        "-movflags".to_string(), "+faststart".to_string(),
        "-y".to_string(),
        config.output_path.to_string_lossy().to_string(),
    ]);

    args
}

/// `settb=1/record_fps` with frame N placed at N / speedup ticks, so each
/// captured frame lasts 1/target_fps seconds in the output.
pub fn timestamp_filter(record_fps: f64, target_fps: f64) -> String {
    format!(
        "settb=1/{},setpts=N/{}",
        format_number(record_fps),
        format_number(target_fps / record_fps)
    )
}

/// Output file for a session started at `started_at`.
pub fn output_path_for(dir: &Path, container: &str, started_at: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "{}{}.{}",
        OUTPUT_PREFIX,
        started_at.format(OUTPUT_TIMESTAMP_FORMAT),
        container
    ))
}

/// Shortest decimal form: `1.0` renders as `1`, `0.5` as `0.5`.
fn format_number(value: f64) -> String {
    format!("{}", value)
}
