use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::errors::ConfigValidationError;

pub const DEFAULT_RECORD_FPS: f64 = 1.0;
pub const DEFAULT_TARGET_FPS: f64 = 60.0;
pub const DEFAULT_BITRATE_KBPS: u32 = 4000;

pub const MAX_FPS: f64 = 1000.0;
pub const MAX_BITRATE_KBPS: u32 = 400_000;

pub const GPU_ENCODER: &str = "h264_nvenc";
pub const GPU_PRESET: &str = "p4";
pub const GPU_TUNE: &str = "hq";

pub const CPU_ENCODER: &str = "libx264";
pub const CPU_PRESET: &str = "medium";
pub const CPU_TUNE: &str = "film";
pub const CPU_FALLBACK_THREADS: u16 = 4;

/// Rectangle in screen coordinates handed to the capture device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn clamped_to(&self, max: CaptureSize) -> Self {
        Self {
            x: self.x,
            y: self.y,
            width: self.width.min(max.width),
            height: self.height.min(max.height),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureSize {
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Gpu,
    Cpu,
}

/// Encoder, preset and tune tokens. Swapped as a unit, never mixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecProfile {
    Gpu,
    Cpu { threads: u16 },
}

impl CodecProfile {
    /// Resolves the CPU thread count once, so building arguments stays pure.
    pub fn resolve(codec: Codec, cpu_threads: Option<u16>) -> Self {
        match codec {
            Codec::Gpu => CodecProfile::Gpu,
            Codec::Cpu => {
                let threads = cpu_threads.filter(|t| *t > 0).unwrap_or_else(|| {
                    std::thread::available_parallelism()
                        .ok()
                        .and_then(|n| u16::try_from(n.get()).ok())
                        .unwrap_or(CPU_FALLBACK_THREADS)
                });
                CodecProfile::Cpu { threads }
            }
        }
    }

    pub fn encoder(&self) -> &'static str {
        match self {
            CodecProfile::Gpu => GPU_ENCODER,
            CodecProfile::Cpu { .. } => CPU_ENCODER,
        }
    }

    pub fn preset(&self) -> &'static str {
        match self {
            CodecProfile::Gpu => GPU_PRESET,
            CodecProfile::Cpu { .. } => CPU_PRESET,
        }
    }

    pub fn tune(&self) -> &'static str {
        match self {
            CodecProfile::Gpu => GPU_TUNE,
            CodecProfile::Cpu { .. } => CPU_TUNE,
        }
    }
}

/// Screen grabbing device passed to `-f`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureInput {
    Gdigrab,
    X11grab { display: String },
}

impl Default for CaptureInput {
    #[cfg(windows)]
    fn default() -> Self {
        CaptureInput::Gdigrab
    }

    #[cfg(not(windows))]
    fn default() -> Self {
        let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0.0".to_string());
        CaptureInput::X11grab { display }
    }
}

/// Validated rate and bitrate values for one session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionParams {
    pub record_fps: f64,
    pub target_fps: f64,
    pub bitrate_kbps: u32,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            record_fps: DEFAULT_RECORD_FPS,
            target_fps: DEFAULT_TARGET_FPS,
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
        }
    }
}

impl SessionParams {
    /// Ratio by which real time is compressed in the output.
    pub fn speedup(&self) -> f64 {
        self.target_fps / self.record_fps
    }

    pub fn output_seconds_for(&self, real_seconds: f64) -> f64 {
        real_seconds / self.speedup()
    }
}

/// Everything the command builder needs for one encoder invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub program: String,
    pub params: SessionParams,
    pub codec: CodecProfile,
    pub input: CaptureInput,
    pub region: CaptureRegion,
    pub max_capture: CaptureSize,
    pub output_path: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigField {
    RecordFps,
    TargetFps,
    Bitrate,
}

impl ConfigField {
    pub fn label(&self) -> &'static str {
        match self {
            ConfigField::RecordFps => "Record FPS",
            ConfigField::TargetFps => "Target FPS",
            ConfigField::Bitrate => "Bitrate (KB/s)",
        }
    }
}

/// Raw text of the three numeric inputs, as typed by the user.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigFields {
    pub record_fps: String,
    pub target_fps: String,
    pub bitrate: String,
}

impl ConfigFields {
    pub fn get(&self, field: ConfigField) -> &str {
        match field {
            ConfigField::RecordFps => &self.record_fps,
            ConfigField::TargetFps => &self.target_fps,
            ConfigField::Bitrate => &self.bitrate,
        }
    }

    pub fn set(&mut self, field: ConfigField, value: String) {
        match field {
            ConfigField::RecordFps => self.record_fps = value,
            ConfigField::TargetFps => self.target_fps = value,
            ConfigField::Bitrate => self.bitrate = value,
        }
    }

    /// Parses the fields, substituting `defaults` for empty ones.
    pub fn validate(
        &self,
        defaults: &SessionParams,
    ) -> Result<SessionParams, ConfigValidationError> {
        Ok(SessionParams {
            record_fps: parse_fps(ConfigField::RecordFps, &self.record_fps, defaults.record_fps)?,
            target_fps: parse_fps(ConfigField::TargetFps, &self.target_fps, defaults.target_fps)?,
            bitrate_kbps: parse_bitrate(&self.bitrate, defaults.bitrate_kbps)?,
        })
    }
}

fn parse_fps(field: ConfigField, raw: &str, default: f64) -> Result<f64, ConfigValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }

    let value: f64 = raw.parse().map_err(|_| ConfigValidationError::Unparsable {
        field: field.label(),
        value: raw.to_string(),
    })?;

    if !value.is_finite() || value <= 0.0 || value > MAX_FPS {
        return Err(ConfigValidationError::OutOfRange {
            field: field.label(),
            value: raw.to_string(),
            min: "> 0".to_string(),
            max: MAX_FPS.to_string(),
        });
    }

    Ok(value)
}

fn parse_bitrate(raw: &str, default: u32) -> Result<u32, ConfigValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }

    let field = ConfigField::Bitrate.label();
    let value: u64 = raw.parse().map_err(|_| ConfigValidationError::Unparsable {
        field,
        value: raw.to_string(),
    })?;

    if value == 0 || value > u64::from(MAX_BITRATE_KBPS) {
        return Err(ConfigValidationError::OutOfRange {
            field,
            value: raw.to_string(),
            min: "1".to_string(),
            max: MAX_BITRATE_KBPS.to_string(),
        });
    }

    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_use_defaults() {
        let params = ConfigFields::default()
            .validate(&SessionParams::default())
            .unwrap();

        assert_eq!(params.record_fps, 1.0);
        assert_eq!(params.target_fps, 60.0);
        assert_eq!(params.bitrate_kbps, 4000);
        assert_eq!(params.speedup(), 60.0);
    }

    #[test]
    fn test_fields_are_parsed() {
        let fields = ConfigFields {
            record_fps: "0.5".to_string(),
            target_fps: " 30 ".to_string(),
            bitrate: "8000".to_string(),
        };
        let params = fields.validate(&SessionParams::default()).unwrap();

        assert_eq!(params.record_fps, 0.5);
        assert_eq!(params.target_fps, 30.0);
        assert_eq!(params.bitrate_kbps, 8000);
        assert_eq!(params.speedup(), 60.0);
    }

    #[test]
    fn test_non_positive_fps_is_rejected() {
        for raw in ["0", "-1", "0.0", "inf", "NaN"] {
            let fields = ConfigFields {
                record_fps: raw.to_string(),
                ..Default::default()
            };
            assert!(
                fields.validate(&SessionParams::default()).is_err(),
                "record fps {:?} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_unparsable_bitrate_is_rejected() {
        let fields = ConfigFields {
            bitrate: "4k".to_string(),
            ..Default::default()
        };
        let err = fields.validate(&SessionParams::default()).unwrap_err();
        assert!(matches!(err, ConfigValidationError::Unparsable { .. }));

        let fields = ConfigFields {
            bitrate: "0".to_string(),
            ..Default::default()
        };
        let err = fields.validate(&SessionParams::default()).unwrap_err();
        assert!(matches!(err, ConfigValidationError::OutOfRange { .. }));
    }

    #[test]
    fn test_region_clamps_to_max_size() {
        let region = CaptureRegion {
            x: 10,
            y: 20,
            width: 4000,
            height: 900,
        };
        let clamped = region.clamped_to(CaptureSize {
            width: 1920,
            height: 1080,
        });
        assert_eq!(clamped.width, 1920);
        assert_eq!(clamped.height, 900);
        assert_eq!((clamped.x, clamped.y), (10, 20));
    }

    #[test]
    fn test_cpu_profile_uses_explicit_threads() {
        assert_eq!(
            CodecProfile::resolve(Codec::Cpu, Some(6)),
            CodecProfile::Cpu { threads: 6 }
        );
        assert!(matches!(
            CodecProfile::resolve(Codec::Cpu, None),
            CodecProfile::Cpu { threads } if threads > 0
        ));
        assert_eq!(CodecProfile::resolve(Codec::Gpu, Some(6)), CodecProfile::Gpu);
    }
}
