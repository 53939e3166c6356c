//! Parsing of the encoder's `-stats` progress lines.
//!
//! The encoder reports output time (compressed), not the wall-clock time
//! shown by the session timer.

use std::time::Duration;

/// Latest progress report: the parsed output time and the raw line.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderProgress {
    pub time: Option<Duration>,
    pub line: String,
}

impl EncoderProgress {
    pub fn output_seconds(&self) -> Option<f64> {
        self.time.map(|t| t.as_secs_f64())
    }
}

/// Returns `None` for lines that are not progress reports.
pub fn parse_stats_line(line: &str) -> Option<EncoderProgress> {
    let line = line.trim();
    if !(line.contains("time=") && line.contains("bitrate=")) {
        return None;
    }

    Some(EncoderProgress {
        time: extract_value(line, "time=").and_then(|t| parse_timestamp(&t)),
        line: line.to_string(),
    })
}

fn extract_value(line: &str, key: &str) -> Option<String> {
    let start = line.find(key)?;
    let after_key = line[start + key.len()..].trim_start();
    let end = after_key
        .find(|c: char| c.is_whitespace())
        .unwrap_or(after_key.len());

    let value = &after_key[..end];
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// `HH:MM:SS.ss` to a duration; `N/A` and malformed stamps yield `None`.
fn parse_timestamp(raw: &str) -> Option<Duration> {
    let mut parts = raw.trim_start_matches('-').split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    if total.is_finite() && total >= 0.0 {
        Some(Duration::from_secs_f64(total))
    } else {
        None
    }
}
