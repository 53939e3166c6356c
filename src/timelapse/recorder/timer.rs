use std::time::{Duration, Instant};

/// Wall-clock session timer. Callers pass `now` so ticks and tests share one clock.
#[derive(Debug, Clone, Default)]
pub struct SessionTimer {
    running_since: Option<Instant>,
    frozen: Duration,
}

impl SessionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, now: Instant) {
        self.running_since = Some(now);
        self.frozen = Duration::ZERO;
    }

    /// Freezes the elapsed value; later `elapsed` calls keep returning it.
    pub fn stop(&mut self, now: Instant) {
        if let Some(since) = self.running_since.take() {
            self.frozen = now.saturating_duration_since(since);
        }
    }

    pub fn reset(&mut self) {
        self.running_since = None;
        self.frozen = Duration::ZERO;
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.running_since {
            Some(since) => now.saturating_duration_since(since),
            None => self.frozen,
        }
    }
}

/// `HH:MM:SS.cc`, matching the recorder's on-screen clock.
pub fn format_elapsed(elapsed: Duration) -> String {
    let centis = elapsed.as_millis() / 10;
    let hours = centis / 360_000;
    let minutes = (centis / 6_000) % 60;
    let seconds = (centis / 100) % 60;
    let fraction = centis % 100;
    format!("{:02}:{:02}:{:02}.{:02}", hours, minutes, seconds, fraction)
}
