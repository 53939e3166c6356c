//! Window enumeration and region resolution.
//!
//! A selection is a one-time snapshot: moving or resizing the window after
//! it was picked is not tracked. Reselect to pick up a new geometry.

use xcap::{Monitor, Window};

use super::errors::SelectionError;
use super::types::{CaptureRegion, CaptureSize};

/// Invisible resize border Windows 10 adds around maximized windows.
const INVISIBLE_BORDER: i32 = 8;

#[derive(Clone, Debug, PartialEq)]
pub struct WindowCandidate {
    pub id: u32,
    pub title: String,
}

impl WindowCandidate {
    pub fn label(&self) -> String {
        format!("{} ({})", self.title, self.id)
    }
}

/// Raw window rectangle as reported by the OS; may start off-screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

pub trait WindowLocator {
    /// Visible, titled top-level windows sorted by title.
    fn list_candidate_windows(&self) -> Result<Vec<WindowCandidate>, SelectionError>;

    fn resolve_region(&self, id: u32) -> Result<CaptureRegion, SelectionError>;
}

/// Locator backed by the OS window list through `xcap`.
pub struct XcapLocator {
    screen: CaptureSize,
}

impl XcapLocator {
    pub fn new(screen: CaptureSize) -> Self {
        Self { screen }
    }
}

impl WindowLocator for XcapLocator {
    fn list_candidate_windows(&self) -> Result<Vec<WindowCandidate>, SelectionError> {
        let windows = Window::all().map_err(|e| SelectionError::Enumeration(e.to_string()))?;

        let candidates = windows
            .iter()
            .filter(|w| !w.is_minimized())
            .map(|w| WindowCandidate {
                id: w.id(),
                title: w.title().to_string(),
            })
            .collect();

        Ok(sort_candidates(candidates))
    }

    fn resolve_region(&self, id: u32) -> Result<CaptureRegion, SelectionError> {
        let windows = Window::all().map_err(|e| SelectionError::Enumeration(e.to_string()))?;

        let window = windows
            .into_iter()
            .find(|w| w.id() == id)
            .ok_or(SelectionError::WindowNotFound(id))?;

        let bounds = WindowBounds {
            x: window.x(),
            y: window.y(),
            width: window.width(),
            height: window.height(),
        };

        tracing::debug!(target: "session", "[LOCATOR] Window {} bounds: {:?}", id, bounds);

        region_from_bounds(id, bounds, self.screen)
    }
}

/// Size of the primary monitor, the largest region the capture device accepts.
pub fn max_capture_size() -> CaptureSize {
    let monitors = match Monitor::all() {
        Ok(monitors) => monitors,
        Err(e) => {
            tracing::warn!(target: "system", "Failed to query monitors: {}", e);
            return CaptureSize::default();
        }
    };

    monitors
        .iter()
        .find(|m| m.is_primary())
        .or_else(|| monitors.first())
        .map(|m| CaptureSize {
            width: m.width(),
            height: m.height(),
        })
        .unwrap_or_default()
}

/// Drops untitled windows and orders the rest case-insensitively by title.
pub fn sort_candidates(mut candidates: Vec<WindowCandidate>) -> Vec<WindowCandidate> {
    candidates.retain(|c| !c.title.trim().is_empty());
    candidates.sort_by_key(|c| c.title.to_lowercase());
    candidates
}

/// Converts OS bounds into a capture region.
///
/// Maximized windows are shrunk by their invisible border and negative
/// offsets are clamped to the screen origin.
pub fn region_from_bounds(
    id: u32,
    bounds: WindowBounds,
    screen: CaptureSize,
) -> Result<CaptureRegion, SelectionError> {
    let WindowBounds {
        mut x,
        mut y,
        mut width,
        mut height,
    } = bounds;

    let right = i64::from(x) + i64::from(width);
    let bottom = i64::from(y) + i64::from(height);
    let border = i64::from(INVISIBLE_BORDER);

    if x == -INVISIBLE_BORDER
        || y == -INVISIBLE_BORDER
        || right == i64::from(screen.width) + border
        || bottom == i64::from(screen.height) + border
    {
        x += INVISIBLE_BORDER;
        y += INVISIBLE_BORDER;
        width = width.saturating_sub(2 * INVISIBLE_BORDER as u32);
        height = height.saturating_sub(2 * INVISIBLE_BORDER as u32);
    }

    if width == 0 || height == 0 {
        return Err(SelectionError::ZeroArea(id));
    }

    Ok(CaptureRegion {
        x: x.max(0) as u32,
        y: y.max(0) as u32,
        width,
        height,
    })
}
