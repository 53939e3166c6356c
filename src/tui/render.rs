use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::{cursor, queue, terminal};
use std::io::{self, Write};
use std::time::Duration;

use super::input::{Focus, UiState};
use crate::timelapse::recorder::format_elapsed;
use crate::timelapse::types::ConfigField;
use crate::timelapse::DisplayState;

/// Rows used by everything except the window list.
const CHROME_ROWS: u16 = 12;

pub fn draw<W: Write>(
    out: &mut W,
    display: &DisplayState,
    ui: &UiState,
    rows: u16,
) -> io::Result<()> {
    queue!(out, terminal::Clear(terminal::ClearType::All), cursor::MoveTo(0, 0))?;

    let mut header = format!(" winlapse  [{}]  {}", display.status_label(), display.elapsed_text);
    if let Some(expected) = display.expected_output_seconds {
        header.push_str(&format!(
            "  -> {} output",
            format_elapsed(Duration::from_secs_f64(expected.max(0.0)))
        ));
    }
    if let Some(speedup) = display.speedup {
        header.push_str(&format!(" ({}x)", speedup));
    }
    line(out, &header)?;

    match (&display.selected_window, display.region) {
        (Some(title), Some(r)) => line(
            out,
            &format!(" Window: {}  at {},{} {}x{}", title, r.x, r.y, r.width, r.height),
        )?,
        _ => line(out, " Window: none selected")?,
    }

    line(
        out,
        &format!(" Output: {}", display.output_path.as_deref().unwrap_or("-")),
    )?;
    line(
        out,
        &format!(" Encoder: {}", display.encoder_line.as_deref().unwrap_or("-")),
    )?;
    line(out, "")?;

    let list_focused = ui.focus == Focus::Windows;
    line(
        out,
        &format!(" Windows{} (Up/Down, Enter to select, F5 refresh)", focus_mark(list_focused)),
    )?;

    let visible = usize::from(rows.saturating_sub(CHROME_ROWS).max(3));
    let first = ui.cursor.saturating_sub(visible.saturating_sub(1));
    for (index, window) in display.windows.iter().enumerate().skip(first).take(visible) {
        let marker = if index == ui.cursor && list_focused { ">" } else { " " };
        line(out, &format!(" {} {}", marker, window.label()))?;
    }
    if display.windows.is_empty() {
        line(out, "   (no windows found)")?;
    }
    line(out, "")?;

    let fields: Vec<String> = [ConfigField::RecordFps, ConfigField::TargetFps, ConfigField::Bitrate]
        .iter()
        .map(|field| {
            let value = display.fields.get(*field);
            let shown = if value.is_empty() { "default" } else { value };
            let focused = ui.focus == Focus::Field(*field);
            format!("{}{}: [{}]", field.label(), focus_mark(focused), shown)
        })
        .collect();
    line(out, &format!(" {}   (Tab to edit)", fields.join("  ")))?;
    line(out, "")?;

    line(
        out,
        &format!(
            " {}  {}  {}  [X] Exit",
            button("[R] Start", display.can_start),
            button("[S] Stop", display.can_stop),
            button("[C] Cancel", display.can_cancel),
        ),
    )?;

    if let Some(error) = &display.error {
        queue!(out, SetAttribute(Attribute::Bold))?;
        line(out, &format!(" Error: {}", error))?;
        queue!(out, SetAttribute(Attribute::Reset))?;
    }

    out.flush()
}

fn line<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    queue!(out, Print(text), Print("\r\n"))
}

fn focus_mark(focused: bool) -> &'static str {
    if focused {
        "*"
    } else {
        ""
    }
}

fn button(label: &str, enabled: bool) -> String {
    if enabled {
        label.to_string()
    } else {
        format!("({})", label)
    }
}
