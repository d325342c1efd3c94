//! Terminal setup, teardown and frame output.
//!
//! Raw mode, the alternate screen and cursor visibility go through crossterm.
//! Frames are written row by row; rows identical to the previous frame are
//! skipped.

use std::io::{self, Write};

use crossterm::cursor::{Hide, MoveTo, MoveToColumn, MoveUp, Show};
use crossterm::style::Print;
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};

use crate::host::terminal::{Frame, TerminalSize};

// =============================================================================
// Render Mode
// =============================================================================

/// Where frames are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Alternate screen, the frame fills the terminal.
    #[default]
    Fullscreen,
    /// Normal screen below the cursor, the frame is as tall as its content.
    Inline,
}

impl RenderMode {
    /// Whether layout is clamped to the terminal height.
    pub fn constrains_height(self) -> bool {
        matches!(self, RenderMode::Fullscreen)
    }
}

/// Current terminal size, or 80x24 when it cannot be queried.
pub fn detect_terminal_size() -> TerminalSize {
    match terminal::size() {
        Ok((width, height)) if width > 0 && height > 0 => TerminalSize::new(width, height),
        Ok(_) => TerminalSize::default(),
        Err(err) => {
            log::debug!("[terminal] size unavailable: {err}");
            TerminalSize::default()
        }
    }
}

// =============================================================================
// Setup
// =============================================================================

/// Terminal setup/teardown handle.
#[derive(Debug, Default)]
pub struct TerminalSetup {
    mode: RenderMode,
    is_raw: bool,
    is_alternate: bool,
}

impl TerminalSetup {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Raw mode, hidden cursor, and the alternate screen in fullscreen mode.
    pub fn enter(&mut self, out: &mut impl Write) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        self.is_raw = true;

        if self.mode == RenderMode::Fullscreen {
            execute!(out, EnterAlternateScreen, Clear(ClearType::All))?;
            self.is_alternate = true;
        }
        execute!(out, Hide)
    }

    /// Undo whatever [`enter`](Self::enter) did.
    pub fn exit(&mut self, out: &mut impl Write) -> io::Result<()> {
        execute!(out, Show)?;
        if self.is_alternate {
            execute!(out, LeaveAlternateScreen)?;
            self.is_alternate = false;
        }
        if self.is_raw {
            terminal::disable_raw_mode()?;
            self.is_raw = false;
        }
        Ok(())
    }
}

// =============================================================================
// Frame Renderer
// =============================================================================

/// Writes frames, redrawing only rows that changed.
#[derive(Debug, Default)]
pub struct FrameRenderer {
    mode: RenderMode,
    previous: Option<Frame>,
}

impl FrameRenderer {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            previous: None,
        }
    }

    /// Forget the previous frame. The next render redraws everything.
    pub fn invalidate(&mut self) {
        self.previous = None;
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    /// Rows of `frame` that differ from the previous frame.
    pub fn changed_rows(&self, frame: &Frame) -> Vec<u16> {
        match &self.previous {
            Some(previous)
                if previous.width() == frame.width() && previous.height() == frame.height() =>
            {
                (0..frame.height())
                    .filter(|y| previous.row(*y) != frame.row(*y))
                    .collect()
            }
            _ => (0..frame.height()).collect(),
        }
    }

    pub fn render(&mut self, out: &mut impl Write, frame: Frame) -> io::Result<()> {
        match self.mode {
            RenderMode::Fullscreen => {
                for y in self.changed_rows(&frame) {
                    queue!(
                        out,
                        MoveTo(0, y),
                        Clear(ClearType::CurrentLine),
                        Print(frame.row(y))
                    )?;
                }
            }
            RenderMode::Inline => {
                // Rewind over the previous frame and redraw in place.
                let previous_height = self.previous.as_ref().map_or(0, Frame::height);
                if previous_height > 0 {
                    queue!(out, MoveUp(previous_height), MoveToColumn(0))?;
                }
                queue!(out, Clear(ClearType::FromCursorDown))?;
                for y in 0..frame.height() {
                    queue!(out, Print(frame.row(y)), Print("\r\n"))?;
                }
            }
        }
        out.flush()?;
        self.previous = Some(frame);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(rows: &[&str]) -> Frame {
        let mut frame = Frame::new(10, rows.len() as u16);
        for (y, row) in rows.iter().enumerate() {
            frame.put_str(0, y as u16, row, 10);
        }
        frame
    }

    #[test]
    fn test_first_render_writes_every_row() {
        let renderer = FrameRenderer::new(RenderMode::Fullscreen);
        assert!(!renderer.has_previous());
        assert_eq!(renderer.changed_rows(&frame(&["a", "b"])), vec![0, 1]);
    }

    #[test]
    fn test_only_changed_rows_redrawn() {
        let mut renderer = FrameRenderer::new(RenderMode::Fullscreen);
        let mut out = Vec::new();
        renderer.render(&mut out, frame(&["a", "b", "c"])).expect("render");
        assert!(renderer.has_previous());

        assert_eq!(renderer.changed_rows(&frame(&["a", "x", "c"])), vec![1]);

        renderer.invalidate();
        assert_eq!(renderer.changed_rows(&frame(&["a", "x", "c"])), vec![0, 1, 2]);
    }

    #[test]
    fn test_inline_render_prints_rows() {
        let mut renderer = FrameRenderer::new(RenderMode::Inline);
        let mut out = Vec::new();
        renderer.render(&mut out, frame(&["hello"])).expect("render");
        let written = String::from_utf8_lossy(&out);
        assert!(written.contains("hello"));
    }

    #[test]
    fn test_render_mode_height() {
        assert!(RenderMode::Fullscreen.constrains_height());
        assert!(!RenderMode::Inline.constrains_height());
        assert_eq!(RenderMode::default(), RenderMode::Fullscreen);
    }
}
