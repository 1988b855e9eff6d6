use crate::layout::format_row;
use anyhow::{Context, Result};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType};
use meshdash_model::DisplayColor;
use meshdash_probe::ResultStore;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const TITLE: &str = "Tailscale Status Scanner";
const SCANNING: &str = "Scanning...";
const RULE_WIDTH: usize = 63;
const FIRST_ROW: usize = 3;
const FALLBACK_WIDTH: u16 = 80;
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Completed,
    Interrupted,
}

/// Paints the result table at fixed rows, one per peer.
pub struct Dashboard<W: Write> {
    out: W,
    plain: bool,
    width: Option<u16>,
}

impl<W: Write> Dashboard<W> {
    pub fn new(out: W, plain: bool) -> Self {
        Self {
            out,
            plain,
            width: None,
        }
    }

    /// Fixes the row width instead of asking the terminal each frame.
    pub fn with_width(mut self, width: u16) -> Self {
        self.width = Some(width);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Repaints every `tick` until all records are done or `interrupt` is set.
    /// The last frame painted is always the one the loop decided on.
    pub fn run(
        &mut self,
        store: &ResultStore,
        interrupt: &AtomicBool,
        tick: Duration,
    ) -> Result<RenderOutcome> {
        self.paint_header(store.len())?;

        let outcome = loop {
            if self.paint_rows(store)? {
                break RenderOutcome::Completed;
            }
            if interrupt.load(Ordering::SeqCst) || wait_for_tick(interrupt, tick) {
                break RenderOutcome::Interrupted;
            }
        };

        self.paint_footer(store.len(), outcome)?;
        Ok(outcome)
    }

    fn paint_header(&mut self, rows: usize) -> Result<()> {
        queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))
            .context("failed to clear terminal")?;
        self.write_line(0, TITLE, DisplayColor::White)?;
        self.write_line(1, &"-".repeat(RULE_WIDTH), DisplayColor::Gray)?;
        self.write_line(2, SCANNING, DisplayColor::Yellow)?;
        queue!(self.out, MoveTo(0, FIRST_ROW as u16), Print("\n".repeat(rows)))
            .context("failed to reserve table rows")?;
        self.flush()
    }

    /// Paints one frame and reports whether every row was already done.
    fn paint_rows(&mut self, store: &ResultStore) -> Result<bool> {
        let width = self.term_width();
        let mut all_done = true;

        for (idx, entry) in store.entries().iter().enumerate() {
            let result = entry.view.snapshot();
            all_done &= result.done;
            let line = format_row(&entry.peer, &result, width);
            self.write_line(FIRST_ROW + idx, &line, result.display_color())?;
        }

        self.flush()?;
        Ok(all_done)
    }

    fn paint_footer(&mut self, rows: usize, outcome: RenderOutcome) -> Result<()> {
        let (banner, color) = match outcome {
            RenderOutcome::Completed => ("Done!", DisplayColor::Green),
            RenderOutcome::Interrupted => ("Interrupted", DisplayColor::Yellow),
        };
        let banner = format!("{banner:<width$}", width = SCANNING.len() + 5);
        self.write_line(2, &banner, color)?;
        self.write_line(FIRST_ROW + rows, &"-".repeat(RULE_WIDTH), DisplayColor::Gray)?;
        queue!(self.out, Print("\n")).context("failed to finish output")?;
        self.flush()
    }

    fn write_line(&mut self, row: usize, text: &str, color: DisplayColor) -> Result<()> {
        let row = u16::try_from(row).unwrap_or(u16::MAX);
        let written = if self.plain {
            queue!(self.out, MoveTo(0, row), Print(text))
        } else {
            queue!(
                self.out,
                MoveTo(0, row),
                SetForegroundColor(terminal_color(color)),
                Print(text),
                ResetColor
            )
        };
        written.context("failed to write to terminal")
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush().context("failed to flush terminal")
    }

    fn term_width(&self) -> usize {
        let width = self
            .width
            .or_else(|| terminal::size().ok().map(|(cols, _)| cols))
            .filter(|cols| *cols > 0)
            .unwrap_or(FALLBACK_WIDTH);
        width as usize
    }
}

fn terminal_color(color: DisplayColor) -> Color {
    match color {
        DisplayColor::Gray => Color::DarkGrey,
        DisplayColor::Green => Color::Green,
        DisplayColor::Red => Color::Red,
        DisplayColor::Yellow => Color::Yellow,
        DisplayColor::White => Color::White,
    }
}

/// Sleeps for `tick`, waking early when `interrupt` is set.
fn wait_for_tick(interrupt: &AtomicBool, tick: Duration) -> bool {
    let deadline = Instant::now() + tick;
    loop {
        if interrupt.load(Ordering::SeqCst) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep((deadline - now).min(INTERRUPT_POLL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_wait_returns_early_on_interrupt() {
        let flag = AtomicBool::new(true);
        let started = Instant::now();
        assert!(wait_for_tick(&flag, Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn tick_wait_runs_out() {
        let flag = AtomicBool::new(false);
        assert!(!wait_for_tick(&flag, Duration::from_millis(5)));
    }
}
