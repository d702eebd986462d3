use std::io::{self, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossterm::style::{Attribute, Color, SetAttribute, SetBackgroundColor, SetForegroundColor};
use crossterm::{cursor, event, execute, queue, terminal};
use tracing::warn;

use accord_engine::{MouseCommand, Position, Renderer, Size, Style, StyleFlags};

#[derive(Debug, thiserror::Error)]
pub enum TermError {
    #[error("terminal error: {0}")]
    Io(#[from] io::Error),
}

/// Click and wheel hit-testing data published by the renderer each frame
/// and consulted by the input pump.
#[derive(Debug, Default)]
pub struct TargetMap {
    pub(crate) targets: Vec<(MouseCommand, Position, Size)>,
    pub(crate) scrolls: Vec<(i32, Position, Size)>,
}

impl TargetMap {
    pub fn hit(&self, x: u16, y: u16) -> Option<MouseCommand> {
        self.targets
            .iter()
            .rev()
            .find(|(_, pos, size)| contains(*pos, *size, x, y))
            .map(|(cmd, _, _)| cmd.clone())
    }

    pub fn scroll_step(&self, x: u16, y: u16) -> Option<i32> {
        self.scrolls
            .iter()
            .rev()
            .find(|(_, pos, size)| contains(*pos, *size, x, y))
            .map(|(step, _, _)| *step)
    }
}

fn contains(pos: Position, size: Size, x: u16, y: u16) -> bool {
    x >= pos.x && x < pos.x + size.width && y >= pos.y && y < pos.y + size.height
}

#[derive(Clone, Copy)]
struct Cell {
    ch: char,
    style: Style,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: Style::default(),
        }
    }
}

/// Crossterm-backed renderer: an off-screen cell buffer presented as one
/// full frame on `show()`. Raw mode and the alternate screen are entered
/// on creation and restored by `stop()` (and by drop, as a backstop).
pub struct Terminal {
    out: Stdout,
    width: u16,
    height: u16,
    cells: Vec<Cell>,
    style: Style,
    building: TargetMap,
    shared: Arc<Mutex<TargetMap>>,
    stop_flag: Arc<AtomicBool>,
    stopped: bool,
}

impl Terminal {
    pub fn new() -> Result<Self, TermError> {
        let mut out = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(
            out,
            terminal::EnterAlternateScreen,
            event::EnableMouseCapture,
            cursor::Hide
        )?;
        let (width, height) = terminal::size()?;
        Ok(Self {
            out,
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
            style: Style::default(),
            building: TargetMap::default(),
            shared: Arc::new(Mutex::new(TargetMap::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
            stopped: false,
        })
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Hit-testing data shared with the input pump.
    pub fn targets(&self) -> Arc<Mutex<TargetMap>> {
        self.shared.clone()
    }

    /// Flag observed by the input pump; raised by `stop()`.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    fn present(&mut self) -> io::Result<()> {
        queue!(self.out, cursor::MoveTo(0, 0))?;
        let mut current: Option<Style> = None;
        for y in 0..self.height {
            queue!(self.out, cursor::MoveTo(0, y))?;
            let mut run = String::new();
            for x in 0..self.width {
                let cell = self.cells[y as usize * self.width as usize + x as usize];
                if current != Some(cell.style) {
                    if !run.is_empty() {
                        queue!(self.out, crossterm::style::Print(&run))?;
                        run.clear();
                    }
                    apply_style(&mut self.out, cell.style)?;
                    current = Some(cell.style);
                }
                run.push(cell.ch);
            }
            if !run.is_empty() {
                queue!(self.out, crossterm::style::Print(&run))?;
            }
        }
        self.out.flush()
    }

    fn restore(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.stop_flag.store(true, Ordering::Relaxed);
        let _ = execute!(
            self.out,
            event::DisableMouseCapture,
            terminal::LeaveAlternateScreen,
            cursor::Show
        );
        let _ = terminal::disable_raw_mode();
    }
}

fn apply_style(out: &mut Stdout, style: Style) -> io::Result<()> {
    queue!(
        out,
        SetAttribute(Attribute::Reset),
        SetForegroundColor(Color::AnsiValue(style.fg)),
        SetBackgroundColor(Color::AnsiValue(style.bg))
    )?;
    if style.flags.contains(StyleFlags::BOLD) {
        queue!(out, SetAttribute(Attribute::Bold))?;
    }
    if style.flags.contains(StyleFlags::ITALIC) {
        queue!(out, SetAttribute(Attribute::Italic))?;
    }
    if style.flags.contains(StyleFlags::REVERSE) {
        queue!(out, SetAttribute(Attribute::Reverse))?;
    }
    Ok(())
}

impl Renderer for Terminal {
    fn reset(&mut self) {
        if let Ok((width, height)) = terminal::size() {
            if (width, height) != (self.width, self.height) {
                self.width = width;
                self.height = height;
            }
        }
        self.cells = vec![Cell::default(); self.width as usize * self.height as usize];
        self.style = Style::default();
        self.building = TargetMap::default();
    }

    fn add_mouse_target(&mut self, target: MouseCommand, pos: Position, size: Size) {
        self.building.targets.push((target, pos, size));
    }

    fn add_scroll_area(&mut self, step: i32, pos: Position, size: Size) {
        self.building.scrolls.push((step, pos, size));
    }

    fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    fn current_style(&self) -> Style {
        self.style
    }

    fn text(&mut self, runes: &str, pos: Position) {
        if pos.y >= self.height {
            return;
        }
        let row = pos.y as usize * self.width as usize;
        let mut x = pos.x as usize;
        for ch in runes.chars() {
            if x >= self.width as usize {
                break;
            }
            self.cells[row + x] = Cell {
                ch,
                style: self.style,
            };
            x += 1;
        }
    }

    fn show(&mut self) {
        let built = std::mem::take(&mut self.building);
        if let Ok(mut shared) = self.shared.lock() {
            *shared = built;
        }
        if let Err(err) = self.present() {
            warn!(%err, "failed to present frame");
        }
    }

    fn stop(&mut self) {
        self.restore();
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_core::TreePath;

    fn folder_target(path: &str, pos: Position, size: Size) -> (MouseCommand, Position, Size) {
        (MouseCommand::SelectFolder(TreePath::from(path)), pos, size)
    }

    #[test]
    fn hit_testing_respects_bounds() {
        let map = TargetMap {
            targets: vec![folder_target("a", Position::new(2, 1), Size::new(4, 1))],
            scrolls: vec![],
        };
        assert!(map.hit(2, 1).is_some());
        assert!(map.hit(5, 1).is_some());
        assert!(map.hit(6, 1).is_none());
        assert!(map.hit(2, 0).is_none());
        assert!(map.hit(1, 1).is_none());
    }

    #[test]
    fn later_registrations_win_on_overlap() {
        let map = TargetMap {
            targets: vec![
                folder_target("below", Position::new(0, 0), Size::new(10, 2)),
                folder_target("above", Position::new(0, 0), Size::new(10, 1)),
            ],
            scrolls: vec![],
        };
        match map.hit(3, 0) {
            Some(MouseCommand::SelectFolder(path)) => assert_eq!(path.as_str(), "above"),
            other => panic!("unexpected hit: {other:?}"),
        }
        match map.hit(3, 1) {
            Some(MouseCommand::SelectFolder(path)) => assert_eq!(path.as_str(), "below"),
            other => panic!("unexpected hit: {other:?}"),
        }
    }

    #[test]
    fn scroll_areas_report_their_step() {
        let map = TargetMap {
            targets: vec![],
            scrolls: vec![(1, Position::new(0, 3), Size::new(80, 10))],
        };
        assert_eq!(map.scroll_step(10, 5), Some(1));
        assert_eq!(map.scroll_step(10, 2), None);
    }
}
