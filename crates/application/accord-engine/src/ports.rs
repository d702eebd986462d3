use crate::commands::FileCommand;
use crate::events::MouseCommand;

/// Handle to one archive's scanner actor. The reconciler keeps only this
/// handle; the actor owns its mailbox and emits immutable event values
/// into the shared bus. Dropping every handle signals the actor to stop
/// once its in-flight work drains.
pub trait ArchiveScanner: Send {
    fn send(&self, cmd: FileCommand);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub x: u16,
    pub y: u16,
}

impl Position {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

impl Size {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleFlags(u8);

impl StyleFlags {
    pub const NONE: StyleFlags = StyleFlags(0);
    pub const BOLD: StyleFlags = StyleFlags(1);
    pub const ITALIC: StyleFlags = StyleFlags(2);
    pub const REVERSE: StyleFlags = StyleFlags(4);

    pub fn contains(self, other: StyleFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for StyleFlags {
    type Output = StyleFlags;

    fn bitor(self, rhs: StyleFlags) -> StyleFlags {
        StyleFlags(self.0 | rhs.0)
    }
}

/// Indexed 256-color terminal style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub fg: u8,
    pub bg: u8,
    pub flags: StyleFlags,
}

impl Style {
    pub const fn new(fg: u8, bg: u8) -> Self {
        Self {
            fg,
            bg,
            flags: StyleFlags::NONE,
        }
    }

    pub const fn with_flags(fg: u8, bg: u8, flags: StyleFlags) -> Self {
        Self { fg, bg, flags }
    }
}

impl Default for Style {
    fn default() -> Self {
        Style::new(7, 0)
    }
}

/// The drawing surface the reconciler renders each frame through. One
/// frame is `reset()`, any number of `text`/target registrations, then
/// `show()`. `stop()` releases the terminal and is called exactly once.
pub trait Renderer {
    fn reset(&mut self);
    fn add_mouse_target(&mut self, target: MouseCommand, pos: Position, size: Size);
    /// Register an area where wheel movement produces `Scroll` events of
    /// `step` lines per notch (negated for upward movement).
    fn add_scroll_area(&mut self, step: i32, pos: Position, size: Size);
    fn set_style(&mut self, style: Style);
    fn current_style(&self) -> Style;
    fn text(&mut self, runes: &str, pos: Position);
    fn show(&mut self);
    fn stop(&mut self);
}
