use accord_core::{FileId, FileKind, FileState, Root, SortColumn, TreePath};
use chrono::{DateTime, Utc};

use crate::events::MouseCommand;
use crate::ports::{Position, Renderer, Size, Style, StyleFlags};
use crate::projector::{ProgressInfo, ViewFile};

/// Immutable frame snapshot handed to the renderer once per loop
/// iteration.
#[derive(Debug, Clone)]
pub struct Screen {
    pub origin: Root,
    pub current_path: TreePath,
    pub entries: Vec<ViewFile>,
    pub selected_id: Option<FileId>,
    pub offset_idx: usize,
    pub sort_column: SortColumn,
    pub sort_ascending: bool,
    pub pending_files: usize,
    pub duplicate_files: usize,
    pub absent_files: usize,
    pub progress: Vec<ProgressInfo>,
    pub copy_progress: Option<f64>,
    pub status_line: Option<String>,
    pub width: u16,
    pub height: u16,
    pub pane_height: usize,
}

const STYLE_TITLE: Style = Style::with_flags(231, 17, StyleFlags::BOLD);
const STYLE_BREADCRUMB: Style = Style::with_flags(250, 17, StyleFlags::NONE);
const STYLE_GAUGE: Style = Style::new(250, 0);
const STYLE_HEADER: Style = Style::with_flags(231, 236, StyleFlags::BOLD);
const STYLE_FILE: Style = Style::new(252, 0);
const STYLE_FOLDER: Style = Style::with_flags(39, 0, StyleFlags::BOLD);
const STYLE_PENDING: Style = Style::new(244, 0);
const STYLE_DUPLICATE: Style = Style::new(220, 0);
const STYLE_ABSENT: Style = Style::new(196, 0);
const STYLE_STATUS: Style = Style::new(245, 0);

const STATE_WIDTH: usize = 11;
const TIME_WIDTH: usize = 17;
const SIZE_WIDTH: usize = 10;
const GAUGE_WIDTH: usize = 24;

pub fn draw(screen: &Screen, renderer: &mut dyn Renderer) {
    let width = screen.width as usize;
    if width == 0 || screen.height == 0 {
        return;
    }

    draw_title(screen, renderer, width);

    let mut y: u16 = 1;
    for info in &screen.progress {
        draw_gauge_row(screen, renderer, info, y, width);
        y += 1;
    }

    draw_header(screen, renderer, y, width);
    y += 1;

    let pane_top = y;
    draw_entries(screen, renderer, pane_top, width);
    renderer.add_scroll_area(
        1,
        Position::new(0, pane_top),
        Size::new(screen.width, screen.pane_height as u16),
    );

    draw_status(screen, renderer, width);
}

fn draw_title(screen: &Screen, renderer: &mut dyn Renderer, width: usize) {
    renderer.set_style(STYLE_TITLE);
    renderer.text(&" ".repeat(width), Position::new(0, 0));

    let name = format!(" accord  {}", screen.origin);
    renderer.text(&name, Position::new(0, 0));

    // Breadcrumb: every ancestor is a click target back up the tree.
    renderer.set_style(STYLE_BREADCRUMB);
    let mut x = name.chars().count() as u16;
    renderer.text(" /", Position::new(x, 0));
    renderer.add_mouse_target(
        MouseCommand::SelectFolder(TreePath::root()),
        Position::new(x, 0),
        Size::new(2, 1),
    );
    x += 2;
    let mut prefix = TreePath::root();
    for component in screen.current_path.components() {
        prefix = prefix.join(component);
        let segment = format!("{component}/");
        let w = segment.chars().count() as u16;
        renderer.text(&segment, Position::new(x, 0));
        renderer.add_mouse_target(
            MouseCommand::SelectFolder(prefix.clone()),
            Position::new(x, 0),
            Size::new(w, 1),
        );
        x += w;
    }

    renderer.set_style(STYLE_TITLE);
    let counters = format!(
        "pending {}  duplicate {}  absent {} ",
        screen.pending_files, screen.duplicate_files, screen.absent_files
    );
    let len = counters.chars().count();
    if len < width {
        renderer.text(&counters, Position::new((width - len) as u16, 0));
    }
}

fn draw_gauge_row(
    screen: &Screen,
    renderer: &mut dyn Renderer,
    info: &ProgressInfo,
    y: u16,
    width: usize,
) {
    renderer.set_style(STYLE_GAUGE);
    let mut line = format!(
        " {}  {} {:>3.0}% {}",
        info.root,
        gauge(info.value, GAUGE_WIDTH),
        info.value * 100.0,
        info.label
    );
    if info.root == screen.origin {
        if let Some(copying) = screen.copy_progress {
            line.push_str(&format!("  copying {:>3.0}%", copying * 100.0));
        }
    }
    renderer.text(&fit(&line, width), Position::new(0, y));
}

fn draw_header(screen: &Screen, renderer: &mut dyn Renderer, y: u16, width: usize) {
    renderer.set_style(STYLE_HEADER);
    let name_width = name_column_width(width);

    let marker = |column: SortColumn| -> &'static str {
        if column == screen.sort_column {
            if screen.sort_ascending {
                " ▲"
            } else {
                " ▼"
            }
        } else {
            ""
        }
    };

    let line = format!(
        " {:<name_width$} {:<STATE_WIDTH$} {:<TIME_WIDTH$} {:>SIZE_WIDTH$}",
        format!("Name{}", marker(SortColumn::Name)),
        format!("State{}", marker(SortColumn::State)),
        format!("Modified{}", marker(SortColumn::Time)),
        format!("Size{}", marker(SortColumn::Size)),
    );
    renderer.text(&fit(&line, width), Position::new(0, y));

    let columns = [
        (SortColumn::Name, 1u16, name_width as u16),
        (SortColumn::State, (2 + name_width) as u16, STATE_WIDTH as u16),
        (
            SortColumn::Time,
            (3 + name_width + STATE_WIDTH) as u16,
            TIME_WIDTH as u16,
        ),
        (
            SortColumn::Size,
            (4 + name_width + STATE_WIDTH + TIME_WIDTH) as u16,
            SIZE_WIDTH as u16,
        ),
    ];
    for (column, x, w) in columns {
        renderer.add_mouse_target(
            MouseCommand::SortColumn(column),
            Position::new(x, y),
            Size::new(w, 1),
        );
    }
}

fn draw_entries(screen: &Screen, renderer: &mut dyn Renderer, pane_top: u16, width: usize) {
    let name_width = name_column_width(width);
    let end = (screen.offset_idx + screen.pane_height).min(screen.entries.len());

    for (row, entry) in screen.entries[screen.offset_idx..end].iter().enumerate() {
        let y = pane_top + row as u16;
        let selected = screen.selected_id.as_ref() == Some(entry.id());

        let mut style = entry_style(entry);
        if selected {
            style.flags = style.flags | StyleFlags::REVERSE;
        }
        renderer.set_style(style);

        let name = if entry.kind == FileKind::Folder {
            format!("{}/", entry.id().base())
        } else {
            entry.id().base().to_string()
        };
        let line = format!(
            " {:<name_width$} {:<STATE_WIDTH$} {:<TIME_WIDTH$} {:>SIZE_WIDTH$}",
            fit(&name, name_width),
            entry.state.label(),
            format_time(entry.meta.mod_time),
            format_size(entry.meta.size),
        );
        renderer.text(&fit(&line, width), Position::new(0, y));
        renderer.add_mouse_target(
            MouseCommand::SelectFile(entry.id().clone()),
            Position::new(0, y),
            Size::new(screen.width, 1),
        );
    }
}

fn draw_status(screen: &Screen, renderer: &mut dyn Renderer, width: usize) {
    let y = screen.height - 1;
    renderer.set_style(STYLE_STATUS);
    let line = match &screen.status_line {
        Some(message) => format!(" {message}"),
        None => " enter open   esc up   tab next duplicate   k keep   del delete   q quit"
            .to_string(),
    };
    renderer.text(&fit(&line, width), Position::new(0, y));
}

fn entry_style(entry: &ViewFile) -> Style {
    match entry.state {
        FileState::Pending => STYLE_PENDING,
        FileState::Duplicate => STYLE_DUPLICATE,
        FileState::Absent => STYLE_ABSENT,
        FileState::Initial | FileState::Resolved => {
            if entry.kind == FileKind::Folder {
                STYLE_FOLDER
            } else {
                STYLE_FILE
            }
        }
    }
}

fn name_column_width(width: usize) -> usize {
    width
        .saturating_sub(STATE_WIDTH + TIME_WIDTH + SIZE_WIDTH + 5)
        .max(8)
}

fn gauge(value: f64, width: usize) -> String {
    let filled = ((value.clamp(0.0, 1.0)) * width as f64).round() as usize;
    let mut bar = String::with_capacity(width);
    for i in 0..width {
        bar.push(if i < filled { '█' } else { '░' });
    }
    bar
}

/// Truncate or pad to an exact character width.
fn fit(s: &str, width: usize) -> String {
    let mut out: String = s.chars().take(width).collect();
    let len = out.chars().count();
    if len < width {
        out.extend(std::iter::repeat(' ').take(width - len));
    }
    out
}

fn format_time(time: DateTime<Utc>) -> String {
    if time == DateTime::UNIX_EPOCH {
        String::new()
    } else {
        time.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Decimal units, one fractional digit above kilobytes.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1_000.0;
    const MB: f64 = 1_000_000.0;
    const GB: f64 = 1_000_000_000.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.1} GB", b / GB)
    } else if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}
