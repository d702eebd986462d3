use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{
    self, Event as TermEvent, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
};
use tracing::debug;

use accord_engine::{Event, EventSender};

use crate::term::TargetMap;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Decode terminal key/mouse/resize events into bus events on a dedicated
/// thread. Clicks and wheel movement are resolved against the target map
/// the renderer published with the last frame. The pump exits when the
/// stop flag is raised or the bus closes.
pub fn spawn_input_pump(
    events: EventSender,
    targets: Arc<Mutex<TargetMap>>,
    stop: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("accord-input".into()).spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            match event::poll(POLL_INTERVAL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(err) => {
                    debug!(%err, "input poll failed");
                    break;
                }
            }
            let term_event = match event::read() {
                Ok(ev) => ev,
                Err(err) => {
                    debug!(%err, "input read failed");
                    break;
                }
            };
            let Some(event) = translate(term_event, &targets) else {
                continue;
            };
            if events.blocking_send(event).is_err() {
                break;
            }
        }
        debug!("input pump stopped");
    })
}

fn translate(term_event: TermEvent, targets: &Arc<Mutex<TargetMap>>) -> Option<Event> {
    match term_event {
        TermEvent::Key(key) => {
            if key.kind == KeyEventKind::Release {
                return None;
            }
            match key.code {
                KeyCode::Enter => Some(Event::Enter),
                KeyCode::Esc => Some(Event::Esc),
                KeyCode::Up => Some(Event::MoveSelection { lines: -1 }),
                KeyCode::Down => Some(Event::MoveSelection { lines: 1 }),
                KeyCode::PageUp => Some(Event::PgUp),
                KeyCode::PageDown => Some(Event::PgDn),
                KeyCode::Home => Some(Event::SelectFirst),
                KeyCode::End => Some(Event::SelectLast),
                KeyCode::Tab => Some(Event::Tab),
                KeyCode::Delete | KeyCode::Backspace => Some(Event::Delete),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    Some(Event::Quit)
                }
                KeyCode::Char('q') => Some(Event::Quit),
                KeyCode::Char('k') => Some(Event::KeepOne),
                KeyCode::Char('K') => Some(Event::KeepAll),
                KeyCode::Char('r') => Some(Event::RevealInFinder),
                _ => None,
            }
        }
        TermEvent::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => targets
                .lock()
                .ok()
                .and_then(|map| map.hit(mouse.column, mouse.row))
                .map(Event::MouseTarget),
            MouseEventKind::ScrollDown => targets
                .lock()
                .ok()
                .and_then(|map| map.scroll_step(mouse.column, mouse.row))
                .map(|step| Event::Scroll { lines: step }),
            MouseEventKind::ScrollUp => targets
                .lock()
                .ok()
                .and_then(|map| map.scroll_step(mouse.column, mouse.row))
                .map(|step| Event::Scroll { lines: -step }),
            _ => None,
        },
        TermEvent::Resize(width, height) => Some(Event::ScreenSize { width, height }),
        _ => None,
    }
}
