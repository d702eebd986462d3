use tokio::sync::mpsc;

use crate::events::Event;

/// The bounded bus keeps fast producers (hashing) throttled to reconciler
/// consumption while staying deep enough that input never waits behind a
/// single slow frame.
pub const EVENT_BUS_CAPACITY: usize = 32;

pub type EventSender = mpsc::Sender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;

pub fn event_bus() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_BUS_CAPACITY)
}
