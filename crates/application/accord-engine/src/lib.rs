pub mod archive;
pub mod bus;
pub mod commands;
pub mod events;
pub mod folders;
pub mod ops;
pub mod ports;
pub mod projector;
pub mod reconciler;
pub mod sorter;
pub mod view;

pub use bus::{event_bus, EventReceiver, EventSender, EVENT_BUS_CAPACITY};
pub use commands::FileCommand;
pub use events::{Event, MouseCommand};
pub use ops::FileOp;
pub use ports::{ArchiveScanner, Position, Renderer, Size, Style, StyleFlags};
pub use projector::{ProgressInfo, Projection, ViewFile};
pub use reconciler::Reconciler;
pub use view::Screen;
