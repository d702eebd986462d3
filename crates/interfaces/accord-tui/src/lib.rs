pub mod input;
pub mod term;

pub use input::spawn_input_pump;
pub use term::{TargetMap, TermError, Terminal};
