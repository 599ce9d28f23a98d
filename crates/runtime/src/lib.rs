pub mod epoch;
pub mod event_bus;
pub mod refresh;

pub use epoch::*;
pub use event_bus::*;
pub use refresh::*;
