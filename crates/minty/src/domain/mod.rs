//! Domain layer: identifiers, value types and pure rules.

mod command;
mod events;
mod session_types;
mod signal;
mod title;

pub use command::*;
pub use events::*;
pub use session_types::*;
pub use signal::*;
pub use title::suggested_title;
