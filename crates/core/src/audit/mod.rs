//! Append-only audit log of every request attempt, failure and outcome.

mod events;
mod handle;
mod store;
mod writer;

pub use events::*;
pub use handle::*;
pub use store::*;
pub use writer::*;
