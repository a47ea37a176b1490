//! Record types on both sides of the migration.

mod destination;
mod source;

pub use destination::*;
pub use source::*;
