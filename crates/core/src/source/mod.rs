//! Paginated reads from the source API.
//!
//! This module provides the `PageSource` trait that the paginated fetcher
//! walks, and the HTTP client implementing it for the source system.

mod autotask;
mod types;

pub(crate) use autotask::decode_page;
pub use autotask::{AutotaskClient, EntityQuery, TICKET_NOTES_ENTITY};
pub use types::*;
