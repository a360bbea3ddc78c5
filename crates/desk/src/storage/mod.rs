//! Storage traits and implementations
//!
//! This module defines the storage abstraction layer for dashboard
//! entities. The trait-based design allows swapping between in-memory and
//! persistent storage implementations.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryDeskStore;
pub use sqlite::SqliteDeskStore;
pub use traits::{DeskStore, MAX_CACHED_MESSAGES};
