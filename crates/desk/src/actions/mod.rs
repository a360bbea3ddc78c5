//! User actions on messages
//!
//! Mutations go to the provider and are mirrored into local storage,
//! either server-first or optimistically with rollback.

mod handler;
mod optimistic;

pub use handler::ActionHandler;
pub use optimistic::{apply_optimistic, ActionState, ItemAction, OptimisticUpdate};
