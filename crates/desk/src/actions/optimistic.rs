//! Optimistic mutation state machine
//!
//! Star and unstar update local state before the provider call resolves,
//! then revert on failure. The explicit machine keeps callers and tests
//! agreed on what "pending" means, without racing real network calls.

use anyhow::{bail, Result};

/// Actions that mutate a single message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Star,
    Unstar,
    MarkRead,
    MarkUnread,
    Archive,
    Trash,
    Resolve,
    Delete,
}

/// Lifecycle of one optimistic mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionState {
    /// No mutation in flight
    #[default]
    Idle,
    /// Local state reflects the action; the provider call is unresolved
    Pending(ItemAction),
    /// The provider confirmed the action
    Committed(ItemAction),
    /// The provider call failed and local state was reverted
    RolledBack(ItemAction),
}

/// Per-item state machine: Idle to Pending, then Committed or RolledBack
#[derive(Debug, Default)]
pub struct OptimisticUpdate {
    state: ActionState,
}

impl OptimisticUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, ActionState::Pending(_))
    }

    /// Enter Pending. Fails while another action is unresolved.
    pub fn begin(&mut self, action: ItemAction) -> Result<()> {
        if self.is_pending() {
            bail!("another action is already pending");
        }
        self.state = ActionState::Pending(action);
        Ok(())
    }

    pub fn commit(&mut self) {
        if let ActionState::Pending(action) = self.state {
            self.state = ActionState::Committed(action);
        }
    }

    pub fn roll_back(&mut self) {
        if let ActionState::Pending(action) = self.state {
            self.state = ActionState::RolledBack(action);
        }
    }

    /// Return to Idle so the item can accept a new action
    pub fn reset(&mut self) {
        self.state = ActionState::Idle;
    }
}

/// Drive one optimistic mutation through the machine.
///
/// `apply_local` runs first, then `commit_remote` confirms with the
/// provider. On remote failure `revert_local` undoes the local change and
/// the machine lands in RolledBack.
pub fn apply_optimistic<T>(
    update: &mut OptimisticUpdate,
    action: ItemAction,
    apply_local: impl FnOnce() -> Result<()>,
    commit_remote: impl FnOnce() -> Result<T>,
    revert_local: impl FnOnce(),
) -> Result<T> {
    update.begin(action)?;

    if let Err(err) = apply_local() {
        update.roll_back();
        return Err(err);
    }

    match commit_remote() {
        Ok(value) => {
            update.commit();
            Ok(value)
        }
        Err(err) => {
            revert_local();
            update.roll_back();
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::Cell;

    #[test]
    fn test_commit_path() {
        let mut update = OptimisticUpdate::new();
        let applied = Cell::new(false);
        let reverted = Cell::new(false);

        let result = apply_optimistic(
            &mut update,
            ItemAction::Star,
            || {
                applied.set(true);
                Ok(())
            },
            || Ok(42),
            || reverted.set(true),
        );

        assert_eq!(result.unwrap(), 42);
        assert_eq!(update.state(), ActionState::Committed(ItemAction::Star));
        assert!(applied.get());
        assert!(!reverted.get());
    }

    #[test]
    fn test_remote_failure_reverts_local_change() {
        let mut update = OptimisticUpdate::new();
        let reverted = Cell::new(false);

        let result: Result<()> = apply_optimistic(
            &mut update,
            ItemAction::Unstar,
            || Ok(()),
            || Err(anyhow!("network down")),
            || reverted.set(true),
        );

        assert!(result.is_err());
        assert!(reverted.get());
        assert_eq!(update.state(), ActionState::RolledBack(ItemAction::Unstar));
    }

    #[test]
    fn test_local_failure_skips_revert() {
        // Nothing was applied, so there is nothing to undo.
        let mut update = OptimisticUpdate::new();
        let reverted = Cell::new(false);

        let result: Result<()> = apply_optimistic(
            &mut update,
            ItemAction::Star,
            || Err(anyhow!("store unavailable")),
            || Ok(()),
            || reverted.set(true),
        );

        assert!(result.is_err());
        assert!(!reverted.get());
        assert_eq!(update.state(), ActionState::RolledBack(ItemAction::Star));
    }

    #[test]
    fn test_begin_rejects_overlapping_action() {
        let mut update = OptimisticUpdate::new();
        update.begin(ItemAction::Trash).unwrap();

        assert!(update.begin(ItemAction::Star).is_err());
        assert_eq!(update.state(), ActionState::Pending(ItemAction::Trash));
    }

    #[test]
    fn test_reset_allows_reuse() {
        let mut update = OptimisticUpdate::new();
        update.begin(ItemAction::Archive).unwrap();
        update.commit();
        assert_eq!(update.state(), ActionState::Committed(ItemAction::Archive));

        update.reset();
        assert_eq!(update.state(), ActionState::Idle);
        update.begin(ItemAction::Trash).unwrap();
        assert!(update.is_pending());
    }
}
