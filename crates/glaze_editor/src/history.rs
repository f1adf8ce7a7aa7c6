// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo stack.
//!
//! One bounded-depth stack per graph scope. Discarding a command (depth
//! eviction, redo-tail invalidation, explicit clear) flushes its
//! pending permanent deletions against the collection, so nodes a
//! dead command alone kept alive are purged at a well-defined point.

use crate::commands::{CommandContext, UndoCommand};
use std::collections::VecDeque;
use thiserror::Error;

/// Default maximum undo history depth
pub const MAX_HISTORY: usize = 100;

/// History errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,
}

/// Undo/redo stack for one graph scope.
pub struct History {
    undo_stack: VecDeque<Box<dyn UndoCommand>>,
    redo_stack: Vec<Box<dyn UndoCommand>>,
    max_depth: usize,
}

impl History {
    /// Create a stack with the default depth
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create a stack with a custom depth bound
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Execute and record a command.
    ///
    /// The redo tail is invalidated, the command is merged into the
    /// previous entry when both agree, and the oldest entry is evicted
    /// once the depth bound is exceeded.
    pub fn push(&mut self, mut command: Box<dyn UndoCommand>, ctx: &CommandContext<'_>) {
        command.redo(ctx);

        for stale in self.redo_stack.drain(..) {
            flush_discarded(stale, ctx);
        }

        if let Some(top) = self.undo_stack.back_mut() {
            if top.merge_with(&*command) {
                return;
            }
        }
        self.undo_stack.push_back(command);

        while self.undo_stack.len() > self.max_depth {
            if let Some(evicted) = self.undo_stack.pop_front() {
                tracing::debug!(name = evicted.name(), "evicting oldest undo entry");
                flush_discarded(evicted, ctx);
            }
        }
    }

    /// Undo the most recent entry, returning its name
    pub fn undo(&mut self, ctx: &CommandContext<'_>) -> Result<String, HistoryError> {
        let mut command = self
            .undo_stack
            .pop_back()
            .ok_or(HistoryError::NothingToUndo)?;
        command.undo(ctx);
        let name = command.name().to_string();
        self.redo_stack.push(command);
        Ok(name)
    }

    /// Re-apply the most recently undone entry, returning its name
    pub fn redo(&mut self, ctx: &CommandContext<'_>) -> Result<String, HistoryError> {
        let mut command = self.redo_stack.pop().ok_or(HistoryError::NothingToRedo)?;
        command.redo(ctx);
        let name = command.name().to_string();
        self.undo_stack.push_back(command);
        Ok(name)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Undo stack depth
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Redo stack depth
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Name of the next undo entry
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|c| c.name())
    }

    /// Name of the next redo entry
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|c| c.name())
    }

    /// Drop all history, flushing every entry's pending deletions
    pub fn clear(&mut self, ctx: &CommandContext<'_>) {
        for command in self.undo_stack.drain(..) {
            flush_discarded(command, ctx);
        }
        for command in self.redo_stack.drain(..) {
            flush_discarded(command, ctx);
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

fn flush_discarded(command: Box<dyn UndoCommand>, ctx: &CommandContext<'_>) {
    for id in command.pending_permanent_deletions() {
        tracing::debug!(?id, "purging node held by discarded command");
        ctx.collection.remove_node(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{MoveNodesCommand, RemoveNodesCommand};
    use emath::Pos2;
    use glaze_graph::registry::create_default_registry;
    use glaze_graph::{DefaultPolicy, NodeCollection};

    fn ctx<'a>(
        coll: &'a NodeCollection,
        policy: &'a DefaultPolicy,
    ) -> CommandContext<'a> {
        CommandContext {
            collection: coll,
            policy,
        }
    }

    #[test]
    fn test_undo_redo_round_trip_restores_state() {
        let coll = NodeCollection::new("root");
        let registry = create_default_registry();
        let policy = DefaultPolicy;
        let id = coll
            .add_node(registry.create_node("glaze.blur", Pos2::ZERO).unwrap())
            .unwrap();

        let mut history = History::new();
        let cmd = MoveNodesCommand::new(vec![(id, Pos2::ZERO, Pos2::new(50.0, 0.0))]);
        history.push(Box::new(cmd), &ctx(&coll, &policy));
        assert_eq!(coll.node(id).unwrap().position, Pos2::new(50.0, 0.0));

        let name = history.undo(&ctx(&coll, &policy)).unwrap();
        assert_eq!(name, "Move nodes");
        assert_eq!(coll.node(id).unwrap().position, Pos2::ZERO);

        history.redo(&ctx(&coll, &policy)).unwrap();
        assert_eq!(coll.node(id).unwrap().position, Pos2::new(50.0, 0.0));
    }

    #[test]
    fn test_empty_stacks_error() {
        let coll = NodeCollection::new("root");
        let policy = DefaultPolicy;
        let mut history = History::new();
        assert_eq!(
            history.undo(&ctx(&coll, &policy)),
            Err(HistoryError::NothingToUndo)
        );
        assert_eq!(
            history.redo(&ctx(&coll, &policy)),
            Err(HistoryError::NothingToRedo)
        );
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_consecutive_moves_merge_into_one_entry() {
        let coll = NodeCollection::new("root");
        let registry = create_default_registry();
        let policy = DefaultPolicy;
        let id = coll
            .add_node(registry.create_node("glaze.blur", Pos2::ZERO).unwrap())
            .unwrap();

        let mut history = History::new();
        history.push(
            Box::new(MoveNodesCommand::new(vec![(
                id,
                Pos2::ZERO,
                Pos2::new(10.0, 0.0),
            )])),
            &ctx(&coll, &policy),
        );
        history.push(
            Box::new(MoveNodesCommand::new(vec![(
                id,
                Pos2::new(10.0, 0.0),
                Pos2::new(25.0, 0.0),
            )])),
            &ctx(&coll, &policy),
        );
        assert_eq!(history.undo_depth(), 1);

        // One undo jumps all the way back
        history.undo(&ctx(&coll, &policy)).unwrap();
        assert_eq!(coll.node(id).unwrap().position, Pos2::ZERO);
    }

    #[test]
    fn test_eviction_purges_removed_nodes() {
        let coll = NodeCollection::new("root");
        let registry = create_default_registry();
        let policy = DefaultPolicy;
        let doomed = coll
            .add_node(registry.create_node("glaze.blur", Pos2::ZERO).unwrap())
            .unwrap();
        let survivor = coll
            .add_node(registry.create_node("glaze.grade", Pos2::ZERO).unwrap())
            .unwrap();

        let mut history = History::with_max_depth(1);
        history.push(
            Box::new(RemoveNodesCommand::new(vec![doomed])),
            &ctx(&coll, &policy),
        );
        assert!(!coll.node(doomed).unwrap().active);

        // Pushing a second entry evicts the removal, which finalizes it
        history.push(
            Box::new(MoveNodesCommand::new(vec![(
                survivor,
                Pos2::ZERO,
                Pos2::new(5.0, 5.0),
            )])),
            &ctx(&coll, &policy),
        );
        assert!(coll.node(doomed).is_none());
        assert!(coll.node(survivor).is_some());
    }

    #[test]
    fn test_new_push_invalidates_redo_tail_and_flushes_it() {
        let coll = NodeCollection::new("root");
        let registry = create_default_registry();
        let policy = DefaultPolicy;
        let a = coll
            .add_node(registry.create_node("glaze.blur", Pos2::ZERO).unwrap())
            .unwrap();
        let b = coll
            .add_node(registry.create_node("glaze.grade", Pos2::ZERO).unwrap())
            .unwrap();

        let mut history = History::new();
        // Undo an add, leaving the node alive only through the redo tail
        history.push(
            Box::new(crate::commands::AddNodesCommand::new(vec![a])),
            &ctx(&coll, &policy),
        );
        history.undo(&ctx(&coll, &policy)).unwrap();
        assert!(!coll.node(a).unwrap().active);
        assert!(history.can_redo());

        // A fresh edit discards the tail and finalizes the undone add
        history.push(
            Box::new(MoveNodesCommand::new(vec![(
                b,
                Pos2::ZERO,
                Pos2::new(1.0, 1.0),
            )])),
            &ctx(&coll, &policy),
        );
        assert!(!history.can_redo());
        assert!(coll.node(a).is_none());
    }

    #[test]
    fn test_descriptions() {
        let coll = NodeCollection::new("root");
        let registry = create_default_registry();
        let policy = DefaultPolicy;
        let id = coll
            .add_node(registry.create_node("glaze.blur", Pos2::ZERO).unwrap())
            .unwrap();

        let mut history = History::new();
        assert_eq!(history.undo_description(), None);
        history.push(
            Box::new(MoveNodesCommand::new(vec![(id, Pos2::ZERO, Pos2::ZERO)])),
            &ctx(&coll, &policy),
        );
        assert_eq!(history.undo_description(), Some("Move nodes"));
        history.undo(&ctx(&coll, &policy)).unwrap();
        assert_eq!(history.redo_description(), Some("Move nodes"));
    }
}
