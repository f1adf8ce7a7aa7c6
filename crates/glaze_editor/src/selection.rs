// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node selection state.

use glaze_graph::NodeId;
use serde::{Deserialize, Serialize};

/// Selection mode for multi-select operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectMode {
    /// Replace current selection
    #[default]
    Set,
    /// Add to current selection (Shift+Click)
    Add,
    /// Toggle in current selection (Ctrl+Shift+Click)
    Toggle,
}

/// Current node selection, order-preserving and duplicate-free.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Selection {
    /// Selected nodes in selection order
    pub nodes: Vec<NodeId>,
}

impl Selection {
    /// Create a new empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a node is selected
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Add a node to the selection (idempotent)
    pub fn add(&mut self, id: NodeId) {
        if !self.contains(id) {
            self.nodes.push(id);
        }
    }

    /// Remove a node from the selection
    pub fn remove(&mut self, id: NodeId) {
        self.nodes.retain(|n| *n != id);
    }

    /// Toggle a node in the selection
    pub fn toggle(&mut self, id: NodeId) {
        if self.contains(id) {
            self.remove(id);
        } else {
            self.add(id);
        }
    }

    /// Apply a click on `id` under the given mode
    pub fn click(&mut self, id: NodeId, mode: SelectMode) {
        match mode {
            SelectMode::Set => {
                // Clicking inside the current selection keeps it, so a
                // multi-node drag can start from any member
                if !self.contains(id) {
                    self.nodes.clear();
                    self.nodes.push(id);
                }
            }
            SelectMode::Add => self.add(id),
            SelectMode::Toggle => self.toggle(id),
        }
    }

    /// Clear the selection
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Check if the selection is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of selected nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// The single selected node, if exactly one is selected
    pub fn single(&self) -> Option<NodeId> {
        match self.nodes.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
}
