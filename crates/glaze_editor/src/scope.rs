// SPDX-License-Identifier: MIT OR Apache-2.0
//! One editable graph scope: a collection plus its selection, undo
//! stack, viewport and user-notice queue.

use crate::commands::{
    AddNodesCommand, CommandContext, DecloneNodesCommand, RemoveNodesCommand, RenameNodeCommand,
    SetEnabledCommand, UndoCommand,
};
use crate::history::{History, HistoryError};
use crate::interaction::EventState;
use crate::selection::{SelectMode, Selection};
use emath::{Pos2, Rect, Vec2};
use glaze_graph::{ConnectPolicy, DefaultPolicy, EditorContext, NodeCollection, NodeId};
use parking_lot::Mutex;
use std::sync::Arc;

/// Severity of a user notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Action proceeded, user is merely informed
    Warning,
    /// Action was aborted
    Error,
}

/// A message for the embedding UI to surface (dialog, status bar).
/// Errors are resolved at the point of detection; nothing unwinds
/// through the gesture machinery.
#[derive(Debug, Clone)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Message text
    pub message: String,
}

/// View over the graph canvas, graph-space coordinates throughout.
#[derive(Debug, Clone)]
pub struct Viewport {
    /// Center of the visible region
    pub pan: Vec2,
    /// Zoom factor (1.0 = 1:1)
    pub zoom: f32,
    /// Size of the visible region at zoom 1.0
    pub size: Vec2,
    /// Navigator thumbnail area, when the embedding UI shows one
    pub navigator_rect: Option<Rect>,
}

impl Viewport {
    /// Currently visible region of the graph
    pub fn visible_rect(&self) -> Rect {
        Rect::from_center_size(Pos2::ZERO + self.pan, self.size / self.zoom.max(0.01))
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
            size: Vec2::new(1920.0, 1080.0),
            navigator_rect: None,
        }
    }
}

/// An editable graph scope (the project root or one opened group).
pub struct GraphScope {
    pub(crate) collection: Arc<NodeCollection>,
    pub(crate) context: EditorContext,
    pub(crate) policy: Box<dyn ConnectPolicy + Send + Sync>,
    pub(crate) history: History,
    pub(crate) selection: Mutex<Selection>,
    pub(crate) notices: Vec<Notice>,
    /// Current view over the canvas
    pub viewport: Viewport,
    pub(crate) state: EventState,
}

impl GraphScope {
    /// Scope over a fresh collection
    pub fn new(name: impl Into<String>, context: EditorContext) -> Self {
        Self::with_collection(Arc::new(NodeCollection::new(name)), context)
    }

    /// Scope over an existing collection
    pub fn with_collection(collection: Arc<NodeCollection>, context: EditorContext) -> Self {
        let history = History::with_max_depth(context.settings.max_undo_depth);
        Self {
            collection,
            context,
            policy: Box::new(DefaultPolicy),
            history,
            selection: Mutex::new(Selection::new()),
            notices: Vec::new(),
            viewport: Viewport::default(),
            state: EventState::None,
        }
    }

    /// Swap in a different compatibility policy
    pub fn with_policy(mut self, policy: Box<dyn ConnectPolicy + Send + Sync>) -> Self {
        self.policy = policy;
        self
    }

    /// The underlying collection
    pub fn collection(&self) -> &Arc<NodeCollection> {
        &self.collection
    }

    /// The editor context this scope was built with
    pub fn context(&self) -> &EditorContext {
        &self.context
    }

    /// The active compatibility policy
    pub fn policy(&self) -> &dyn ConnectPolicy {
        self.policy.as_ref()
    }

    // ---- undo stack -----------------------------------------------------

    /// Record (and execute) an edit. Any external gesture - scripting,
    /// menu actions - funnels through here to share the same stack as
    /// interactive edits.
    pub fn push_undo_command(&mut self, command: Box<dyn UndoCommand>) {
        let ctx = CommandContext {
            collection: self.collection.as_ref(),
            policy: self.policy.as_ref(),
        };
        self.history.push(command, &ctx);
    }

    /// Undo the most recent edit
    pub fn undo(&mut self) -> Result<String, HistoryError> {
        let ctx = CommandContext {
            collection: self.collection.as_ref(),
            policy: self.policy.as_ref(),
        };
        self.history.undo(&ctx)
    }

    /// Re-apply the most recently undone edit
    pub fn redo(&mut self) -> Result<String, HistoryError> {
        let ctx = CommandContext {
            collection: self.collection.as_ref(),
            policy: self.policy.as_ref(),
        };
        self.history.redo(&ctx)
    }

    /// Whether an undo entry is available
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether a redo entry is available
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ---- selection ------------------------------------------------------

    /// Copy of the current selection
    pub fn selection(&self) -> Selection {
        self.selection.lock().clone()
    }

    /// Replace the selection
    pub fn set_selection(&self, selection: Selection) {
        *self.selection.lock() = selection;
    }

    /// Apply a click-selection on one node
    pub fn select_node(&self, id: NodeId, mode: SelectMode) {
        self.selection.lock().click(id, mode);
    }

    /// Clear the selection
    pub fn clear_selection(&self) {
        self.selection.lock().clear();
    }

    // ---- notices --------------------------------------------------------

    pub(crate) fn notice(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Warning => tracing::warn!(%message, "user notice"),
            NoticeLevel::Error => tracing::error!(%message, "user notice"),
        }
        self.notices.push(Notice { level, message });
    }

    /// Drain queued notices for display
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ---- node lifecycle -------------------------------------------------

    /// Create a node of `type_id` at `pos`, optionally wiring it
    /// against the current single selection, and record the addition.
    pub fn create_node(&mut self, type_id: &str, pos: Pos2, auto_connect: bool) -> Option<NodeId> {
        let node = self.context.registry.create_node(type_id, pos)?;
        let id = match self.collection.add_node(node) {
            Ok(id) => id,
            Err(err) => {
                self.notice(NoticeLevel::Error, format!("Could not create node: {err}"));
                return None;
            }
        };
        if auto_connect {
            if let Some(selected) = self.selection.lock().single() {
                if let Err(err) =
                    self.collection
                        .auto_connect_nodes(selected, id, self.policy.as_ref())
                {
                    tracing::debug!(%err, "auto-connect of new node skipped");
                }
            }
        }
        self.push_undo_command(Box::new(AddNodesCommand::new(vec![id])));
        self.select_node(id, SelectMode::Set);
        Some(id)
    }

    /// Soft-delete the selected nodes as one undo entry
    pub fn delete_selected_nodes(&mut self) {
        let nodes = self.selection.lock().nodes.clone();
        if nodes.is_empty() {
            return;
        }
        self.clear_selection();
        self.push_undo_command(Box::new(RemoveNodesCommand::new(nodes)));
    }

    /// Sever the clone link of every selected clone
    pub fn declone_selected_nodes(&mut self) {
        let links: Vec<(NodeId, NodeId)> = self
            .selection
            .lock()
            .nodes
            .iter()
            .filter_map(|id| {
                self.collection
                    .node(*id)
                    .and_then(|n| n.master)
                    .map(|master| (*id, master))
            })
            .collect();
        if links.is_empty() {
            return;
        }
        self.push_undo_command(Box::new(DecloneNodesCommand::new(links)));
    }

    /// Rename one node, deriving a collision-free script-name
    pub fn rename_node(&mut self, id: NodeId, base: &str) {
        let Some(node) = self.collection.node(id) else {
            return;
        };
        match self.collection.check_node_name(base, Some(id)) {
            Ok(new_name) => {
                if new_name != node.script_name {
                    self.push_undo_command(Box::new(RenameNodeCommand::new(
                        id,
                        node.script_name,
                        new_name,
                    )));
                }
            }
            Err(err) => {
                self.notice(NoticeLevel::Error, format!("Cannot rename node: {err}"));
            }
        }
    }

    /// Toggle the bypass flag on the selection
    pub fn set_selected_nodes_enabled(&mut self, enable: bool) {
        let changes: Vec<(NodeId, bool)> = self
            .selection
            .lock()
            .nodes
            .iter()
            .filter_map(|id| self.collection.node(*id).map(|n| (*id, n.enabled)))
            .filter(|(_, was)| *was != enable)
            .collect();
        if changes.is_empty() {
            return;
        }
        self.push_undo_command(Box::new(SetEnabledCommand::new(changes, enable)));
    }
}
