// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reversible graph edits.
//!
//! Every user-visible mutation is captured as a command holding enough
//! state to replay forward and backward. Commands resolve their own
//! failures (log and continue) rather than unwinding into the gesture
//! machinery. Permanent deletion of nodes a discarded command alone
//! kept alive goes through [`UndoCommand::pending_permanent_deletions`],
//! flushed by the history stack's discard paths.

use emath::{Pos2, Vec2};
use glaze_graph::{ConnectPolicy, NodeCollection, NodeId};
use std::any::Any;

/// Everything a command needs to replay against live graph state.
pub struct CommandContext<'a> {
    /// The collection the command mutates
    pub collection: &'a NodeCollection,
    /// Compatibility predicate for re-applied connections
    pub policy: &'a dyn ConnectPolicy,
}

/// A reversible graph edit.
pub trait UndoCommand: Send {
    /// Human-readable entry name for undo menus
    fn name(&self) -> &str;

    /// Apply (or re-apply) the edit
    fn redo(&mut self, ctx: &CommandContext<'_>);

    /// Invert the edit
    fn undo(&mut self, ctx: &CommandContext<'_>);

    /// Coalesce `other` (the newer command) into `self`. Returns true
    /// when merged; `other` is then discarded.
    fn merge_with(&mut self, _other: &dyn UndoCommand) -> bool {
        false
    }

    /// Nodes only this command keeps alive, to be purged when the
    /// command is discarded in its current state.
    fn pending_permanent_deletions(&self) -> Vec<NodeId> {
        Vec::new()
    }

    /// Downcast support for merging
    fn as_any(&self) -> &dyn Any;
}

// ---- helpers shared by add/remove/insert ---------------------------------

/// Soft-delete `id`: record and cut its outgoing connections (bridging
/// linear chains), then deactivate. Returns the former consumers.
fn deactivate_node(ctx: &CommandContext<'_>, id: NodeId) -> Vec<(NodeId, usize)> {
    let consumers = ctx.collection.output_consumers(id);
    for (consumer, _) in &consumers {
        if let Err(err) = ctx.collection.disconnect_nodes(id, *consumer, true, ctx.policy) {
            tracing::warn!(%err, "disconnect during deactivation failed");
        }
    }
    ctx.collection.set_node_active(id, false);
    consumers
}

/// Bring a soft-deleted node back and rewire its former consumers.
fn reactivate_node(ctx: &CommandContext<'_>, id: NodeId, consumers: &[(NodeId, usize)]) {
    ctx.collection.set_node_active(id, true);
    for (consumer, input) in consumers {
        let current = ctx
            .collection
            .node(*consumer)
            .and_then(|n| n.input_source(*input));
        if current == Some(id) {
            continue;
        }
        if let Some(bridge) = current {
            let _ = ctx
                .collection
                .disconnect_nodes(bridge, *consumer, false, ctx.policy);
        }
        if let Err(err) = ctx
            .collection
            .connect_nodes(*input, id, *consumer, false, ctx.policy)
        {
            tracing::warn!(%err, "reconnect during reactivation failed");
        }
    }
}

// ---- move ----------------------------------------------------------------

/// Move one or more nodes. Consecutive moves of the identical node set
/// coalesce into a single entry.
pub struct MoveNodesCommand {
    moves: Vec<(NodeId, Pos2, Pos2)>,
}

impl MoveNodesCommand {
    /// Record a completed move: `(node, old position, new position)`
    pub fn new(moves: Vec<(NodeId, Pos2, Pos2)>) -> Self {
        Self { moves }
    }
}

impl UndoCommand for MoveNodesCommand {
    fn name(&self) -> &str {
        "Move nodes"
    }

    fn redo(&mut self, ctx: &CommandContext<'_>) {
        for (id, _, new) in &self.moves {
            ctx.collection.set_position(*id, *new);
        }
    }

    fn undo(&mut self, ctx: &CommandContext<'_>) {
        for (id, old, _) in &self.moves {
            ctx.collection.set_position(*id, *old);
        }
    }

    fn merge_with(&mut self, other: &dyn UndoCommand) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        if self.moves.len() != other.moves.len()
            || self
                .moves
                .iter()
                .zip(&other.moves)
                .any(|((a, _, _), (b, _, _))| a != b)
        {
            return false;
        }
        for (mine, theirs) in self.moves.iter_mut().zip(&other.moves) {
            mine.2 = theirs.2;
        }
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---- connect / disconnect ------------------------------------------------

/// Rewire one input slot between two sources (either may be absent).
pub struct ConnectCommand {
    dest: NodeId,
    input_no: usize,
    old_source: Option<NodeId>,
    new_source: Option<NodeId>,
    label: &'static str,
}

impl ConnectCommand {
    /// Record a slot rewire on `dest`'s input `input_no`
    pub fn new(
        dest: NodeId,
        input_no: usize,
        old_source: Option<NodeId>,
        new_source: Option<NodeId>,
    ) -> Self {
        let label = if new_source.is_some() {
            "Connect"
        } else {
            "Disconnect"
        };
        Self {
            dest,
            input_no,
            old_source,
            new_source,
            label,
        }
    }

    fn apply(&self, from: Option<NodeId>, to: Option<NodeId>, ctx: &CommandContext<'_>) {
        if let Some(src) = to {
            let current = ctx
                .collection
                .node(self.dest)
                .and_then(|n| n.input_source(self.input_no));
            if current == Some(src) {
                return;
            }
            if let Some(current) = current {
                let _ = ctx
                    .collection
                    .disconnect_nodes(current, self.dest, false, ctx.policy);
            }
            if let Err(err) =
                ctx.collection
                    .connect_nodes(self.input_no, src, self.dest, false, ctx.policy)
            {
                tracing::warn!(%err, "connection replay rejected");
            }
        } else if let Some(old) = from {
            let _ = ctx
                .collection
                .disconnect_nodes(old, self.dest, false, ctx.policy);
        }
    }
}

impl UndoCommand for ConnectCommand {
    fn name(&self) -> &str {
        self.label
    }

    fn redo(&mut self, ctx: &CommandContext<'_>) {
        self.apply(self.old_source, self.new_source, ctx);
    }

    fn undo(&mut self, ctx: &CommandContext<'_>) {
        self.apply(self.new_source, self.old_source, ctx);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---- insert (splice into an existing connection) -------------------------

/// Splice a node into the connection feeding `dest`'s input `input_no`.
/// Used by bend-point Dot synthesis and connection-hint realization.
pub struct InsertNodeCommand {
    node: NodeId,
    dest: NodeId,
    input_no: usize,
    prior_source: Option<NodeId>,
    owns_node: bool,
    node_active: bool,
}

impl InsertNodeCommand {
    /// Splice `node` into the wire ending at `dest`'s slot `input_no`.
    /// `owns_node` marks a node synthesized for this splice, which the
    /// command purges when discarded in the undone state.
    pub fn new(
        node: NodeId,
        dest: NodeId,
        input_no: usize,
        prior_source: Option<NodeId>,
        owns_node: bool,
    ) -> Self {
        Self {
            node,
            dest,
            input_no,
            prior_source,
            owns_node,
            node_active: true,
        }
    }
}

impl UndoCommand for InsertNodeCommand {
    fn name(&self) -> &str {
        "Insert node"
    }

    fn redo(&mut self, ctx: &CommandContext<'_>) {
        ctx.collection.set_node_active(self.node, true);
        self.node_active = true;
        if let Some(prior) = self.prior_source {
            let _ = ctx
                .collection
                .disconnect_nodes(prior, self.dest, false, ctx.policy);
            if let Some(input) = ctx.collection.node(self.node).and_then(|n| n.preferred_input())
            {
                if let Err(err) =
                    ctx.collection
                        .connect_nodes(input, prior, self.node, false, ctx.policy)
                {
                    tracing::warn!(%err, "splice upstream connect rejected");
                }
            }
        }
        if let Err(err) =
            ctx.collection
                .connect_nodes(self.input_no, self.node, self.dest, false, ctx.policy)
        {
            tracing::warn!(%err, "splice downstream connect rejected");
        }
    }

    fn undo(&mut self, ctx: &CommandContext<'_>) {
        let _ = ctx
            .collection
            .disconnect_nodes(self.node, self.dest, false, ctx.policy);
        if let Some(prior) = self.prior_source {
            let _ = ctx
                .collection
                .disconnect_nodes(prior, self.node, false, ctx.policy);
            if let Err(err) =
                ctx.collection
                    .connect_nodes(self.input_no, prior, self.dest, false, ctx.policy)
            {
                tracing::warn!(%err, "splice undo reconnect rejected");
            }
        }
        ctx.collection.set_node_active(self.node, false);
        self.node_active = false;
    }

    fn pending_permanent_deletions(&self) -> Vec<NodeId> {
        if self.owns_node && !self.node_active {
            vec![self.node]
        } else {
            Vec::new()
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---- add / remove --------------------------------------------------------

/// Activation record for nodes added to the graph. The nodes are
/// created and wired before the command is pushed; redo is a no-op on
/// first execution.
pub struct AddNodesCommand {
    nodes: Vec<NodeId>,
    consumers: Vec<Vec<(NodeId, usize)>>,
    active: bool,
}

impl AddNodesCommand {
    /// Record `nodes` as freshly added (currently active)
    pub fn new(nodes: Vec<NodeId>) -> Self {
        let consumers = nodes.iter().map(|_| Vec::new()).collect();
        Self {
            nodes,
            consumers,
            active: true,
        }
    }
}

impl UndoCommand for AddNodesCommand {
    fn name(&self) -> &str {
        "Add nodes"
    }

    fn redo(&mut self, ctx: &CommandContext<'_>) {
        if self.active {
            return;
        }
        for (id, consumers) in self.nodes.iter().zip(&self.consumers) {
            reactivate_node(ctx, *id, consumers);
        }
        self.active = true;
    }

    fn undo(&mut self, ctx: &CommandContext<'_>) {
        for (id, consumers) in self.nodes.iter().zip(self.consumers.iter_mut()).rev() {
            *consumers = deactivate_node(ctx, *id);
        }
        self.active = false;
    }

    fn pending_permanent_deletions(&self) -> Vec<NodeId> {
        if self.active {
            Vec::new()
        } else {
            self.nodes.clone()
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Soft-delete a set of nodes, remembering each node's consumers so
/// undo can rebuild the wiring exactly.
pub struct RemoveNodesCommand {
    entries: Vec<(NodeId, Vec<(NodeId, usize)>)>,
    removed: bool,
}

impl RemoveNodesCommand {
    /// Remove `nodes` when executed
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self {
            entries: nodes.into_iter().map(|id| (id, Vec::new())).collect(),
            removed: false,
        }
    }
}

impl UndoCommand for RemoveNodesCommand {
    fn name(&self) -> &str {
        "Remove nodes"
    }

    fn redo(&mut self, ctx: &CommandContext<'_>) {
        for (id, consumers) in &mut self.entries {
            *consumers = deactivate_node(ctx, *id);
        }
        self.removed = true;
    }

    fn undo(&mut self, ctx: &CommandContext<'_>) {
        for (id, consumers) in self.entries.iter().rev() {
            reactivate_node(ctx, *id, consumers);
        }
        self.removed = false;
    }

    fn pending_permanent_deletions(&self) -> Vec<NodeId> {
        if self.removed {
            self.entries.iter().map(|(id, _)| *id).collect()
        } else {
            Vec::new()
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---- resize --------------------------------------------------------------

/// Resize a backdrop. Consecutive resizes of the same backdrop merge.
pub struct ResizeBackdropCommand {
    node: NodeId,
    old: Vec2,
    new: Vec2,
}

impl ResizeBackdropCommand {
    /// Record a completed resize
    pub fn new(node: NodeId, old: Vec2, new: Vec2) -> Self {
        Self { node, old, new }
    }
}

impl UndoCommand for ResizeBackdropCommand {
    fn name(&self) -> &str {
        "Resize backdrop"
    }

    fn redo(&mut self, ctx: &CommandContext<'_>) {
        ctx.collection.resize_node(self.node, self.new);
    }

    fn undo(&mut self, ctx: &CommandContext<'_>) {
        ctx.collection.resize_node(self.node, self.old);
    }

    fn merge_with(&mut self, other: &dyn UndoCommand) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        if self.node != other.node {
            return false;
        }
        self.new = other.new;
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---- rename --------------------------------------------------------------

/// Rename a node between two known-unique script-names.
pub struct RenameNodeCommand {
    node: NodeId,
    old: String,
    new: String,
}

impl RenameNodeCommand {
    /// Record a completed rename
    pub fn new(node: NodeId, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            node,
            old: old.into(),
            new: new.into(),
        }
    }
}

impl UndoCommand for RenameNodeCommand {
    fn name(&self) -> &str {
        "Rename node"
    }

    fn redo(&mut self, ctx: &CommandContext<'_>) {
        ctx.collection.restore_script_name(self.node, &self.new);
    }

    fn undo(&mut self, ctx: &CommandContext<'_>) {
        ctx.collection.restore_script_name(self.node, &self.old);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---- enable / disable ----------------------------------------------------

/// Toggle the bypass flag on a set of nodes, restoring per-node prior
/// states on undo.
pub struct SetEnabledCommand {
    changes: Vec<(NodeId, bool)>,
    enable: bool,
}

impl SetEnabledCommand {
    /// `changes` records each node's prior enabled state
    pub fn new(changes: Vec<(NodeId, bool)>, enable: bool) -> Self {
        Self { changes, enable }
    }
}

impl UndoCommand for SetEnabledCommand {
    fn name(&self) -> &str {
        if self.enable {
            "Enable nodes"
        } else {
            "Disable nodes"
        }
    }

    fn redo(&mut self, ctx: &CommandContext<'_>) {
        for (id, _) in &self.changes {
            ctx.collection.with_node_mut(*id, |n| n.enabled = self.enable);
        }
    }

    fn undo(&mut self, ctx: &CommandContext<'_>) {
        for (id, was) in &self.changes {
            ctx.collection.with_node_mut(*id, |n| n.enabled = *was);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---- declone -------------------------------------------------------------

/// Sever clone links, remembering the prior master per node so undo
/// can re-slave.
pub struct DecloneNodesCommand {
    links: Vec<(NodeId, NodeId)>,
}

impl DecloneNodesCommand {
    /// `links` maps each slave to its current master
    pub fn new(links: Vec<(NodeId, NodeId)>) -> Self {
        Self { links }
    }
}

impl UndoCommand for DecloneNodesCommand {
    fn name(&self) -> &str {
        "Declone nodes"
    }

    fn redo(&mut self, ctx: &CommandContext<'_>) {
        for (slave, _) in &self.links {
            ctx.collection.clear_master(*slave);
        }
    }

    fn undo(&mut self, ctx: &CommandContext<'_>) {
        for (slave, master) in &self.links {
            ctx.collection.set_master(*slave, *master);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---- composite -----------------------------------------------------------

/// Several commands undone/redone as one entry (grouped edits such as
/// group-from-selection).
pub struct CompositeCommand {
    label: String,
    children: Vec<Box<dyn UndoCommand>>,
}

impl CompositeCommand {
    /// Group `children` under one entry
    pub fn new(label: impl Into<String>, children: Vec<Box<dyn UndoCommand>>) -> Self {
        Self {
            label: label.into(),
            children,
        }
    }
}

impl UndoCommand for CompositeCommand {
    fn name(&self) -> &str {
        &self.label
    }

    fn redo(&mut self, ctx: &CommandContext<'_>) {
        for child in &mut self.children {
            child.redo(ctx);
        }
    }

    fn undo(&mut self, ctx: &CommandContext<'_>) {
        for child in self.children.iter_mut().rev() {
            child.undo(ctx);
        }
    }

    fn pending_permanent_deletions(&self) -> Vec<NodeId> {
        self.children
            .iter()
            .flat_map(|c| c.pending_permanent_deletions())
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
