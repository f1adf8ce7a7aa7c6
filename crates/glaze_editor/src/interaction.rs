// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pointer-gesture state machine.
//!
//! Translates press/move/release events into graph mutations. Every
//! gesture terminates cleanly at release, whatever happened in between:
//! rejected connections surface as notices, and defensive failures
//! abort back to [`EventState::None`] instead of poisoning the scope.

use crate::commands::{
    AddNodesCommand, ConnectCommand, InsertNodeCommand, MoveNodesCommand, ResizeBackdropCommand,
};
use crate::hints::{compute_hint, input_edges, Hint};
use crate::scope::{GraphScope, NoticeLevel};
use crate::selection::SelectMode;
use emath::{Pos2, Rect, Vec2};
use glaze_graph::{Edge, Node, NodeId, Verdict};

/// Smallest size a backdrop can be dragged down to
const MIN_BACKDROP_SIZE: Vec2 = Vec2::new(80.0, 60.0);
/// Hit tolerance around the output stub hanging below a node, for
/// starting an output-edge drag
const OUTPUT_STUB_TOLERANCE: f32 = 8.0;

/// Pointer button of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Left button
    Primary,
    /// Middle button / wheel press
    Middle,
    /// Right button
    Secondary,
}

/// Modifier keys held during an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Shift held
    pub shift: bool,
    /// Ctrl (or Cmd) held
    pub ctrl: bool,
    /// Alt held
    pub alt: bool,
}

/// One pointer event in graph-space coordinates
#[derive(Debug, Clone, Copy)]
pub struct PointerEvent {
    /// Cursor position, graph space
    pub pos: Pos2,
    /// Button involved
    pub button: PointerButton,
    /// Modifiers held
    pub modifiers: Modifiers,
}

impl PointerEvent {
    /// Primary-button event with no modifiers
    pub fn primary(pos: Pos2) -> Self {
        Self {
            pos,
            button: PointerButton::Primary,
            modifiers: Modifiers::default(),
        }
    }

    /// Override the modifiers
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// In-flight node drag bookkeeping
#[derive(Debug, Clone)]
pub struct NodeDrag {
    last_pos: Pos2,
    nodes: Vec<NodeId>,
    start_positions: Vec<(NodeId, Pos2)>,
    hint: Option<Hint>,
}

/// What the pointer is currently doing
#[derive(Debug, Clone, Default)]
pub enum EventState {
    /// Idle
    #[default]
    None,
    /// Panning the canvas
    MovingArea {
        /// Cursor position at the previous move
        last: Pos2,
    },
    /// Zooming the canvas
    ZoomingArea {
        /// Cursor position at the previous move
        last: Pos2,
    },
    /// Dragging a connection end
    DraggingArrow {
        /// The edge being dragged
        edge: Edge,
    },
    /// Dragging the navigator thumbnail
    DraggingNavigator,
    /// Dragging the selected nodes
    DraggingNode(NodeDrag),
    /// Resizing a backdrop by its corner handle
    ResizingBackdrop {
        /// The backdrop
        node: NodeId,
        /// Size at press time
        start_size: Vec2,
    },
    /// Rubber-band selection
    SelectionRect {
        /// Press position
        start: Pos2,
        /// Current corner
        current: Pos2,
        /// Shift held: extend instead of replace
        extend: bool,
    },
}

impl GraphScope {
    /// Current gesture state
    pub fn event_state(&self) -> &EventState {
        &self.state
    }

    /// Handle a pointer press.
    pub fn on_pointer_press(&mut self, ev: &PointerEvent) {
        if !matches!(self.state, EventState::None) {
            self.abort_gesture("press received during an active gesture");
        }
        let pos = ev.pos;

        // 1. canvas navigation
        if ev.button == PointerButton::Middle {
            self.state = if ev.modifiers.ctrl {
                EventState::ZoomingArea { last: pos }
            } else {
                EventState::MovingArea { last: pos }
            };
            return;
        }
        if ev.button != PointerButton::Primary {
            return;
        }
        if ev.modifiers.alt {
            self.state = EventState::MovingArea { last: pos };
            return;
        }

        let mode = select_mode(ev.modifiers);

        // 2. backdrop resize handle
        if let Some(node) = self.resize_handle_at(pos) {
            self.select_node(node.id, mode);
            self.state = EventState::ResizingBackdrop {
                node: node.id,
                start_size: node.size,
            };
            return;
        }

        // 3. node body
        if let Some(node) = self.node_at(pos, true) {
            self.select_node(node.id, mode);
            self.begin_node_drag(pos, ev.modifiers.ctrl);
            return;
        }

        // 4. bend point: splice a pass-through dot into the wire
        if let Some(edge) = self.connected_edge_bend_at(pos) {
            self.splice_dot_at_bend(&edge, pos);
            return;
        }

        // 5. edge body
        if let Some(edge) = self.edge_at(pos) {
            self.state = EventState::DraggingArrow { edge };
            return;
        }

        // 6. navigator thumbnail
        if self
            .viewport
            .navigator_rect
            .is_some_and(|rect| rect.contains(pos))
        {
            self.state = EventState::DraggingNavigator;
            return;
        }

        // 7. empty canvas
        if !ev.modifiers.shift {
            self.clear_selection();
        }
        self.state = EventState::SelectionRect {
            start: pos,
            current: pos,
            extend: ev.modifiers.shift,
        };
    }

    /// Handle a pointer move.
    pub fn on_pointer_move(&mut self, ev: &PointerEvent) {
        let pos = ev.pos;
        let mut state = std::mem::take(&mut self.state);
        match &mut state {
            EventState::None => {}
            EventState::DraggingNavigator => {
                self.viewport.pan = pos.to_vec2();
            }
            EventState::MovingArea { last } => {
                self.viewport.pan -= pos - *last;
                *last = pos;
            }
            EventState::ZoomingArea { last } => {
                let factor = 1.0 + (pos.y - last.y) * 0.01;
                self.viewport.zoom = (self.viewport.zoom * factor).clamp(0.1, 4.0);
                *last = pos;
            }
            EventState::ResizingBackdrop { node, .. } => {
                if let Some(backdrop) = self.collection.node(*node) {
                    let size = (pos - backdrop.position).max(MIN_BACKDROP_SIZE);
                    self.collection.resize_node(*node, size);
                } else {
                    self.state = EventState::None;
                    self.abort_gesture("backdrop vanished mid-resize");
                    return;
                }
            }
            EventState::DraggingNode(drag) => {
                let delta = pos - drag.last_pos;
                self.collection.translate_nodes(&drag.nodes, delta);
                drag.last_pos = pos;
                drag.hint = self.selection.lock().single().and_then(|single| {
                    compute_hint(
                        &self.collection,
                        &self.context.settings,
                        self.policy.as_ref(),
                        single,
                        pos,
                    )
                });
                self.autoscroll(pos);
            }
            EventState::SelectionRect { current, .. } => {
                *current = pos;
                self.autoscroll(pos);
            }
            EventState::DraggingArrow { edge } => {
                edge.set_dangling_end(pos);
                self.autoscroll(pos);
            }
        }
        if matches!(self.state, EventState::None) {
            self.state = state;
        }
    }

    /// Handle a pointer release: realize whatever the gesture produced
    /// and return to idle.
    pub fn on_pointer_release(&mut self, ev: &PointerEvent) {
        let state = std::mem::take(&mut self.state);
        match state {
            EventState::None
            | EventState::MovingArea { .. }
            | EventState::ZoomingArea { .. } => {}
            EventState::DraggingNavigator => {
                self.viewport.pan = ev.pos.to_vec2();
            }
            EventState::ResizingBackdrop { node, start_size } => {
                if let Some(backdrop) = self.collection.node(node) {
                    if backdrop.size != start_size {
                        self.push_undo_command(Box::new(ResizeBackdropCommand::new(
                            node,
                            start_size,
                            backdrop.size,
                        )));
                    }
                }
            }
            EventState::DraggingNode(drag) => {
                if let Some(hint) = drag.hint {
                    let single = self.selection.lock().single();
                    if let Some(single) = single {
                        self.realize_hint(hint, single);
                    }
                }
                let moves: Vec<(NodeId, Pos2, Pos2)> = drag
                    .start_positions
                    .iter()
                    .filter_map(|(id, start)| {
                        let now = self.collection.node(*id)?.position;
                        (now != *start).then_some((*id, *start, now))
                    })
                    .collect();
                if !moves.is_empty() {
                    self.push_undo_command(Box::new(MoveNodesCommand::new(moves)));
                }
            }
            EventState::SelectionRect {
                start,
                current,
                extend,
            } => {
                let rect = Rect::from_two_pos(start, current);
                let mut selection = if extend {
                    self.selection()
                } else {
                    crate::selection::Selection::new()
                };
                for id in self.collection.active_nodes() {
                    if let Some(node) = self.collection.node(id) {
                        if rect.intersects(node.bounds()) {
                            selection.add(id);
                        }
                    }
                }
                self.set_selection(selection);
            }
            EventState::DraggingArrow { edge } => {
                self.resolve_arrow_drop(&edge, ev.pos);
            }
        }
        self.state = EventState::None;
    }

    // ---- gesture internals ----------------------------------------------

    fn abort_gesture(&mut self, reason: &str) {
        tracing::warn!(reason, "aborting gesture");
        self.state = EventState::None;
    }

    fn begin_node_drag(&mut self, pos: Pos2, exclude_backdrop_contents: bool) {
        let selection = self.selection();
        let mut nodes = selection.nodes.clone();

        // Backdrops carry whatever sits on them, unless Ctrl opts out
        if !exclude_backdrop_contents {
            for id in &selection.nodes {
                let Some(node) = self.collection.node(*id) else {
                    continue;
                };
                if !node.kind.is_backdrop {
                    continue;
                }
                let area = node.bounds();
                for other in self.collection.active_nodes() {
                    if nodes.contains(&other) {
                        continue;
                    }
                    if let Some(contained) = self.collection.node(other) {
                        if area.contains_rect(contained.bounds()) {
                            nodes.push(other);
                        }
                    }
                }
            }
        }

        let start_positions = nodes
            .iter()
            .filter_map(|id| self.collection.node(*id).map(|n| (*id, n.position)))
            .collect();
        self.state = EventState::DraggingNode(NodeDrag {
            last_pos: pos,
            nodes,
            start_positions,
            hint: None,
        });
    }

    fn splice_dot_at_bend(&mut self, edge: &Edge, pos: Pos2) {
        let (Some(dest), Some(prior)) = (edge.dest, edge.source) else {
            self.abort_gesture("bend point on an incomplete edge");
            return;
        };
        let Some(dot) = self.context.registry.create_node("glaze.dot", pos) else {
            self.abort_gesture("pass-through type missing from registry");
            return;
        };
        let dot_id = match self.collection.add_node(dot) {
            Ok(id) => id,
            Err(err) => {
                self.notice(NoticeLevel::Error, format!("Could not create dot: {err}"));
                self.state = EventState::None;
                return;
            }
        };
        self.push_undo_command(Box::new(InsertNodeCommand::new(
            dot_id,
            dest,
            edge.input_number,
            Some(prior),
            true,
        )));
        self.select_node(dot_id, SelectMode::Set);
        self.begin_node_drag(pos, false);
    }

    fn realize_hint(&mut self, hint: Hint, dragged: NodeId) {
        match hint {
            Hint::Splice {
                dest,
                input_no,
                prior,
            } => {
                self.push_undo_command(Box::new(InsertNodeCommand::new(
                    dragged,
                    dest,
                    input_no,
                    Some(prior),
                    false,
                )));
            }
            Hint::Connect { dest, input_no } => {
                self.try_connect(dragged, dest, input_no);
            }
            Hint::Merge { other } => {
                self.realize_merge(other, dragged);
            }
        }
    }

    fn realize_merge(&mut self, a: NodeId, b: NodeId) {
        let (Some(node_a), Some(node_b)) = (self.collection.node(a), self.collection.node(b))
        else {
            return;
        };
        let mid = node_a.bounds().center().lerp(node_b.bounds().center(), 0.5);
        let below = Pos2::new(
            mid.x,
            node_a.bounds().bottom().max(node_b.bounds().bottom()) + 80.0,
        );
        let Some(merge) = self.context.registry.create_node("glaze.merge", below) else {
            return;
        };
        let merge_id = match self.collection.add_node(merge) {
            Ok(id) => id,
            Err(err) => {
                self.notice(NoticeLevel::Error, format!("Could not create merge: {err}"));
                return;
            }
        };
        for (input, source) in [(0, a), (1, b)] {
            if let Err(err) =
                self.collection
                    .connect_nodes(input, source, merge_id, false, self.policy.as_ref())
            {
                self.notice(NoticeLevel::Warning, format!("Merge input skipped: {err}"));
            }
        }
        self.push_undo_command(Box::new(AddNodesCommand::new(vec![merge_id])));
        self.select_node(merge_id, SelectMode::Set);
    }

    fn resolve_arrow_drop(&mut self, edge: &Edge, pos: Pos2) {
        let target = self.node_at(pos, false).map(|n| n.id);
        if edge.is_output_edge {
            let Some(producer) = edge.source else {
                self.abort_gesture("output edge lost its node");
                return;
            };
            let Some(target) = target.filter(|t| *t != producer) else {
                return;
            };
            let Some(target_node) = self.collection.node(target) else {
                return;
            };
            let Some(input_no) = target_node.preferred_input() else {
                self.notice(
                    NoticeLevel::Error,
                    format!("{} has no free input", target_node.label),
                );
                return;
            };
            self.try_connect(producer, target, input_no);
        } else {
            let Some(dest) = edge.dest else {
                self.abort_gesture("input edge lost its consumer");
                return;
            };
            match target.filter(|t| *t != dest) {
                Some(new_source) => {
                    if edge.source == Some(new_source) {
                        return;
                    }
                    self.try_replace(dest, edge.input_number, edge.source, new_source);
                }
                None => {
                    // Dropped on empty canvas: sever the connection
                    if let Some(old) = edge.source {
                        self.push_undo_command(Box::new(ConnectCommand::new(
                            dest,
                            edge.input_number,
                            Some(old),
                            None,
                        )));
                    }
                }
            }
        }
    }

    /// Validate and record a connection into a free slot.
    fn try_connect(&mut self, producer: NodeId, consumer: NodeId, input_no: usize) {
        self.try_replace(
            consumer,
            input_no,
            self.collection
                .node(consumer)
                .and_then(|n| n.input_source(input_no)),
            producer,
        );
    }

    /// Validate and record a slot rewire, surfacing warn/block verdicts.
    fn try_replace(
        &mut self,
        dest: NodeId,
        input_no: usize,
        old_source: Option<NodeId>,
        new_source: NodeId,
    ) {
        let code = self
            .policy
            .can_connect_input(&self.collection, new_source, dest, input_no);
        match code.verdict() {
            Verdict::Block(reason) => {
                self.notice(NoticeLevel::Error, format!("Cannot connect: {reason}"));
            }
            verdict => {
                if let Verdict::Warn(reason) = verdict {
                    self.notice(NoticeLevel::Warning, format!("Connected anyway: {reason}"));
                }
                self.push_undo_command(Box::new(ConnectCommand::new(
                    dest,
                    input_no,
                    old_source,
                    Some(new_source),
                )));
            }
        }
    }

    fn autoscroll(&mut self, pos: Pos2) {
        let rect = self.viewport.visible_rect();
        let margin = self.context.settings.autoscroll_margin;
        let speed = self.context.settings.autoscroll_speed;
        let mut shift = Vec2::ZERO;
        if pos.x > rect.right() - margin {
            shift.x += speed;
        } else if pos.x < rect.left() + margin {
            shift.x -= speed;
        }
        if pos.y > rect.bottom() - margin {
            shift.y += speed;
        } else if pos.y < rect.top() + margin {
            shift.y -= speed;
        }
        self.viewport.pan += shift;
    }

    // ---- hit testing ----------------------------------------------------

    /// Topmost active node under `pos`; plain nodes shadow backdrops.
    fn node_at(&self, pos: Pos2, include_backdrops: bool) -> Option<Node> {
        let ids = self.collection.active_nodes();
        let hit = |want_backdrop: bool| {
            ids.iter().rev().find_map(|id| {
                let node = self.collection.node(*id)?;
                (node.kind.is_backdrop == want_backdrop && node.bounds().contains(pos))
                    .then_some(node)
            })
        };
        hit(false).or_else(|| include_backdrops.then(|| hit(true)).flatten())
    }

    fn resize_handle_at(&self, pos: Pos2) -> Option<Node> {
        self.collection.active_nodes().into_iter().rev().find_map(|id| {
            let node = self.collection.node(id)?;
            node.resize_handle()
                .is_some_and(|handle| handle.contains(pos))
                .then_some(node)
        })
    }

    fn connected_edge_bend_at(&self, pos: Pos2) -> Option<Edge> {
        let tolerance = self.context.settings.edge_hit_tolerance;
        input_edges(&self.collection, None)
            .into_iter()
            .filter(|e| e.has_source())
            .find(|e| e.bend_point_hit(pos, tolerance))
    }

    fn edge_at(&self, pos: Pos2) -> Option<Edge> {
        let tolerance = self.context.settings.edge_hit_tolerance;
        // Output stubs first: a drag from there starts a new wire
        for id in self.collection.active_nodes().into_iter().rev() {
            let Some(node) = self.collection.node(id) else {
                continue;
            };
            if node.kind.is_backdrop || node.kind.is_output {
                continue;
            }
            let mut edge = Edge::output(id);
            edge.refresh_geometry(&self.collection);
            if edge.hit_test(pos, OUTPUT_STUB_TOLERANCE) {
                return Some(edge);
            }
        }
        input_edges(&self.collection, None)
            .into_iter()
            .find(|e| e.hit_test(pos, tolerance))
    }
}

fn select_mode(modifiers: Modifiers) -> SelectMode {
    if modifiers.shift && modifiers.ctrl {
        SelectMode::Toggle
    } else if modifiers.shift {
        SelectMode::Add
    } else {
        SelectMode::Set
    }
}
