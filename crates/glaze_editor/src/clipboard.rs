// SPDX-License-Identifier: MIT OR Apache-2.0
//! Clipboard and paste engine.
//!
//! A copy captures per-node snapshots (type, parameters, positions,
//! input names) for the selection plus anything enclosed by selected
//! backdrops. Pasting re-instantiates the snapshots - in the same
//! collection or a different one - with fresh unique names, then
//! restores the internal wiring by mapping old names to new ones,
//! falling back to the original name for producers outside the copied
//! set.

use crate::commands::{AddNodesCommand, CompositeCommand, RemoveNodesCommand, UndoCommand};
use crate::scope::{GraphScope, NoticeLevel};
use crate::selection::SelectMode;
use emath::{Pos2, Rect, Vec2};
use glaze_graph::collection::GroupBoundarySync;
use glaze_graph::{
    ConnectPolicy, NameError, NodeCollection, NodeId, NodeRegistry, ParamValue,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Paste failures. Every error aborts the paste before or while
/// rolling back; no partial node set is ever left behind.
#[derive(Debug, Error)]
pub enum PasteError {
    /// Nothing copied
    #[error("clipboard is empty")]
    Empty,
    /// Clone-of-clone is not allowed
    #[error("cannot clone {0}: it is already a clone")]
    CloneOfClone(String),
    /// Viewers cannot be cloned
    #[error("cannot clone the viewer {0}")]
    CloneViewer(String),
    /// Multi-instance hosts cannot be cloned
    #[error("cannot clone {0}: it hosts multiple instances")]
    CloneMultiInstance(String),
    /// Snapshot references a type the registry does not know
    #[error("unknown node type {0}")]
    UnknownType(String),
    /// Script-name derivation failed
    #[error(transparent)]
    Name(#[from] NameError),
    /// Clipboard text could not be produced
    #[error("clipboard serialization failed: {0}")]
    Serialize(#[from] ron::Error),
    /// Clipboard text could not be parsed
    #[error("clipboard deserialization failed: {0}")]
    Deserialize(#[from] ron::error::SpannedError),
}

/// Plain copy or parameter-linked clone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteMode {
    /// Values are copied once
    Copy,
    /// Pasted nodes mirror future edits of their originals
    Clone,
}

/// Transient per-node snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Registry type of the node
    pub type_id: String,
    /// Script-name at copy time (basis for the fresh name)
    pub script_name: String,
    /// Display label
    pub label: String,
    /// Position at copy time
    pub position: Pos2,
    /// Size at copy time
    pub size: Vec2,
    /// Parameter values
    pub params: IndexMap<String, ParamValue>,
    /// Per-slot producer script-names
    pub input_sources: Vec<Option<String>>,
}

/// A serialized subset of a graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Clipboard {
    /// Copied nodes
    pub snapshots: Vec<NodeSnapshot>,
    /// Center of the copied selection's bounding box
    pub center: Pos2,
}

impl Clipboard {
    /// Snapshot `ids` plus every active node enclosed by a selected
    /// backdrop.
    pub fn copy_nodes(collection: &NodeCollection, ids: &[NodeId]) -> Self {
        let mut wanted: Vec<NodeId> = Vec::new();
        for id in ids {
            if !wanted.contains(id) {
                wanted.push(*id);
            }
        }
        for id in ids {
            let Some(node) = collection.node(*id) else {
                continue;
            };
            if !node.kind.is_backdrop {
                continue;
            }
            let area = node.bounds();
            for other in collection.active_nodes() {
                if wanted.contains(&other) {
                    continue;
                }
                if let Some(inner) = collection.node(other) {
                    if area.contains_rect(inner.bounds()) {
                        wanted.push(other);
                    }
                }
            }
        }

        let mut snapshots = Vec::new();
        let mut bounds: Option<Rect> = None;
        for id in wanted {
            let Some(node) = collection.node(id) else {
                continue;
            };
            bounds = Some(match bounds {
                Some(b) => b.union(node.bounds()),
                None => node.bounds(),
            });
            let input_sources = node
                .inputs
                .iter()
                .map(|slot| {
                    slot.source
                        .and_then(|src| collection.node(src))
                        .map(|src| src.script_name)
                })
                .collect();
            snapshots.push(NodeSnapshot {
                type_id: node.type_id,
                script_name: node.script_name,
                label: node.label,
                position: node.position,
                size: node.size,
                params: node.params,
                input_sources,
            });
        }
        Self {
            snapshots,
            center: bounds.map_or(Pos2::ZERO, |b| b.center()),
        }
    }

    /// Whether anything was copied
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Textual interchange form
    pub fn to_ron(&self) -> Result<String, PasteError> {
        Ok(ron::to_string(self)?)
    }

    /// Parse the textual interchange form
    pub fn from_ron(text: &str) -> Result<Self, PasteError> {
        Ok(ron::from_str(text)?)
    }
}

/// Re-instantiate a clipboard into `collection` around `target`.
///
/// Returns the created node ids in snapshot order. Clone restrictions
/// are checked up front so a rejected paste creates nothing.
pub fn paste(
    clipboard: &Clipboard,
    collection: &NodeCollection,
    registry: &NodeRegistry,
    policy: &dyn ConnectPolicy,
    target: Pos2,
    mode: PasteMode,
) -> Result<Vec<NodeId>, PasteError> {
    if clipboard.is_empty() {
        return Err(PasteError::Empty);
    }

    // Preflight: every type must exist, and clone restrictions hold,
    // before any node is created
    for snapshot in &clipboard.snapshots {
        let ty = registry
            .get(&snapshot.type_id)
            .ok_or_else(|| PasteError::UnknownType(snapshot.type_id.clone()))?;
        if mode == PasteMode::Clone && !ty.kind.is_pass_through {
            let original = collection.get_node_by_name(&snapshot.script_name);
            if original.as_ref().and_then(|n| n.master).is_some() {
                return Err(PasteError::CloneOfClone(snapshot.script_name.clone()));
            }
            if ty.kind.is_inspector {
                return Err(PasteError::CloneViewer(snapshot.script_name.clone()));
            }
            if ty.multi_instance {
                return Err(PasteError::CloneMultiInstance(snapshot.script_name.clone()));
            }
        }
    }

    let offset = target - clipboard.center;
    let mut created: Vec<NodeId> = Vec::new();
    let mut name_map: HashMap<String, String> = HashMap::new();

    for snapshot in &clipboard.snapshots {
        let Some(mut node) = registry.create_node(&snapshot.type_id, snapshot.position + offset)
        else {
            rollback(collection, &created);
            return Err(PasteError::UnknownType(snapshot.type_id.clone()));
        };
        node.script_name = snapshot.script_name.clone();
        node.label = snapshot.label.clone();
        node.size = snapshot.size;
        node.params = snapshot.params.clone();
        let id = match collection.add_node(node) {
            Ok(id) => id,
            Err(err) => {
                rollback(collection, &created);
                return Err(err.into());
            }
        };
        if let Some(new) = collection.node(id) {
            name_map.insert(snapshot.script_name.clone(), new.script_name);
        }
        created.push(id);
    }

    // Restore connections through the old-name -> new-name map,
    // falling back to the original name for out-of-set producers
    for (snapshot, id) in clipboard.snapshots.iter().zip(&created) {
        for (input_no, source_name) in snapshot.input_sources.iter().enumerate() {
            let Some(source_name) = source_name else {
                continue;
            };
            let resolved = name_map
                .get(source_name)
                .map(String::as_str)
                .unwrap_or(source_name);
            let Some(producer) = collection.get_node_by_name(resolved) else {
                continue;
            };
            if let Err(err) = collection.connect_nodes(input_no, producer.id, *id, false, policy)
            {
                tracing::debug!(%err, input_no, "pasted connection skipped");
            }
        }
    }

    if mode == PasteMode::Clone {
        for (snapshot, id) in clipboard.snapshots.iter().zip(&created) {
            let is_pass_through = registry
                .get(&snapshot.type_id)
                .is_some_and(|ty| ty.kind.is_pass_through);
            if is_pass_through {
                continue;
            }
            if let Some(original) = collection.get_node_by_name(&snapshot.script_name) {
                collection.set_master(*id, original.id);
            }
        }
    }

    Ok(created)
}

fn rollback(collection: &NodeCollection, created: &[NodeId]) {
    for id in created {
        collection.remove_node(*id);
    }
}

impl GraphScope {
    /// Copy the current selection (plus backdrop-enclosed nodes)
    pub fn copy_selection(&self) -> Clipboard {
        let nodes = self.selection.lock().nodes.clone();
        Clipboard::copy_nodes(&self.collection, &nodes)
    }

    /// Paste a clipboard around `target`, recording one undo entry and
    /// selecting the new nodes.
    pub fn paste_clipboard(
        &mut self,
        clipboard: &Clipboard,
        target: Pos2,
        mode: PasteMode,
    ) -> Result<Vec<NodeId>, PasteError> {
        let created = match paste(
            clipboard,
            &self.collection,
            &self.context.registry,
            self.policy.as_ref(),
            target,
            mode,
        ) {
            Ok(created) => created,
            Err(err) => {
                self.notice(NoticeLevel::Error, format!("Paste failed: {err}"));
                return Err(err);
            }
        };
        self.push_undo_command(Box::new(AddNodesCommand::new(created.clone())));
        let mut selection = crate::selection::Selection::new();
        for id in &created {
            selection.add(*id);
        }
        self.set_selection(selection);
        Ok(created)
    }

    /// Duplicate the selection next to itself
    pub fn duplicate_selection(&mut self, offset: Vec2) -> Result<Vec<NodeId>, PasteError> {
        let clipboard = self.copy_selection();
        let target = clipboard.center + offset;
        self.paste_clipboard(&clipboard, target, PasteMode::Copy)
    }

    /// Duplicate the selection as parameter-linked clones
    pub fn clone_selection(&mut self, offset: Vec2) -> Result<Vec<NodeId>, PasteError> {
        let clipboard = self.copy_selection();
        let target = clipboard.center + offset;
        self.paste_clipboard(&clipboard, target, PasteMode::Clone)
    }

    /// Collapse the selection into a new group node whose sub-graph
    /// holds a copy of the selected nodes.
    pub fn group_from_selection(&mut self) -> Option<NodeId> {
        let nodes = self.selection.lock().nodes.clone();
        if nodes.is_empty() {
            return None;
        }
        let clipboard = Clipboard::copy_nodes(&self.collection, &nodes);

        let subgraph = Arc::new(NodeCollection::new("Group"));
        if let Err(err) = paste(
            &clipboard,
            &subgraph,
            &self.context.registry,
            self.policy.as_ref(),
            clipboard.center,
            PasteMode::Copy,
        ) {
            self.notice(NoticeLevel::Error, format!("Group failed: {err}"));
            return None;
        }

        let mut group = self
            .context
            .registry
            .create_node("glaze.group", clipboard.center)?;
        group.subgraph = Some(subgraph.clone());
        let group_id = match self.collection.add_node(group) {
            Ok(id) => id,
            Err(err) => {
                self.notice(NoticeLevel::Error, format!("Group failed: {err}"));
                return None;
            }
        };
        subgraph.add_observer(GroupBoundarySync::new(&self.collection, group_id));
        self.collection.sync_group_inputs(group_id);

        let children: Vec<Box<dyn UndoCommand>> = vec![
            Box::new(RemoveNodesCommand::new(nodes)),
            Box::new(AddNodesCommand::new(vec![group_id])),
        ];
        self.push_undo_command(Box::new(CompositeCommand::new(
            "Group from selection",
            children,
        )));
        self.select_node(group_id, SelectMode::Set);
        Some(group_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glaze_graph::registry::create_default_registry;
    use glaze_graph::{DefaultPolicy, EditorContext};

    fn setup() -> (NodeCollection, NodeRegistry, DefaultPolicy) {
        (
            NodeCollection::new("root"),
            create_default_registry(),
            DefaultPolicy,
        )
    }

    fn add_at(
        coll: &NodeCollection,
        registry: &NodeRegistry,
        ty: &str,
        pos: Pos2,
    ) -> NodeId {
        coll.add_node(registry.create_node(ty, pos).unwrap()).unwrap()
    }

    #[test]
    fn test_paste_into_empty_collection_reproduces_topology() {
        let (source, registry, policy) = setup();
        let a = add_at(&source, &registry, "glaze.input", Pos2::new(0.0, 0.0));
        let b = add_at(&source, &registry, "glaze.blur", Pos2::new(0.0, 150.0));
        let c = add_at(&source, &registry, "glaze.merge", Pos2::new(0.0, 300.0));
        source.connect_nodes(0, a, b, false, &policy).unwrap();
        source.connect_nodes(0, b, c, false, &policy).unwrap();
        source.connect_nodes(1, a, c, false, &policy).unwrap();

        let clipboard = Clipboard::copy_nodes(&source, &[a, b, c]);
        let target = NodeCollection::new("other");
        let created =
            paste(&clipboard, &target, &registry, &policy, Pos2::new(500.0, 500.0), PasteMode::Copy)
                .unwrap();
        assert_eq!(created.len(), 3);

        let (na, nb, nc) = (created[0], created[1], created[2]);
        assert_eq!(target.node(nb).unwrap().input_source(0), Some(na));
        assert_eq!(target.node(nc).unwrap().input_source(0), Some(nb));
        assert_eq!(target.node(nc).unwrap().input_source(1), Some(na));
        // Fresh names, no collisions
        let names: Vec<String> = created
            .iter()
            .map(|id| target.node(*id).unwrap().script_name)
            .collect();
        assert_eq!(names, vec!["Input", "Blur", "Merge"]);
    }

    #[test]
    fn test_paste_into_same_collection_remaps_names() {
        let (coll, registry, policy) = setup();
        let a = add_at(&coll, &registry, "glaze.input", Pos2::new(0.0, 0.0));
        let b = add_at(&coll, &registry, "glaze.blur", Pos2::new(0.0, 150.0));
        coll.connect_nodes(0, a, b, false, &policy).unwrap();

        let clipboard = Clipboard::copy_nodes(&coll, &[a, b]);
        let created =
            paste(&clipboard, &coll, &registry, &policy, Pos2::new(400.0, 75.0), PasteMode::Copy)
                .unwrap();

        let (na, nb) = (created[0], created[1]);
        assert_eq!(coll.node(na).unwrap().script_name, "Input1");
        assert_eq!(coll.node(nb).unwrap().script_name, "Blur1");
        // The copy wires to the copied producer, not the original
        assert_eq!(coll.node(nb).unwrap().input_source(0), Some(na));
        assert_eq!(coll.node(b).unwrap().input_source(0), Some(a));
    }

    #[test]
    fn test_paste_falls_back_to_external_producer() {
        let (coll, registry, policy) = setup();
        let a = add_at(&coll, &registry, "glaze.input", Pos2::new(0.0, 0.0));
        let b = add_at(&coll, &registry, "glaze.blur", Pos2::new(0.0, 150.0));
        coll.connect_nodes(0, a, b, false, &policy).unwrap();

        // Copy only the consumer; its producer stays outside the set
        let clipboard = Clipboard::copy_nodes(&coll, &[b]);
        let created =
            paste(&clipboard, &coll, &registry, &policy, Pos2::new(300.0, 150.0), PasteMode::Copy)
                .unwrap();
        assert_eq!(coll.node(created[0]).unwrap().input_source(0), Some(a));
    }

    #[test]
    fn test_paste_offsets_relative_to_selection_center() {
        let (coll, registry, policy) = setup();
        let a = add_at(&coll, &registry, "glaze.blur", Pos2::new(0.0, 0.0));
        let b = add_at(&coll, &registry, "glaze.blur", Pos2::new(200.0, 0.0));

        let clipboard = Clipboard::copy_nodes(&coll, &[a, b]);
        let center = clipboard.center;
        let created = paste(
            &clipboard,
            &coll,
            &registry,
            &policy,
            center + Vec2::new(0.0, 500.0),
            PasteMode::Copy,
        )
        .unwrap();
        // Relative layout preserved, whole box shifted by the delta
        assert_eq!(
            coll.node(created[0]).unwrap().position,
            Pos2::new(0.0, 500.0)
        );
        assert_eq!(
            coll.node(created[1]).unwrap().position,
            Pos2::new(200.0, 500.0)
        );
    }

    #[test]
    fn test_backdrop_copy_includes_enclosed_nodes() {
        let (coll, registry, _policy) = setup();
        let backdrop = add_at(&coll, &registry, "glaze.backdrop", Pos2::new(0.0, 0.0));
        let _inner = add_at(&coll, &registry, "glaze.blur", Pos2::new(40.0, 40.0));
        let _outside = add_at(&coll, &registry, "glaze.blur", Pos2::new(900.0, 900.0));

        let clipboard = Clipboard::copy_nodes(&coll, &[backdrop]);
        let types: Vec<&str> = clipboard
            .snapshots
            .iter()
            .map(|s| s.type_id.as_str())
            .collect();
        assert_eq!(types, vec!["glaze.backdrop", "glaze.blur"]);
    }

    #[test]
    fn test_clone_mode_slaves_parameters() {
        let (coll, registry, policy) = setup();
        let a = add_at(&coll, &registry, "glaze.grade", Pos2::new(0.0, 0.0));
        coll.set_param(a, "gain", ParamValue::Float(1.2));

        let clipboard = Clipboard::copy_nodes(&coll, &[a]);
        let created = paste(
            &clipboard,
            &coll,
            &registry,
            &policy,
            Pos2::new(300.0, 0.0),
            PasteMode::Clone,
        )
        .unwrap();
        let clone = created[0];
        assert_eq!(coll.node(clone).unwrap().master, Some(a));

        // Future edits of the original mirror into the clone
        coll.set_param(a, "gain", ParamValue::Float(3.3));
        assert_eq!(coll.param(clone, "gain"), Some(ParamValue::Float(3.3)));
    }

    #[test]
    fn test_clone_restrictions_abort_atomically() {
        let (coll, registry, policy) = setup();
        let grade = add_at(&coll, &registry, "glaze.grade", Pos2::new(0.0, 0.0));
        let other = add_at(&coll, &registry, "glaze.grade", Pos2::new(100.0, 0.0));
        coll.set_master(other, grade);
        let viewer = add_at(&coll, &registry, "glaze.viewer", Pos2::new(0.0, 200.0));
        let tracker = add_at(&coll, &registry, "glaze.tracker", Pos2::new(0.0, 400.0));
        let before = coll.len();

        // A clone in the set
        let cb = Clipboard::copy_nodes(&coll, &[grade, other]);
        let err = paste(&cb, &coll, &registry, &policy, Pos2::ZERO, PasteMode::Clone);
        assert!(matches!(err, Err(PasteError::CloneOfClone(_))));

        // A viewer in the set
        let cb = Clipboard::copy_nodes(&coll, &[grade, viewer]);
        let err = paste(&cb, &coll, &registry, &policy, Pos2::ZERO, PasteMode::Clone);
        assert!(matches!(err, Err(PasteError::CloneViewer(_))));

        // A multi-instance host in the set
        let cb = Clipboard::copy_nodes(&coll, &[tracker]);
        let err = paste(&cb, &coll, &registry, &policy, Pos2::ZERO, PasteMode::Clone);
        assert!(matches!(err, Err(PasteError::CloneMultiInstance(_))));

        // Nothing was created by any of the rejected attempts
        assert_eq!(coll.len(), before);
    }

    #[test]
    fn test_clipboard_ron_round_trip() {
        let (coll, registry, policy) = setup();
        let a = add_at(&coll, &registry, "glaze.input", Pos2::new(0.0, 0.0));
        let b = add_at(&coll, &registry, "glaze.blur", Pos2::new(0.0, 150.0));
        coll.connect_nodes(0, a, b, false, &policy).unwrap();

        let clipboard = Clipboard::copy_nodes(&coll, &[a, b]);
        let text = clipboard.to_ron().unwrap();
        let parsed = Clipboard::from_ron(&text).unwrap();
        assert_eq!(parsed.snapshots.len(), 2);
        assert_eq!(parsed.snapshots[1].input_sources[0].as_deref(), Some("Input"));
        assert_eq!(parsed.center, clipboard.center);
    }

    #[test]
    fn test_scope_paste_records_one_undo_entry() {
        let mut scope = GraphScope::new("root", EditorContext::with_defaults());
        let a = scope.create_node("glaze.input", Pos2::ZERO, false).unwrap();
        let b = scope
            .create_node("glaze.blur", Pos2::new(0.0, 150.0), false)
            .unwrap();
        scope
            .collection()
            .connect_nodes(0, a, b, false, scope.policy())
            .unwrap();
        scope.select_node(a, SelectMode::Set);
        scope.select_node(b, SelectMode::Add);

        let created = scope.duplicate_selection(Vec2::new(300.0, 0.0)).unwrap();
        assert_eq!(created.len(), 2);
        let depth = scope.history.undo_depth();

        scope.undo().unwrap();
        for id in &created {
            assert!(!scope.collection().node(*id).unwrap().active);
        }
        scope.redo().unwrap();
        for id in &created {
            assert!(scope.collection().node(*id).unwrap().active);
        }
        assert_eq!(scope.history.undo_depth(), depth);
    }

    #[test]
    fn test_group_from_selection_moves_copies_into_subgraph() {
        let mut scope = GraphScope::new("root", EditorContext::with_defaults());
        let a = scope.create_node("glaze.input", Pos2::ZERO, false).unwrap();
        let b = scope
            .create_node("glaze.blur", Pos2::new(0.0, 150.0), false)
            .unwrap();
        scope
            .collection()
            .connect_nodes(0, a, b, false, scope.policy())
            .unwrap();
        scope.select_node(a, SelectMode::Set);
        scope.select_node(b, SelectMode::Add);

        let group = scope.group_from_selection().unwrap();
        let group_node = scope.collection().node(group).unwrap();
        assert!(group_node.kind.is_group);
        // The boundary Input node surfaced as an external input
        assert_eq!(group_node.max_inputs(), 1);
        let sub = group_node.subgraph.as_ref().unwrap();
        assert_eq!(sub.active_nodes().len(), 2);
        let inner_blur = sub.get_node_by_name("Blur").unwrap();
        assert_eq!(
            inner_blur.input_source(0),
            Some(sub.get_node_by_name("Input").unwrap().id)
        );
        // Originals are soft-deleted
        assert!(!scope.collection().node(a).unwrap().active);
        assert!(!scope.collection().node(b).unwrap().active);

        scope.undo().unwrap();
        assert!(scope.collection().node(a).unwrap().active);
        assert!(!scope.collection().node(group).unwrap().active);
    }
}
