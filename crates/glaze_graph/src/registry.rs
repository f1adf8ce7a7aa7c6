// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node type registry and node factory.

use crate::node::{InputSlot, Node, NodeId, NodeVisualKind, StreamFormat};
use emath::{Pos2, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default visual size of a standard node
pub const DEFAULT_NODE_SIZE: Vec2 = Vec2::new(104.0, 34.0);
/// Default visual size of a freshly created backdrop
pub const DEFAULT_BACKDROP_SIZE: Vec2 = Vec2::new(240.0, 160.0);
/// Visual size of a pass-through dot
pub const DOT_SIZE: Vec2 = Vec2::new(16.0, 16.0);

/// Node type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeType {
    /// Unique type identifier
    pub id: String,
    /// Display name, also the base for generated script-names
    pub label: String,
    /// Capability descriptor applied to instances
    pub kind: NodeVisualKind,
    /// Input slot templates
    pub inputs: Vec<InputSlot>,
    /// Output format metadata applied to instances
    pub format: StreamFormat,
    /// Multiple internal instances (per-track style nodes); such nodes
    /// cannot be cloned
    pub multi_instance: bool,
}

impl NodeType {
    /// Create a standard processing type with the given input labels
    pub fn processor(id: impl Into<String>, label: impl Into<String>, inputs: &[&str]) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: NodeVisualKind::standard(),
            inputs: inputs.iter().map(|n| InputSlot::new(*n)).collect(),
            format: StreamFormat::default(),
            multi_instance: false,
        }
    }

    /// Override the capability descriptor
    pub fn with_kind(mut self, kind: NodeVisualKind) -> Self {
        self.kind = kind;
        self
    }

    /// Override the format metadata
    pub fn with_format(mut self, format: StreamFormat) -> Self {
        self.format = format;
        self
    }

    /// Mark the type as hosting multiple internal instances
    pub fn multi_instance(mut self) -> Self {
        self.multi_instance = true;
        self
    }
}

/// Registry of available node types; the node factory.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    types: IndexMap<String, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Register a node type
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Instantiate a node of the given type at a position.
    ///
    /// The script-name is left empty; the owning collection assigns it
    /// through its naming pass when the node is added.
    pub fn create_node(&self, type_id: &str, position: Pos2) -> Option<Node> {
        let ty = self.get(type_id)?;
        let size = if ty.kind.is_backdrop {
            DEFAULT_BACKDROP_SIZE
        } else if ty.kind.is_pass_through {
            DOT_SIZE
        } else {
            DEFAULT_NODE_SIZE
        };
        Some(Node {
            id: NodeId::new(),
            type_id: ty.id.clone(),
            script_name: String::new(),
            label: ty.label.clone(),
            position,
            size,
            inputs: ty.inputs.clone(),
            kind: ty.kind,
            format: ty.format,
            active: true,
            enabled: true,
            master: None,
            active_input: None,
            params: IndexMap::new(),
            subgraph: None,
        })
    }
}

/// Registry seeded with the built-in types.
pub fn create_default_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register(
        NodeType::processor("glaze.input", "Input", &[])
            .with_kind(NodeVisualKind::group_input()),
    );
    registry.register(
        NodeType::processor("glaze.output", "Output", &["Source"])
            .with_kind(NodeVisualKind::output()),
    );
    registry.register(NodeType::processor("glaze.blur", "Blur", &["Source"]));
    registry.register(NodeType::processor("glaze.grade", "Grade", &["Source"]));
    registry.register({
        let mut merge = NodeType::processor("glaze.merge", "Merge", &["A", "B"]);
        merge.inputs.push(InputSlot::new("Mask").mask());
        merge
    });
    registry.register(
        NodeType::processor("glaze.dot", "Dot", &["Source"]).with_kind(NodeVisualKind::dot()),
    );
    registry.register(
        NodeType::processor("glaze.viewer", "Viewer", &["0", "1"])
            .with_kind(NodeVisualKind::inspector()),
    );
    registry.register(
        NodeType::processor("glaze.backdrop", "Backdrop", &[])
            .with_kind(NodeVisualKind::backdrop()),
    );
    registry.register(
        NodeType::processor("glaze.group", "Group", &[]).with_kind(NodeVisualKind::group()),
    );
    registry.register(
        NodeType::processor("glaze.tracker", "Tracker", &["Source"]).multi_instance(),
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_node_applies_type() {
        let registry = create_default_registry();
        let node = registry
            .create_node("glaze.merge", Pos2::new(10.0, 20.0))
            .unwrap();
        assert_eq!(node.type_id, "glaze.merge");
        assert_eq!(node.max_inputs(), 3);
        assert!(node.inputs[2].is_mask);
        assert_eq!(node.position, Pos2::new(10.0, 20.0));
        assert!(node.script_name.is_empty());
    }

    #[test]
    fn test_unknown_type_yields_no_node() {
        let registry = create_default_registry();
        assert!(registry.create_node("glaze.missing", Pos2::ZERO).is_none());
    }

    #[test]
    fn test_backdrop_and_dot_sizes() {
        let registry = create_default_registry();
        let backdrop = registry.create_node("glaze.backdrop", Pos2::ZERO).unwrap();
        assert_eq!(backdrop.size, DEFAULT_BACKDROP_SIZE);
        assert!(backdrop.kind.resizable);

        let dot = registry.create_node("glaze.dot", Pos2::ZERO).unwrap();
        assert_eq!(dot.size, DOT_SIZE);
        assert!(dot.kind.is_pass_through);
    }
}
