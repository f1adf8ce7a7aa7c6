// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph model.

use crate::collection::NodeCollection;
use emath::{Pos2, Rect, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Side length of the resize handle square in the bottom-right corner
/// of resizable nodes.
pub const RESIZE_HANDLE_SIZE: f32 = 20.0;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Visual/behavioral capabilities of a node kind.
///
/// One flat descriptor per kind instead of a widget subclass per kind;
/// everything that used to be a virtual override is a flag here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeVisualKind {
    /// Node can be resized by dragging its corner handle
    pub resizable: bool,
    /// Node renders a thumbnail preview of its output
    pub can_preview: bool,
    /// Node draws a frame around its label
    pub frames_name: bool,
    /// Node shows an enabled/disabled indicator
    pub has_state_indicator: bool,
    /// Grouping rectangle with no processing role
    pub is_backdrop: bool,
    /// Pass-through node (single input forwarded unchanged)
    pub is_pass_through: bool,
    /// Viewer-like node with an "active input" among several candidates
    pub is_inspector: bool,
    /// Node owns a sub-graph
    pub is_group: bool,
    /// Terminal node (no outputs)
    pub is_output: bool,
    /// Boundary node exposing an external input on the owning group
    pub is_group_input: bool,
}

impl NodeVisualKind {
    /// A regular processing node
    pub fn standard() -> Self {
        Self {
            resizable: false,
            can_preview: true,
            frames_name: true,
            has_state_indicator: true,
            is_backdrop: false,
            is_pass_through: false,
            is_inspector: false,
            is_group: false,
            is_output: false,
            is_group_input: false,
        }
    }

    /// A backdrop grouping rectangle
    pub fn backdrop() -> Self {
        Self {
            resizable: true,
            can_preview: false,
            frames_name: true,
            has_state_indicator: false,
            is_backdrop: true,
            is_pass_through: false,
            is_inspector: false,
            is_group: false,
            is_output: false,
            is_group_input: false,
        }
    }

    /// A pass-through dot
    pub fn dot() -> Self {
        Self {
            resizable: false,
            can_preview: false,
            frames_name: false,
            has_state_indicator: false,
            is_backdrop: false,
            is_pass_through: true,
            is_inspector: false,
            is_group: false,
            is_output: false,
            is_group_input: false,
        }
    }

    /// A viewer-like inspector node
    pub fn inspector() -> Self {
        Self {
            resizable: false,
            can_preview: false,
            frames_name: true,
            has_state_indicator: false,
            is_backdrop: false,
            is_pass_through: false,
            is_inspector: true,
            is_group: false,
            is_output: true,
            is_group_input: false,
        }
    }

    /// A group node owning a sub-graph
    pub fn group() -> Self {
        Self {
            resizable: false,
            can_preview: false,
            frames_name: true,
            has_state_indicator: true,
            is_backdrop: false,
            is_pass_through: false,
            is_inspector: false,
            is_group: true,
            is_output: false,
            is_group_input: false,
        }
    }

    /// A boundary node exposing an external input on the owning group
    pub fn group_input() -> Self {
        Self {
            can_preview: false,
            is_group_input: true,
            ..Self::standard()
        }
    }

    /// A terminal output node
    pub fn output() -> Self {
        Self {
            is_output: true,
            ..Self::standard()
        }
    }
}

impl Default for NodeVisualKind {
    fn default() -> Self {
        Self::standard()
    }
}

/// Format metadata compared by the connection compatibility predicate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Pixel aspect ratio of the produced stream
    pub pixel_aspect: f64,
    /// Frame rate of the produced stream
    pub frame_rate: f64,
    /// Resolution of the produced stream
    pub resolution: [u32; 2],
    /// Whether the node accepts inputs of differing resolutions
    pub supports_multi_res: bool,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            pixel_aspect: 1.0,
            frame_rate: 24.0,
            resolution: [1920, 1080],
            supports_multi_res: true,
        }
    }
}

/// One input slot on a node.
///
/// A slot either is empty or holds a reference to exactly one producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSlot {
    /// Slot label ("Source", "A", "B", "Mask", ...)
    pub name: String,
    /// Optional inputs do not block rendering when unconnected
    pub optional: bool,
    /// Mask inputs are skipped by preferred-input selection
    pub is_mask: bool,
    /// Producer currently feeding this slot
    pub source: Option<NodeId>,
}

impl InputSlot {
    /// Create an empty mandatory slot
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
            is_mask: false,
            source: None,
        }
    }

    /// Mark the slot optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Mark the slot as a mask input
    pub fn mask(mut self) -> Self {
        self.is_mask = true;
        self.optional = true;
        self
    }
}

/// Value held by a node parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// Boolean toggle
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Text
    Text(String),
    /// RGBA color
    Color([f32; 4]),
}

/// A node instance in a collection.
///
/// Nodes are addressed by [`NodeId`] through their owning
/// [`NodeCollection`]; they never hold references back to it.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node type ID in the registry
    pub type_id: String,
    /// Scripting identifier, unique among active members of a collection
    pub script_name: String,
    /// Display label
    pub label: String,
    /// Position of the top-left corner, graph space
    pub position: Pos2,
    /// Visual size
    pub size: Vec2,
    /// Ordered input slots
    pub inputs: Vec<InputSlot>,
    /// Capability descriptor
    pub kind: NodeVisualKind,
    /// Output format metadata
    pub format: StreamFormat,
    /// Activated nodes are the visible/renderable ones; deactivated nodes
    /// are kept in the table only so undo can bring them back
    pub active: bool,
    /// Bypass toggle
    pub enabled: bool,
    /// Clone link: parameter values mirror this node while set
    pub master: Option<NodeId>,
    /// Inspector nodes: which connected input is displayed
    pub active_input: Option<usize>,
    /// Parameter values
    pub params: IndexMap<String, ParamValue>,
    /// Sub-graph, for group nodes
    pub subgraph: Option<Arc<NodeCollection>>,
}

impl Node {
    /// Source currently connected to input `index`
    pub fn input_source(&self, index: usize) -> Option<NodeId> {
        self.inputs.get(index).and_then(|slot| slot.source)
    }

    /// Indices of inputs that currently hold a source
    pub fn connected_inputs(&self) -> Vec<usize> {
        self.inputs
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.source.map(|_| i))
            .collect()
    }

    /// Number of input slots
    pub fn max_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// The slot a node nominates for an incoming auto-connect gesture:
    /// first unconnected non-mask slot, else first unconnected slot.
    pub fn preferred_input(&self) -> Option<usize> {
        let free = |slot: &InputSlot| slot.source.is_none();
        self.inputs
            .iter()
            .position(|s| free(s) && !s.is_mask)
            .or_else(|| self.inputs.iter().position(free))
    }

    /// Grow the input list to at least `count` slots.
    ///
    /// Inspector nodes use this to sprout inputs on demand.
    pub fn ensure_input_count(&mut self, count: usize) {
        while self.inputs.len() < count {
            let name = format!("{}", self.inputs.len());
            self.inputs.push(InputSlot::new(name).optional());
        }
    }

    /// Bounding rectangle in graph space
    pub fn bounds(&self) -> Rect {
        Rect::from_min_size(self.position, self.size)
    }

    /// Resize handle rectangle, present only on resizable kinds
    pub fn resize_handle(&self) -> Option<Rect> {
        if !self.kind.resizable {
            return None;
        }
        let max = self.position + self.size;
        Some(Rect::from_min_max(
            Pos2::new(max.x - RESIZE_HANDLE_SIZE, max.y - RESIZE_HANDLE_SIZE),
            max,
        ))
    }

    /// Anchor point where input edges terminate
    pub fn input_anchor(&self, index: usize) -> Pos2 {
        let n = self.inputs.len().max(1) as f32;
        let step = self.size.x / (n + 1.0);
        Pos2::new(
            self.position.x + step * (index as f32 + 1.0),
            self.position.y,
        )
    }

    /// Anchor point where the output edge originates
    pub fn output_anchor(&self) -> Pos2 {
        Pos2::new(
            self.position.x + self.size.x * 0.5,
            self.position.y + self.size.y,
        )
    }
}
