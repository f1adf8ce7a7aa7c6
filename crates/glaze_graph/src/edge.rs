// SPDX-License-Identifier: MIT OR Apache-2.0
//! Consumer-side connection slots as draggable objects.
//!
//! One edge per input slot, plus one synthetic output edge per node: a
//! pure UI affordance for drag-from-output gestures that never persists
//! a connection itself.

use crate::collection::NodeCollection;
use crate::node::NodeId;
use emath::{Pos2, Vec2};
use serde::{Deserialize, Serialize};

/// Length of the stub drawn for unconnected edges
const DANGLING_STUB: f32 = 40.0;

/// One potential or actual connection, with its line geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Position in the consumer's input list
    pub input_number: usize,
    /// Producer end; `None` means disconnected
    pub source: Option<NodeId>,
    /// Consumer end; present on every input edge
    pub dest: Option<NodeId>,
    /// Synthetic drag-from-output affordance
    pub is_output_edge: bool,
    /// Line start, graph space
    pub from: Pos2,
    /// Line end, graph space
    pub to: Pos2,
}

impl Edge {
    /// Input edge for `consumer`'s slot `input_number`
    pub fn input(consumer: NodeId, input_number: usize) -> Self {
        Self {
            input_number,
            source: None,
            dest: Some(consumer),
            is_output_edge: false,
            from: Pos2::ZERO,
            to: Pos2::ZERO,
        }
    }

    /// Synthetic output edge for `producer`
    pub fn output(producer: NodeId) -> Self {
        Self {
            input_number: 0,
            source: Some(producer),
            dest: None,
            is_output_edge: true,
            from: Pos2::ZERO,
            to: Pos2::ZERO,
        }
    }

    /// Reassign the producer end. `None` is legal and means
    /// "disconnected"; geometry is recomputed either way.
    pub fn set_source(&mut self, source: Option<NodeId>, collection: &NodeCollection) {
        self.source = source;
        self.refresh_geometry(collection);
    }

    /// Whether the edge currently carries a connection
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Recompute the line from current node bounds.
    pub fn refresh_geometry(&mut self, collection: &NodeCollection) {
        if self.is_output_edge {
            if let Some(node) = self.source.and_then(|id| collection.node(id)) {
                self.from = node.output_anchor();
                self.to = self.from + Vec2::new(0.0, DANGLING_STUB);
            }
            return;
        }
        if let Some(node) = self.dest.and_then(|id| collection.node(id)) {
            self.to = node.input_anchor(self.input_number);
        }
        self.from = match self.source.and_then(|id| collection.node(id)) {
            Some(node) => node.output_anchor(),
            None => self.to - Vec2::new(0.0, DANGLING_STUB),
        };
    }

    /// Move the free endpoint while the edge is being dragged
    pub fn set_dangling_end(&mut self, pos: Pos2) {
        if self.is_output_edge {
            self.to = pos;
        } else {
            self.from = pos;
        }
    }

    /// Midpoint of the line; dragging it splices a pass-through node
    /// into the connection.
    pub fn bend_point(&self) -> Pos2 {
        self.from + (self.to - self.from) * 0.5
    }

    /// Distance from `pos` to the line segment
    pub fn distance_to(&self, pos: Pos2) -> f32 {
        dist_to_segment(pos, self.from, self.to)
    }

    /// Whether `pos` lies on the line within `tolerance`
    pub fn hit_test(&self, pos: Pos2, tolerance: f32) -> bool {
        self.distance_to(pos) <= tolerance
    }

    /// Whether `pos` lies on the bend point within `tolerance`
    pub fn bend_point_hit(&self, pos: Pos2, tolerance: f32) -> bool {
        self.bend_point().distance(pos) <= tolerance
    }
}

fn dist_to_segment(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq == 0.0 {
        return a.distance(p);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t).distance(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::create_default_registry;

    #[test]
    fn test_set_source_recomputes_geometry() {
        let registry = create_default_registry();
        let coll = NodeCollection::new("root");
        let a = coll
            .add_node(registry.create_node("glaze.input", Pos2::new(0.0, 0.0)).unwrap())
            .unwrap();
        let b = coll
            .add_node(registry.create_node("glaze.blur", Pos2::new(0.0, 200.0)).unwrap())
            .unwrap();

        let mut edge = Edge::input(b, 0);
        edge.refresh_geometry(&coll);
        let dangling_from = edge.from;

        edge.set_source(Some(a), &coll);
        assert!(edge.has_source());
        assert_ne!(edge.from, dangling_from);
        assert_eq!(edge.from, coll.node(a).unwrap().output_anchor());
        assert_eq!(edge.to, coll.node(b).unwrap().input_anchor(0));

        edge.set_source(None, &coll);
        assert!(!edge.has_source());
    }

    #[test]
    fn test_hit_test_segment_distance() {
        let mut edge = Edge::input(NodeId::new(), 0);
        edge.from = Pos2::new(0.0, 0.0);
        edge.to = Pos2::new(100.0, 0.0);

        assert!(edge.hit_test(Pos2::new(50.0, 4.0), 6.0));
        assert!(!edge.hit_test(Pos2::new(50.0, 10.0), 6.0));
        // Beyond the endpoints the distance is to the endpoint itself
        assert!(!edge.hit_test(Pos2::new(140.0, 0.0), 6.0));
        assert_eq!(edge.bend_point(), Pos2::new(50.0, 0.0));
    }
}
