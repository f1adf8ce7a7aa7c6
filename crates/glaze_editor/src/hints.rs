// SPDX-License-Identifier: MIT OR Apache-2.0
//! Drop-target suggestions for node drags.
//!
//! Computing a suggestion is a pure query over the graph; realizing one
//! as commands happens separately in the gesture machinery, so both
//! sides are testable on their own.

use emath::Pos2;
use glaze_graph::{CanConnectInput, ConnectPolicy, Edge, NodeCollection, NodeId, Settings, Verdict};

/// A suggested wiring action for the node under drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    /// Feed the dragged node into a free input slot nearby
    Connect {
        /// Consumer owning the free slot
        dest: NodeId,
        /// The free slot
        input_no: usize,
    },
    /// Splice the dragged node into an existing connection
    Splice {
        /// Consumer end of the wire
        dest: NodeId,
        /// Slot the wire feeds
        input_no: usize,
        /// Producer end of the wire
        prior: NodeId,
    },
    /// Synthesize a merge node combining the dragged node with the one
    /// it overlaps
    Merge {
        /// The stationary node under the dragged one
        other: NodeId,
    },
}

/// All input edges of active nodes except `exclude`, with geometry.
pub(crate) fn input_edges(collection: &NodeCollection, exclude: Option<NodeId>) -> Vec<Edge> {
    let mut edges = Vec::new();
    for id in collection.active_nodes() {
        if Some(id) == exclude {
            continue;
        }
        let Some(node) = collection.node(id) else {
            continue;
        };
        for (i, slot) in node.inputs.iter().enumerate() {
            let mut edge = Edge::input(id, i);
            edge.source = slot.source;
            edge.refresh_geometry(collection);
            edges.push(edge);
        }
    }
    edges
}

/// Suggest a wiring action for `dragged` at `cursor`, or nothing.
pub fn compute_hint(
    collection: &NodeCollection,
    settings: &Settings,
    policy: &dyn ConnectPolicy,
    dragged: NodeId,
    cursor: Pos2,
) -> Option<Hint> {
    let node = collection.node(dragged)?;
    if node.kind.is_backdrop {
        return None;
    }

    // Overlapping a compatible node wins: offer a merge
    if settings.merge_hint_enabled && !node.kind.is_output {
        let bounds = node.bounds();
        for other_id in collection.active_nodes() {
            if other_id == dragged {
                continue;
            }
            let Some(other) = collection.node(other_id) else {
                continue;
            };
            if other.kind.is_backdrop || other.kind.is_output {
                continue;
            }
            if directly_wired(collection, dragged, other_id) {
                continue;
            }
            if bounds.intersects(other.bounds()) {
                return Some(Hint::Merge { other: other_id });
            }
        }
    }

    // Otherwise the nearest edge within reach
    let mut best: Option<(f32, Hint)> = None;
    for edge in input_edges(collection, Some(dragged)) {
        if edge.source == Some(dragged) {
            continue;
        }
        let Some(dest) = edge.dest else { continue };
        let distance = edge.distance_to(cursor);
        if distance > settings.connection_hint_radius {
            continue;
        }
        let hint = match edge.source {
            // Splicing needs a node that can pass the stream through
            Some(prior) => {
                if node.preferred_input().is_none() || node.kind.is_output {
                    continue;
                }
                Hint::Splice {
                    dest,
                    input_no: edge.input_number,
                    prior,
                }
            }
            None => {
                if node.kind.is_output {
                    continue;
                }
                if policy.can_connect_input(collection, dragged, dest, edge.input_number)
                    == CanConnectInput::WouldCreateCycle
                {
                    continue;
                }
                Hint::Connect {
                    dest,
                    input_no: edge.input_number,
                }
            }
        };
        if best.as_ref().map_or(true, |(d, _)| distance < *d) {
            best = Some((distance, hint));
        }
    }
    if let Some((_, hint)) = best {
        // Hard incompatibilities disqualify the suggestion outright
        let target_ok = match hint {
            Hint::Connect { dest, input_no } | Hint::Splice { dest, input_no, .. } => !matches!(
                policy
                    .can_connect_input(collection, dragged, dest, input_no)
                    .verdict(),
                Verdict::Block(_)
            ),
            Hint::Merge { .. } => true,
        };
        if target_ok {
            return Some(hint);
        }
    }
    None
}

fn directly_wired(collection: &NodeCollection, a: NodeId, b: NodeId) -> bool {
    let feeds = |x: NodeId, y: NodeId| {
        collection
            .node(y)
            .is_some_and(|n| n.inputs.iter().any(|slot| slot.source == Some(x)))
    };
    feeds(a, b) || feeds(b, a)
}
