// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection compatibility predicate.
//!
//! The collection consults the policy before committing any connection
//! and treats its answer as authoritative; warn codes connect anyway,
//! hard codes abort without mutating the graph.

use crate::collection::NodeCollection;
use crate::node::NodeId;
use std::collections::HashSet;

/// Answer of the compatibility query for (producer, consumer input slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanConnectInput {
    /// Connection is fine
    Ok,
    /// The slot already holds this producer; re-connecting is a no-op
    AlreadyConnected,
    /// Producer's pixel aspect ratio differs from the consumer's stream
    DifferentPixelAspect,
    /// Producer's frame rate differs from the consumer's stream
    DifferentFrameRate,
    /// Producer is a group whose sub-graph has no output node
    GroupHasNoOutput,
    /// Consumer cannot combine inputs of differing resolutions
    MultiResUnsupported,
    /// Input index is out of range for the consumer
    IndexOutOfRange,
    /// Producer and consumer are the same node
    SelfConnection,
    /// Connecting would close a loop through the graph
    WouldCreateCycle,
}

/// What the caller should do with a given predicate answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Commit the connection
    Allow,
    /// Commit the connection but surface a warning
    Warn(&'static str),
    /// Abort, no mutation
    Block(&'static str),
}

impl CanConnectInput {
    /// Map the predicate code to the warn/block decision
    pub fn verdict(self) -> Verdict {
        match self {
            Self::Ok | Self::AlreadyConnected => Verdict::Allow,
            Self::DifferentPixelAspect => {
                Verdict::Warn("input has a different pixel aspect ratio")
            }
            Self::DifferentFrameRate => Verdict::Warn("input has a different frame rate"),
            Self::GroupHasNoOutput => Verdict::Block("group has no output node"),
            Self::MultiResUnsupported => {
                Verdict::Block("node does not support inputs of different resolutions")
            }
            Self::IndexOutOfRange => Verdict::Block("input index out of range"),
            Self::SelfConnection => Verdict::Block("cannot connect a node to itself"),
            Self::WouldCreateCycle => Verdict::Block("connection would create a cycle"),
        }
    }
}

/// Capability query seam. The graph core never re-derives
/// cycle-freedom itself; it asks the policy.
pub trait ConnectPolicy {
    /// May `producer` feed `consumer`'s input slot `input`?
    fn can_connect_input(
        &self,
        collection: &NodeCollection,
        producer: NodeId,
        consumer: NodeId,
        input: usize,
    ) -> CanConnectInput;
}

/// Built-in policy: slot range, self-loops, upstream cycle walk, group
/// output presence, multi-resolution support, PAR/FPS comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl ConnectPolicy for DefaultPolicy {
    fn can_connect_input(
        &self,
        collection: &NodeCollection,
        producer: NodeId,
        consumer: NodeId,
        input: usize,
    ) -> CanConnectInput {
        let Some(consumer_node) = collection.node(consumer) else {
            return CanConnectInput::IndexOutOfRange;
        };
        let Some(producer_node) = collection.node(producer) else {
            return CanConnectInput::IndexOutOfRange;
        };

        if input >= consumer_node.max_inputs() {
            return CanConnectInput::IndexOutOfRange;
        }
        if producer == consumer {
            return CanConnectInput::SelfConnection;
        }
        if consumer_node.input_source(input) == Some(producer) {
            return CanConnectInput::AlreadyConnected;
        }
        if feeds_transitively(collection, consumer, producer) {
            return CanConnectInput::WouldCreateCycle;
        }

        if producer_node.kind.is_group {
            let has_output = producer_node
                .subgraph
                .as_ref()
                .is_some_and(|sub| sub.has_active_output());
            if !has_output {
                return CanConnectInput::GroupHasNoOutput;
            }
        }

        // Compare against what already feeds the consumer's other slots
        let mut sibling_formats = Vec::new();
        for i in consumer_node.connected_inputs() {
            if i == input {
                continue;
            }
            if let Some(src) = consumer_node.input_source(i) {
                if let Some(node) = collection.node(src) {
                    sibling_formats.push(node.format);
                }
            }
        }

        if !consumer_node.format.supports_multi_res
            && sibling_formats
                .iter()
                .any(|f| f.resolution != producer_node.format.resolution)
        {
            return CanConnectInput::MultiResUnsupported;
        }
        if producer_node.format.pixel_aspect != consumer_node.format.pixel_aspect {
            return CanConnectInput::DifferentPixelAspect;
        }
        if producer_node.format.frame_rate != consumer_node.format.frame_rate {
            return CanConnectInput::DifferentFrameRate;
        }

        CanConnectInput::Ok
    }
}

/// Does `upstream` reach `downstream` by walking input sources?
fn feeds_transitively(collection: &NodeCollection, upstream: NodeId, downstream: NodeId) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![downstream];
    while let Some(id) = stack.pop() {
        if id == upstream {
            return true;
        }
        if !visited.insert(id) {
            continue;
        }
        if let Some(node) = collection.node(id) {
            for slot in &node.inputs {
                if let Some(src) = slot.source {
                    stack.push(src);
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::NodeCollection;
    use crate::registry::create_default_registry;
    use emath::Pos2;

    fn scope() -> (NodeCollection, crate::registry::NodeRegistry) {
        (NodeCollection::new("root"), create_default_registry())
    }

    fn add(coll: &NodeCollection, registry: &crate::registry::NodeRegistry, ty: &str) -> NodeId {
        let node = registry.create_node(ty, Pos2::ZERO).unwrap();
        coll.add_node(node).unwrap()
    }

    #[test]
    fn test_self_connection_blocked() {
        let (coll, registry) = scope();
        let blur = add(&coll, &registry, "glaze.blur");
        let policy = DefaultPolicy;
        assert_eq!(
            policy.can_connect_input(&coll, blur, blur, 0),
            CanConnectInput::SelfConnection
        );
    }

    #[test]
    fn test_cycle_detected_through_chain() {
        let (coll, registry) = scope();
        let a = add(&coll, &registry, "glaze.blur");
        let b = add(&coll, &registry, "glaze.blur");
        let c = add(&coll, &registry, "glaze.blur");
        let policy = DefaultPolicy;
        assert!(coll.connect_nodes(0, a, b, false, &policy).unwrap());
        assert!(coll.connect_nodes(0, b, c, false, &policy).unwrap());
        // c -> a would close a -> b -> c -> a
        assert_eq!(
            policy.can_connect_input(&coll, c, a, 0),
            CanConnectInput::WouldCreateCycle
        );
    }

    #[test]
    fn test_index_out_of_range() {
        let (coll, registry) = scope();
        let input = add(&coll, &registry, "glaze.input");
        let blur = add(&coll, &registry, "glaze.blur");
        let policy = DefaultPolicy;
        assert_eq!(
            policy.can_connect_input(&coll, input, blur, 5),
            CanConnectInput::IndexOutOfRange
        );
    }

    #[test]
    fn test_format_mismatch_warns() {
        let (coll, registry) = scope();
        let input = add(&coll, &registry, "glaze.input");
        let blur = add(&coll, &registry, "glaze.blur");
        coll.with_node_mut(input, |n| n.format.pixel_aspect = 2.0)
            .unwrap();
        let policy = DefaultPolicy;
        let code = policy.can_connect_input(&coll, input, blur, 0);
        assert_eq!(code, CanConnectInput::DifferentPixelAspect);
        assert!(matches!(code.verdict(), Verdict::Warn(_)));
    }

    #[test]
    fn test_group_without_output_blocked() {
        let (coll, registry) = scope();
        let group = add(&coll, &registry, "glaze.group");
        let blur = add(&coll, &registry, "glaze.blur");
        let policy = DefaultPolicy;
        assert_eq!(
            policy.can_connect_input(&coll, group, blur, 0),
            CanConnectInput::GroupHasNoOutput
        );
    }
}
