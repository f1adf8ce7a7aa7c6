// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph model for the Glaze compositor.
//!
//! This crate owns the logical graph: node collections with
//! name-uniqueness and membership rules, connection slots, the
//! compatibility predicate consulted before any wire is committed, and
//! the node-type registry acting as the node factory.
//!
//! ## Architecture
//!
//! - Nodes are plain values addressed by [`NodeId`] through their
//!   owning [`NodeCollection`]; no back-references, so teardown order
//!   never matters.
//! - One collection per scope (project root, one per group node);
//!   collections hand out copies of their member list, never the live
//!   table.
//! - Everything that edits the graph (gestures, undo commands,
//!   clipboard) lives in `glaze_editor` on top of this crate.

pub mod collection;
pub mod compat;
pub mod context;
pub mod edge;
pub mod node;
pub mod registry;

pub use collection::{CollectionObserver, ConnectError, NameError, NodeCollection};
pub use compat::{CanConnectInput, ConnectPolicy, DefaultPolicy, Verdict};
pub use context::{EditorContext, Settings};
pub use edge::Edge;
pub use node::{InputSlot, Node, NodeId, NodeVisualKind, ParamValue, StreamFormat};
pub use registry::{NodeRegistry, NodeType};
