// SPDX-License-Identifier: MIT OR Apache-2.0
//! Process-wide editor configuration, passed explicitly.

use crate::registry::{create_default_registry, NodeRegistry};
use serde::{Deserialize, Serialize};

/// Editor tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Maximum undo stack depth before the oldest entry is evicted
    pub max_undo_depth: usize,
    /// Distance within which a dragged node highlights a nearby edge
    pub connection_hint_radius: f32,
    /// Whether overlapping a compatible node offers a merge hint
    pub merge_hint_enabled: bool,
    /// Margin from the viewport border that triggers autoscroll
    pub autoscroll_margin: f32,
    /// Pixels scrolled per autoscroll step
    pub autoscroll_speed: f32,
    /// Hit tolerance around connection lines and bend points
    pub edge_hit_tolerance: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_undo_depth: 100,
            connection_hint_radius: 12.0,
            merge_hint_enabled: true,
            autoscroll_margin: 50.0,
            autoscroll_speed: 10.0,
            edge_hit_tolerance: 6.0,
        }
    }
}

/// Explicit context handed to the graph and editing components at
/// construction. Read-mostly, initialized once at startup.
#[derive(Debug, Clone, Default)]
pub struct EditorContext {
    /// Editor tunables
    pub settings: Settings,
    /// Node type registry / factory
    pub registry: NodeRegistry,
}

impl EditorContext {
    /// Context with default settings and the built-in node types
    pub fn with_defaults() -> Self {
        Self {
            settings: Settings::default(),
            registry: create_default_registry(),
        }
    }
}
