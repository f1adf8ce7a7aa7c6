// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editing core for the Glaze compositor's node graph.
//!
//! Everything that mutates a [`glaze_graph`] collection on behalf of a
//! user lives here:
//! - selection state and the pointer-gesture state machine
//!   (select, drag, connect, rubber-band, resize, navigate)
//! - the undo/redo command set and the bounded history stack
//! - the clipboard/paste engine (duplicate, clone, cross-collection
//!   copy, group-from-selection)
//! - drop-target hints (connection and merge suggestions)
//!
//! The rendering of all of this is someone else's job; this crate is
//! headless and fully testable without a UI.

pub mod clipboard;
pub mod commands;
pub mod hints;
pub mod history;
pub mod interaction;
pub mod scope;
pub mod selection;

pub use clipboard::{Clipboard, NodeSnapshot, PasteError, PasteMode};
pub use commands::{CommandContext, UndoCommand};
pub use hints::Hint;
pub use history::{History, HistoryError};
pub use interaction::{EventState, Modifiers, PointerButton, PointerEvent};
pub use scope::{GraphScope, Notice, NoticeLevel, Viewport};
pub use selection::{SelectMode, Selection};
