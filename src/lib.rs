//! # Mind-Map Layout
//!
//! Automatic tree layout for a mind-mapping editor.
//!
//! A mind map is a forest of independent trees whose node boxes depend on
//! wrapped, markup-aware text. This crate assigns every visible node a
//! centre coordinate so that subtrees never overlap, independent roots
//! stack top to bottom, and a chosen node stays where the user is looking
//! while the map reflows around an edit.
//!
//! Layout runs on every keystroke, so everything expensive is memoized
//! (sizes, subtree bounds, node counts) and bursts of edits are debounced
//! into a single pass.
//!
//! ## Architecture
//!
//! ```text
//! Input (Forest + Settings)
//!       ↓
//!   [scheduler] — Debounced / immediate pass requests
//!       ↓
//!   [layout]    — Per-root strategy, root stacking, anchor compensation
//!       ↓           ↘
//!   [size]      — Node boxes     [cache] — TTL + LRU memoization
//!       ↓
//!   [text]      — Markup, script-aware breaking, greedy wrapping
//!       ↓
//!   [font]      — Pixel widths (font metrics or heuristic)
//! ```
//!
//! [`session::Session`] wires all of it together for hosts that just want to
//! apply edits and read coordinates back.

pub mod cache;
pub mod clock;
pub mod error;
pub mod font;
pub mod geometry;
pub mod layout;
pub mod model;
pub mod scheduler;
pub mod session;
pub mod size;
pub mod text;

#[cfg(feature = "wasm")]
pub mod wasm;

use std::sync::Arc;

pub use error::LayoutError;
pub use layout::{LayoutApplied, LayoutContext, LayoutEngine, Viewport};
pub use model::{Forest, Node, NodeId, Settings};
pub use scheduler::{LayoutRequest, LayoutScheduler, ScheduleMode};
pub use session::Session;

use clock::SystemClock;

/// Lay out a forest given as JSON and return it, with coordinates, as JSON.
///
/// Both inputs use the camelCase schema of [`Forest`] and [`Settings`]; an
/// empty settings string means defaults.
pub fn layout_json(forest_json: &str, settings_json: &str) -> Result<String, LayoutError> {
    let mut forest = Forest::from_json(forest_json)?;
    let settings = if settings_json.trim().is_empty() {
        Settings::default()
    } else {
        Settings::from_json(settings_json)?
    };
    let engine = LayoutEngine::from_settings(&settings, Arc::new(SystemClock::new()))?;
    engine.layout(&mut forest, &settings, &mut LayoutContext::default())?;
    Ok(serde_json::to_string(&forest)?)
}
