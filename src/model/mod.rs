//! # Forest Model
//!
//! The input representation for the layout engine. A mind map is a forest of
//! independent root nodes; every node owns its children outright, so the
//! structure is a strict tree with no sharing and no back-pointers. A parent
//! lookup, when needed, is derived by walking from the roots.
//!
//! The engine only ever writes `x` and `y`. Everything else here is content
//! owned by the editor, and a node's size is always re-derived from it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// Stable node identifier, unique within one forest.
pub type NodeId = String;

/// A node in a mind-map tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,

    /// Raw text. May carry a structural prefix (heading, list, checkbox),
    /// inline emphasis markup, and embedded media references.
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub children: Vec<Node>,

    /// Centre x. Written by the layout engine.
    #[serde(default)]
    pub x: f64,

    /// Centre y. Written by the layout engine.
    #[serde(default)]
    pub y: f64,

    /// Hides children from layout and bounds without removing them.
    #[serde(default)]
    pub collapsed: bool,

    #[serde(default)]
    pub kind: NodeKind,

    /// Explicit size set by the user (e.g. a resized table).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<FontOverrides>,

    /// Free-form note. Table nodes may keep their pipe table here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Structured table rows, used when neither text nor note holds a table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Vec<Vec<String>>>,

    /// Trailing icon cluster (link, note, tag indicators).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub icons: Vec<String>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            children: Vec::new(),
            x: 0.0,
            y: 0.0,
            collapsed: false,
            kind: NodeKind::Plain,
            size: None,
            font: None,
            note: None,
            table: None,
            icons: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// Children that take part in layout: none when collapsed.
    pub fn visible_children(&self) -> &[Node] {
        if self.collapsed {
            &[]
        } else {
            &self.children
        }
    }

    pub fn is_table(&self) -> bool {
        self.kind == NodeKind::Table
    }

    /// Depth-first search for `id` in this subtree.
    pub fn find(&self, id: &str) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Translate this node and every descendant, hidden ones included.
    pub fn shift(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
        for child in &mut self.children {
            child.shift(dx, dy);
        }
    }

    /// Number of nodes in this subtree, hidden ones included.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(Node::len).sum::<usize>()
    }

    /// Number of nodes in this subtree that take part in layout.
    pub fn visible_len(&self) -> usize {
        1 + self
            .visible_children()
            .iter()
            .map(Node::visible_len)
            .sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Plain,
    Table,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

impl FontStyle {
    pub fn is_italic(self) -> bool {
        matches!(self, FontStyle::Italic | FontStyle::Oblique)
    }
}

/// Per-node font overrides. Unset fields inherit from [`Settings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontOverrides {
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(default)]
    pub style: Option<FontStyle>,
}

/// An ordered collection of independent root trees shown in one view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Forest {
    pub roots: Vec<Node>,
}

impl Forest {
    pub fn new(roots: Vec<Node>) -> Self {
        Self { roots }
    }

    pub fn from_json(json: &str) -> Result<Self, LayoutError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total node count, hidden nodes included.
    pub fn len(&self) -> usize {
        self.roots.iter().map(Node::len).sum()
    }

    pub fn visible_len(&self) -> usize {
        self.roots.iter().map(Node::visible_len).sum()
    }

    pub fn find(&self, id: &str) -> Option<&Node> {
        self.roots.iter().find_map(|r| r.find(id))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.roots.iter_mut().find_map(|r| r.find_mut(id))
    }

    /// Centre of the node with `id`, if present.
    pub fn position_of(&self, id: &str) -> Option<(f64, f64)> {
        self.find(id).map(|n| (n.x, n.y))
    }

    /// The root whose subtree contains `id`.
    pub fn root_of(&self, id: &str) -> Option<&Node> {
        self.roots.iter().find(|r| r.find(id).is_some())
    }

    /// Pre-order traversal with depth (roots are depth 0).
    pub fn visit(&self, mut f: impl FnMut(&Node, usize)) {
        fn walk(node: &Node, depth: usize, f: &mut dyn FnMut(&Node, usize)) {
            f(node, depth);
            for child in &node.children {
                walk(child, depth + 1, f);
            }
        }
        for root in &self.roots {
            walk(root, 0, &mut f);
        }
    }

    /// Check the invariants a layout pass relies on: unique ids and finite
    /// coordinates.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut problem = None;
        self.visit(|node, _| {
            if problem.is_some() {
                return;
            }
            if node.id.is_empty() {
                problem = Some("node with empty id".to_string());
            } else if !seen.insert(node.id.clone()) {
                problem = Some(format!("duplicate node id `{}`", node.id));
            } else if !node.x.is_finite() || !node.y.is_finite() {
                problem = Some(format!("node `{}` has non-finite coordinates", node.id));
            }
        });
        match problem {
            Some(reason) => Err(LayoutError::CorruptTree(reason)),
            None => Ok(()),
        }
    }
}

/// Read-only layout configuration supplied by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_font_size")]
    pub font_size: f64,

    #[serde(default = "default_font_family")]
    pub font_family: String,

    /// Vertical gap between sibling subtrees.
    #[serde(default = "default_spacing")]
    pub spacing: f64,

    /// Horizontal gap between depth columns.
    #[serde(default = "default_level_gap")]
    pub level_gap: f64,

    #[serde(default)]
    pub wrap: WrapConfig,

    /// Name of the per-root strategy ("right" or "balanced").
    #[serde(default = "default_strategy")]
    pub strategy: String,

    #[serde(default)]
    pub view: ViewHints,

    /// Fonts to register with the metrics backend before measuring.
    #[serde(default)]
    pub fonts: Vec<FontEntry>,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Debounce window for interactive edits.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            font_family: default_font_family(),
            spacing: default_spacing(),
            level_gap: default_level_gap(),
            wrap: WrapConfig::default(),
            strategy: default_strategy(),
            view: ViewHints::default(),
            fonts: Vec::new(),
            cache: CacheConfig::default(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, LayoutError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether `id` is the node currently open in the text editor.
    pub fn is_editing(&self, id: &str) -> bool {
        self.view.editing_id.as_deref() == Some(id)
    }
}

fn default_font_size() -> f64 {
    14.0
}

fn default_font_family() -> String {
    "sans-serif".to_string()
}

fn default_spacing() -> f64 {
    12.0
}

fn default_level_gap() -> f64 {
    48.0
}

fn default_strategy() -> String {
    "right".to_string()
}

fn default_debounce_ms() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrapConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_width")]
    pub max_width: f64,
}

fn default_max_width() -> f64 {
    240.0
}

impl Default for WrapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_width: default_max_width(),
        }
    }
}

impl WrapConfig {
    /// The width text is wrapped at; unbounded when wrapping is off.
    pub fn effective_max_width(&self) -> f64 {
        if self.enabled && self.max_width.is_finite() && self.max_width > 0.0 {
            self.max_width
        } else {
            f64::INFINITY
        }
    }
}

/// View-dependent state that influences sizing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewHints {
    /// Node currently open in the inline text editor.
    #[serde(default)]
    pub editing_id: Option<NodeId>,
    /// Live contents of the edit buffer, when it differs from the node text.
    #[serde(default)]
    pub edit_text: Option<String>,
}

/// A custom font to register with the measuring backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontEntry {
    pub family: String,
    /// Base64-encoded font data, or a data URI (e.g. "data:font/ttf;base64,...").
    pub src: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub italic: bool,
}

fn default_weight() -> u32 {
    400
}

/// Bounds for the three layout caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_size_capacity")]
    pub size_capacity: usize,
    #[serde(default = "default_bounds_capacity")]
    pub bounds_capacity: usize,
    #[serde(default = "default_count_capacity")]
    pub count_capacity: usize,
    /// Entries older than this are treated as misses.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    /// Minimum time between automatic sweeps of expired entries.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_size_capacity() -> usize {
    2000
}

fn default_bounds_capacity() -> usize {
    2000
}

fn default_count_capacity() -> usize {
    1000
}

fn default_ttl_ms() -> u64 {
    5 * 60 * 1000
}

fn default_sweep_interval_ms() -> u64 {
    60 * 1000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size_capacity: default_size_capacity(),
            bounds_capacity: default_bounds_capacity(),
            count_capacity: default_count_capacity(),
            ttl_ms: default_ttl_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}
