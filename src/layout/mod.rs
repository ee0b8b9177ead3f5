//! # Tree Layout Engine
//!
//! Assigns centre coordinates to every visible node of a forest.
//!
//! ## One pass
//!
//! 1. Validate the forest and resolve the strategy named in the settings.
//!    Anything wrong aborts the pass before a single coordinate moves.
//! 2. Take the pending anchor from the [`LayoutContext`] and remember where
//!    that node is now. The anchor is one-shot: it is consumed even when the
//!    pass fails.
//! 3. Arrange each root's subtree on a working copy of the forest.
//! 4. Stack the roots top to bottom. Every root after the first is moved,
//!    with its whole subtree, so its top sits one adaptive gap below the
//!    bottom of the previous subtree. The gap grows with the size of the
//!    larger of the two trees.
//! 5. Swap the copy in, pan the viewport by however far the anchor moved so
//!    it stays put on screen, and announce the pass to listeners.
//!
//! Sizes, bounds and counts all go through the [`LayoutCache`]. Bounds are
//! keyed by a node's own y, which says nothing about where its descendants
//! went, so the bounds cache is cleared at the start of a pass and again
//! around every root shift.

pub mod bounds;
pub mod strategy;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::cache::{LayoutCache, LayoutCacheStats, SizeKey};
use crate::clock::{Clock, SystemClock};
use crate::error::LayoutError;
use crate::font::MeasurementService;
use crate::geometry::{self, Bounds, Side};
use crate::model::{CacheConfig, Forest, Node, NodeId, Settings};
use crate::size::{content_fingerprint, NodeSize, SizeCalculator};

use self::bounds::{subtree_bounds, subtree_count};
use self::strategy::{Balanced, RightTree, SizeSource, StrategyParams, SubtreeStrategy};

/// Base gap between stacked root subtrees.
const ROOT_GAP: f64 = 8.0;
/// Extra gap per node of the larger neighbouring subtree.
const ROOT_GAP_PER_NODE: f64 = 0.5;
const ROOT_GAP_MAX_EXTRA: f64 = 16.0;

/// Gap between two stacked roots with `prev` and `cur` visible nodes.
pub fn root_gap(prev: usize, cur: usize) -> f64 {
    ROOT_GAP + (prev.max(cur) as f64 * ROOT_GAP_PER_NODE).min(ROOT_GAP_MAX_EXTRA)
}

/// Scroll offset of the view: `screen = world - pan`.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Viewport {
    pub fn to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.pan_x, y - self.pan_y)
    }
}

/// Per-view state a pass reads and updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutContext {
    pub viewport: Viewport,
    /// Node to keep stationary on screen across the next pass.
    pub pending_anchor: Option<NodeId>,
}

impl LayoutContext {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            pending_anchor: None,
        }
    }

    pub fn anchor(&mut self, id: impl Into<NodeId>) {
        self.pending_anchor = Some(id.into());
    }
}

/// Announcement of a committed pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutApplied {
    /// 1-based pass number for this engine.
    pub pass: u64,
    pub roots: usize,
    /// Nodes that took part in layout.
    pub nodes: usize,
    /// How far the anchor moved (and the viewport panned), if one resolved.
    pub anchor_shift: Option<(f64, f64)>,
    pub elapsed: Duration,
}

type Listener = Box<dyn Fn(&LayoutApplied) + Send + Sync>;

pub struct LayoutEngine {
    measurer: MeasurementService,
    cache: LayoutCache,
    strategies: FxHashMap<String, Box<dyn SubtreeStrategy>>,
    listeners: Mutex<Vec<Listener>>,
    passes: AtomicU64,
}

impl std::fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("LayoutEngine")
            .field("measurer", &self.measurer)
            .field("cache", &self.cache)
            .field("strategies", &names)
            .field("passes", &self.passes.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutEngine {
    /// Heuristic measurement, default cache bounds and the system clock.
    pub fn new() -> Self {
        Self::with_parts(
            MeasurementService::heuristic(),
            &CacheConfig::default(),
            Arc::new(SystemClock::new()),
        )
    }

    pub fn with_parts(
        measurer: MeasurementService,
        cache: &CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut engine = Self {
            measurer,
            cache: LayoutCache::new(cache, clock),
            strategies: FxHashMap::default(),
            listeners: Mutex::new(Vec::new()),
            passes: AtomicU64::new(0),
        };
        engine.register_strategy(Box::new(RightTree));
        engine.register_strategy(Box::new(Balanced));
        engine
    }

    /// Engine measuring with the fonts and cache bounds from `settings`.
    pub fn from_settings(settings: &Settings, clock: Arc<dyn Clock>) -> Result<Self, LayoutError> {
        let measurer = MeasurementService::from_settings(settings)?;
        Ok(Self::with_parts(measurer, &settings.cache, clock))
    }

    /// Swap in the fonts and cache bounds from `settings`, keeping strategies,
    /// listeners and the pass counter. On error the engine is unchanged.
    pub fn reconfigure(&mut self, settings: &Settings) -> Result<(), LayoutError> {
        let measurer = MeasurementService::from_settings(settings)?;
        let clock = Arc::clone(self.cache.clock());
        self.measurer = measurer;
        self.cache = LayoutCache::new(&settings.cache, clock);
        tracing::debug!(
            fonts = settings.fonts.len(),
            sizes = settings.cache.size_capacity,
            "layout engine reconfigured"
        );
        Ok(())
    }

    /// Add a strategy, replacing any with the same name.
    pub fn register_strategy(&mut self, strategy: Box<dyn SubtreeStrategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    pub fn on_layout_applied(&self, listener: impl Fn(&LayoutApplied) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    pub fn measurer(&self) -> &MeasurementService {
        &self.measurer
    }

    pub fn cache_stats(&self) -> LayoutCacheStats {
        self.cache.stats()
    }

    /// Drop every cached value, e.g. when switching documents.
    pub fn clear_caches(&self) {
        self.cache.clear();
    }

    /// Children were added, removed or moved between parents.
    pub fn notify_structure_changed(&self) {
        self.cache.clear_counts();
    }

    /// Size of `node` under `settings`, served from the cache.
    pub fn node_size(&self, node: &Node, settings: &Settings) -> NodeSize {
        let editing = settings.is_editing(&node.id);
        let edit_text = if editing {
            settings.view.edit_text.as_deref()
        } else {
            None
        };
        let fingerprint = content_fingerprint(
            node,
            edit_text,
            editing,
            &settings.wrap,
            &settings.font_family,
        );
        let key = SizeKey::new(&node.id, fingerprint, settings.font_size, node.kind);
        self.cache.size(key, || {
            SizeCalculator::new(&self.measurer, &settings.font_family).size(
                node,
                edit_text,
                editing,
                settings.font_size,
                &settings.wrap,
            )
        })
    }

    /// Vertical extent of `node` and its visible descendants. Cached bounds
    /// are keyed by each node's own y and collapse state, which misses changes
    /// further down, so they are dropped before every query.
    pub fn subtree_bounds(&self, node: &Node, settings: &Settings) -> Bounds {
        self.cache.clear_bounds();
        subtree_bounds(node, &self.sizes(settings), &self.cache)
    }

    pub fn subtree_count(&self, node: &Node) -> usize {
        subtree_count(node, &self.cache)
    }

    /// World position of the collapse toggle of node `id`.
    pub fn toggle_anchor(&self, forest: &Forest, settings: &Settings, id: &str) -> Option<(f64, f64)> {
        let node = forest.find(id)?;
        let root = forest.root_of(id)?;
        let side = Side::of(root.id == node.id, node.x, root.x);
        let size = self.node_size(node, settings);
        let font_size = node
            .font
            .as_ref()
            .and_then(|f| f.size)
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(settings.font_size);
        Some(geometry::toggle_anchor(node.x, node.y, &size, side, font_size))
    }

    /// Run one layout pass over `forest`.
    ///
    /// On success the forest carries the new coordinates, the viewport has
    /// absorbed the anchor's movement and listeners have been notified. On
    /// failure neither the forest nor the viewport is touched. The pending
    /// anchor is consumed either way.
    ///
    /// Visible node counts stay cached between passes. Callers that add,
    /// remove or collapse nodes must call [`Self::notify_structure_changed`]
    /// first or the root gaps are computed from stale counts (subtrees still
    /// never overlap). [`crate::Session::edit`] does this for every edit.
    pub fn layout(
        &self,
        forest: &mut Forest,
        settings: &Settings,
        ctx: &mut LayoutContext,
    ) -> Result<LayoutApplied, LayoutError> {
        let started = self.cache.clock().now();
        let anchor = ctx.pending_anchor.take();
        let pass = self.passes.fetch_add(1, Ordering::Relaxed) + 1;

        let next = match self.arrange(forest, settings) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(pass, error = %e, "layout pass aborted");
                return Err(e);
            }
        };

        let anchor_shift = anchor.as_deref().and_then(|id| {
            let (bx, by) = forest.position_of(id)?;
            let (ax, ay) = next.position_of(id)?;
            Some((ax - bx, ay - by))
        });
        *forest = next;
        if let Some((dx, dy)) = anchor_shift {
            ctx.viewport.pan_x += dx;
            ctx.viewport.pan_y += dy;
        }

        let applied = LayoutApplied {
            pass,
            roots: forest.roots.len(),
            nodes: forest.roots.iter().map(|r| self.subtree_count(r)).sum(),
            anchor_shift,
            elapsed: self.cache.clock().now().saturating_sub(started),
        };
        tracing::debug!(
            pass,
            roots = applied.roots,
            nodes = applied.nodes,
            elapsed_us = applied.elapsed.as_micros() as u64,
            anchored = applied.anchor_shift.is_some(),
            "layout pass applied"
        );

        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener(&applied);
        }
        Ok(applied)
    }

    /// Arrange and stack every root on a copy of `forest`.
    fn arrange(&self, forest: &Forest, settings: &Settings) -> Result<Forest, LayoutError> {
        forest.validate()?;
        let strategy = self
            .strategies
            .get(&settings.strategy)
            .ok_or_else(|| LayoutError::UnknownStrategy(settings.strategy.clone()))?;

        self.cache.maybe_sweep();
        self.cache.clear_bounds();

        let sizes = self.sizes(settings);
        let params = StrategyParams {
            spacing: settings.spacing,
            level_gap: settings.level_gap,
        };

        let mut next = forest.clone();
        let mut previous: Option<(f64, usize)> = None;
        for root in &mut next.roots {
            // Arrange with the root at the origin so the result does not
            // depend on where the root was before this pass.
            let (x, y) = (root.x, root.y);
            root.shift(-x, -y);
            strategy.arrange(root, &sizes, &params);
            let count = subtree_count(root, &self.cache);

            self.cache.clear_bounds();
            let local = subtree_bounds(root, &sizes, &self.cache);
            let target_y = match previous {
                Some((prev_bottom, prev_count)) => {
                    prev_bottom + root_gap(prev_count, count) - local.min_y
                }
                None => y,
            };
            root.shift(x, target_y);
            self.cache.clear_bounds();

            previous = Some((local.max_y + target_y, count));
        }

        next.validate()?;
        Ok(next)
    }

    fn sizes<'a>(&'a self, settings: &'a Settings) -> EngineSizes<'a> {
        EngineSizes {
            engine: self,
            settings,
        }
    }
}

/// Cached node sizes for one settings snapshot.
struct EngineSizes<'a> {
    engine: &'a LayoutEngine,
    settings: &'a Settings,
}

impl SizeSource for EngineSizes<'_> {
    fn node_size(&self, node: &Node) -> NodeSize {
        self.engine.node_size(node, self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::AtomicUsize;

    fn engine() -> LayoutEngine {
        LayoutEngine::with_parts(
            MeasurementService::heuristic(),
            &CacheConfig::default(),
            Arc::new(ManualClock::new()),
        )
    }

    fn sample() -> Forest {
        Forest::new(vec![
            Node::new("a", "Alpha").with_children(vec![Node::new("a1", "one"), Node::new("a2", "two")]),
            Node::new("b", "Beta").with_children(vec![Node::new("b1", "child")]),
        ])
    }

    #[test]
    fn root_gap_grows_and_caps() {
        assert_eq!(root_gap(1, 2), 9.0);
        assert_eq!(root_gap(10, 0), 13.0);
        assert_eq!(root_gap(1000, 1), 24.0);
    }

    #[test]
    fn second_root_sits_one_gap_below_first() {
        let engine = engine();
        let settings = Settings::default();
        let mut forest = sample();
        engine
            .layout(&mut forest, &settings, &mut LayoutContext::default())
            .unwrap();
        let a = engine.subtree_bounds(&forest.roots[0], &settings);
        let b = engine.subtree_bounds(&forest.roots[1], &settings);
        assert!((b.min_y - (a.max_y + root_gap(3, 2))).abs() < 1e-9);
    }

    #[test]
    fn collapsing_a_child_shrinks_root_bounds_without_relayout() {
        let engine = engine();
        let settings = Settings::default();
        let mut forest = Forest::new(vec![Node::new("r", "root").with_children(vec![
            Node::new("c", "child").with_children(vec![
                Node::new("g1", "one"),
                Node::new("g2", "two"),
                Node::new("g3", "three"),
            ]),
        ])]);
        engine
            .layout(&mut forest, &settings, &mut LayoutContext::default())
            .unwrap();
        let open = engine.subtree_bounds(&forest.roots[0], &settings);

        forest.find_mut("c").unwrap().collapsed = true;
        let closed = engine.subtree_bounds(&forest.roots[0], &settings);
        assert!(closed.height() < open.height(), "{:?} vs {:?}", open, closed);
        assert_eq!(closed, self::engine().subtree_bounds(&forest.roots[0], &settings));
    }

    #[test]
    fn unknown_strategy_leaves_forest_untouched() {
        let engine = engine();
        let settings = Settings {
            strategy: "radial".to_string(),
            ..Settings::default()
        };
        let mut forest = sample();
        let before = forest.clone();
        let mut ctx = LayoutContext::default();
        ctx.anchor("a1");
        let err = engine.layout(&mut forest, &settings, &mut ctx).unwrap_err();
        assert!(matches!(err, LayoutError::UnknownStrategy(ref s) if s == "radial"));
        assert_eq!(forest, before);
        assert!(ctx.pending_anchor.is_none());
        assert_eq!(ctx.viewport, Viewport::default());
    }

    #[test]
    fn duplicate_ids_abort() {
        let engine = engine();
        let mut forest = Forest::new(vec![Node::new("x", "1"), Node::new("x", "2")]);
        let err = engine
            .layout(&mut forest, &Settings::default(), &mut LayoutContext::default())
            .unwrap_err();
        assert!(matches!(err, LayoutError::CorruptTree(_)));
    }

    #[test]
    fn listeners_receive_each_pass() {
        let engine = engine();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        engine.on_layout_applied(move |applied| {
            assert_eq!(applied.roots, 2);
            assert_eq!(applied.nodes, 5);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut forest = sample();
        let mut ctx = LayoutContext::default();
        let first = engine.layout(&mut forest, &Settings::default(), &mut ctx).unwrap();
        let second = engine.layout(&mut forest, &Settings::default(), &mut ctx).unwrap();
        assert_eq!((first.pass, second.pass), (1, 2));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn anchor_pans_by_its_movement() {
        let engine = engine();
        let settings = Settings::default();
        let mut forest = sample();
        let mut ctx = LayoutContext::default();
        engine.layout(&mut forest, &settings, &mut ctx).unwrap();

        let (bx, by) = forest.position_of("b1").unwrap();
        forest
            .find_mut("a")
            .unwrap()
            .children
            .push(Node::new("a3", "three"));
        engine.notify_structure_changed();
        ctx.anchor("b1");
        let applied = engine.layout(&mut forest, &settings, &mut ctx).unwrap();
        let (ax, ay) = forest.position_of("b1").unwrap();
        let (dx, dy) = applied.anchor_shift.unwrap();
        assert!(dy > 0.0);
        assert_eq!((ctx.viewport.pan_x, ctx.viewport.pan_y), (ax - bx, ay - by));
        assert_eq!((dx, dy), (ax - bx, ay - by));
        assert!(ctx.pending_anchor.is_none());
    }

    #[test]
    fn unresolved_anchor_is_dropped() {
        let engine = engine();
        let mut forest = sample();
        let mut ctx = LayoutContext::default();
        ctx.anchor("missing");
        let applied = engine.layout(&mut forest, &Settings::default(), &mut ctx).unwrap();
        assert!(applied.anchor_shift.is_none());
        assert!(ctx.pending_anchor.is_none());
        assert_eq!(ctx.viewport, Viewport::default());
    }

    #[test]
    fn toggle_anchor_faces_away_from_root() {
        let engine = engine();
        let settings = Settings {
            strategy: "balanced".to_string(),
            ..Settings::default()
        };
        let mut forest = Forest::new(vec![Node::new("r", "Root")
            .with_children(vec![Node::new("right", "R"), Node::new("left", "L")])]);
        engine
            .layout(&mut forest, &settings, &mut LayoutContext::default())
            .unwrap();
        let left = forest.find("left").unwrap();
        let (tx, ty) = engine.toggle_anchor(&forest, &settings, "left").unwrap();
        let w = engine.node_size(left, &settings).width;
        assert!(tx < geometry::left(left.x, w));
        assert_eq!(ty, left.y);
        assert!(engine.toggle_anchor(&forest, &settings, "nope").is_none());
    }

    #[test]
    fn size_cache_serves_identical_values() {
        let engine = engine();
        let settings = Settings::default();
        let node = Node::new("n", "Some **styled** text that is long enough to wrap twice over");
        let first = engine.node_size(&node, &settings);
        let hits_before = engine.cache_stats().sizes.hits;
        let second = engine.node_size(&node, &settings);
        assert_eq!(engine.cache_stats().sizes.hits, hits_before + 1);
        assert_eq!(first.width.to_bits(), second.width.to_bits());
        assert_eq!(first.height.to_bits(), second.height.to_bits());
    }
}
