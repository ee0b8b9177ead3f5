//! Subtree extents and node counts, memoized in the layout cache.

use crate::cache::{BoundsKey, CountKey, LayoutCache};
use crate::geometry::Bounds;
use crate::model::Node;

use super::strategy::SizeSource;

/// Extra room kept above and below table nodes for their frame.
const TABLE_MARGIN: f64 = 10.0;

/// Vertical extent of `node` and every visible descendant.
///
/// Entries are keyed by the node's own y only, so the caller must clear the
/// bounds cache whenever descendants may have moved under a fixed parent.
pub fn subtree_bounds(node: &Node, sizes: &dyn SizeSource, cache: &LayoutCache) -> Bounds {
    let key = BoundsKey::new(&node.id, node.y, node.collapsed);
    cache.bounds(key, || {
        let own = Bounds::of_box(node.y, sizes.node_size(node).height);
        let bounds = node
            .visible_children()
            .iter()
            .fold(own, |acc, child| acc.union(subtree_bounds(child, sizes, cache)));
        if node.is_table() {
            bounds.expand(TABLE_MARGIN)
        } else {
            bounds
        }
    })
}

/// Number of nodes in the subtree that take part in layout.
pub fn subtree_count(node: &Node, cache: &LayoutCache) -> usize {
    cache.count(CountKey::new(&node.id, node.collapsed), || {
        1 + node
            .visible_children()
            .iter()
            .map(|child| subtree_count(child, cache))
            .sum::<usize>()
    })
}
