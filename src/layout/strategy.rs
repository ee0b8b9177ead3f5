//! Per-root tree arrangement.
//!
//! A strategy positions every visible descendant of one root; the root
//! itself keeps its coordinates. Both built-in strategies share the same
//! contract:
//!
//! - **x by depth.** Nodes at the same depth share a column. Columns are
//!   left-aligned (right-aligned when mirrored) and spaced by the widest node
//!   of the previous column plus the level gap.
//! - **y centred on the parent.** Each node owns a block as tall as the
//!   larger of its own height and its children's stacked blocks; children's
//!   blocks are stacked with the sibling spacing and centred on the parent.

use rustc_hash::FxHashMap;

use crate::model::Node;
use crate::size::NodeSize;

/// Where a strategy gets node sizes from. The engine serves them from the
/// layout cache.
pub trait SizeSource {
    fn node_size(&self, node: &Node) -> NodeSize;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyParams {
    /// Vertical gap between sibling blocks.
    pub spacing: f64,
    /// Horizontal gap between depth columns.
    pub level_gap: f64,
}

pub trait SubtreeStrategy: Send + Sync {
    /// Name the strategy is selected by in the settings.
    fn name(&self) -> &str;

    /// Position every visible descendant of `root`.
    fn arrange(&self, root: &mut Node, sizes: &dyn SizeSource, params: &StrategyParams);
}

/// Every child opens to the right of its parent.
#[derive(Debug, Clone, Copy, Default)]
pub struct RightTree;

impl SubtreeStrategy for RightTree {
    fn name(&self) -> &str {
        "right"
    }

    fn arrange(&self, root: &mut Node, sizes: &dyn SizeSource, params: &StrategyParams) {
        let (x, y) = (root.x, root.y);
        let width = sizes.node_size(root).width;
        if root.collapsed {
            return;
        }
        let group: Vec<&mut Node> = root.children.iter_mut().collect();
        arrange_side(group, x, y, width, Direction::Right, sizes, params);
    }
}

/// The root's children are split in two: the first half opens to the
/// right, the rest mirrored to the left.
#[derive(Debug, Clone, Copy, Default)]
pub struct Balanced;

impl SubtreeStrategy for Balanced {
    fn name(&self) -> &str {
        "balanced"
    }

    fn arrange(&self, root: &mut Node, sizes: &dyn SizeSource, params: &StrategyParams) {
        let (x, y) = (root.x, root.y);
        let width = sizes.node_size(root).width;
        if root.collapsed {
            return;
        }
        let right_count = root.children.len().div_ceil(2);
        let (right, left) = root.children.split_at_mut(right_count);
        arrange_side(right.iter_mut().collect(), x, y, width, Direction::Right, sizes, params);
        arrange_side(left.iter_mut().collect(), x, y, width, Direction::Left, sizes, params);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Right,
    Left,
}

impl Direction {
    fn sign(self) -> f64 {
        match self {
            Direction::Right => 1.0,
            Direction::Left => -1.0,
        }
    }
}

/// Column edges for one side of a root: `edges[d - 1]` is the inner edge of
/// depth `d`.
struct Columns {
    edges: Vec<f64>,
    direction: Direction,
}

impl Columns {
    fn new(
        root_x: f64,
        root_width: f64,
        widths: &[f64],
        direction: Direction,
        level_gap: f64,
    ) -> Self {
        let sign = direction.sign();
        let mut edges = Vec::with_capacity(widths.len());
        let mut edge = root_x + sign * (root_width / 2.0 + level_gap);
        for w in widths {
            edges.push(edge);
            edge += sign * (w + level_gap);
        }
        Self { edges, direction }
    }

    fn x_for(&self, depth: usize, width: f64) -> f64 {
        self.edges[depth - 1] + self.direction.sign() * width / 2.0
    }
}

fn arrange_side(
    group: Vec<&mut Node>,
    root_x: f64,
    root_y: f64,
    root_width: f64,
    direction: Direction,
    sizes: &dyn SizeSource,
    params: &StrategyParams,
) {
    if group.is_empty() {
        return;
    }
    let mut widths = Vec::new();
    let mut blocks = FxHashMap::default();
    for node in &group {
        measure(node, 1, sizes, params.spacing, &mut widths, &mut blocks);
    }
    let columns = Columns::new(root_x, root_width, &widths, direction, params.level_gap);
    place(group, root_y, 1, &columns, sizes, &blocks, params.spacing);
}

/// Record the widest node per depth and each visible node's block height.
fn measure(
    node: &Node,
    depth: usize,
    sizes: &dyn SizeSource,
    spacing: f64,
    widths: &mut Vec<f64>,
    blocks: &mut FxHashMap<String, f64>,
) -> f64 {
    let size = sizes.node_size(node);
    if widths.len() < depth {
        widths.push(0.0);
    }
    widths[depth - 1] = widths[depth - 1].max(size.width);

    let children = node.visible_children();
    let mut stacked = 0.0;
    for child in children {
        stacked += measure(child, depth + 1, sizes, spacing, widths, blocks);
    }
    if children.len() > 1 {
        stacked += spacing * (children.len() - 1) as f64;
    }
    let block = size.height.max(stacked);
    blocks.insert(node.id.clone(), block);
    block
}

fn place(
    group: Vec<&mut Node>,
    center_y: f64,
    depth: usize,
    columns: &Columns,
    sizes: &dyn SizeSource,
    blocks: &FxHashMap<String, f64>,
    spacing: f64,
) {
    let block_of = |node: &Node| blocks.get(&node.id).copied().unwrap_or(0.0);
    let total: f64 = group.iter().map(|n| block_of(n)).sum::<f64>()
        + spacing * group.len().saturating_sub(1) as f64;

    let mut cursor = center_y - total / 2.0;
    for node in group {
        let block = block_of(node);
        let width = sizes.node_size(node).width;
        node.x = columns.x_for(depth, width);
        node.y = cursor + block / 2.0;
        cursor += block + spacing;
        if !node.collapsed {
            let y = node.y;
            place(
                node.children.iter_mut().collect(),
                y,
                depth + 1,
                columns,
                sizes,
                blocks,
                spacing,
            );
        }
    }
}
